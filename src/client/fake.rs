//! Scriptable in-memory broker used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::broker::BrokerClient;
use super::error::{BrokerError, Result};
use super::models::{QueueMessage, QueueSummary};

#[derive(Default)]
pub struct FakeBroker {
    label: String,
    queues: Mutex<Vec<QueueSummary>>,
    list_fails: Mutex<bool>,
    messages: Mutex<HashMap<String, Vec<QueueMessage>>>,
    browse_fails: bool,
    /// Ids whose move/delete reports `false`.
    rejected: HashSet<String>,
    /// Ids whose move/delete returns an error.
    erroring: HashSet<String>,
    /// Ids whose move/delete panics.
    panicking: HashSet<String>,
    list_gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self {
            label: "fake://broker".to_string(),
            ..Default::default()
        }
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_queues(self, names: &[&str]) -> Self {
        *self.queues.lock().unwrap() = names.iter().map(|n| QueueSummary::new(*n)).collect();
        self
    }

    pub fn with_messages(self, queue: &str, msgs: Vec<QueueMessage>) -> Self {
        self.messages.lock().unwrap().insert(queue.to_string(), msgs);
        self
    }

    pub fn failing_browse(mut self) -> Self {
        self.browse_fails = true;
        self
    }

    pub fn rejecting(mut self, id: &str) -> Self {
        self.rejected.insert(id.to_string());
        self
    }

    pub fn erroring(mut self, id: &str) -> Self {
        self.erroring.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    /// `list_queues` waits for one `notify_one` on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.list_gate = Some(gate);
        self
    }

    pub fn shared(self) -> Arc<dyn BrokerClient> {
        Arc::new(self)
    }

    pub fn set_list_fails(&self, fails: bool) {
        *self.list_fails.lock().unwrap() = fails;
    }

    pub fn set_queues(&self, names: &[&str]) {
        *self.queues.lock().unwrap() = names.iter().map(|n| QueueSummary::new(*n)).collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self, queue: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .get(queue)
            .map(|m| m.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    fn outcome(&self, id: &str) -> Result<bool> {
        if self.panicking.contains(id) {
            panic!("scripted panic for {}", id);
        }
        if self.erroring.contains(id) {
            return Err(BrokerError::InvalidResponse(format!("scripted failure for {}", id)));
        }
        Ok(!self.rejected.contains(id))
    }

    fn take(&self, queue: &str, id: &str) -> Option<QueueMessage> {
        let mut all = self.messages.lock().unwrap();
        let msgs = all.get_mut(queue)?;
        let idx = msgs.iter().position(|m| m.id == id)?;
        Some(msgs.remove(idx))
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        if *self.list_fails.lock().unwrap() {
            return Err(BrokerError::Api {
                status: 401,
                body: "Unauthorized".into(),
            });
        }
        Ok(self.queues.lock().unwrap().clone())
    }

    async fn browse_messages(&self, queue: &str) -> Result<Vec<QueueMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.browse_fails {
            return Err(BrokerError::Jolokia {
                status: 404,
                error: "javax.management.InstanceNotFoundException".into(),
            });
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(queue)
            .cloned()
            .unwrap_or_default())
    }

    async fn move_message(&self, message_id: &str, source: &str, target: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.outcome(message_id)?;
        if ok {
            if let Some(msg) = self.take(source, message_id) {
                self.messages
                    .lock()
                    .unwrap()
                    .entry(target.to_string())
                    .or_default()
                    .push(msg);
            }
        }
        Ok(ok)
    }

    async fn delete_message(&self, message_id: &str, queue: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.outcome(message_id)?;
        if ok {
            self.take(queue, message_id);
        }
        Ok(ok)
    }
}

/// Message with the given id, type and millisecond timestamp.
pub fn message(id: &str, message_type: &str, timestamp: &str) -> QueueMessage {
    QueueMessage {
        id: id.to_string(),
        timestamp: timestamp.to_string(),
        message_type: message_type.to_string(),
        priority: Some(4),
        ..Default::default()
    }
}
