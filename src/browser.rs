use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::batch::{self, BatchActionResult};
use crate::client::models::QueueMessage;
use crate::client::{self, BrokerClient};
use crate::directory::contains_ignore_case;
use crate::error::{ConsoleError, ConsoleResult};
use crate::session::{ActiveConnection, Epoch, Session};

/// Ids of the messages picked for a batch action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Proof that a load was started for `queue` under a given connection.
/// Only the most recently issued ticket may apply its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    epoch: Epoch,
    queue: String,
    generation: u64,
}

impl LoadTicket {
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

/// Messages of one queue plus the operator's filter and selection.
#[derive(Default)]
pub struct MessageBrowser {
    queue: Option<String>,
    snapshot: Vec<QueueMessage>,
    epoch: Epoch,
    query: String,
    selection: SelectionSet,
    in_flight: Option<LoadTicket>,
    generation: u64,
}

impl MessageBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue currently browsed.
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Start loading `queue`, refused while a load of the same queue is
    /// running. A load of another queue is superseded. Any selection is
    /// dropped immediately; moving to a different queue also resets the filter.
    pub fn begin_load(
        &mut self,
        session: &Session,
        queue: &str,
    ) -> ConsoleResult<(LoadTicket, Arc<dyn BrokerClient>)> {
        let conn = session.connection()?;
        if let Some(running) = &self.in_flight {
            if running.epoch == conn.epoch && running.queue == queue {
                return Err(ConsoleError::InFlight {
                    resource: format!("messages of '{}'", queue),
                });
            }
        }
        Ok(self.issue(conn, queue))
    }

    /// Start loading `queue` after it was changed, superseding any load of it
    /// that is still running: that load may have been answered before the change.
    pub fn begin_reload(
        &mut self,
        session: &Session,
        queue: &str,
    ) -> ConsoleResult<(LoadTicket, Arc<dyn BrokerClient>)> {
        let conn = session.connection()?;
        if self.in_flight.is_some() {
            debug!("Superseding running load with a reload of '{}'", queue);
        }
        Ok(self.issue(conn, queue))
    }

    fn issue(&mut self, conn: ActiveConnection, queue: &str) -> (LoadTicket, Arc<dyn BrokerClient>) {
        if self.queue.as_deref() != Some(queue) {
            self.queue = Some(queue.to_string());
            self.snapshot.clear();
            self.query.clear();
        }
        self.selection.clear();
        self.generation += 1;
        let ticket = LoadTicket {
            epoch: conn.epoch,
            queue: queue.to_string(),
            generation: self.generation,
        };
        self.in_flight = Some(ticket.clone());
        (ticket, conn.client)
    }

    /// Apply a browse result. A failed browse leaves an empty snapshot and
    /// reports the error. A superseded ticket or one from another connection
    /// is dropped.
    pub fn complete_load(
        &mut self,
        session: &Session,
        ticket: LoadTicket,
        result: client::Result<Vec<QueueMessage>>,
    ) -> ConsoleResult<&[QueueMessage]> {
        if self.in_flight.as_ref() != Some(&ticket) {
            debug!(
                "Discarding messages of '{}' from superseded load #{}",
                ticket.queue, ticket.generation
            );
            return Err(ConsoleError::Stale);
        }
        self.in_flight = None;
        if !session.is_current(ticket.epoch) {
            debug!("Discarding messages of '{}' from a stale load", ticket.queue);
            return Err(ConsoleError::Stale);
        }
        self.selection.clear();
        self.epoch = ticket.epoch;
        match result {
            Ok(messages) => {
                info!("Loaded {} messages from '{}'", messages.len(), ticket.queue);
                self.snapshot = messages;
                Ok(&self.snapshot)
            }
            Err(e) => {
                warn!("Error browsing queue '{}': {}", ticket.queue, e);
                self.snapshot.clear();
                Err(ConsoleError::Transport(e))
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Last fetched messages, or nothing if they belong to another connection.
    pub fn snapshot(&self, session: &Session) -> &[QueueMessage] {
        if session.is_current(self.epoch) {
            &self.snapshot
        } else {
            &[]
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Snapshot under the active filter.
    pub fn visible(&self, session: &Session) -> Vec<&QueueMessage> {
        filter(self.snapshot(session), &self.query)
    }

    // ────────── Selection ──────────

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Flip `id` in the selection. Ids not in the snapshot are ignored.
    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.snapshot.iter().any(|m| m.id == id) {
            return false;
        }
        self.selection.toggle(id)
    }

    /// Select exactly the messages visible under the current filter, adding to
    /// any existing selection. Returns how many are selected afterwards.
    pub fn select_all_visible(&mut self, session: &Session) -> usize {
        let ids: Vec<String> = self
            .visible(session)
            .into_iter()
            .map(|m| m.id.clone())
            .collect();
        self.selection.ids.extend(ids);
        self.selection.len()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Drop everything, e.g. after a connection switch. Tickets issued
    /// before stay unusable.
    pub fn invalidate(&mut self) {
        *self = Self {
            generation: self.generation,
            ..Self::default()
        };
    }

    // ────────── Batch actions ──────────

    /// What a batch action needs: the selection, or `fallback` alone when
    /// nothing is selected. `None` when there is nothing to act on.
    pub fn batch_request(
        &self,
        session: &Session,
        fallback: Option<&str>,
    ) -> ConsoleResult<Option<BatchRequest>> {
        let conn = session.connection()?;
        let Some(queue) = self.queue.clone() else {
            return Ok(None);
        };
        let ids = if !self.selection.is_empty() {
            self.selection.to_vec()
        } else {
            match fallback {
                Some(id) if self.snapshot.iter().any(|m| m.id == id) => vec![id.to_string()],
                _ => return Ok(None),
            }
        };
        Ok(Some(BatchRequest {
            client: conn.client,
            queue,
            ids,
        }))
    }

    /// Drop the selection after a batch ran and hand back the queue to reload.
    pub fn finish_batch(&mut self) -> Option<String> {
        self.selection.clear();
        self.queue.clone()
    }
}

/// Inputs of a batch action, detached from the browser so it can run on a
/// spawned task.
pub struct BatchRequest {
    pub client: Arc<dyn BrokerClient>,
    pub queue: String,
    pub ids: Vec<String>,
}

impl BatchRequest {
    pub async fn delete(
        self,
        concurrency: usize,
        progress: Option<UnboundedSender<usize>>,
    ) -> BatchActionResult {
        batch::batch_delete(self.client, self.ids, &self.queue, concurrency, progress).await
    }

    pub async fn move_to(
        self,
        target: &str,
        concurrency: usize,
        progress: Option<UnboundedSender<usize>>,
    ) -> ConsoleResult<BatchActionResult> {
        batch::batch_move(self.client, self.ids, &self.queue, target, concurrency, progress).await
    }
}

/// Messages whose id, timestamp or type contains `query`, ignoring case, in
/// fetch order.
pub fn filter<'a>(snapshot: &'a [QueueMessage], query: &str) -> Vec<&'a QueueMessage> {
    if query.is_empty() {
        return snapshot.iter().collect();
    }
    let needle = query.to_lowercase();
    snapshot
        .iter()
        .filter(|m| {
            contains_ignore_case(&m.id, &needle)
                || contains_ignore_case(&m.timestamp, &needle)
                || contains_ignore_case(&m.timestamp_display(), &needle)
                || contains_ignore_case(&m.message_type, &needle)
        })
        .collect()
}
