use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat};

// ──────────────────────────── Queue Models ────────────────────────────

/// Point-in-time statistics for one queue, as returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSummary {
    pub name: String,
    pub pending_count: u64,
    pub consumer_count: u64,
    pub enqueued_count: u64,
    pub dequeued_count: u64,
}

impl QueueSummary {
    #[cfg(test)]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ──────────────────────────── Message Models ────────────────────────────

/// A browsed message. Read-only snapshot: stale as soon as anything moves or
/// deletes messages on the source queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueMessage {
    pub id: String,
    /// Broker-provided timestamp in its textual form (epoch millis or a date string).
    pub timestamp: String,
    pub priority: Option<i32>,
    pub redelivered: bool,
    pub message_type: String,
    /// Every field the broker sent that has no named slot above.
    pub properties: BTreeMap<String, String>,
    pub body: String,
}

impl QueueMessage {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Human-readable timestamp. Epoch millis are rendered as RFC 3339 (UTC);
    /// anything else is shown as received.
    pub fn timestamp_display(&self) -> String {
        self.timestamp
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| self.timestamp.clone())
    }
}
