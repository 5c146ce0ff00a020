use async_trait::async_trait;

use super::error::Result;
use super::models::{QueueMessage, QueueSummary};

/// Operations the console needs from a broker management endpoint.
///
/// Implementations own their timeout and retry policy. Callers only look at
/// success versus failure: for `move_message` and `delete_message` both
/// `Ok(false)` and `Err(_)` count as a failed item.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Short label for logs, e.g. `http://localhost:8161/api/jolokia`.
    fn describe(&self) -> String;

    async fn list_queues(&self) -> Result<Vec<QueueSummary>>;

    async fn browse_messages(&self, queue: &str) -> Result<Vec<QueueMessage>>;

    async fn move_message(&self, message_id: &str, source: &str, target: &str) -> Result<bool>;

    async fn delete_message(&self, message_id: &str, queue: &str) -> Result<bool>;
}
