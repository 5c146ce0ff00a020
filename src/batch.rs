use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::BrokerClient;
use crate::error::{ConsoleError, ConsoleResult};

/// Outcome of a delete or move sweep over a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchActionResult {
    pub attempted: usize,
    pub succeeded: usize,
    /// Ids the broker refused or that errored, in selection order.
    pub failed: Vec<String>,
}

impl BatchActionResult {
    pub fn failed_count(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn summary(&self, verb: &str) -> String {
        if self.failed.is_empty() {
            format!("{} {} message(s)", verb, self.succeeded)
        } else {
            format!(
                "{} {}/{} message(s), {} failed",
                verb,
                self.succeeded,
                self.attempted,
                self.failed_count()
            )
        }
    }
}

#[derive(Clone)]
enum Action {
    Delete { queue: String },
    Move { source: String, target: String },
}

impl Action {
    async fn apply(&self, client: &dyn BrokerClient, id: &str) -> bool {
        let outcome = match self {
            Action::Delete { queue } => client.delete_message(id, queue).await,
            Action::Move { source, target } => client.move_message(id, source, target).await,
        };
        match outcome {
            Ok(true) => true,
            Ok(false) => {
                warn!("Broker rejected action on message {}", id);
                false
            }
            Err(e) => {
                warn!("Action on message {} failed: {}", id, e);
                false
            }
        }
    }
}

/// Delete each of `ids` from `queue`, `concurrency` requests at a time.
/// `progress` receives the number of finished items after each one.
pub async fn batch_delete(
    client: Arc<dyn BrokerClient>,
    ids: Vec<String>,
    queue: &str,
    concurrency: usize,
    progress: Option<UnboundedSender<usize>>,
) -> BatchActionResult {
    let action = Action::Delete {
        queue: queue.to_string(),
    };
    let result = run(client, ids, action, concurrency, progress).await;
    info!("Batch delete on '{}': {}", queue, result.summary("deleted"));
    result
}

/// Move each of `ids` from `source` to `target`. A move onto `source` itself
/// is refused before anything is sent.
pub async fn batch_move(
    client: Arc<dyn BrokerClient>,
    ids: Vec<String>,
    source: &str,
    target: &str,
    concurrency: usize,
    progress: Option<UnboundedSender<usize>>,
) -> ConsoleResult<BatchActionResult> {
    if target == source {
        return Err(ConsoleError::InvalidTarget {
            queue: source.to_string(),
        });
    }
    let action = Action::Move {
        source: source.to_string(),
        target: target.to_string(),
    };
    let result = run(client, ids, action, concurrency, progress).await;
    info!(
        "Batch move '{}' -> '{}': {}",
        source,
        target,
        result.summary("moved")
    );
    Ok(result)
}

/// Drain `ids` with a fixed pool of workers. Anything not confirmed by a
/// worker counts as failed: the item a worker panicked on, and whatever was
/// still queued when no worker was left to take it.
async fn run(
    client: Arc<dyn BrokerClient>,
    ids: Vec<String>,
    action: Action,
    concurrency: usize,
    progress: Option<UnboundedSender<usize>>,
) -> BatchActionResult {
    let attempted = ids.len();
    let pending = Arc::new(Mutex::new(ids.iter().cloned().collect::<VecDeque<_>>()));
    let finished = Arc::new(AtomicUsize::new(0));
    let confirmed = Arc::new(Mutex::new(HashSet::new()));

    let workers = concurrency.clamp(1, attempted.max(1));
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let client = Arc::clone(&client);
        let pending = Arc::clone(&pending);
        let finished = Arc::clone(&finished);
        let confirmed = Arc::clone(&confirmed);
        let action = action.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let Some(id) = pending.lock().await.pop_front() else {
                    return;
                };
                if action.apply(client.as_ref(), &id).await {
                    confirmed.lock().await.insert(id);
                }
                let n = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref tx) = progress {
                    let _ = tx.send(n);
                }
            }
        }));
    }

    for h in handles {
        if let Err(e) = h.await {
            warn!("Batch worker aborted: {}", e);
        }
    }

    let succeeded = confirmed.lock().await;

    let failed: Vec<String> = ids
        .into_iter()
        .filter(|id| !succeeded.contains(id))
        .collect();
    BatchActionResult {
        attempted,
        succeeded: attempted - failed.len(),
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{message, FakeBroker};

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn broker_with(queue: &str, raw: &[&str]) -> FakeBroker {
        FakeBroker::new().with_messages(
            queue,
            raw.iter().map(|id| message(id, "T", "0")).collect(),
        )
    }

    #[tokio::test]
    async fn partial_failure_is_counted() {
        let fake = Arc::new(broker_with("Orders", &["a", "b", "c"]).rejecting("b"));
        let result = batch_delete(fake.clone(), ids(&["a", "b", "c"]), "Orders", 8, None).await;
        assert_eq!(result.attempted, 3);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, vec!["b"]);
        assert_eq!(fake.remaining("Orders"), vec!["b"]);
    }

    #[tokio::test]
    async fn errors_count_as_failures() {
        let fake = Arc::new(
            broker_with("DLQ.Orders", &["a", "b", "c", "d"])
                .erroring("a")
                .rejecting("d"),
        );
        let result = batch_move(
            fake.clone(),
            ids(&["a", "b", "c", "d"]),
            "DLQ.Orders",
            "Orders",
            2,
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.attempted, 4);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, vec!["a", "d"]);
        assert_eq!(result.summary("moved"), "moved 2/4 message(s), 2 failed");
    }

    #[tokio::test]
    async fn move_onto_source_makes_no_calls() {
        let fake = Arc::new(broker_with("Orders", &["a"]));
        let err = batch_move(fake.clone(), ids(&["a"]), "Orders", "Orders", 4, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidTarget { ref queue } if queue == "Orders"));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn every_item_attempted_once() {
        let raw: Vec<String> = (0..50).map(|i| format!("ID:{}", i)).collect();
        let refs: Vec<&str> = raw.iter().map(String::as_str).collect();
        let fake = Arc::new(broker_with("Bulk", &refs));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let result = batch_delete(fake.clone(), raw.clone(), "Bulk", 7, Some(tx)).await;
        assert_eq!(result.attempted, 50);
        assert_eq!(result.succeeded, 50);
        assert!(result.failed.is_empty());
        assert_eq!(fake.calls(), 50);
        assert!(fake.remaining("Bulk").is_empty());

        let mut last = 0;
        while let Ok(n) = rx.try_recv() {
            last = last.max(n);
        }
        assert_eq!(last, 50);
    }

    #[tokio::test]
    async fn panicking_worker_loses_only_its_item_and_the_unreached_rest() {
        let fake = Arc::new(broker_with("Orders", &["a", "b", "c"]).panicking("b"));
        let result = batch_delete(fake.clone(), ids(&["a", "b", "c"]), "Orders", 1, None).await;
        assert_eq!(result.attempted, 3);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, vec!["b", "c"]);
        assert_eq!(fake.remaining("Orders"), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn other_workers_carry_on_after_a_panic() {
        let fake = Arc::new(broker_with("Orders", &["a", "b", "c"]).panicking("b"));
        let result = batch_delete(fake.clone(), ids(&["a", "b", "c"]), "Orders", 3, None).await;
        assert_eq!((result.attempted, result.succeeded), (3, 2));
        assert_eq!(result.failed, vec!["b"]);
        assert_eq!(fake.remaining("Orders"), vec!["b"]);
    }

    #[tokio::test]
    async fn empty_selection_is_a_no_op() {
        let fake = Arc::new(FakeBroker::new());
        let result = batch_delete(fake.clone(), Vec::new(), "Orders", 0, None).await;
        assert_eq!(result, BatchActionResult::default());
        assert_eq!(fake.calls(), 0);
    }
}
