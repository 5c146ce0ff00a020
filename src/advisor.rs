use std::cmp::Ordering;

use crate::client::models::QueueSummary;
use crate::directory::contains_ignore_case;

/// Naming convention ActiveMQ uses for individual dead-letter queues.
pub const DLQ_PREFIX: &str = "DLQ.";

/// At most this many suggestions are offered.
pub const MAX_SUGGESTIONS: usize = 10;

/// For a dead-letter queue, the queue its messages came from.
pub fn original_queue(source: &str) -> Option<&str> {
    let prefix = source.get(..DLQ_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(DLQ_PREFIX) {
        Some(&source[DLQ_PREFIX.len()..])
    } else {
        None
    }
}

/// Candidate targets for moving messages out of `source`, whose name contains
/// `query` (ignoring case). The queue a DLQ drains back into ranks first; the
/// rest follow in case-insensitive name order.
pub fn suggest(queues: &[QueueSummary], source: &str, query: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    let original = original_queue(source);

    let mut candidates: Vec<&str> = queues
        .iter()
        .map(|q| q.name.as_str())
        .filter(|name| *name != source)
        .filter(|name| needle.is_empty() || contains_ignore_case(name, &needle))
        .collect();

    candidates.sort_by(|a, b| {
        let a_orig = Some(*a) == original;
        let b_orig = Some(*b) == original;
        match (a_orig, b_orig) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
        }
    });
    candidates.dedup();
    candidates.truncate(MAX_SUGGESTIONS);
    candidates.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queues(names: &[&str]) -> Vec<QueueSummary> {
        names.iter().map(|n| QueueSummary::new(*n)).collect()
    }

    #[test]
    fn original_queue_comes_first() {
        let all = queues(&["DLQ.Orders", "Payments", "Orders"]);
        assert_eq!(suggest(&all, "DLQ.Orders", ""), vec!["Orders", "Payments"]);
    }

    #[test]
    fn original_queue_is_found_case_insensitively() {
        assert_eq!(original_queue("dlq.Orders"), Some("Orders"));
        assert_eq!(original_queue("DLQ."), Some(""));
        assert_eq!(original_queue("Orders"), None);
        assert_eq!(original_queue("DL"), None);

        let all = queues(&["alpha", "Orders", "dlq.Orders"]);
        assert_eq!(suggest(&all, "dlq.Orders", ""), vec!["Orders", "alpha"]);
    }

    #[test]
    fn plain_source_sorts_lexically_ignoring_case() {
        let all = queues(&["beta", "Alpha", "Orders", "gamma"]);
        assert_eq!(
            suggest(&all, "Orders", ""),
            vec!["Alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn query_filters_and_still_excludes_source() {
        let all = queues(&["DLQ.Orders", "Orders", "Orders.retry", "Payments"]);
        assert_eq!(
            suggest(&all, "DLQ.Orders", "ORD"),
            vec!["Orders", "Orders.retry"]
        );
        assert!(suggest(&all, "DLQ.Orders", "nothing").is_empty());
    }

    #[test]
    fn original_outside_query_is_not_forced_in() {
        let all = queues(&["DLQ.Orders", "Orders", "Payments"]);
        assert_eq!(suggest(&all, "DLQ.Orders", "pay"), vec!["Payments"]);
    }

    #[test]
    fn results_are_truncated() {
        let names: Vec<String> = (0..25).map(|i| format!("queue.{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let all = queues(&refs);
        let hits = suggest(&all, "DLQ.queue.20", "");
        assert_eq!(hits.len(), MAX_SUGGESTIONS);
        assert_eq!(hits[0], "queue.20");
        assert_eq!(hits[1], "queue.00");
    }
}
