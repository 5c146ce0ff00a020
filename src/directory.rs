use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::models::QueueSummary;
use crate::client::{self, BrokerClient};
use crate::error::{ConsoleError, ConsoleResult};
use crate::session::{Epoch, Session};

/// Proof that a refresh was started, tagged with the connection it ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    epoch: Epoch,
}

/// Cached queue listing for the active connection.
#[derive(Default)]
pub struct QueueDirectory {
    snapshot: Vec<QueueSummary>,
    epoch: Epoch,
    /// Cleared when the last refresh failed; the old listing is kept but not shown.
    trusted: bool,
    in_flight: Option<Epoch>,
}

impl QueueDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the single refresh slot for the active connection.
    pub fn begin_refresh(
        &mut self,
        session: &Session,
    ) -> ConsoleResult<(RefreshTicket, Arc<dyn BrokerClient>)> {
        let conn = session.connection()?;
        if self.in_flight == Some(conn.epoch) {
            return Err(ConsoleError::InFlight {
                resource: format!("queues of '{}'", conn.profile.name),
            });
        }
        self.in_flight = Some(conn.epoch);
        Ok((RefreshTicket { epoch: conn.epoch }, conn.client))
    }

    /// Apply the outcome of a refresh started with `ticket`.
    ///
    /// A response for a connection that is no longer active is dropped with
    /// `Stale`. On success the listing is replaced wholesale; on failure the
    /// previous listing stays cached but `snapshot` reports it as empty.
    pub fn complete_refresh(
        &mut self,
        session: &Session,
        ticket: RefreshTicket,
        result: client::Result<Vec<QueueSummary>>,
    ) -> ConsoleResult<&[QueueSummary]> {
        if self.in_flight == Some(ticket.epoch) {
            self.in_flight = None;
        }
        if !session.is_current(ticket.epoch) {
            debug!("Discarding queue listing from a previous connection");
            return Err(ConsoleError::Stale);
        }
        match result {
            Ok(queues) => {
                info!("Refreshed {} queues", queues.len());
                self.snapshot = queues;
                self.epoch = ticket.epoch;
                self.trusted = true;
                Ok(&self.snapshot)
            }
            Err(e) => {
                warn!("Error refreshing queues: {}", e);
                self.trusted = false;
                Err(ConsoleError::Transport(e))
            }
        }
    }

    /// The cached listing, or nothing when it is untrusted or belongs to
    /// another connection.
    pub fn snapshot(&self, session: &Session) -> &[QueueSummary] {
        if self.trusted && session.is_current(self.epoch) {
            &self.snapshot
        } else {
            &[]
        }
    }

    pub fn is_refreshing(&self, session: &Session) -> bool {
        self.in_flight.is_some() && self.in_flight == Some(session.epoch())
    }

    /// Forget everything, including any refresh still in flight.
    pub fn invalidate(&mut self) {
        self.snapshot.clear();
        self.trusted = false;
        self.in_flight = None;
    }
}

/// Queues whose name contains `query`, ignoring case, in snapshot order.
pub fn filter<'a>(snapshot: &'a [QueueSummary], query: &str) -> Vec<&'a QueueSummary> {
    if query.is_empty() {
        return snapshot.iter().collect();
    }
    let needle = query.to_lowercase();
    snapshot
        .iter()
        .filter(|q| contains_ignore_case(&q.name, &needle))
        .collect()
}

/// `needle_lower` must already be lowercase.
pub fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
