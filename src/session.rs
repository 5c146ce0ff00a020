use std::sync::Arc;

use tracing::{info, warn};

use crate::client::{self, BrokerClient};
use crate::config::{AppConfig, ConnectionProfile};
use crate::error::{ConsoleError, ConsoleResult};

/// Identifies one activation of a connection. Bumped on every switch, so a
/// response tagged with an older epoch belongs to a session that is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Epoch(u64);

/// The active connection, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct ActiveConnection {
    pub profile: ConnectionProfile,
    pub client: Arc<dyn BrokerClient>,
    pub epoch: Epoch,
}

/// Tracks which connection profile queue and message operations run against.
#[derive(Default)]
pub struct Session {
    active: Option<ActiveConnection>,
    epoch: Epoch,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on the store's default profile, or with no connection when the
    /// store is empty or the client for the default cannot be built.
    pub fn start<F>(store: &AppConfig, connect: F) -> Self
    where
        F: FnOnce(&ConnectionProfile) -> client::Result<Arc<dyn BrokerClient>>,
    {
        let mut session = Self::new();
        if let Some(profile) = store.default_connection() {
            match connect(profile) {
                Ok(client) => {
                    session.switch_to(profile.clone(), client);
                }
                Err(e) => warn!("Could not open default connection '{}': {}", profile.name, e),
            }
        }
        session
    }

    pub fn active(&self) -> Option<&ConnectionProfile> {
        self.active.as_ref().map(|a| &a.profile)
    }

    /// The active connection, or `NoActiveConnection`.
    pub fn connection(&self) -> ConsoleResult<ActiveConnection> {
        self.active.clone().ok_or(ConsoleError::NoActiveConnection)
    }

    /// Replace the active connection. Every snapshot taken under the previous
    /// epoch is invalid from here on.
    pub fn switch_to(&mut self, profile: ConnectionProfile, client: Arc<dyn BrokerClient>) -> Epoch {
        self.epoch = Epoch(self.epoch.0 + 1);
        info!(
            "Switched to connection '{}' ({})",
            profile.name,
            client.describe()
        );
        self.active = Some(ActiveConnection {
            profile,
            client,
            epoch: self.epoch,
        });
        self.epoch
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// True when `epoch` is the epoch of the connection that is active now.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.active.is_some() && self.epoch == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeBroker;

    fn profile(name: &str, is_default: bool) -> ConnectionProfile {
        ConnectionProfile {
            name: name.into(),
            is_default,
            ..ConnectionProfile::default()
        }
    }

    #[test]
    fn starts_without_connection_when_store_empty() {
        let session = Session::start(&AppConfig::default(), |_| {
            panic!("no profile to connect")
        });
        assert!(session.active().is_none());
        assert!(matches!(
            session.connection(),
            Err(ConsoleError::NoActiveConnection)
        ));
    }

    #[test]
    fn starts_on_default_profile() {
        let mut store = AppConfig::default();
        store.add_connection(profile("dev", false));
        store.add_connection(profile("prod", true));
        let session = Session::start(&store, |_| Ok(FakeBroker::new().shared()));
        assert_eq!(session.active().unwrap().name, "prod");
        assert!(session.is_current(session.epoch()));
    }

    #[test]
    fn failed_client_leaves_session_inactive() {
        let mut store = AppConfig::default();
        store.add_connection(profile("dev", true));
        let session = Session::start(&store, |_| {
            Err(client::BrokerError::InvalidResponse("boom".into()))
        });
        assert!(session.active().is_none());
    }

    #[test]
    fn switching_invalidates_previous_epoch() {
        let mut session = Session::new();
        let first = session.switch_to(profile("a", false), FakeBroker::new().shared());
        let conn = session.connection().unwrap();
        assert_eq!(conn.epoch, first);
        let second = session.switch_to(profile("b", false), FakeBroker::new().shared());
        assert_ne!(first, second);
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert_eq!(session.active().unwrap().name, "b");
    }
}
