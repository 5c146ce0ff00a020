use thiserror::Error;

use crate::client::BrokerError;

/// Failures of queue and message operations. None of these end the session.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("No active connection. Press 'c' to select one")]
    NoActiveConnection,

    #[error(transparent)]
    Transport(#[from] BrokerError),

    #[error("Cannot move messages from '{queue}' to itself")]
    InvalidTarget { queue: String },

    #[error("Already loading {resource}")]
    InFlight { resource: String },

    /// A response arrived for a connection or queue that is no longer current.
    #[error("Discarded a stale response")]
    Stale,
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
