pub mod broker;
pub mod error;
pub mod jolokia;
pub mod models;

#[cfg(test)]
pub mod fake;

pub use broker::BrokerClient;
pub use error::{BrokerError, Result};
pub use jolokia::JolokiaClient;
