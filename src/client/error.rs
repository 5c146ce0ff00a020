use thiserror::Error;

/// Transport and protocol failures raised while talking to the broker.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Broker returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Jolokia error {status}: {error}")]
    Jolokia { status: u16, error: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
