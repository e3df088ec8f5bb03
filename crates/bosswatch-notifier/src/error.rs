use bosswatch_store::StoreError;
use thiserror::Error;

/// Webhook delivery failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// A blocking store call panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
