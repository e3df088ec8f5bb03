use thiserror::Error;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No boss with the given ID exists in the catalog.
    #[error("boss not found: {id}")]
    BossNotFound { id: String },

    /// The boss record failed validation and was not written.
    #[error("invalid boss: {0}")]
    InvalidBoss(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
