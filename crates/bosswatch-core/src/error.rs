use thiserror::Error;

#[derive(Debug, Error)]
pub enum BosswatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BosswatchError {
    /// Short machine-readable code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            BosswatchError::Config(_) => "CONFIG_ERROR",
            BosswatchError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BosswatchError>;
