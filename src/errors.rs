use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out")]
    NavigationTimeout,

    #[error("Browser session has terminated")]
    SessionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    Anyhow(String),
}

pub type Result<T> = std::result::Result<T, KioskError>;

// Convert anyhow::Error to KioskError
impl From<anyhow::Error> for KioskError {
    fn from(err: anyhow::Error) -> Self {
        KioskError::Anyhow(err.to_string())
    }
}
