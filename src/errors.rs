/// Infrastructure error types for the intake service.
/// These cover the machinery around the pipeline (storage, config, channels).
/// Protocol-level failures are NOT represented here -- they are ErrorEnvelope
/// values produced by the intake taxonomy and travel inside outcomes.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),
}

impl From<rusqlite::Error> for IntakeError {
    fn from(e: rusqlite::Error) -> Self {
        IntakeError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(e: serde_json::Error) -> Self {
        IntakeError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for IntakeError {
    fn from(e: std::io::Error) -> Self {
        IntakeError::Database(e.to_string())
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;
