use thiserror::Error;

/// Top-level error type for the INGRES assistant.
///
/// Subsystem crates either use these variants directly or define their own
/// error type with a `From<IngresError>` conversion so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngresError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for IngresError {
    fn from(err: toml::de::Error) -> Self {
        IngresError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for IngresError {
    fn from(err: toml::ser::Error) -> Self {
        IngresError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for IngresError {
    fn from(err: serde_json::Error) -> Self {
        IngresError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for INGRES operations.
pub type Result<T> = std::result::Result<T, IngresError>;
