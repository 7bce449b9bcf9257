use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssociationError>;

#[derive(Error, Debug)]
pub enum AssociationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed settings in {location}: {detail}")]
    Malformed { location: String, detail: String },

    #[error("No writable configuration scope")]
    NoWritableScope,

    #[error("Configuration scope '{0}' is read-only")]
    ReadOnlyScope(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The notification surface answered with a button that was never offered.
    #[error("Unexpected response from notification surface: {0:?}")]
    UnexpectedResponse(String),
}
