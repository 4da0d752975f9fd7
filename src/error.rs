use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Store error: {0}")]
    Store(#[from] duckdb::Error),

    #[error("Invalid collection identifier {0:?}: only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier(String),

    #[error("Document is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Not signed in")]
    Unauthenticated,
}

pub type Result<T> = std::result::Result<T, ViewerError>;
