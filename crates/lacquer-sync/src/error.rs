use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
