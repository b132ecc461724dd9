use thiserror::Error;

/// Core error type shared across regsynth crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The reference catalog cannot satisfy a structural requirement.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A tabular dataset is missing tables/columns or holds mistyped values.
    #[error("malformed dataset: {0}")]
    MalformedDataset(String),
    /// Catalog JSON could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by regsynth crates.
pub type Result<T> = std::result::Result<T, Error>;
