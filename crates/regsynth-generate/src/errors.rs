use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// The reference catalog cannot support the requested dataset.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("inconsistent timeline: {0}")]
    Timeline(String),
    #[error(transparent)]
    Core(#[from] regsynth_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
