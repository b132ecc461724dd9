use thiserror::Error;

/// Errors emitted by the validation engine and dataset loader.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("validation failed: {failed} rule(s) failed, {not_run} not run")]
    Violations { failed: u64, not_run: u64 },
    #[error(transparent)]
    Core(#[from] regsynth_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
