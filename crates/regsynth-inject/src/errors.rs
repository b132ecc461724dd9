use regsynth_core::RuleId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("rule '{0}' has no injectable violation")]
    NotInjectable(RuleId),
    #[error(transparent)]
    Core(#[from] regsynth_core::Error),
}
