//! Consistency validation for regsynth datasets.
//!
//! Rules are plain functions over a [`regsynth_core::TabularDataset`],
//! collected in a [`RuleRegistry`] and run by the [`RuleEngine`].

pub mod checks;
pub mod engine;
pub mod errors;
pub mod load;
pub mod metrics;
pub mod model;
pub mod report;

pub use engine::{RuleEngine, RuleFn, RuleRegistry};
pub use errors::EvalError;
pub use load::{LoadOptions, LoadWarning, LoadedDataset, load_dataset};
pub use metrics::{DatasetMetrics, METRICS_VERSION, PersonMetrics, TableMetrics, collect_dataset_metrics};
pub use model::{RuleOutcome, RuleResult, ValidationReport};
pub use report::render_report;
