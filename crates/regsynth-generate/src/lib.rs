//! Seeded generation of synthetic population-register datasets.
//!
//! The engine consumes a [`regsynth_core::ReferenceCatalog`] and produces a
//! deterministic [`regsynth_core::Dataset`]; the relationship resolver keeps
//! residencies, licenses and citizenships consistent while rows are linked.

pub mod engine;
pub mod errors;
pub mod model;
pub mod output;
pub mod resolver;

pub use engine::{GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use model::{GenerateOptions, GenerationIssue, GenerationReport, TableReport};
pub use resolver::{RelationshipResolver, ResolverStats};
