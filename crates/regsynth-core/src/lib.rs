//! Core contracts and helpers for regsynth.
//!
//! This crate defines the register data model, the reference catalog,
//! the tabular dataset form and the rule identifiers shared by the
//! generator, the injector, the validator and the CLI.

pub mod catalog;
pub mod error;
pub mod graph;
pub mod model;
pub mod personal_code;
pub mod rules;
pub mod schema;
pub mod table;
pub mod types;
pub mod validation;

pub use catalog::{
    AddressEntry, Classifier, CodeEntry, ComponentEntry, OrganizationEntry, ReferenceCatalog,
};
pub use error::{Error, Result};
pub use graph::{ComponentTreeReport, ComponentTreeSummary, build_component_tree_report};
pub use model::{
    Address, AddressComponent, Citizenship, CitizenshipRole, Dataset, DatasetMeta, DrivingLicense,
    Gender, Person, RecordStatus, Residency, StatusCodes,
};
pub use rules::{RowRef, RuleId};
pub use schema::{ColumnDef, TableSchema};
pub use table::{Table, TableRow, TabularDataset};
pub use types::{ColumnKind, Value};
pub use validation::validate_catalog;

/// File name of the dataset metadata artifact.
pub const DATASET_META_FILE: &str = "dataset.json";
