use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options for the generation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Number of persons to generate.
    pub record_count: u64,
    /// Number of address rows; defaults to `record_count`.
    pub address_count: Option<u64>,
    pub seed: u64,
    /// Simulated "current" date.
    pub reference_date: NaiveDate,
    /// No residency starts before this date.
    pub earliest_residency_date: NaiveDate,
    pub min_residencies: u32,
    pub max_residencies: u32,
    /// Consecutive residencies move to a different address when possible.
    pub ensure_new_address: bool,
    pub max_age_years: u32,
    pub undetermined_probability: f64,
    pub home_country_probability: f64,
    pub dual_citizenship_probability: f64,
    pub death_probability: f64,
    pub license_probability: f64,
    pub renewal_probability: f64,
    pub license_validity_years: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            record_count: 100,
            address_count: None,
            seed: 42,
            reference_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            earliest_residency_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
            min_residencies: 1,
            max_residencies: 3,
            ensure_new_address: true,
            max_age_years: 100,
            undetermined_probability: 0.05,
            home_country_probability: 0.7,
            dual_citizenship_probability: 0.1,
            death_probability: 0.1,
            license_probability: 0.6,
            renewal_probability: 0.7,
            license_validity_years: 10,
        }
    }
}

impl GenerateOptions {
    pub fn address_rows(&self) -> u64 {
        self.address_count.unwrap_or(self.record_count)
    }
}

/// Summary of a generated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_generated: u64,
}

/// Structured generation issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<u64>,
}

impl GenerationIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            table: None,
            person_id: None,
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn with_person(mut self, person_id: u64) -> Self {
        self.person_id = Some(person_id);
        self
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub reference_date: NaiveDate,
    pub tables: Vec<TableReport>,
    pub residency_demotions: u64,
    pub license_demotions: u64,
    pub death_truncations: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(seed: u64, reference_date: NaiveDate) -> Self {
        Self {
            seed,
            reference_date,
            tables: Vec::new(),
            residency_demotions: 0,
            license_demotions: 0,
            death_truncations: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_table(&mut self, table: &str, rows: usize) {
        self.tables.push(TableReport {
            table: table.to_string(),
            rows_generated: rows as u64,
        });
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn rows_for(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| report.rows_generated)
    }
}
