use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use regsynth_core::TabularDataset;
use regsynth_core::schema::{CITIZENSHIPS, PERSONS};

/// Metrics contract version for dataset summaries.
pub const METRICS_VERSION: &str = "0.1";

/// Machine-readable summary of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetrics {
    pub metrics_version: String,
    pub reference_date: NaiveDate,
    pub seed: u64,
    pub catalog_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub tables: Vec<TableMetrics>,
    pub persons: PersonMetrics,
}

/// Row count and status tallies of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub table: String,
    pub rows: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub statuses: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub null_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonMetrics {
    pub alive: u64,
    pub deceased: u64,
    pub undetermined_citizenship: u64,
    pub additional_citizenships: u64,
}

/// Collect per-table counts and status tallies.
///
/// Cells that do not hold the expected type are tallied as `invalid`.
pub fn collect_dataset_metrics(dataset: &TabularDataset) -> DatasetMetrics {
    let mut tables = Vec::new();
    for table in dataset.tables.values() {
        let status_index = table.column_index("status");
        let mut statuses = BTreeMap::new();
        let mut null_counts = BTreeMap::new();
        for row in &table.rows {
            if let Some(index) = status_index {
                let label = row
                    .get(index)
                    .and_then(|value| value.as_str())
                    .unwrap_or("invalid")
                    .to_string();
                *statuses.entry(label).or_insert(0) += 1;
            }
            for (column, value) in table.columns.iter().zip(row.iter()) {
                if value.is_null() {
                    *null_counts.entry(column.clone()).or_insert(0) += 1;
                }
            }
        }
        tables.push(TableMetrics {
            table: table.name.clone(),
            rows: table.rows.len() as u64,
            statuses,
            null_counts,
        });
    }

    let mut persons = PersonMetrics::default();
    if let Some(table) = dataset.tables.get(PERSONS) {
        if let Some(index) = table.column_index("alive") {
            for row in &table.rows {
                match row.get(index).and_then(|value| value.as_bool()) {
                    Some(true) => persons.alive += 1,
                    Some(false) => persons.deceased += 1,
                    None => {}
                }
            }
        }
    }
    if let Some(table) = dataset.tables.get(CITIZENSHIPS) {
        if let (Some(code_index), Some(role_index)) =
            (table.column_index("country_code"), table.column_index("role"))
        {
            let sentinel = dataset.meta.undetermined_citizenship.as_deref();
            for row in &table.rows {
                let code = row.get(code_index).and_then(|value| value.as_str());
                let role = row.get(role_index).and_then(|value| value.as_str());
                match role {
                    Some("main") if sentinel.is_some() && code == sentinel => {
                        persons.undetermined_citizenship += 1
                    }
                    Some("additional") => persons.additional_citizenships += 1,
                    _ => {}
                }
            }
        }
    }

    DatasetMetrics {
        metrics_version: METRICS_VERSION.to_string(),
        reference_date: dataset.meta.reference_date,
        seed: dataset.meta.seed,
        catalog_version: dataset.meta.catalog_version.clone(),
        fingerprint: dataset.fingerprint().ok(),
        tables,
        persons,
    }
}
