use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use regsynth_core::schema::{self, TableSchema};
use regsynth_core::{DATASET_META_FILE, DatasetMeta, Table, TabularDataset, Value};

use crate::errors::EvalError;

/// Options for reading a dataset directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Fail on unparseable cells instead of keeping them for rules to reject.
    pub strict: bool,
}

/// Non-fatal problem met while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadWarning {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: TabularDataset,
    pub warnings: Vec<LoadWarning>,
}

/// Read `dataset.json` and every `<table>.csv` found in `dir`.
///
/// Missing table files and columns are tolerated and reported as warnings;
/// rules depending on them come back as not run.
pub fn load_dataset(dir: &Path, options: &LoadOptions) -> Result<LoadedDataset, EvalError> {
    let meta_path = dir.join(DATASET_META_FILE);
    if !meta_path.exists() {
        return Err(EvalError::InvalidDataset(format!(
            "missing {} in {}",
            DATASET_META_FILE,
            dir.display()
        )));
    }
    let meta: DatasetMeta = serde_json::from_slice(&std::fs::read(&meta_path)?)?;
    let mut dataset = TabularDataset::new(meta);
    let mut warnings = Vec::new();

    for table_schema in schema::TABLES {
        let path = dir.join(format!("{}.csv", table_schema.name));
        if !path.exists() {
            warn!(table = table_schema.name, "table file missing");
            warnings.push(LoadWarning {
                code: "missing_table".to_string(),
                path: table_schema.name.to_string(),
                message: format!("{} not found", path.display()),
                hint: Some("regenerate the dataset to include every table".to_string()),
            });
            continue;
        }
        let table = load_table_csv(table_schema, &path, options, &mut warnings)?;
        dataset.insert(table);
    }

    info!(
        dir = %dir.display(),
        tables = dataset.tables.len(),
        warnings = warnings.len(),
        "dataset loaded"
    );
    Ok(LoadedDataset { dataset, warnings })
}

fn load_table_csv(
    table_schema: &TableSchema,
    path: &Path,
    options: &LoadOptions,
    warnings: &mut Vec<LoadWarning>,
) -> Result<Table, EvalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader
        .headers()
        .map_err(EvalError::Csv)?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let header_map = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.to_lowercase(), idx))
        .collect::<HashMap<_, _>>();

    let mut present = Vec::new();
    let mut missing_columns = Vec::new();
    for column in table_schema.columns {
        match header_map.get(column.name) {
            Some(position) => present.push((column, *position)),
            None => missing_columns.push(column.name),
        }
    }

    let extra_columns = headers
        .iter()
        .filter(|header| table_schema.column(&header.to_lowercase()).is_none())
        .cloned()
        .collect::<Vec<_>>();

    if !missing_columns.is_empty() {
        warnings.push(LoadWarning {
            code: "missing_columns".to_string(),
            path: table_schema.name.to_string(),
            message: format!("missing columns: {}", missing_columns.join(", ")),
            hint: Some("regenerate dataset to include all columns".to_string()),
        });
    }

    if !extra_columns.is_empty() {
        warnings.push(LoadWarning {
            code: "extra_columns".to_string(),
            path: table_schema.name.to_string(),
            message: format!("unexpected columns: {}", extra_columns.join(", ")),
            hint: Some("extra columns are ignored".to_string()),
        });
    }

    let mut table = Table::new(
        table_schema.name,
        present
            .iter()
            .map(|(column, _)| column.name.to_string())
            .collect(),
    );

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let mut row = Vec::with_capacity(present.len());
        for (column, position) in &present {
            let raw = record.get(*position).unwrap_or_default();
            match Value::parse(column.kind, raw) {
                Ok(value) => row.push(value),
                Err(message) => {
                    if options.strict {
                        return Err(EvalError::InvalidDataset(format!(
                            "invalid value at {}.{} row {}: {}",
                            table_schema.name,
                            column.name,
                            row_idx + 1,
                            message
                        )));
                    }
                    warnings.push(LoadWarning {
                        code: "invalid_value".to_string(),
                        path: format!("{}.{}:{}", table_schema.name, column.name, row_idx + 1),
                        message,
                        hint: Some("check CSV serialization for this column".to_string()),
                    });
                    row.push(Value::Text(raw.to_string()));
                }
            }
        }
        table.rows.push(row);
    }

    Ok(table)
}
