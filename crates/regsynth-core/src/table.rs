use std::collections::BTreeMap;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::{
    Address, AddressComponent, Dataset, DatasetMeta, DrivingLicense, Gender, Person, RecordStatus,
    Residency,
};
use crate::schema::{self, TableSchema};
use crate::types::Value;

/// One table of named columns and typed rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    fn from_schema(schema: &TableSchema) -> Self {
        Self::new(
            schema.name,
            schema.columns.iter().map(|column| column.name.to_string()).collect(),
        )
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Fail with [`Error::MalformedDataset`] unless every named column is present.
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        let missing = names
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .copied()
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MalformedDataset(format!(
                "table '{}' is missing columns: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows.iter().enumerate().map(move |(position, values)| TableRow {
            table: self,
            position,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Borrowed row with typed, column-name based accessors.
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    table: &'a Table,
    position: usize,
    values: &'a [Value],
}

impl<'a> TableRow<'a> {
    pub fn value(&self, column: &str) -> Result<&'a Value> {
        let index = self.table.column_index(column).ok_or_else(|| {
            Error::MalformedDataset(format!(
                "table '{}' has no column '{}'",
                self.table.name, column
            ))
        })?;
        self.values.get(index).ok_or_else(|| {
            Error::MalformedDataset(format!(
                "table '{}' row {} is shorter than its header",
                self.table.name, self.position
            ))
        })
    }

    fn mistyped(&self, column: &str, expected: &str, value: &Value) -> Error {
        Error::MalformedDataset(format!(
            "table '{}' row {} column '{}': expected {}, found {:?}",
            self.table.name, self.position, column, expected, value
        ))
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Int(value) => Ok(Some(*value)),
            other => Err(self.mistyped(column, "int", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        self.opt_int(column)?
            .ok_or_else(|| self.mistyped(column, "int", &Value::Null))
    }

    /// Non-negative integer identifier.
    pub fn id(&self, column: &str) -> Result<u64> {
        let value = self.int(column)?;
        u64::try_from(value).map_err(|_| self.mistyped(column, "identifier", &Value::Int(value)))
    }

    pub fn opt_id(&self, column: &str) -> Result<Option<u64>> {
        match self.opt_int(column)? {
            None => Ok(None),
            Some(value) => u64::try_from(value)
                .map(Some)
                .map_err(|_| self.mistyped(column, "identifier", &Value::Int(value))),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<&'a str>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.as_str())),
            other => Err(self.mistyped(column, "text", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&'a str> {
        self.opt_text(column)?
            .ok_or_else(|| self.mistyped(column, "text", &Value::Null))
    }

    pub fn bool(&self, column: &str) -> Result<bool> {
        match self.value(column)? {
            Value::Bool(value) => Ok(*value),
            other => Err(self.mistyped(column, "bool", other)),
        }
    }

    pub fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Date(value) => Ok(Some(*value)),
            other => Err(self.mistyped(column, "date", other)),
        }
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate> {
        self.opt_date(column)?
            .ok_or_else(|| self.mistyped(column, "date", &Value::Null))
    }

    /// Text list; a null cell reads as an empty list.
    pub fn list(&self, column: &str) -> Result<Vec<String>> {
        match self.value(column)? {
            Value::Null => Ok(Vec::new()),
            Value::TextList(values) => Ok(values.clone()),
            other => Err(self.mistyped(column, "text list", other)),
        }
    }

    pub fn status(&self, column: &str) -> Result<RecordStatus> {
        let raw = self.text(column)?;
        RecordStatus::parse(raw)
            .ok_or_else(|| self.mistyped(column, "status", &Value::Text(raw.to_string())))
    }
}

/// Dataset metadata plus every table keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularDataset {
    pub meta: DatasetMeta,
    pub tables: BTreeMap<String, Table>,
}

impl TabularDataset {
    pub fn new(meta: DatasetMeta) -> Self {
        Self {
            meta,
            tables: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::MalformedDataset(format!("missing table '{}'", name)))
    }

    /// Stable SHA-256 digest over metadata and every cell, hex encoded.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.meta)?);
        for table in self.tables.values() {
            hasher.update(table.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(table.columns.join(",").as_bytes());
            for row in &table.rows {
                hasher.update([0x1e]);
                for value in row {
                    hasher.update(value.to_csv().as_bytes());
                    hasher.update([0x1f]);
                }
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

impl Dataset {
    /// Render the typed dataset into its tabular form, tables in schema order.
    pub fn to_tables(&self) -> TabularDataset {
        let codes = self.meta.status_codes;
        let mut tabular = TabularDataset::new(self.meta.clone());

        for table_schema in schema::TABLES {
            let mut table = Table::from_schema(table_schema);
            match table_schema.name {
                schema::PERSONS => {
                    for person in &self.persons {
                        table.rows.push(vec![
                            person.id.into(),
                            person.alive.into(),
                            person.birth_date.into(),
                            person.death_date.into(),
                            person.gender.as_str().into(),
                            person.first_name.as_str().into(),
                            person.last_name.as_str().into(),
                            person.personal_code.as_str().into(),
                            person.main_citizenship.as_str().into(),
                            list_value(&person.additional_citizenships),
                        ]);
                    }
                }
                schema::ADDRESS_COMPONENTS => {
                    for component in &self.address_components {
                        table.rows.push(vec![
                            component.id.into(),
                            component.parent_id.into(),
                            component.code.as_str().into(),
                            component.label.as_str().into(),
                            Value::Int(i64::from(component.level)),
                        ]);
                    }
                }
                schema::ADDRESSES => {
                    for address in &self.addresses {
                        table.rows.push(vec![
                            address.id.into(),
                            address.catalog_code.as_str().into(),
                            address.component_id.into(),
                            address.full_text.as_str().into(),
                            address.postal_code.as_str().into(),
                            address.status.as_str().into(),
                            Value::Int(i64::from(codes.code_for(address.status))),
                        ]);
                    }
                }
                schema::RESIDENCIES => {
                    for residency in &self.residencies {
                        table.rows.push(vec![
                            residency.id.into(),
                            residency.person_id.into(),
                            residency.address_id.into(),
                            residency.status.as_str().into(),
                            Value::Int(i64::from(codes.code_for(residency.status))),
                            residency.start_date.into(),
                            residency.end_date.into(),
                        ]);
                    }
                }
                schema::CITIZENSHIPS => {
                    for citizenship in self.citizenships() {
                        table.rows.push(vec![
                            citizenship.id.into(),
                            citizenship.person_id.into(),
                            citizenship.country_code.into(),
                            citizenship.role.as_str().into(),
                        ]);
                    }
                }
                schema::DRIVING_LICENSES => {
                    for license in &self.driving_licenses {
                        table.rows.push(vec![
                            license.id.into(),
                            license.person_id.into(),
                            license.status.as_str().into(),
                            Value::Int(i64::from(codes.code_for(license.status))),
                            license.issue_date.into(),
                            license.expiry_date.into(),
                            license
                                .issuing_authority
                                .as_deref()
                                .map(Value::from)
                                .unwrap_or(Value::Null),
                        ]);
                    }
                }
                _ => {}
            }
            tabular.insert(table);
        }

        tabular
    }
}

fn list_value(items: &[String]) -> Value {
    if items.is_empty() {
        Value::Null
    } else {
        Value::TextList(items.to_vec())
    }
}

fn checked_table<'a>(tabular: &'a TabularDataset, name: &str) -> Result<&'a Table> {
    let table = tabular.table(name)?;
    if let Some(table_schema) = schema::table_schema(name) {
        table.require_columns(&table_schema.column_names())?;
    }
    Ok(table)
}

impl TryFrom<&TabularDataset> for Dataset {
    type Error = Error;

    /// Rebuild typed rows. The `citizenships` table is a derived view and is not read back.
    fn try_from(tabular: &TabularDataset) -> Result<Self> {
        let mut persons = Vec::new();
        for row in checked_table(tabular, schema::PERSONS)?.iter_rows() {
            let raw_gender = row.text("gender")?;
            let gender = Gender::parse(raw_gender).ok_or_else(|| {
                Error::MalformedDataset(format!("unknown gender '{}'", raw_gender))
            })?;
            persons.push(Person {
                id: row.id("id")?,
                alive: row.bool("alive")?,
                birth_date: row.date("birth_date")?,
                death_date: row.opt_date("death_date")?,
                gender,
                first_name: row.text("first_name")?.to_string(),
                last_name: row.text("last_name")?.to_string(),
                personal_code: row.text("personal_code")?.to_string(),
                main_citizenship: row.text("main_citizenship")?.to_string(),
                additional_citizenships: row.list("additional_citizenships")?,
            });
        }

        let mut address_components = Vec::new();
        for row in checked_table(tabular, schema::ADDRESS_COMPONENTS)?.iter_rows() {
            let level = row.int("level")?;
            address_components.push(AddressComponent {
                id: row.id("id")?,
                parent_id: row.opt_id("parent_id")?,
                code: row.text("code")?.to_string(),
                label: row.text("label")?.to_string(),
                level: u8::try_from(level).map_err(|_| {
                    Error::MalformedDataset(format!("component level {} out of range", level))
                })?,
            });
        }

        let mut addresses = Vec::new();
        for row in checked_table(tabular, schema::ADDRESSES)?.iter_rows() {
            addresses.push(Address {
                id: row.id("id")?,
                catalog_code: row.text("catalog_code")?.to_string(),
                component_id: row.id("component_id")?,
                full_text: row.text("full_text")?.to_string(),
                postal_code: row.text("postal_code")?.to_string(),
                status: row.status("status")?,
            });
        }

        let mut residencies = Vec::new();
        for row in checked_table(tabular, schema::RESIDENCIES)?.iter_rows() {
            residencies.push(Residency {
                id: row.id("id")?,
                person_id: row.id("person_id")?,
                address_id: row.id("address_id")?,
                status: row.status("status")?,
                start_date: row.date("start_date")?,
                end_date: row.opt_date("end_date")?,
            });
        }

        let mut driving_licenses = Vec::new();
        for row in checked_table(tabular, schema::DRIVING_LICENSES)?.iter_rows() {
            driving_licenses.push(DrivingLicense {
                id: row.id("id")?,
                person_id: row.id("person_id")?,
                status: row.status("status")?,
                issue_date: row.date("issue_date")?,
                expiry_date: row.date("expiry_date")?,
                issuing_authority: row.opt_text("issuing_authority")?.map(str::to_string),
            });
        }

        Ok(Dataset {
            meta: tabular.meta.clone(),
            persons,
            addresses,
            address_components,
            residencies,
            driving_licenses,
        })
    }
}
