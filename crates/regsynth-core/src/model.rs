use std::collections::BTreeMap;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Validity status shared by addresses, residencies and licenses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Currently in force (`KEHTIV`).
    Active,
    /// No longer in force, kept for history (`KEHTETU`).
    Historical,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Historical => "historical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(RecordStatus::Active),
            "historical" => Some(RecordStatus::Historical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Aggregation root of the register extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: u64,
    pub alive: bool,
    pub birth_date: NaiveDate,
    pub death_date: Option<NaiveDate>,
    pub gender: Gender,
    pub first_name: String,
    pub last_name: String,
    pub personal_code: String,
    pub main_citizenship: String,
    /// Additional citizenship codes, sorted and free of duplicates.
    pub additional_citizenships: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: u64,
    /// Code of the catalog address this row was drawn from.
    pub catalog_code: String,
    /// Deepest component of the address; parents are reached through the component tree.
    pub component_id: u64,
    pub full_text: String,
    pub postal_code: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub code: String,
    pub label: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Residency {
    pub id: u64,
    pub person_id: u64,
    pub address_id: u64,
    pub status: RecordStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivingLicense {
    pub id: u64,
    pub person_id: u64,
    pub status: RecordStatus,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub issuing_authority: Option<String>,
}

/// Role of a citizenship code on a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenshipRole {
    Main,
    Additional,
}

impl CitizenshipRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CitizenshipRole::Main => "main",
            CitizenshipRole::Additional => "additional",
        }
    }
}

/// Row of the citizenship view derived from [`Person`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizenship {
    pub id: u64,
    pub person_id: u64,
    pub country_code: String,
    pub role: CitizenshipRole,
}

/// Catalog status code ids used when rendering status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodes {
    pub active: u32,
    pub historical: u32,
}

impl StatusCodes {
    pub fn code_for(&self, status: RecordStatus) -> u32 {
        match status {
            RecordStatus::Active => self.active,
            RecordStatus::Historical => self.historical,
        }
    }
}

/// Run-level facts every rule needs to interpret the rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    /// Simulated "current" date all temporal rules compare against.
    pub reference_date: NaiveDate,
    pub seed: u64,
    pub record_count: u64,
    pub catalog_version: String,
    pub status_codes: StatusCodes,
    /// Country code standing for an undetermined citizenship, if the catalog has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undetermined_citizenship: Option<String>,
}

/// Typed, in-memory register extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub meta: DatasetMeta,
    pub persons: Vec<Person>,
    pub addresses: Vec<Address>,
    pub address_components: Vec<AddressComponent>,
    pub residencies: Vec<Residency>,
    pub driving_licenses: Vec<DrivingLicense>,
}

impl Dataset {
    /// Derive the citizenship view: main code first, then additional codes, per person.
    pub fn citizenships(&self) -> Vec<Citizenship> {
        let mut rows = Vec::new();
        let mut next_id = 1;
        for person in &self.persons {
            rows.push(Citizenship {
                id: next_id,
                person_id: person.id,
                country_code: person.main_citizenship.clone(),
                role: CitizenshipRole::Main,
            });
            next_id += 1;
            for code in &person.additional_citizenships {
                rows.push(Citizenship {
                    id: next_id,
                    person_id: person.id,
                    country_code: code.clone(),
                    role: CitizenshipRole::Additional,
                });
                next_id += 1;
            }
        }
        rows
    }

    pub fn person(&self, id: u64) -> Option<&Person> {
        self.persons.iter().find(|person| person.id == id)
    }

    /// Residencies grouped by person id, each group in id order.
    pub fn residencies_by_person(&self) -> BTreeMap<u64, Vec<&Residency>> {
        let mut grouped: BTreeMap<u64, Vec<&Residency>> = BTreeMap::new();
        for residency in &self.residencies {
            grouped.entry(residency.person_id).or_default().push(residency);
        }
        grouped
    }

    pub fn next_residency_id(&self) -> u64 {
        self.residencies.iter().map(|row| row.id).max().unwrap_or(0) + 1
    }
}
