use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::RecordStatus;

/// Short name of the status code meaning "in force".
pub const STATUS_ACTIVE: &str = "KEHTIV";
/// Short name of the status code meaning "no longer in force".
pub const STATUS_HISTORICAL: &str = "KEHTETU";
/// Short name of the country entry standing for an undetermined citizenship.
pub const UNDETERMINED_CITIZENSHIP: &str = "MÄÄRATLEMATA";

/// Normalized reference data the generator draws from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceCatalog {
    /// Version label carried into dataset metadata.
    pub catalog_version: String,
    pub codes: Vec<CodeEntry>,
    pub address_components: Vec<ComponentEntry>,
    pub addresses: Vec<AddressEntry>,
    #[serde(default)]
    pub organizations: Vec<OrganizationEntry>,
}

/// Code table a [`CodeEntry`] belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    Status,
    Country,
    DocumentType,
}

/// One row of the code table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodeEntry {
    pub id: u32,
    pub classifier: Classifier,
    /// Machine code (e.g. `EST`).
    pub code: String,
    /// Stable short name used for lookups (e.g. `KEHTIV`).
    pub short_name: String,
    pub label: String,
    /// Marks the home country among country entries.
    #[serde(default)]
    pub home: bool,
}

/// Administrative unit in the address hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComponentEntry {
    pub code: String,
    pub parent_code: Option<String>,
    pub label: String,
    pub level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AddressEntry {
    pub code: String,
    /// Deepest component the address hangs under.
    pub component_code: String,
    pub full_text: String,
    pub postal_code: String,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrganizationEntry {
    pub registry_code: String,
    pub name: String,
}

impl ReferenceCatalog {
    /// Decode a catalog from its JSON form.
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn code_by_short_name(&self, classifier: Classifier, short_name: &str) -> Option<&CodeEntry> {
        self.codes
            .iter()
            .find(|entry| entry.classifier == classifier && entry.short_name == short_name)
    }

    /// Status code entry for a record status.
    pub fn status_code(&self, status: RecordStatus) -> Option<&CodeEntry> {
        let short_name = match status {
            RecordStatus::Active => STATUS_ACTIVE,
            RecordStatus::Historical => STATUS_HISTORICAL,
        };
        self.code_by_short_name(Classifier::Status, short_name)
    }

    pub fn undetermined_citizenship(&self) -> Option<&CodeEntry> {
        self.code_by_short_name(Classifier::Country, UNDETERMINED_CITIZENSHIP)
    }

    pub fn home_country(&self) -> Option<&CodeEntry> {
        self.codes
            .iter()
            .find(|entry| entry.classifier == Classifier::Country && entry.home)
    }

    /// Real country entries, i.e. everything except the undetermined sentinel.
    pub fn countries(&self) -> impl Iterator<Item = &CodeEntry> {
        self.codes.iter().filter(|entry| {
            entry.classifier == Classifier::Country && entry.short_name != UNDETERMINED_CITIZENSHIP
        })
    }

    /// Countries other than the home country.
    pub fn foreign_countries(&self) -> impl Iterator<Item = &CodeEntry> {
        self.countries().filter(|entry| !entry.home)
    }

    pub fn active_addresses(&self) -> impl Iterator<Item = &AddressEntry> {
        self.addresses
            .iter()
            .filter(|address| address.status == RecordStatus::Active)
    }

    /// Small Estonian-flavoured catalog, enough to exercise every table.
    pub fn builtin() -> Self {
        let codes = vec![
            code(1, Classifier::Status, "K", STATUS_ACTIVE, "Kehtiv"),
            code(2, Classifier::Status, "V", STATUS_HISTORICAL, "Kehtetu"),
            home_code(10, "EST", "EESTI", "Eesti"),
            code(11, Classifier::Country, "FIN", "SOOME", "Soome"),
            code(12, Classifier::Country, "LVA", "LÄTI", "Läti"),
            code(13, Classifier::Country, "LTU", "LEEDU", "Leedu"),
            code(14, Classifier::Country, "RUS", "VENEMAA", "Venemaa"),
            code(15, Classifier::Country, "UKR", "UKRAINA", "Ukraina"),
            code(16, Classifier::Country, "SWE", "ROOTSI", "Rootsi"),
            code(17, Classifier::Country, "DEU", "SAKSAMAA", "Saksamaa"),
            code(
                18,
                Classifier::Country,
                "XXX",
                UNDETERMINED_CITIZENSHIP,
                "Määratlemata kodakondsus",
            ),
            code(30, Classifier::DocumentType, "JL", "JUHILUBA", "Juhiluba"),
        ];

        let address_components = vec![
            component("0037", None, "Harju maakond", 1),
            component("0079", None, "Tartu maakond", 1),
            component("0784", Some("0037"), "Tallinn", 2),
            component("0793", Some("0079"), "Tartu linn", 2),
            component("0339", Some("0784"), "Kesklinna linnaosa", 3),
            component("0614", Some("0784"), "Põhja-Tallinna linnaosa", 3),
            component("S001", Some("0339"), "Narva mnt", 4),
            component("S002", Some("0339"), "Pärnu mnt", 4),
            component("S003", Some("0614"), "Kopli tn", 4),
            component("S004", Some("0793"), "Rüütli tn", 4),
            component("S005", Some("0793"), "Riia tn", 4),
        ];

        let addresses = vec![
            address("A0001", "S001", "Harju maakond, Tallinn, Kesklinna linnaosa, Narva mnt 5", "10117", RecordStatus::Active),
            address("A0002", "S001", "Harju maakond, Tallinn, Kesklinna linnaosa, Narva mnt 27", "10120", RecordStatus::Active),
            address("A0003", "S002", "Harju maakond, Tallinn, Kesklinna linnaosa, Pärnu mnt 10", "10148", RecordStatus::Active),
            address("A0004", "S002", "Harju maakond, Tallinn, Kesklinna linnaosa, Pärnu mnt 62a", "10135", RecordStatus::Historical),
            address("A0005", "S003", "Harju maakond, Tallinn, Põhja-Tallinna linnaosa, Kopli tn 18", "10412", RecordStatus::Active),
            address("A0006", "S003", "Harju maakond, Tallinn, Põhja-Tallinna linnaosa, Kopli tn 93", "10416", RecordStatus::Active),
            address("A0007", "S004", "Tartu maakond, Tartu linn, Rüütli tn 2", "51007", RecordStatus::Active),
            address("A0008", "S004", "Tartu maakond, Tartu linn, Rüütli tn 11", "51007", RecordStatus::Historical),
            address("A0009", "S005", "Tartu maakond, Tartu linn, Riia tn 15", "51010", RecordStatus::Active),
            address("A0010", "S005", "Tartu maakond, Tartu linn, Riia tn 142", "51014", RecordStatus::Active),
        ];

        let organizations = vec![
            OrganizationEntry {
                registry_code: "70003098".to_string(),
                name: "Transpordiamet".to_string(),
            },
            OrganizationEntry {
                registry_code: "70008747".to_string(),
                name: "Politsei- ja Piirivalveamet".to_string(),
            },
        ];

        Self {
            catalog_version: "builtin-1".to_string(),
            codes,
            address_components,
            addresses,
            organizations,
        }
    }
}

fn code(id: u32, classifier: Classifier, code: &str, short_name: &str, label: &str) -> CodeEntry {
    CodeEntry {
        id,
        classifier,
        code: code.to_string(),
        short_name: short_name.to_string(),
        label: label.to_string(),
        home: false,
    }
}

fn home_code(id: u32, code_value: &str, short_name: &str, label: &str) -> CodeEntry {
    CodeEntry {
        home: true,
        ..code(id, Classifier::Country, code_value, short_name, label)
    }
}

fn component(code: &str, parent_code: Option<&str>, label: &str, level: u8) -> ComponentEntry {
    ComponentEntry {
        code: code.to_string(),
        parent_code: parent_code.map(str::to_string),
        label: label.to_string(),
        level,
    }
}

fn address(
    code: &str,
    component_code: &str,
    full_text: &str,
    postal_code: &str,
    status: RecordStatus,
) -> AddressEntry {
    AddressEntry {
        code: code.to_string(),
        component_code: component_code.to_string(),
        full_text: full_text.to_string(),
        postal_code: postal_code.to_string(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_lookups() {
        let catalog = ReferenceCatalog::builtin();
        assert_eq!(catalog.status_code(RecordStatus::Active).map(|c| c.id), Some(1));
        assert_eq!(catalog.status_code(RecordStatus::Historical).map(|c| c.id), Some(2));
        assert_eq!(catalog.home_country().map(|c| c.code.as_str()), Some("EST"));
        assert_eq!(
            catalog.undetermined_citizenship().map(|c| c.code.as_str()),
            Some("XXX")
        );
        assert!(catalog.countries().all(|c| c.code != "XXX"));
        assert!(catalog.foreign_countries().all(|c| c.code != "EST"));
        assert_eq!(catalog.active_addresses().count(), 8);
    }
}
