use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use tracing::debug;

use regsynth_core::{
    Address, AddressComponent, AddressEntry, Dataset, DatasetMeta, DrivingLicense, Person,
    RecordStatus, ReferenceCatalog, Residency, StatusCodes, build_component_tree_report,
    validate_catalog,
};

use crate::errors::GenerationError;

/// Counters of corrective actions taken while linking rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub residency_demotions: u64,
    pub license_demotions: u64,
    pub death_truncations: u64,
}

/// Links generated rows to each other and to the catalog while keeping
/// the status and timeline invariants of the register.
#[derive(Debug)]
pub struct RelationshipResolver<'a> {
    catalog: &'a ReferenceCatalog,
    reference_date: NaiveDate,
    status_codes: StatusCodes,
    undetermined: Option<String>,
    component_ids: BTreeMap<String, u64>,
    components: Vec<AddressComponent>,
    addresses: Vec<Address>,
    residencies: Vec<Residency>,
    licenses: Vec<DrivingLicense>,
    active_residency: BTreeMap<u64, usize>,
    active_license: BTreeMap<u64, usize>,
    stats: ResolverStats,
}

impl<'a> RelationshipResolver<'a> {
    /// Resolve status codes and the component tree, failing when the catalog
    /// cannot back a consistent dataset.
    pub fn new(
        catalog: &'a ReferenceCatalog,
        reference_date: NaiveDate,
    ) -> Result<Self, GenerationError> {
        validate_catalog(catalog)
            .map_err(|err| GenerationError::Configuration(err.to_string()))?;

        let active = catalog.status_code(RecordStatus::Active).ok_or_else(|| {
            GenerationError::Configuration("catalog has no active status code".to_string())
        })?;
        let historical = catalog
            .status_code(RecordStatus::Historical)
            .ok_or_else(|| {
                GenerationError::Configuration(
                    "catalog has no historical status code".to_string(),
                )
            })?;
        if catalog.countries().next().is_none() {
            return Err(GenerationError::Configuration(
                "catalog has no country codes".to_string(),
            ));
        }
        if catalog.addresses.is_empty() {
            return Err(GenerationError::Configuration(
                "catalog has no addresses".to_string(),
            ));
        }
        if catalog.active_addresses().next().is_none() {
            return Err(GenerationError::Configuration(
                "catalog has no active address".to_string(),
            ));
        }

        let tree = build_component_tree_report(&catalog.address_components);
        let order = tree.topo_order.ok_or_else(|| {
            GenerationError::Configuration("address component tree has a cycle".to_string())
        })?;

        let by_code = catalog
            .address_components
            .iter()
            .map(|entry| (entry.code.as_str(), entry))
            .collect::<BTreeMap<_, _>>();
        let mut component_ids = BTreeMap::new();
        let mut components = Vec::with_capacity(order.len());
        for code in order {
            let Some(entry) = by_code.get(code.as_str()) else {
                continue;
            };
            let id = components.len() as u64 + 1;
            let parent_id = entry
                .parent_code
                .as_ref()
                .and_then(|parent| component_ids.get(parent).copied());
            components.push(AddressComponent {
                id,
                parent_id,
                code: entry.code.clone(),
                label: entry.label.clone(),
                level: entry.level,
            });
            component_ids.insert(code, id);
        }

        Ok(Self {
            catalog,
            reference_date,
            status_codes: StatusCodes {
                active: active.id,
                historical: historical.id,
            },
            undetermined: catalog
                .undetermined_citizenship()
                .map(|entry| entry.code.clone()),
            component_ids,
            components,
            addresses: Vec::new(),
            residencies: Vec::new(),
            licenses: Vec::new(),
            active_residency: BTreeMap::new(),
            active_license: BTreeMap::new(),
            stats: ResolverStats::default(),
        })
    }

    pub fn catalog(&self) -> &'a ReferenceCatalog {
        self.catalog
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn status_codes(&self) -> StatusCodes {
        self.status_codes
    }

    pub fn undetermined_citizenship(&self) -> Option<&str> {
        self.undetermined.as_deref()
    }

    pub fn component_id(&self, code: &str) -> Option<u64> {
        self.component_ids.get(code).copied()
    }

    pub fn components(&self) -> &[AddressComponent] {
        &self.components
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Materialize a catalog address as a new address row and return its id.
    pub fn resolve_address(&mut self, entry: &AddressEntry) -> Result<u64, GenerationError> {
        let component_id = self.component_id(&entry.component_code).ok_or_else(|| {
            GenerationError::Configuration(format!(
                "address {} references unknown component {}",
                entry.code, entry.component_code
            ))
        })?;
        let id = self.addresses.len() as u64 + 1;
        self.addresses.push(Address {
            id,
            catalog_code: entry.code.clone(),
            component_id,
            full_text: entry.full_text.clone(),
            postal_code: entry.postal_code.clone(),
            status: entry.status,
        });
        Ok(id)
    }

    pub fn active_residency(&self, person_id: u64) -> Option<&Residency> {
        self.active_residency
            .get(&person_id)
            .and_then(|index| self.residencies.get(*index))
    }

    /// Append an active residency, demoting the current one to end the day before `start`.
    pub fn assign_residency(
        &mut self,
        person_id: u64,
        address_id: u64,
        start: NaiveDate,
    ) -> Result<u64, GenerationError> {
        if start > self.reference_date {
            return Err(GenerationError::Timeline(format!(
                "residency for person {} starts {} after reference date {}",
                person_id, start, self.reference_date
            )));
        }

        if let Some(&index) = self.active_residency.get(&person_id) {
            let current = &mut self.residencies[index];
            if start <= current.start_date {
                return Err(GenerationError::Timeline(format!(
                    "residency for person {} starting {} does not follow {}",
                    person_id, start, current.start_date
                )));
            }
            current.status = RecordStatus::Historical;
            current.end_date = start.checked_sub_days(Days::new(1));
            self.stats.residency_demotions += 1;
            debug!(person_id, residency_id = current.id, "residency demoted");
        }

        let id = self.residencies.len() as u64 + 1;
        self.residencies.push(Residency {
            id,
            person_id,
            address_id,
            status: RecordStatus::Active,
            start_date: start,
            end_date: None,
        });
        self.active_residency.insert(person_id, self.residencies.len() - 1);
        Ok(id)
    }

    /// Close the active residency of a deceased person at the death date.
    pub fn close_for_death(
        &mut self,
        person_id: u64,
        death_date: NaiveDate,
    ) -> Result<(), GenerationError> {
        let Some(&index) = self.active_residency.get(&person_id) else {
            return Ok(());
        };
        let current = &mut self.residencies[index];
        if death_date < current.start_date {
            return Err(GenerationError::Timeline(format!(
                "person {} died {} before residency start {}",
                person_id, death_date, current.start_date
            )));
        }
        self.active_residency.remove(&person_id);
        current.status = RecordStatus::Historical;
        current.end_date = Some(death_date);
        self.stats.death_truncations += 1;
        Ok(())
    }

    /// Record a license, demoting the previous active one. The new license is
    /// active only for a living holder whose license has not yet expired.
    pub fn issue_license(
        &mut self,
        person_id: u64,
        issue: NaiveDate,
        expiry: NaiveDate,
        authority: Option<String>,
        alive: bool,
    ) -> Result<u64, GenerationError> {
        if issue > expiry {
            return Err(GenerationError::Timeline(format!(
                "license for person {} issued {} after expiry {}",
                person_id, issue, expiry
            )));
        }

        if let Some(index) = self.active_license.remove(&person_id) {
            self.licenses[index].status = RecordStatus::Historical;
            self.stats.license_demotions += 1;
        }

        let status = if alive && expiry >= self.reference_date {
            RecordStatus::Active
        } else {
            RecordStatus::Historical
        };
        let id = self.licenses.len() as u64 + 1;
        self.licenses.push(DrivingLicense {
            id,
            person_id,
            status,
            issue_date: issue,
            expiry_date: expiry,
            issuing_authority: authority,
        });
        if status == RecordStatus::Active {
            self.active_license.insert(person_id, self.licenses.len() - 1);
        }
        Ok(id)
    }

    /// Set citizenship codes. An undetermined main code clears the additional
    /// set; the main code and duplicates are dropped from it.
    pub fn set_citizenship(&self, person: &mut Person, main: String, additional: Vec<String>) {
        let mut additional = if self.undetermined.as_deref() == Some(main.as_str()) {
            Vec::new()
        } else {
            additional
                .into_iter()
                .filter(|code| *code != main && self.undetermined.as_ref() != Some(code))
                .collect::<Vec<_>>()
        };
        additional.sort();
        additional.dedup();
        person.main_citizenship = main;
        person.additional_citizenships = additional;
    }

    /// Assemble the final dataset.
    pub fn finish(self, persons: Vec<Person>, seed: u64) -> Dataset {
        Dataset {
            meta: DatasetMeta {
                reference_date: self.reference_date,
                seed,
                record_count: persons.len() as u64,
                catalog_version: self.catalog.catalog_version.clone(),
                status_codes: self.status_codes,
                undetermined_citizenship: self.undetermined,
            },
            persons,
            addresses: self.addresses,
            address_components: self.components,
            residencies: self.residencies,
            driving_licenses: self.licenses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsynth_core::{Classifier, Gender};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn person(id: u64) -> Person {
        Person {
            id,
            alive: true,
            birth_date: date(1980, 1, 1),
            death_date: None,
            gender: Gender::Female,
            first_name: "Mari".to_string(),
            last_name: "Kask".to_string(),
            personal_code: String::new(),
            main_citizenship: String::new(),
            additional_citizenships: Vec::new(),
        }
    }

    #[test]
    fn components_are_emitted_parent_first() {
        let catalog = ReferenceCatalog::builtin();
        let resolver = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect("resolver");
        let seen = resolver
            .components()
            .iter()
            .fold(Vec::new(), |mut seen: Vec<u64>, component| {
                if let Some(parent) = component.parent_id {
                    assert!(seen.contains(&parent), "parent {parent} after child");
                }
                seen.push(component.id);
                seen
            });
        assert_eq!(seen.len(), catalog.address_components.len());
    }

    #[test]
    fn new_assignment_demotes_current_residency() {
        let catalog = ReferenceCatalog::builtin();
        let mut resolver = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect("resolver");
        let address = resolver
            .resolve_address(&catalog.addresses[0])
            .expect("address");
        let first = resolver
            .assign_residency(7, address, date(2000, 5, 1))
            .expect("first");
        let second = resolver
            .assign_residency(7, address, date(2010, 5, 1))
            .expect("second");

        assert_eq!(resolver.active_residency(7).map(|row| row.id), Some(second));
        let dataset = resolver.finish(vec![person(7)], 1);
        let demoted = dataset
            .residencies
            .iter()
            .find(|row| row.id == first)
            .expect("first row");
        assert_eq!(demoted.status, RecordStatus::Historical);
        assert_eq!(demoted.end_date, Some(date(2010, 4, 30)));
    }

    #[test]
    fn death_closes_active_residency() {
        let catalog = ReferenceCatalog::builtin();
        let mut resolver = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect("resolver");
        let address = resolver
            .resolve_address(&catalog.addresses[0])
            .expect("address");
        resolver
            .assign_residency(3, address, date(2001, 1, 1))
            .expect("assign");
        resolver
            .close_for_death(3, date(2015, 8, 9))
            .expect("close");

        assert!(resolver.active_residency(3).is_none());
        assert_eq!(resolver.stats().death_truncations, 1);
        assert!(resolver.close_for_death(4, date(2015, 8, 9)).is_ok());
    }

    #[test]
    fn license_status_follows_holder_and_expiry() {
        let catalog = ReferenceCatalog::builtin();
        let mut resolver = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect("resolver");
        resolver
            .issue_license(1, date(2010, 1, 1), date(2020, 1, 1), None, true)
            .expect("old");
        resolver
            .issue_license(1, date(2020, 1, 2), date(2030, 1, 2), None, true)
            .expect("renewed");
        resolver
            .issue_license(2, date(2020, 1, 2), date(2030, 1, 2), None, false)
            .expect("deceased holder");

        let dataset = resolver.finish(Vec::new(), 1);
        let statuses = dataset
            .driving_licenses
            .iter()
            .map(|license| license.status)
            .collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![
                RecordStatus::Historical,
                RecordStatus::Active,
                RecordStatus::Historical
            ]
        );
    }

    #[test]
    fn undetermined_main_citizenship_clears_additional() {
        let catalog = ReferenceCatalog::builtin();
        let resolver = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect("resolver");
        let mut holder = person(1);
        resolver.set_citizenship(
            &mut holder,
            "XXX".to_string(),
            vec!["FIN".to_string()],
        );
        assert!(holder.additional_citizenships.is_empty());

        resolver.set_citizenship(
            &mut holder,
            "EST".to_string(),
            vec!["FIN".to_string(), "EST".to_string(), "FIN".to_string()],
        );
        assert_eq!(holder.additional_citizenships, vec!["FIN"]);
    }

    #[test]
    fn catalog_without_historical_status_is_fatal() {
        let mut catalog = ReferenceCatalog::builtin();
        catalog
            .codes
            .retain(|entry| !(entry.classifier == Classifier::Status && entry.short_name == "KEHTETU"));
        let err = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect_err("fatal");
        assert!(matches!(err, GenerationError::Configuration(message) if message.contains("historical")));
    }

    #[test]
    fn catalog_without_active_address_is_fatal() {
        let mut catalog = ReferenceCatalog::builtin();
        for address in catalog.addresses.iter_mut() {
            address.status = RecordStatus::Historical;
        }
        let err = RelationshipResolver::new(&catalog, date(2025, 1, 1)).expect_err("fatal");
        assert!(matches!(err, GenerationError::Configuration(message) if message.contains("active address")));
    }
}
