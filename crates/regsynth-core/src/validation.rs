use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::ReferenceCatalog;
use crate::error::{Error, Result};
use crate::graph::build_component_tree_report;

/// Validate internal consistency of a reference catalog.
///
/// This checks:
/// - duplicate code ids and duplicate (classifier, short name) pairs
/// - duplicate component, address and organization codes
/// - component parents and address leaf components exist
/// - the component tree has no cycles
pub fn validate_catalog(catalog: &ReferenceCatalog) -> Result<()> {
    let mut ids = BTreeSet::new();
    let mut short_names = BTreeSet::new();
    for entry in &catalog.codes {
        if !ids.insert(entry.id) {
            return Err(Error::Configuration(format!("duplicate code id: {}", entry.id)));
        }
        if !short_names.insert((entry.classifier, entry.short_name.clone())) {
            return Err(Error::Configuration(format!(
                "duplicate short name: {:?}.{}",
                entry.classifier, entry.short_name
            )));
        }
    }

    let mut components = BTreeMap::new();
    for component in &catalog.address_components {
        if components
            .insert(component.code.clone(), component)
            .is_some()
        {
            return Err(Error::Configuration(format!(
                "duplicate component code: {}",
                component.code
            )));
        }
    }

    for component in &catalog.address_components {
        if let Some(parent) = &component.parent_code {
            if !components.contains_key(parent) {
                return Err(Error::Configuration(format!(
                    "component {} references missing parent {}",
                    component.code, parent
                )));
            }
        }
    }

    let report = build_component_tree_report(&catalog.address_components);
    if let Some(cycle) = report.cycle {
        return Err(Error::Configuration(format!(
            "component tree has a cycle through: {}",
            cycle.join(", ")
        )));
    }

    let mut address_codes = BTreeSet::new();
    for address in &catalog.addresses {
        if !address_codes.insert(address.code.as_str()) {
            return Err(Error::Configuration(format!(
                "duplicate address code: {}",
                address.code
            )));
        }
        if !components.contains_key(&address.component_code) {
            return Err(Error::Configuration(format!(
                "address {} references missing component {}",
                address.code, address.component_code
            )));
        }
    }

    let mut organizations = BTreeSet::new();
    for organization in &catalog.organizations {
        if !organizations.insert(organization.registry_code.as_str()) {
            return Err(Error::Configuration(format!(
                "duplicate organization code: {}",
                organization.registry_code
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ComponentEntry;

    #[test]
    fn builtin_catalog_is_valid() {
        validate_catalog(&ReferenceCatalog::builtin()).expect("valid builtin");
    }

    #[test]
    fn rejects_dangling_parent() {
        let mut catalog = ReferenceCatalog::builtin();
        catalog.address_components.push(ComponentEntry {
            code: "orphan".to_string(),
            parent_code: Some("nowhere".to_string()),
            label: "Orphan".to_string(),
            level: 4,
        });
        let err = validate_catalog(&catalog).expect_err("dangling parent");
        assert!(err.to_string().contains("missing parent nowhere"));
    }

    #[test]
    fn rejects_component_cycle() {
        let mut catalog = ReferenceCatalog::builtin();
        for component in catalog.address_components.iter_mut() {
            if component.code == "0037" {
                component.parent_code = Some("S001".to_string());
            }
        }
        let err = validate_catalog(&catalog).expect_err("cycle");
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn rejects_duplicate_code_id() {
        let mut catalog = ReferenceCatalog::builtin();
        let mut duplicate = catalog.codes[0].clone();
        duplicate.short_name = "OTHER".to_string();
        catalog.codes.push(duplicate);
        let err = validate_catalog(&catalog).expect_err("duplicate id");
        assert!(err.to_string().contains("duplicate code id"));
    }
}
