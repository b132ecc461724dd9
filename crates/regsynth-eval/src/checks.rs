use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use regsynth_core::personal_code::validate_personal_code;
use regsynth_core::schema::{
    ADDRESS_COMPONENTS, ADDRESSES, CITIZENSHIPS, DRIVING_LICENSES, PERSONS, RESIDENCIES,
};
use regsynth_core::{Error, Gender, RecordStatus, Result, RowRef, TabularDataset};

use crate::model::RuleOutcome;

/// Offending rows plus a short description of what they break.
struct Findings {
    offenders: Vec<RowRef>,
    description: &'static str,
}

impl Findings {
    fn new(description: &'static str) -> Self {
        Self {
            offenders: Vec::new(),
            description,
        }
    }

    fn push(&mut self, table: &str, id: u64) {
        self.offenders.push(RowRef::new(table, id));
    }
}

fn conclude(result: Result<Findings>) -> RuleOutcome {
    match result {
        Ok(findings) if findings.offenders.is_empty() => RuleOutcome::Pass,
        Ok(mut findings) => {
            findings.offenders.sort();
            findings.offenders.dedup();
            RuleOutcome::Fail {
                message: format!("{} {}", findings.offenders.len(), findings.description),
                offenders: findings.offenders,
            }
        }
        Err(err) => RuleOutcome::NotRun {
            reason: err.to_string(),
        },
    }
}

struct PersonFacts {
    alive: bool,
}

fn person_facts(dataset: &TabularDataset) -> Result<BTreeMap<u64, PersonFacts>> {
    let persons = dataset.table(PERSONS)?;
    persons.require_columns(&["id", "alive"])?;
    let mut facts = BTreeMap::new();
    for row in persons.iter_rows() {
        facts.insert(
            row.id("id")?,
            PersonFacts {
                alive: row.bool("alive")?,
            },
        );
    }
    Ok(facts)
}

struct Period {
    id: u64,
    person_id: u64,
    status: RecordStatus,
    start: NaiveDate,
    end: Option<NaiveDate>,
}

fn residency_periods(dataset: &TabularDataset) -> Result<Vec<Period>> {
    let residencies = dataset.table(RESIDENCIES)?;
    residencies.require_columns(&["id", "person_id", "status", "start_date", "end_date"])?;
    residencies
        .iter_rows()
        .map(|row| {
            Ok(Period {
                id: row.id("id")?,
                person_id: row.id("person_id")?,
                status: row.status("status")?,
                start: row.date("start_date")?,
                end: row.opt_date("end_date")?,
            })
        })
        .collect()
}

fn id_set(dataset: &TabularDataset, table: &str) -> Result<BTreeSet<u64>> {
    let table = dataset.table(table)?;
    table.require_columns(&["id"])?;
    table.iter_rows().map(|row| row.id("id")).collect()
}

/// Living persons holding more than one active residency.
pub fn duplicate_active_residency(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_duplicate_active_residency(dataset))
}

fn find_duplicate_active_residency(dataset: &TabularDataset) -> Result<Findings> {
    let persons = person_facts(dataset)?;
    let mut active: BTreeMap<u64, usize> = BTreeMap::new();
    for period in residency_periods(dataset)? {
        if period.status == RecordStatus::Active {
            *active.entry(period.person_id).or_insert(0) += 1;
        }
    }

    let mut findings = Findings::new("living person(s) with more than one active residency");
    for (person_id, count) in active {
        let alive = persons.get(&person_id).is_some_and(|facts| facts.alive);
        if alive && count > 1 {
            findings.push(PERSONS, person_id);
        }
    }
    Ok(findings)
}

/// Active licenses whose expiry lies before the reference date.
pub fn expired_but_active_license(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_expired_but_active_license(dataset))
}

fn find_expired_but_active_license(dataset: &TabularDataset) -> Result<Findings> {
    let licenses = dataset.table(DRIVING_LICENSES)?;
    licenses.require_columns(&["id", "status", "expiry_date"])?;
    let reference = dataset.meta.reference_date;
    let mut findings = Findings::new("active license(s) already expired");
    for row in licenses.iter_rows() {
        if row.status("status")? == RecordStatus::Active && row.date("expiry_date")? < reference
        {
            findings.push(DRIVING_LICENSES, row.id("id")?);
        }
    }
    Ok(findings)
}

/// Active residencies starting after the reference date.
pub fn future_start_residency(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_future_start_residency(dataset))
}

fn find_future_start_residency(dataset: &TabularDataset) -> Result<Findings> {
    let reference = dataset.meta.reference_date;
    let mut findings = Findings::new("active residency(ies) starting in the future");
    for period in residency_periods(dataset)? {
        if period.status == RecordStatus::Active && period.start > reference {
            findings.push(RESIDENCIES, period.id);
        }
    }
    Ok(findings)
}

/// Persons with an undetermined main citizenship who still hold additional ones.
pub fn conflicting_citizenship(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_conflicting_citizenship(dataset))
}

fn find_conflicting_citizenship(dataset: &TabularDataset) -> Result<Findings> {
    let citizenships = dataset.table(CITIZENSHIPS)?;
    citizenships.require_columns(&["person_id", "country_code", "role"])?;
    let mut findings =
        Findings::new("person(s) with undetermined citizenship and additional citizenships");
    let Some(sentinel) = dataset.meta.undetermined_citizenship.as_deref() else {
        return Ok(findings);
    };

    let mut undetermined = BTreeSet::new();
    let mut with_additional = BTreeSet::new();
    for row in citizenships.iter_rows() {
        let person_id = row.id("person_id")?;
        match row.text("role")? {
            "main" => {
                if row.text("country_code")? == sentinel {
                    undetermined.insert(person_id);
                }
            }
            "additional" => {
                with_additional.insert(person_id);
            }
            other => {
                return Err(Error::MalformedDataset(format!(
                    "unknown citizenship role '{}'",
                    other
                )));
            }
        }
    }

    for person_id in undetermined.intersection(&with_additional) {
        findings.push(PERSONS, *person_id);
    }
    Ok(findings)
}

/// Every foreign key between register tables resolves.
pub fn referential_integrity(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_referential_integrity(dataset))
}

fn find_referential_integrity(dataset: &TabularDataset) -> Result<Findings> {
    let persons = id_set(dataset, PERSONS)?;
    let addresses = id_set(dataset, ADDRESSES)?;
    let components = id_set(dataset, ADDRESS_COMPONENTS)?;
    let mut findings = Findings::new("row(s) referencing missing parents");

    let residencies = dataset.table(RESIDENCIES)?;
    residencies.require_columns(&["id", "person_id", "address_id"])?;
    for row in residencies.iter_rows() {
        if !persons.contains(&row.id("person_id")?)
            || !addresses.contains(&row.id("address_id")?)
        {
            findings.push(RESIDENCIES, row.id("id")?);
        }
    }

    let licenses = dataset.table(DRIVING_LICENSES)?;
    licenses.require_columns(&["id", "person_id"])?;
    for row in licenses.iter_rows() {
        if !persons.contains(&row.id("person_id")?) {
            findings.push(DRIVING_LICENSES, row.id("id")?);
        }
    }

    let citizenships = dataset.table(CITIZENSHIPS)?;
    citizenships.require_columns(&["id", "person_id"])?;
    for row in citizenships.iter_rows() {
        if !persons.contains(&row.id("person_id")?) {
            findings.push(CITIZENSHIPS, row.id("id")?);
        }
    }

    let address_table = dataset.table(ADDRESSES)?;
    address_table.require_columns(&["id", "component_id"])?;
    for row in address_table.iter_rows() {
        if !components.contains(&row.id("component_id")?) {
            findings.push(ADDRESSES, row.id("id")?);
        }
    }

    let component_table = dataset.table(ADDRESS_COMPONENTS)?;
    component_table.require_columns(&["id", "parent_id"])?;
    for row in component_table.iter_rows() {
        if let Some(parent) = row.opt_id("parent_id")? {
            if !components.contains(&parent) {
                findings.push(ADDRESS_COMPONENTS, row.id("id")?);
            }
        }
    }

    Ok(findings)
}

/// Residencies whose end precedes their start.
pub fn residency_period_order(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_residency_period_order(dataset))
}

fn find_residency_period_order(dataset: &TabularDataset) -> Result<Findings> {
    let mut findings = Findings::new("residency(ies) ending before they start");
    for period in residency_periods(dataset)? {
        if period.end.is_some_and(|end| end < period.start) {
            findings.push(RESIDENCIES, period.id);
        }
    }
    Ok(findings)
}

/// Historical residencies carry an end date; active ones do not.
pub fn residency_status_period(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_residency_status_period(dataset))
}

fn find_residency_status_period(dataset: &TabularDataset) -> Result<Findings> {
    let mut findings = Findings::new("residency(ies) whose status disagrees with the end date");
    for period in residency_periods(dataset)? {
        let closed = period.end.is_some();
        let historical = period.status == RecordStatus::Historical;
        if closed != historical {
            findings.push(RESIDENCIES, period.id);
        }
    }
    Ok(findings)
}

/// A closed (historical) period of a person overlaps another of their periods.
///
/// Two open active periods are left to `duplicate-active-residency`.
pub fn residency_overlap(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_residency_overlap(dataset))
}

fn find_residency_overlap(dataset: &TabularDataset) -> Result<Findings> {
    let mut by_person: BTreeMap<u64, Vec<Period>> = BTreeMap::new();
    for period in residency_periods(dataset)? {
        by_person.entry(period.person_id).or_default().push(period);
    }

    let mut findings = Findings::new("person(s) with overlapping residency periods");
    for (person_id, periods) in by_person {
        let overlapping = periods.iter().enumerate().any(|(index, closed)| {
            let Some(closed_end) = closed.end else {
                return false;
            };
            if closed.status != RecordStatus::Historical {
                return false;
            }
            periods.iter().enumerate().any(|(other_index, other)| {
                other_index != index
                    && other.start <= closed_end
                    && other.end.is_none_or(|end| end >= closed.start)
            })
        });
        if overlapping {
            findings.push(PERSONS, person_id);
        }
    }
    Ok(findings)
}

/// Deceased persons hold no active residency.
pub fn deceased_active_residency(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_deceased_active_residency(dataset))
}

fn find_deceased_active_residency(dataset: &TabularDataset) -> Result<Findings> {
    let persons = person_facts(dataset)?;
    let mut findings = Findings::new("deceased person(s) with an active residency");
    for period in residency_periods(dataset)? {
        let deceased = persons
            .get(&period.person_id)
            .is_some_and(|facts| !facts.alive);
        if deceased && period.status == RecordStatus::Active {
            findings.push(PERSONS, period.person_id);
        }
    }
    Ok(findings)
}

/// Licenses are issued no later than they expire.
pub fn license_date_order(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_license_date_order(dataset))
}

fn find_license_date_order(dataset: &TabularDataset) -> Result<Findings> {
    let licenses = dataset.table(DRIVING_LICENSES)?;
    licenses.require_columns(&["id", "issue_date", "expiry_date"])?;
    let mut findings = Findings::new("license(s) expiring before issue");
    for row in licenses.iter_rows() {
        if row.date("issue_date")? > row.date("expiry_date")? {
            findings.push(DRIVING_LICENSES, row.id("id")?);
        }
    }
    Ok(findings)
}

/// Personal codes are well formed and agree with birth date and gender.
pub fn personal_code_format(dataset: &TabularDataset) -> RuleOutcome {
    conclude(find_personal_code_format(dataset))
}

fn find_personal_code_format(dataset: &TabularDataset) -> Result<Findings> {
    let persons = dataset.table(PERSONS)?;
    persons.require_columns(&["id", "personal_code", "birth_date", "gender"])?;
    let mut findings = Findings::new("person(s) with an invalid personal code");
    for row in persons.iter_rows() {
        let raw_gender = row.text("gender")?;
        let gender = Gender::parse(raw_gender).ok_or_else(|| {
            Error::MalformedDataset(format!("unknown gender '{}'", raw_gender))
        })?;
        let code = row.text("personal_code")?;
        if validate_personal_code(code, row.date("birth_date")?, gender).is_err() {
            findings.push(PERSONS, row.id("id")?);
        }
    }
    Ok(findings)
}
