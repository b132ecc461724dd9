use std::collections::BTreeSet;

use chrono::{Datelike, Days, Months, NaiveDate};
use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use regsynth_core::personal_code::personal_code;
use regsynth_core::schema;
use regsynth_core::{Dataset, Gender, Person, RecordStatus, ReferenceCatalog};

use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GenerationIssue, GenerationReport};
use crate::resolver::RelationshipResolver;

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub dataset: Dataset,
    pub report: GenerationReport,
}

/// Entry point for generating register datasets from a reference catalog.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn generate(&self, catalog: &ReferenceCatalog) -> Result<GenerationResult, GenerationError> {
        validate_options(&self.options)?;
        let options = &self.options;
        let mut resolver = RelationshipResolver::new(catalog, options.reference_date)?;
        let mut report = GenerationReport::new(options.seed, options.reference_date);

        info!(
            seed = options.seed,
            records = options.record_count,
            reference_date = %options.reference_date,
            catalog_version = %catalog.catalog_version,
            "generation started"
        );

        if resolver.undetermined_citizenship().is_none() {
            warn!("catalog has no undetermined citizenship code");
            report.record_warning(
                GenerationIssue::warning(
                    "no_undetermined_citizenship",
                    "catalog has no undetermined citizenship code; none will be assigned",
                )
                .with_table(schema::CITIZENSHIPS),
            );
        }
        if catalog.home_country().is_none() {
            report.record_warning(GenerationIssue::warning(
                "no_home_country",
                "catalog flags no home country; main citizenships are drawn uniformly",
            ));
        }
        if catalog.organizations.is_empty() {
            report.record_warning(
                GenerationIssue::warning(
                    "no_issuing_authority",
                    "catalog has no organizations; licenses carry no issuing authority",
                )
                .with_table(schema::DRIVING_LICENSES),
            );
        }

        let mut address_rng = ChaCha8Rng::seed_from_u64(hash_seed(options.seed, "addresses"));
        let pool = draw_addresses(&mut resolver, options, &mut address_rng, &mut report)?;
        info!(addresses = pool.all.len(), "addresses drawn");

        let mut person_rng = ChaCha8Rng::seed_from_u64(hash_seed(options.seed, "persons"));
        let mut persons = Vec::with_capacity(options.record_count as usize);
        let mut used_codes = BTreeSet::new();
        for person_id in 1..=options.record_count {
            let person = generate_person(
                person_id,
                options,
                catalog,
                &mut resolver,
                &pool,
                &mut person_rng,
                &mut used_codes,
                &mut report,
            )?;
            persons.push(person);
        }

        let stats = resolver.stats();
        report.residency_demotions = stats.residency_demotions;
        report.license_demotions = stats.license_demotions;
        report.death_truncations = stats.death_truncations;

        let dataset = resolver.finish(persons, options.seed);
        report.record_table(schema::PERSONS, dataset.persons.len());
        report.record_table(schema::ADDRESS_COMPONENTS, dataset.address_components.len());
        report.record_table(schema::ADDRESSES, dataset.addresses.len());
        report.record_table(schema::RESIDENCIES, dataset.residencies.len());
        report.record_table(schema::CITIZENSHIPS, dataset.citizenships().len());
        report.record_table(schema::DRIVING_LICENSES, dataset.driving_licenses.len());

        info!(
            persons = dataset.persons.len(),
            residencies = dataset.residencies.len(),
            licenses = dataset.driving_licenses.len(),
            demotions = report.residency_demotions + report.license_demotions,
            warnings = report.warnings.len(),
            "generation finished"
        );

        Ok(GenerationResult { dataset, report })
    }
}

fn validate_options(options: &GenerateOptions) -> Result<(), GenerationError> {
    if options.record_count == 0 {
        return Err(GenerationError::InvalidOptions(
            "record_count must be at least 1".to_string(),
        ));
    }
    if options.address_rows() == 0 {
        return Err(GenerationError::InvalidOptions(
            "address_count must be at least 1".to_string(),
        ));
    }
    if options.min_residencies == 0 || options.min_residencies > options.max_residencies {
        return Err(GenerationError::InvalidOptions(format!(
            "residency range {}..={} is empty or starts at zero",
            options.min_residencies, options.max_residencies
        )));
    }
    if options.earliest_residency_date > options.reference_date {
        return Err(GenerationError::InvalidOptions(format!(
            "earliest_residency_date {} is after reference_date {}",
            options.earliest_residency_date, options.reference_date
        )));
    }
    if options.license_validity_years == 0 {
        return Err(GenerationError::InvalidOptions(
            "license_validity_years must be at least 1".to_string(),
        ));
    }
    let oldest_birth_year = options.reference_date.year() - options.max_age_years as i32;
    if oldest_birth_year < 1800 || options.reference_date.year() > 2199 {
        return Err(GenerationError::InvalidOptions(format!(
            "birth years {}..={} cannot be encoded in personal codes",
            oldest_birth_year,
            options.reference_date.year()
        )));
    }

    let probabilities = [
        ("undetermined_probability", options.undetermined_probability),
        ("home_country_probability", options.home_country_probability),
        ("dual_citizenship_probability", options.dual_citizenship_probability),
        ("death_probability", options.death_probability),
        ("license_probability", options.license_probability),
        ("renewal_probability", options.renewal_probability),
    ];
    for (name, value) in probabilities {
        if !(0.0..=1.0).contains(&value) {
            return Err(GenerationError::InvalidOptions(format!(
                "{} must be within 0..=1, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Address rows available to residencies.
struct AddressPool {
    all: Vec<u64>,
    active: Vec<u64>,
}

fn draw_addresses(
    resolver: &mut RelationshipResolver<'_>,
    options: &GenerateOptions,
    rng: &mut ChaCha8Rng,
    report: &mut GenerationReport,
) -> Result<AddressPool, GenerationError> {
    let catalog = resolver.catalog();
    let mut pool = AddressPool {
        all: Vec::new(),
        active: Vec::new(),
    };

    for _ in 0..options.address_rows() {
        let entry = catalog.addresses.choose(rng).ok_or_else(|| {
            GenerationError::Configuration("catalog has no addresses".to_string())
        })?;
        let id = resolver.resolve_address(entry)?;
        pool.all.push(id);
        if entry.status == RecordStatus::Active {
            pool.active.push(id);
        }
    }

    if pool.active.is_empty() {
        let active = catalog.active_addresses().collect::<Vec<_>>();
        let entry = active.choose(rng).ok_or_else(|| {
            GenerationError::Configuration("catalog has no active address".to_string())
        })?;
        let id = resolver.resolve_address(entry)?;
        pool.all.push(id);
        pool.active.push(id);
        warn!(address_id = id, "no active address drawn; added one");
        report.record_warning(
            GenerationIssue::warning(
                "extra_active_address",
                "no active address among drawn rows; one extra active address added",
            )
            .with_table(schema::ADDRESSES),
        );
    }

    Ok(pool)
}

#[allow(clippy::too_many_arguments)]
fn generate_person(
    person_id: u64,
    options: &GenerateOptions,
    catalog: &ReferenceCatalog,
    resolver: &mut RelationshipResolver<'_>,
    pool: &AddressPool,
    rng: &mut ChaCha8Rng,
    used_codes: &mut BTreeSet<String>,
    report: &mut GenerationReport,
) -> Result<Person, GenerationError> {
    let reference = options.reference_date;
    let gender = if rng.random_bool(0.5) {
        Gender::Male
    } else {
        Gender::Female
    };

    let oldest = reference
        .checked_sub_months(Months::new(options.max_age_years * 12))
        .ok_or_else(|| GenerationError::InvalidOptions("max_age_years out of range".to_string()))?;
    let youngest = reference.checked_sub_days(Days::new(1)).unwrap_or(reference);
    let birth_date = random_date(rng, oldest, youngest);
    let death_date = if rng.random_bool(options.death_probability) {
        Some(random_date(rng, birth_date, reference))
    } else {
        None
    };
    let alive = death_date.is_none();

    let first_name: String = FirstName().fake_with_rng(rng);
    let last_name: String = LastName().fake_with_rng(rng);
    let personal_code = unique_personal_code(birth_date, gender, rng, used_codes)?;

    let mut person = Person {
        id: person_id,
        alive,
        birth_date,
        death_date,
        gender,
        first_name,
        last_name,
        personal_code,
        main_citizenship: String::new(),
        additional_citizenships: Vec::new(),
    };

    let (main, additional) = draw_citizenship(catalog, resolver, options, rng);
    resolver.set_citizenship(&mut person, main, additional);

    let window_end = death_date.unwrap_or(reference);
    let window_start = birth_date.max(options.earliest_residency_date);
    if window_start > window_end {
        report.record_warning(
            GenerationIssue::warning(
                "no_residency_window",
                format!(
                    "person lived entirely before {}; no residency generated",
                    options.earliest_residency_date
                ),
            )
            .with_table(schema::RESIDENCIES)
            .with_person(person_id),
        );
    } else {
        let starts = residency_starts(rng, options, window_start, window_end);
        let mut previous = None;
        let last = starts.len().saturating_sub(1);
        for (index, start) in starts.into_iter().enumerate() {
            let candidates = if index == last {
                &pool.active
            } else {
                &pool.all
            };
            let address_id = pick_address(rng, candidates, previous, options.ensure_new_address)?;
            resolver.assign_residency(person_id, address_id, start)?;
            previous = Some(address_id);
        }
        if let Some(death_date) = death_date {
            resolver.close_for_death(person_id, death_date)?;
        }
    }

    if let Some(adult_from) = birth_date.checked_add_months(Months::new(18 * 12)) {
        if adult_from <= window_end && rng.random_bool(options.license_probability) {
            issue_licenses(person_id, options, catalog, resolver, rng, adult_from, window_end, alive)?;
        }
    }

    Ok(person)
}

fn draw_citizenship(
    catalog: &ReferenceCatalog,
    resolver: &RelationshipResolver<'_>,
    options: &GenerateOptions,
    rng: &mut ChaCha8Rng,
) -> (String, Vec<String>) {
    if let Some(undetermined) = resolver.undetermined_citizenship() {
        if rng.random_bool(options.undetermined_probability) {
            return (undetermined.to_string(), Vec::new());
        }
    }

    let countries = catalog.countries().collect::<Vec<_>>();
    let foreign = catalog.foreign_countries().collect::<Vec<_>>();
    let main = match catalog.home_country() {
        Some(home) if foreign.is_empty() || rng.random_bool(options.home_country_probability) => {
            home.code.clone()
        }
        Some(_) => foreign
            .choose(rng)
            .map(|entry| entry.code.clone())
            .unwrap_or_default(),
        None => countries
            .choose(rng)
            .map(|entry| entry.code.clone())
            .unwrap_or_default(),
    };

    let mut additional = Vec::new();
    if rng.random_bool(options.dual_citizenship_probability) {
        if let Some(entry) = countries.choose(rng) {
            additional.push(entry.code.clone());
        }
    }
    (main, additional)
}

/// Strictly increasing start dates inside `[start, end]`.
fn residency_starts(
    rng: &mut ChaCha8Rng,
    options: &GenerateOptions,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    let span = (end - start).num_days().max(0) as usize + 1;
    let wanted = rng.random_range(options.min_residencies..=options.max_residencies) as usize;
    let amount = wanted.min(span);
    let mut offsets = rand::seq::index::sample(rng, span, amount).into_vec();
    offsets.sort_unstable();
    offsets
        .into_iter()
        .filter_map(|offset| start.checked_add_days(Days::new(offset as u64)))
        .collect()
}

fn pick_address(
    rng: &mut ChaCha8Rng,
    candidates: &[u64],
    previous: Option<u64>,
    ensure_new_address: bool,
) -> Result<u64, GenerationError> {
    let filtered = candidates
        .iter()
        .copied()
        .filter(|id| !ensure_new_address || Some(*id) != previous)
        .collect::<Vec<_>>();
    let source = if filtered.is_empty() {
        candidates
    } else {
        filtered.as_slice()
    };
    source
        .choose(rng)
        .copied()
        .ok_or_else(|| GenerationError::Configuration("no address rows to assign".to_string()))
}

#[allow(clippy::too_many_arguments)]
fn issue_licenses(
    person_id: u64,
    options: &GenerateOptions,
    catalog: &ReferenceCatalog,
    resolver: &mut RelationshipResolver<'_>,
    rng: &mut ChaCha8Rng,
    adult_from: NaiveDate,
    window_end: NaiveDate,
    alive: bool,
) -> Result<(), GenerationError> {
    let validity = Months::new(options.license_validity_years * 12);
    let mut issue = random_date(rng, adult_from, window_end);
    loop {
        let expiry = issue.checked_add_months(validity).ok_or_else(|| {
            GenerationError::InvalidOptions("license validity overflows the calendar".to_string())
        })?;
        let authority = catalog
            .organizations
            .choose(rng)
            .map(|organization| organization.registry_code.clone());
        resolver.issue_license(person_id, issue, expiry, authority, alive)?;

        if expiry >= window_end || !rng.random_bool(options.renewal_probability) {
            break;
        }
        issue = expiry.checked_add_days(Days::new(1)).unwrap_or(expiry);
    }
    Ok(())
}

fn unique_personal_code(
    birth_date: NaiveDate,
    gender: Gender,
    rng: &mut ChaCha8Rng,
    used_codes: &mut BTreeSet<String>,
) -> Result<String, GenerationError> {
    let first_serial = rng.random_range(0..1000u16);
    for step in 0..1000u16 {
        let serial = (first_serial + step) % 1000;
        let code = personal_code(birth_date, gender, serial).ok_or_else(|| {
            GenerationError::InvalidOptions(format!(
                "birth date {} cannot be encoded in a personal code",
                birth_date
            ))
        })?;
        if used_codes.insert(code.clone()) {
            return Ok(code);
        }
    }
    Err(GenerationError::Configuration(format!(
        "personal code serials exhausted for {}",
        birth_date
    )))
}

fn random_date(rng: &mut ChaCha8Rng, start: NaiveDate, end: NaiveDate) -> NaiveDate {
    if end <= start {
        return start;
    }
    let span = (end - start).num_days() as u64;
    let offset = rng.random_range(0..=span);
    start.checked_add_days(Days::new(offset)).unwrap_or(end)
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_seed_separates_streams() {
        assert_ne!(hash_seed(42, "addresses"), hash_seed(42, "persons"));
        assert_eq!(hash_seed(42, "persons"), hash_seed(42, "persons"));
    }

    #[test]
    fn residency_starts_are_strictly_increasing() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let options = GenerateOptions {
            min_residencies: 3,
            max_residencies: 3,
            ..GenerateOptions::default()
        };
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).expect("date");
        let end = NaiveDate::from_ymd_opt(2025, 1, 1).expect("date");
        let starts = residency_starts(&mut rng, &options, start, end);
        assert_eq!(starts.len(), 3);
        assert!(starts.windows(2).all(|pair| pair[0] < pair[1]));

        let narrow = residency_starts(&mut rng, &options, end, end);
        assert_eq!(narrow, vec![end]);
    }

    #[test]
    fn rejects_zero_records() {
        let options = GenerateOptions {
            record_count: 0,
            ..GenerateOptions::default()
        };
        let err = GenerationEngine::new(options)
            .generate(&ReferenceCatalog::builtin())
            .expect_err("zero records");
        assert!(matches!(err, GenerationError::InvalidOptions(_)));
    }
}
