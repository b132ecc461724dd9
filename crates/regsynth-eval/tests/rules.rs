use chrono::{Days, NaiveDate};
use regsynth_core::schema::{PERSONS, RESIDENCIES};
use regsynth_core::{Dataset, RecordStatus, ReferenceCatalog, RowRef, RuleId, Value};
use regsynth_eval::{RuleEngine, RuleOutcome, RuleRegistry, checks};
use regsynth_generate::{GenerateOptions, GenerationEngine};

fn generated(records: u64, seed: u64) -> Dataset {
    let options = GenerateOptions {
        record_count: records,
        seed,
        ..GenerateOptions::default()
    };
    GenerationEngine::new(options)
        .generate(&ReferenceCatalog::builtin())
        .expect("generate dataset")
        .dataset
}

fn offenders(outcome: &RuleOutcome) -> Vec<RowRef> {
    match outcome {
        RuleOutcome::Fail { offenders, .. } => offenders.clone(),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn generated_dataset_passes_every_rule() {
    let dataset = generated(100, 11).to_tables();
    let report = RuleEngine::default().run(&dataset, None);

    assert_eq!(report.rules_run, RuleId::ALL.len() as u64);
    assert_eq!(report.failed, 0, "{:?}", report.failed_rules());
    assert_eq!(report.not_run, 0);
    assert!(report.is_clean());
    let order = report.results.iter().map(|r| r.rule).collect::<Vec<_>>();
    assert_eq!(order, RuleId::ALL.to_vec());
}

#[test]
fn validation_is_idempotent() {
    let dataset = generated(60, 4).to_tables();
    let engine = RuleEngine::default();
    assert_eq!(engine.run(&dataset, None), engine.run(&dataset, None));
}

#[test]
fn subset_runs_in_identifier_order() {
    let dataset = generated(10, 2).to_tables();
    let report = RuleEngine::default().run(
        &dataset,
        Some(&[
            RuleId::PersonalCodeFormat,
            RuleId::DuplicateActiveResidency,
            RuleId::PersonalCodeFormat,
        ]),
    );
    let order = report.results.iter().map(|r| r.rule).collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![RuleId::DuplicateActiveResidency, RuleId::PersonalCodeFormat]
    );
}

#[test]
fn unregistered_rule_is_not_run() {
    let dataset = generated(10, 2).to_tables();
    let mut registry = RuleRegistry::new();
    registry.register(RuleId::LicenseDateOrder, checks::license_date_order);
    let report =
        RuleEngine::new(registry).run(&dataset, Some(&[RuleId::ResidencyOverlap, RuleId::LicenseDateOrder]));

    assert_eq!(report.passed, 1);
    assert_eq!(report.not_run, 1);
    assert!(matches!(
        report.result(RuleId::ResidencyOverlap).map(|r| &r.outcome),
        Some(RuleOutcome::NotRun { .. })
    ));
}

#[test]
fn duplicate_active_residency_flags_the_person() {
    let mut dataset = generated(30, 8);
    let active = dataset
        .residencies
        .iter()
        .find(|row| row.status == RecordStatus::Active)
        .cloned()
        .expect("active residency");
    let mut duplicate = active.clone();
    duplicate.id = dataset.next_residency_id();
    dataset.residencies.push(duplicate);

    let outcome = checks::duplicate_active_residency(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(PERSONS, active.person_id)]);
}

#[test]
fn future_start_flags_the_residency() {
    let mut dataset = generated(30, 8);
    let reference = dataset.meta.reference_date;
    let row = dataset
        .residencies
        .iter_mut()
        .find(|row| row.status == RecordStatus::Active)
        .expect("active residency");
    row.start_date = reference + Days::new(1);
    let id = row.id;

    let outcome = checks::future_start_residency(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(RESIDENCIES, id)]);
}

#[test]
fn expired_active_license_is_flagged() {
    let mut dataset = generated(60, 12);
    let reference = dataset.meta.reference_date;
    let license = dataset
        .driving_licenses
        .iter_mut()
        .find(|row| row.status == RecordStatus::Active)
        .expect("active license");
    license.expiry_date = reference - Days::new(1);
    license.issue_date = license.issue_date.min(license.expiry_date);

    let report = RuleEngine::default().run(&dataset.to_tables(), None);
    assert_eq!(report.failed_rules(), vec![RuleId::ExpiredButActiveLicense]);
}

#[test]
fn conflicting_citizenship_needs_sentinel_and_additional_codes() {
    let mut dataset = generated(20, 3);
    let person = dataset
        .persons
        .iter_mut()
        .find(|person| person.main_citizenship != "XXX")
        .expect("person");
    person.main_citizenship = "XXX".to_string();
    person.additional_citizenships = vec!["FIN".to_string()];
    let id = person.id;

    let outcome = checks::conflicting_citizenship(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(PERSONS, id)]);

    dataset.meta.undetermined_citizenship = None;
    assert_eq!(
        checks::conflicting_citizenship(&dataset.to_tables()),
        RuleOutcome::Pass
    );
}

#[test]
fn supplementary_rules_catch_broken_timelines() {
    let mut dataset = generated(40, 21);
    let historical = dataset
        .residencies
        .iter()
        .position(|row| row.status == RecordStatus::Historical)
        .expect("historical residency");
    let row = &mut dataset.residencies[historical];
    let start = row.start_date;
    row.end_date = None;
    let id = row.id;

    let tables = dataset.to_tables();
    assert_eq!(
        offenders(&checks::residency_status_period(&tables)),
        vec![RowRef::new(RESIDENCIES, id)]
    );

    dataset.residencies[historical].end_date = Some(start - Days::new(3));
    let tables = dataset.to_tables();
    assert_eq!(
        offenders(&checks::residency_period_order(&tables)),
        vec![RowRef::new(RESIDENCIES, id)]
    );
}

#[test]
fn overlap_and_deceased_rules() {
    let mut dataset = generated(80, 30);
    let person_id = dataset
        .residencies_by_person()
        .into_iter()
        .find(|(_, rows)| rows.len() >= 2)
        .map(|(person_id, _)| person_id)
        .expect("person with history");
    let first = dataset
        .residencies
        .iter_mut()
        .find(|row| row.person_id == person_id)
        .expect("first period");
    first.end_date = Some(NaiveDate::from_ymd_opt(2100, 1, 1).expect("date"));

    let outcome = checks::residency_overlap(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(PERSONS, person_id)]);

    let mut dataset = generated(80, 30);
    let alive_with_active = dataset
        .residencies
        .iter()
        .find(|row| row.status == RecordStatus::Active)
        .map(|row| row.person_id)
        .expect("active residency");
    for person in dataset.persons.iter_mut() {
        if person.id == alive_with_active {
            person.alive = false;
            person.death_date = Some(dataset.meta.reference_date);
        }
    }
    let outcome = checks::deceased_active_residency(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(PERSONS, alive_with_active)]);
}

#[test]
fn personal_code_rule_checks_birth_date() {
    let mut dataset = generated(15, 6);
    let person = &mut dataset.persons[0];
    person.birth_date = person.birth_date + Days::new(1);
    let id = person.id;

    let outcome = checks::personal_code_format(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(PERSONS, id)]);
}

#[test]
fn broken_reference_is_reported() {
    let mut dataset = generated(15, 6);
    dataset.residencies[0].address_id = 99_999;
    let id = dataset.residencies[0].id;

    let outcome = checks::referential_integrity(&dataset.to_tables());
    assert_eq!(offenders(&outcome), vec![RowRef::new(RESIDENCIES, id)]);
}

#[test]
fn missing_inputs_are_not_run() {
    let dataset = generated(15, 6);

    let mut tables = dataset.to_tables();
    tables.tables.remove("driving_licenses");
    let report = RuleEngine::default().run(&tables, None);
    for rule in [
        RuleId::ExpiredButActiveLicense,
        RuleId::LicenseDateOrder,
        RuleId::ReferentialIntegrity,
    ] {
        assert!(matches!(
            report.result(rule).map(|r| &r.outcome),
            Some(RuleOutcome::NotRun { .. })
        ));
    }
    assert_eq!(report.not_run, 3);

    let mut tables = dataset.to_tables();
    let residencies = tables.tables.get_mut(RESIDENCIES).expect("residencies");
    residencies.rows[0][5] = Value::Text("not-a-date".to_string());
    let outcome = checks::future_start_residency(&tables);
    assert!(
        matches!(&outcome, RuleOutcome::NotRun { reason } if reason.contains("start_date")),
        "{outcome:?}"
    );
}
