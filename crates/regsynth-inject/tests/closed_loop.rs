use chrono::Days;
use regsynth_core::schema::{DRIVING_LICENSES, PERSONS, RESIDENCIES};
use regsynth_core::{Dataset, DrivingLicense, RecordStatus, ReferenceCatalog, RowRef, RuleId};
use regsynth_eval::{RuleEngine, RuleOutcome, ValidationReport};
use regsynth_generate::{GenerateOptions, GenerationEngine};
use regsynth_inject::{ErrorInjector, InjectError, InjectOptions};

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

fn validate(dataset: &Dataset) -> ValidationReport {
    RuleEngine::default().run(&dataset.to_tables(), None)
}

fn offenders(report: &ValidationReport, rule: RuleId) -> Vec<RowRef> {
    report
        .result(rule)
        .map(|result| result.outcome.offenders().to_vec())
        .unwrap_or_default()
}

#[test]
fn future_start_injection_fails_only_its_rule() {
    let dataset = generated(100, 11);
    assert!(validate(&dataset).is_clean());

    let (mutated, report) = ErrorInjector::default()
        .inject(&dataset, &[RuleId::FutureStartResidency])
        .expect("inject");
    assert_eq!(report.applied, 1);
    assert_eq!(report.shortfall, 0);

    let validation = validate(&mutated);
    assert_eq!(validation.failed_rules(), vec![RuleId::FutureStartResidency]);
    let rows = offenders(&validation, RuleId::FutureStartResidency);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].table, RESIDENCIES);
    assert_eq!(report.targets(RuleId::FutureStartResidency), vec![&rows[0]]);

    // input is left untouched
    assert!(validate(&dataset).is_clean());
}

#[test]
fn all_injectable_rules_fail_exactly_once() {
    let dataset = generated(50, 7);
    for seed in [None, Some(3), Some(99)] {
        let (mutated, report) = ErrorInjector::new(InjectOptions { seed })
            .inject(&dataset, &RuleId::INJECTABLE)
            .expect("inject");
        assert_eq!(report.requested, 4);
        assert_eq!(report.applied, 4, "{:?}", report.entries);

        let validation = validate(&mutated);
        assert_eq!(validation.failed_rules(), RuleId::INJECTABLE.to_vec());
        assert_eq!(validation.not_run, 0);
        for rule in RuleId::INJECTABLE {
            let rows = offenders(&validation, rule);
            assert_eq!(rows.len(), 1, "{rule}: {rows:?}");
            assert_eq!(report.targets(rule), vec![&rows[0]]);
        }

        let restricted = RuleEngine::default().run(&mutated.to_tables(), Some(&RuleId::INJECTABLE));
        assert_eq!(restricted.rules_run, 4);
        assert_eq!(restricted.failed, 4);
        assert_eq!(restricted.failed_rules(), RuleId::INJECTABLE.to_vec());
    }
}

/// Leave `holder` with the only active license in the dataset.
fn single_license_holder(dataset: &mut Dataset, holder: u64) {
    let reference = dataset.meta.reference_date;
    for license in &mut dataset.driving_licenses {
        if license.person_id != holder && license.status == RecordStatus::Active {
            license.status = RecordStatus::Historical;
        }
    }
    let held = dataset
        .driving_licenses
        .iter()
        .any(|license| license.person_id == holder && license.status == RecordStatus::Active);
    if !held {
        let id = dataset
            .driving_licenses
            .iter()
            .map(|license| license.id)
            .max()
            .unwrap_or(0)
            + 1;
        dataset.driving_licenses.push(DrivingLicense {
            id,
            person_id: holder,
            status: RecordStatus::Active,
            issue_date: reference - Days::new(365),
            expiry_date: reference + Days::new(3000),
            issuing_authority: None,
        });
    }
}

fn license_owner(dataset: &Dataset, target: &RowRef) -> Option<u64> {
    dataset
        .driving_licenses
        .iter()
        .find(|license| license.id == target.id)
        .map(|license| license.person_id)
}

#[test]
fn scarce_license_holder_is_left_for_the_license_rule() {
    let mut dataset = generated(20, 11);
    let residencies = dataset.residencies_by_person();
    let holder = dataset
        .persons
        .iter()
        .filter(|person| person.alive)
        .find(|person| {
            residencies.get(&person.id).is_some_and(|rows| {
                rows.iter()
                    .filter(|row| row.status == RecordStatus::Active)
                    .count()
                    == 1
            })
        })
        .map(|person| person.id)
        .expect("person with one active residency");
    single_license_holder(&mut dataset, holder);
    assert!(validate(&dataset).is_clean());

    for seed in [None, Some(2), Some(17)] {
        let (mutated, report) = ErrorInjector::new(InjectOptions { seed })
            .inject(&dataset, &RuleId::INJECTABLE)
            .expect("inject");
        assert_eq!(report.applied, 4, "{:?}", report.entries);
        assert_eq!(report.shortfall, 0);

        let license = report.targets(RuleId::ExpiredButActiveLicense)[0];
        assert_eq!(license.table, DRIVING_LICENSES);
        assert_eq!(license_owner(&mutated, license), Some(holder));
        let duplicate = report.targets(RuleId::DuplicateActiveResidency)[0];
        assert_ne!(duplicate, &RowRef::new(PERSONS, holder));

        // entries stay in request order
        let rules = report.entries.iter().map(|entry| entry.rule).collect::<Vec<_>>();
        assert_eq!(rules, RuleId::INJECTABLE.to_vec());
        assert_eq!(validate(&mutated).failed_rules(), RuleId::INJECTABLE.to_vec());
    }
}

#[test]
fn small_dataset_fills_every_injectable_rule() {
    let dataset = generated(20, 11);
    let (_, report) = ErrorInjector::default()
        .inject(&dataset, &RuleId::INJECTABLE)
        .expect("inject");
    assert_eq!(report.applied, 4, "{:?}", report.entries);
}

#[test]
fn targets_are_disjoint_persons() {
    let dataset = generated(50, 7);
    let (mutated, report) = ErrorInjector::default()
        .inject(
            &dataset,
            &[
                RuleId::ConflictingCitizenship,
                RuleId::ConflictingCitizenship,
                RuleId::DuplicateActiveResidency,
            ],
        )
        .expect("inject");
    assert_eq!(report.applied, 3);

    let validation = validate(&mutated);
    let conflicting = offenders(&validation, RuleId::ConflictingCitizenship);
    let duplicate = offenders(&validation, RuleId::DuplicateActiveResidency);
    assert_eq!(conflicting.len(), 2);
    assert_eq!(duplicate.len(), 1);
    assert!(!conflicting.contains(&duplicate[0]));
    assert_eq!(duplicate[0].table, PERSONS);
}

#[test]
fn seeded_injection_is_deterministic() {
    let dataset = generated(50, 21);
    let injector = ErrorInjector::new(InjectOptions { seed: Some(5) });
    let first = injector
        .inject(&dataset, &RuleId::INJECTABLE)
        .expect("inject");
    let second = injector
        .inject(&dataset, &RuleId::INJECTABLE)
        .expect("inject");
    assert_eq!(first, second);
}

#[test]
fn non_injectable_rule_is_rejected() {
    let dataset = generated(10, 1);
    let err = ErrorInjector::default()
        .inject(&dataset, &[RuleId::FutureStartResidency, RuleId::ResidencyOverlap])
        .expect_err("not injectable");
    assert!(matches!(err, InjectError::NotInjectable(RuleId::ResidencyOverlap)));
}

#[test]
fn missing_sentinel_is_a_shortfall() {
    let mut dataset = generated(20, 4);
    dataset.meta.undetermined_citizenship = None;

    let (mutated, report) = ErrorInjector::default()
        .inject(
            &dataset,
            &[RuleId::ConflictingCitizenship, RuleId::FutureStartResidency],
        )
        .expect("inject");
    assert_eq!(report.requested, 2);
    assert_eq!(report.applied, 1);
    assert_eq!(report.shortfall, 1);
    let skipped = &report.entries[0];
    assert_eq!(skipped.applied, 0);
    assert!(skipped.target.is_none());
    assert!(skipped.reason.is_some());

    let validation = validate(&mutated);
    assert_eq!(validation.failed_rules(), vec![RuleId::FutureStartResidency]);
}

#[test]
fn exhausted_targets_are_reported() {
    let dataset = generated(2, 4);
    let requests = vec![RuleId::FutureStartResidency; 3];
    let (mutated, report) = ErrorInjector::default()
        .inject(&dataset, &requests)
        .expect("inject");
    assert!(report.shortfall >= 1);
    assert_eq!(report.applied + report.shortfall, 3);

    let validation = validate(&mutated);
    assert_eq!(
        offenders(&validation, RuleId::FutureStartResidency).len() as u64,
        report.applied
    );
    assert!(matches!(
        validation
            .result(RuleId::DuplicateActiveResidency)
            .map(|result| &result.outcome),
        Some(RuleOutcome::Pass)
    ));
}
