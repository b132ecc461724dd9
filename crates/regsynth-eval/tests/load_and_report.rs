use std::fs;
use std::path::PathBuf;

use regsynth_core::schema::{DRIVING_LICENSES, PERSONS, RESIDENCIES};
use regsynth_core::{Dataset, ReferenceCatalog, RuleId};
use regsynth_eval::{
    EvalError, LoadOptions, RuleEngine, RuleOutcome, collect_dataset_metrics, load_dataset,
    render_report,
};
use regsynth_generate::output::write_dataset;
use regsynth_generate::{GenerateOptions, GenerationEngine};

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("regsynth_eval_{label}_{}", uuid::Uuid::new_v4()));
    dir
}

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

#[test]
fn written_dataset_loads_back_unchanged() {
    let dataset = generated(40, 5);
    let tables = dataset.to_tables();
    let dir = temp_out_dir("roundtrip");
    write_dataset(&dir, &tables).expect("write dataset");

    let loaded = load_dataset(&dir, &LoadOptions { strict: true }).expect("load dataset");
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    assert_eq!(loaded.dataset, tables);
    assert_eq!(
        loaded.dataset.fingerprint().expect("fingerprint"),
        tables.fingerprint().expect("fingerprint")
    );

    let rebuilt = Dataset::try_from(&loaded.dataset).expect("rebuild");
    assert_eq!(rebuilt, dataset);

    let report = RuleEngine::default().run(&loaded.dataset, None);
    assert!(report.is_clean(), "{:?}", report.failed_rules());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_and_column_turn_rules_into_not_run() {
    let dataset = generated(20, 9).to_tables();
    let dir = temp_out_dir("partial");
    write_dataset(&dir, &dataset).expect("write dataset");

    fs::remove_file(dir.join(format!("{DRIVING_LICENSES}.csv"))).expect("remove licenses");

    let residencies = dir.join(format!("{RESIDENCIES}.csv"));
    let text = fs::read_to_string(&residencies).expect("read residencies");
    let stripped = text
        .lines()
        .map(|line| {
            let mut cells = line.split(',').collect::<Vec<_>>();
            cells.truncate(6);
            cells.join(",")
        })
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&residencies, stripped).expect("rewrite residencies");

    let loaded = load_dataset(&dir, &LoadOptions::default()).expect("load dataset");
    let codes = loaded
        .warnings
        .iter()
        .map(|warning| warning.code.as_str())
        .collect::<Vec<_>>();
    assert!(codes.contains(&"missing_table"));
    assert!(codes.contains(&"missing_columns"));

    let report = RuleEngine::default().run(&loaded.dataset, None);
    for rule in [
        RuleId::ExpiredButActiveLicense,
        RuleId::LicenseDateOrder,
        RuleId::ResidencyOverlap,
        RuleId::DuplicateActiveResidency,
    ] {
        assert!(
            matches!(
                report.result(rule).map(|r| &r.outcome),
                Some(RuleOutcome::NotRun { .. })
            ),
            "{rule} should not run"
        );
    }
    assert_eq!(
        report.result(RuleId::PersonalCodeFormat).map(|r| &r.outcome),
        Some(&RuleOutcome::Pass)
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn strict_load_rejects_malformed_cells() {
    let dataset = generated(10, 1).to_tables();
    let dir = temp_out_dir("strict");
    write_dataset(&dir, &dataset).expect("write dataset");

    let persons = dir.join(format!("{PERSONS}.csv"));
    let text = fs::read_to_string(&persons).expect("read persons");
    let mut lines = text.lines().map(str::to_string).collect::<Vec<_>>();
    let first = lines[1].splitn(2, ',').nth(1).expect("row tail").to_string();
    lines[1] = format!("x1,{first}");
    fs::write(&persons, lines.join("\n")).expect("rewrite persons");

    let lenient = load_dataset(&dir, &LoadOptions::default()).expect("lenient load");
    assert!(
        lenient
            .warnings
            .iter()
            .any(|warning| warning.code == "invalid_value")
    );
    let report =
        RuleEngine::default().run(&lenient.dataset, Some(&[RuleId::ReferentialIntegrity]));
    assert_eq!(report.not_run, 1);

    let err = load_dataset(&dir, &LoadOptions { strict: true }).expect_err("strict load");
    assert!(matches!(err, EvalError::InvalidDataset(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_metadata_is_an_error() {
    let dir = temp_out_dir("empty");
    fs::create_dir_all(&dir).expect("create dir");
    let err = load_dataset(&dir, &LoadOptions::default()).expect_err("no metadata");
    assert!(matches!(err, EvalError::InvalidDataset(_)));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn metrics_and_report_describe_the_run() {
    let mut dataset = generated(50, 17);
    let reference = dataset.meta.reference_date;
    let license = dataset
        .driving_licenses
        .iter_mut()
        .find(|row| row.status == regsynth_core::RecordStatus::Active)
        .expect("active license");
    license.expiry_date = reference - chrono::Days::new(30);
    license.issue_date = license.issue_date.min(license.expiry_date);
    let license_id = license.id;

    let tables = dataset.to_tables();
    let metrics = collect_dataset_metrics(&tables);
    assert_eq!(metrics.persons.alive + metrics.persons.deceased, 50);
    assert_eq!(metrics.seed, 17);
    let persons = metrics
        .tables
        .iter()
        .find(|table| table.table == PERSONS)
        .expect("persons metrics");
    assert_eq!(persons.rows, 50);

    let report = RuleEngine::default().run(&tables, None);
    let markdown = render_report(&report, &metrics, 5);
    for section in ["## Dataset", "## Tables", "## Rules", "## Failures", "## Recommendations"] {
        assert!(markdown.contains(section), "missing {section}");
    }
    assert!(!markdown.contains("## Not run"));
    assert!(markdown.contains(&format!("{DRIVING_LICENSES}#{license_id}")));
    assert!(markdown.contains("expired-but-active-license"));

    assert_eq!(markdown, render_report(&report, &metrics, 5));
}
