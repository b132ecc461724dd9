use std::env;
use std::path::PathBuf;

use regsynth_core::RuleId;
use regsynth_eval::{LoadOptions, RuleEngine, collect_dataset_metrics, load_dataset, render_report};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut dataset_dir: Option<PathBuf> = None;
    let mut rules: Option<Vec<RuleId>> = None;
    let mut strict = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dataset" => dataset_dir = args.next().map(PathBuf::from),
            "--rules" => {
                let list = args.next().ok_or("missing --rules value")?;
                rules = Some(
                    list.split(',')
                        .map(str::parse::<RuleId>)
                        .collect::<Result<_, _>>()?,
                );
            }
            "--strict" => strict = true,
            _ => {
                if dataset_dir.is_none() {
                    dataset_dir = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let dataset_dir = dataset_dir.ok_or("missing --dataset directory")?;
    let loaded = load_dataset(&dataset_dir, &LoadOptions { strict })?;
    for warning in &loaded.warnings {
        eprintln!("warning {}: {}", warning.code, warning.message);
    }

    let report = RuleEngine::default().run(&loaded.dataset, rules.as_deref());
    let metrics = collect_dataset_metrics(&loaded.dataset);
    println!("{}", render_report(&report, &metrics, 10));
    println!("passed={} failed={} not_run={}", report.passed, report.failed, report.not_run);
    Ok(())
}
