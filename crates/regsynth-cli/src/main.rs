mod config;
mod registry;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use regsynth_core::{ReferenceCatalog, RuleId};
use regsynth_eval::{
    EvalError, LoadOptions, RuleEngine, collect_dataset_metrics, load_dataset, render_report,
};
use regsynth_generate::output::write_dataset;
use regsynth_generate::{GenerationEngine, GenerationError};
use regsynth_inject::{ErrorInjector, InjectError, InjectOptions};
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, LoggingConfig, load_config};
use registry::{RunContext, RunOptions, RunPaths, init_run_logging, start_run, write_json, write_text};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("core error: {0}")]
    Core(#[from] regsynth_core::Error),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("validation error: {0}")]
    Eval(#[from] EvalError),
    #[error("injection error: {0}")]
    Inject(#[from] InjectError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "regsynth", version, about = "Synthetic population register generator")]
struct Cli {
    /// Path to regsynth.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, global = true, default_value = "runs")]
    run_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a dataset from a reference catalog.
    Generate(GenerateArgs),
    /// Copy a dataset with deliberate rule violations.
    Inject(InjectArgs),
    /// Run consistency rules over a dataset directory.
    Validate(ValidateArgs),
    /// Print the JSON Schema of the reference catalog format.
    CatalogSchema,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Number of persons.
    #[arg(long)]
    records: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Simulated current date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    reference_date: Option<NaiveDate>,
    /// Reference catalog JSON; the built-in catalog when omitted.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Dataset directory; defaults to `dataset/` inside the run directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InjectArgs {
    /// Dataset directory to read.
    #[arg(long)]
    dataset: PathBuf,
    /// Comma-separated rule ids; all injectable rules when omitted.
    #[arg(long, value_delimiter = ',')]
    rules: Vec<RuleId>,
    /// Pick targets at random with this seed.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    dataset: PathBuf,
    /// Comma-separated rule ids; all rules when omitted.
    #[arg(long, value_delimiter = ',')]
    rules: Vec<RuleId>,
    /// Reject malformed cells and exit with an error unless every rule passes.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Offending rows listed per failed rule in report.md.
    #[arg(long, default_value_t = 10)]
    max_examples: usize,
}

fn main() -> Result<(), CliError> {
    let Cli {
        config,
        run_dir,
        command,
    } = Cli::parse();
    let config = load_config(config.as_deref())?;

    match command {
        Command::Generate(args) => run_generate(args, config, &run_dir),
        Command::Inject(args) => run_inject(args, &config.logging, &run_dir),
        Command::Validate(args) => run_validate(args, &config.logging, &run_dir),
        Command::CatalogSchema => {
            let schema = schemars::schema_for!(ReferenceCatalog);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn begin_run(
    options: RunOptions,
    run_dir: &Path,
    logging: &LoggingConfig,
) -> Result<RunPaths, CliError> {
    let run_id = Uuid::new_v4().to_string();
    let command = options.command();
    let ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: run_dir.to_path_buf(),
        options,
    };
    let paths = start_run(&ctx)?;
    init_run_logging(&paths.logs_path, &logging.level)?;
    tracing::info!(event = "run_started", run_id = %run_id, command);
    Ok(paths)
}

fn run_generate(
    args: GenerateArgs,
    config: config::RegsynthConfig,
    run_dir: &Path,
) -> Result<(), CliError> {
    let mut options = config.generation;
    if let Some(records) = args.records {
        options.record_count = records;
    }
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(reference_date) = args.reference_date {
        options.reference_date = reference_date;
    }

    let catalog = match &args.catalog {
        Some(path) => ReferenceCatalog::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ReferenceCatalog::builtin(),
    };

    let paths = begin_run(
        RunOptions::Generate {
            generation: options.clone(),
            catalog: args.catalog.clone(),
            out: args.out.clone(),
        },
        run_dir,
        &config.logging,
    )?;
    let timer = Instant::now();

    let result = GenerationEngine::new(options).generate(&catalog)?;
    let out_dir = args.out.unwrap_or_else(|| paths.dataset_dir.clone());
    let files = write_dataset(&out_dir, &result.dataset.to_tables())?;
    tracing::info!(
        event = "dataset_written",
        path = %files.dir.display(),
        bytes = files.bytes_written
    );

    write_json(&paths.report_path, &result.report)?;
    for issue in &result.report.warnings {
        tracing::warn!(code = %issue.code, "{}", issue.message);
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", out_dir.display());
    Ok(())
}

fn run_inject(args: InjectArgs, logging: &LoggingConfig, run_dir: &Path) -> Result<(), CliError> {
    let rules = if args.rules.is_empty() {
        RuleId::INJECTABLE.to_vec()
    } else {
        args.rules
    };

    let paths = begin_run(
        RunOptions::Inject {
            dataset: args.dataset.clone(),
            rules: rules.clone(),
            seed: args.seed,
            out: args.out.clone(),
        },
        run_dir,
        logging,
    )?;
    let timer = Instant::now();

    let loaded = load_dataset(&args.dataset, &LoadOptions { strict: true })?;
    let (dataset, report) =
        ErrorInjector::new(InjectOptions { seed: args.seed }).inject_tables(&loaded.dataset, &rules)?;

    let out_dir = args.out.unwrap_or_else(|| paths.dataset_dir.clone());
    let files = write_dataset(&out_dir, &dataset.to_tables())?;
    write_json(&paths.report_path, &report)?;

    tracing::info!(
        event = "run_finished",
        status = "success",
        applied = report.applied,
        shortfall = report.shortfall,
        path = %files.dir.display(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", out_dir.display());
    Ok(())
}

fn run_validate(
    args: ValidateArgs,
    logging: &LoggingConfig,
    run_dir: &Path,
) -> Result<(), CliError> {
    let rules = (!args.rules.is_empty()).then(|| args.rules.clone());
    let paths = begin_run(
        RunOptions::Validate {
            dataset: args.dataset.clone(),
            rules: rules.clone(),
            strict: args.strict,
        },
        run_dir,
        logging,
    )?;
    let timer = Instant::now();

    let loaded = load_dataset(&args.dataset, &LoadOptions { strict: args.strict })?;
    for warning in &loaded.warnings {
        tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
    }

    let report = RuleEngine::default().run(&loaded.dataset, rules.as_deref());
    let metrics = collect_dataset_metrics(&loaded.dataset);
    let summary = render_report(&report, &metrics, args.max_examples);

    write_json(&paths.report_path, &report)?;
    write_json(&paths.metrics_path, &metrics)?;
    write_text(&paths.summary_path, &summary)?;
    println!("{summary}");

    tracing::info!(
        event = "run_finished",
        passed = report.passed,
        failed = report.failed,
        not_run = report.not_run,
        duration_ms = timer.elapsed().as_millis() as u64
    );

    if args.strict {
        report.into_strict()?;
    }
    Ok(())
}
