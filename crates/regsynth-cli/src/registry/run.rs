use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use regsynth_core::RuleId;
use regsynth_generate::GenerateOptions;

use super::{RegistryError, RegistryResult};

/// Resolved command options recorded in `config.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum RunOptions {
    Generate {
        generation: GenerateOptions,
        catalog: Option<PathBuf>,
        out: Option<PathBuf>,
    },
    Inject {
        dataset: PathBuf,
        rules: Vec<RuleId>,
        seed: Option<u64>,
        out: Option<PathBuf>,
    },
    Validate {
        dataset: PathBuf,
        rules: Option<Vec<RuleId>>,
        strict: bool,
    },
}

impl RunOptions {
    pub fn command(&self) -> &'static str {
        match self {
            RunOptions::Generate { .. } => "generate",
            RunOptions::Inject { .. } => "inject",
            RunOptions::Validate { .. } => "validate",
        }
    }
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub options: RunOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub options: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub dataset_dir: PathBuf,
    pub report_path: PathBuf,
    pub metrics_path: PathBuf,
    pub summary_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config_path = root.join("config.json");
    let logs_path = root.join("logs.ndjson");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        dataset_dir: root.join("dataset"),
        report_path: root.join(format!("{}.json", ctx.options.command())),
        metrics_path: root.join("metrics.json"),
        summary_path: root.join("report.md"),
        logs_path,
        root,
    })
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    ensure_parent(path)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

pub fn write_text(path: &Path, text: &str) -> RegistryResult<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> RegistryResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    Ok(())
}
