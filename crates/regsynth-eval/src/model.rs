use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use regsynth_core::{RowRef, RuleId};

use crate::errors::EvalError;

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleOutcome {
    Pass,
    Fail {
        offenders: Vec<RowRef>,
        message: String,
    },
    /// The rule could not be evaluated; never counts as a pass.
    NotRun { reason: String },
}

impl RuleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RuleOutcome::Pass => "pass",
            RuleOutcome::Fail { .. } => "fail",
            RuleOutcome::NotRun { .. } => "not_run",
        }
    }

    pub fn offenders(&self) -> &[RowRef] {
        match self {
            RuleOutcome::Fail { offenders, .. } => offenders,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule: RuleId,
    pub outcome: RuleOutcome,
}

/// Ordered report of one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub reference_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_fingerprint: Option<String>,
    pub rules_run: u64,
    pub passed: u64,
    pub failed: u64,
    pub not_run: u64,
    pub results: Vec<RuleResult>,
}

impl ValidationReport {
    pub fn new(reference_date: NaiveDate, dataset_fingerprint: Option<String>) -> Self {
        Self {
            reference_date,
            dataset_fingerprint,
            rules_run: 0,
            passed: 0,
            failed: 0,
            not_run: 0,
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, rule: RuleId, outcome: RuleOutcome) {
        self.rules_run += 1;
        match outcome {
            RuleOutcome::Pass => self.passed += 1,
            RuleOutcome::Fail { .. } => self.failed += 1,
            RuleOutcome::NotRun { .. } => self.not_run += 1,
        }
        self.results.push(RuleResult { rule, outcome });
    }

    pub fn result(&self, rule: RuleId) -> Option<&RuleResult> {
        self.results.iter().find(|result| result.rule == rule)
    }

    pub fn failed_rules(&self) -> Vec<RuleId> {
        self.results
            .iter()
            .filter(|result| matches!(result.outcome, RuleOutcome::Fail { .. }))
            .map(|result| result.rule)
            .collect()
    }

    /// True when every rule ran and passed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.not_run == 0
    }

    /// Turn failures and skipped rules into an error.
    pub fn into_strict(self) -> Result<Self, EvalError> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(EvalError::Violations {
                failed: self.failed,
                not_run: self.not_run,
            })
        }
    }
}
