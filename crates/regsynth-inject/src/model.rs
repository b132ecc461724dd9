use serde::{Deserialize, Serialize};

use regsynth_core::{RowRef, RuleId};

/// Options for an injection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectOptions {
    /// Pick targets uniformly among eligible rows; `None` takes the first eligible row.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Outcome of one requested violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionEntry {
    pub rule: RuleId,
    pub requested: u32,
    pub applied: u32,
    /// Row the matching rule is expected to report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RowRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InjectionEntry {
    pub fn applied(rule: RuleId, target: RowRef) -> Self {
        Self {
            rule,
            requested: 1,
            applied: 1,
            target: Some(target),
            reason: None,
        }
    }

    pub fn skipped(rule: RuleId, reason: impl Into<String>) -> Self {
        Self {
            rule,
            requested: 1,
            applied: 0,
            target: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub requested: u64,
    pub applied: u64,
    pub shortfall: u64,
    pub entries: Vec<InjectionEntry>,
}

impl InjectionReport {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn record(&mut self, entry: InjectionEntry) {
        self.requested += u64::from(entry.requested);
        self.applied += u64::from(entry.applied);
        self.shortfall += u64::from(entry.requested - entry.applied);
        self.entries.push(entry);
    }

    /// Targets of applied injections for `rule`, in request order.
    pub fn targets(&self, rule: RuleId) -> Vec<&RowRef> {
        self.entries
            .iter()
            .filter(|entry| entry.rule == rule)
            .filter_map(|entry| entry.target.as_ref())
            .collect()
    }
}
