use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use regsynth_core::{RuleId, TabularDataset};

use crate::checks;
use crate::model::{RuleOutcome, ValidationReport};

/// A rule: pure function of the tabular dataset.
pub type RuleFn = fn(&TabularDataset) -> RuleOutcome;

/// Mapping from rule identifier to rule function.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<RuleId, RuleFn>,
}

impl RuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(RuleId::DuplicateActiveResidency, checks::duplicate_active_residency);
        registry.register(RuleId::ExpiredButActiveLicense, checks::expired_but_active_license);
        registry.register(RuleId::FutureStartResidency, checks::future_start_residency);
        registry.register(RuleId::ConflictingCitizenship, checks::conflicting_citizenship);
        registry.register(RuleId::ReferentialIntegrity, checks::referential_integrity);
        registry.register(RuleId::ResidencyPeriodOrder, checks::residency_period_order);
        registry.register(RuleId::ResidencyStatusPeriod, checks::residency_status_period);
        registry.register(RuleId::ResidencyOverlap, checks::residency_overlap);
        registry.register(RuleId::DeceasedActiveResidency, checks::deceased_active_residency);
        registry.register(RuleId::LicenseDateOrder, checks::license_date_order);
        registry.register(RuleId::PersonalCodeFormat, checks::personal_code_format);
        registry
    }

    /// Register or replace a rule.
    pub fn register(&mut self, id: RuleId, rule: RuleFn) {
        self.rules.insert(id, rule);
    }

    pub fn get(&self, id: RuleId) -> Option<RuleFn> {
        self.rules.get(&id).copied()
    }

    /// Registered identifiers in evaluation order.
    pub fn ids(&self) -> Vec<RuleId> {
        self.rules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Runs registered rules against a tabular dataset.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    registry: RuleRegistry,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleRegistry::builtin())
    }
}

impl RuleEngine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run the requested rules (all registered rules when `None`) in identifier order.
    ///
    /// Every requested rule is reported; none short-circuits another.
    pub fn run(&self, dataset: &TabularDataset, rules: Option<&[RuleId]>) -> ValidationReport {
        let mut selected = match rules {
            Some(rules) => rules.to_vec(),
            None => self.registry.ids(),
        };
        selected.sort();
        selected.dedup();

        let mut report =
            ValidationReport::new(dataset.meta.reference_date, dataset.fingerprint().ok());

        for rule in selected {
            let outcome = match self.registry.get(rule) {
                Some(check) => check(dataset),
                None => RuleOutcome::NotRun {
                    reason: format!("rule '{}' is not registered", rule),
                },
            };
            match &outcome {
                RuleOutcome::Pass => debug!(rule = %rule, "rule passed"),
                RuleOutcome::Fail { offenders, .. } => {
                    info!(rule = %rule, offenders = offenders.len(), "rule failed")
                }
                RuleOutcome::NotRun { reason } => warn!(rule = %rule, reason = %reason, "rule not run"),
            }
            report.record(rule, outcome);
        }

        info!(
            rules = report.rules_run,
            passed = report.passed,
            failed = report.failed,
            not_run = report.not_run,
            "validation finished"
        );
        report
    }
}
