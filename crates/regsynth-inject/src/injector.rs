use std::collections::{BTreeMap, BTreeSet};

use chrono::Days;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use regsynth_core::schema::{CITIZENSHIPS, DRIVING_LICENSES, PERSONS, RESIDENCIES};
use regsynth_core::{Dataset, RecordStatus, Residency, RowRef, RuleId, TabularDataset};
use regsynth_eval::{RuleEngine, RuleOutcome};

use crate::errors::InjectError;
use crate::model::{InjectOptions, InjectionEntry, InjectionReport};

const EXPIRED_LICENSE_DAYS: u64 = 30;
const FUTURE_START_DAYS: u64 = 730;

/// Applies one deliberate violation per requested rule to a copy of a dataset.
#[derive(Debug, Clone, Default)]
pub struct ErrorInjector {
    options: InjectOptions,
}

impl ErrorInjector {
    pub fn new(options: InjectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &InjectOptions {
        &self.options
    }

    /// Inject into a loaded tabular dataset.
    pub fn inject_tables(
        &self,
        tables: &TabularDataset,
        rules: &[RuleId],
    ) -> Result<(Dataset, InjectionReport), InjectError> {
        let dataset = Dataset::try_from(tables)?;
        self.inject(&dataset, rules)
    }

    /// Returns the mutated dataset and one report entry per requested rule.
    ///
    /// Targets are rows that violate no rule before injection, and no person
    /// is targeted twice. Targets for all requests are matched together, so a
    /// request only falls short when no disjoint assignment covers it. A
    /// request without a target is skipped with a reason instead of failing
    /// the run.
    pub fn inject(
        &self,
        dataset: &Dataset,
        rules: &[RuleId],
    ) -> Result<(Dataset, InjectionReport), InjectError> {
        if let Some(rule) = rules.iter().find(|rule| !rule.is_injectable()) {
            return Err(InjectError::NotInjectable(*rule));
        }

        info!(requested = rules.len(), seed = ?self.options.seed, "injection started");
        let mut state = InjectionState {
            dataset: dataset.clone(),
            tainted: Tainted::from_dataset(dataset),
            rng: self.options.seed.map(ChaCha8Rng::seed_from_u64),
        };

        let pools = rules
            .iter()
            .map(|rule| state.candidates(*rule))
            .collect::<Vec<_>>();
        let choices = match_targets(
            &pools
                .iter()
                .map(|pool| match pool {
                    Ok(candidates) => candidates.as_slice(),
                    Err(_) => &[],
                })
                .collect::<Vec<_>>(),
        );

        let mut report = InjectionReport::new(self.options.seed);
        for ((rule, pool), choice) in rules.iter().zip(&pools).zip(choices) {
            let outcome = match (pool, choice) {
                (Err(reason), _) => Err(reason.clone()),
                (Ok(candidates), Some(index)) => state.apply(*rule, candidates[index]),
                (Ok(_), None) => {
                    Err("every eligible target is used by another injection".to_string())
                }
            };
            let entry = match outcome {
                Ok(target) => {
                    debug!(rule = %rule, target = %target, "violation injected");
                    InjectionEntry::applied(*rule, target)
                }
                Err(reason) => {
                    warn!(rule = %rule, reason = %reason, "injection skipped");
                    InjectionEntry::skipped(*rule, reason)
                }
            };
            report.record(entry);
        }

        info!(
            applied = report.applied,
            shortfall = report.shortfall,
            "injection finished"
        );
        Ok((state.dataset, report))
    }
}

/// Row a mutation would touch, with the person owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    person_id: u64,
    row_id: u64,
}

/// Assign each request one candidate so that no person is used twice.
///
/// Augmenting-path bipartite matching: requests are placed in order and an
/// earlier request gives up its person when it has another free candidate.
/// Each request keeps the earliest candidate in its list that still fits.
fn match_targets(pools: &[&[Candidate]]) -> Vec<Option<usize>> {
    let mut owners: BTreeMap<u64, usize> = BTreeMap::new();
    let mut choices = vec![None; pools.len()];
    for request in 0..pools.len() {
        let mut visited = BTreeSet::new();
        augment(request, pools, &mut owners, &mut choices, &mut visited);
    }
    choices
}

fn augment(
    request: usize,
    pools: &[&[Candidate]],
    owners: &mut BTreeMap<u64, usize>,
    choices: &mut [Option<usize>],
    visited: &mut BTreeSet<u64>,
) -> bool {
    for (index, candidate) in pools[request].iter().enumerate() {
        if !visited.insert(candidate.person_id) {
            continue;
        }
        let free = match owners.get(&candidate.person_id).copied() {
            None => true,
            Some(holder) => augment(holder, pools, owners, choices, visited),
        };
        if free {
            owners.insert(candidate.person_id, request);
            choices[request] = Some(index);
            return true;
        }
    }
    false
}

/// Rows and persons already reported by some rule before injection.
#[derive(Debug, Default)]
struct Tainted {
    rows: BTreeSet<RowRef>,
    persons: BTreeSet<u64>,
}

impl Tainted {
    fn from_dataset(dataset: &Dataset) -> Self {
        let report = RuleEngine::default().run(&dataset.to_tables(), None);
        let residency_owner = dataset
            .residencies
            .iter()
            .map(|row| (row.id, row.person_id))
            .collect::<BTreeMap<_, _>>();
        let license_owner = dataset
            .driving_licenses
            .iter()
            .map(|row| (row.id, row.person_id))
            .collect::<BTreeMap<_, _>>();
        let citizenship_owner = dataset
            .citizenships()
            .into_iter()
            .map(|row| (row.id, row.person_id))
            .collect::<BTreeMap<_, _>>();

        let mut tainted = Tainted::default();
        for result in &report.results {
            if let RuleOutcome::NotRun { reason } = &result.outcome {
                warn!(rule = %result.rule, reason = %reason, "baseline rule not run");
            }
            for row in result.outcome.offenders() {
                let owner = match row.table.as_str() {
                    PERSONS => Some(row.id),
                    RESIDENCIES => residency_owner.get(&row.id).copied(),
                    DRIVING_LICENSES => license_owner.get(&row.id).copied(),
                    CITIZENSHIPS => citizenship_owner.get(&row.id).copied(),
                    _ => None,
                };
                if let Some(person_id) = owner {
                    tainted.persons.insert(person_id);
                }
                tainted.rows.insert(row.clone());
            }
        }
        if !tainted.rows.is_empty() {
            debug!(
                rows = tainted.rows.len(),
                persons = tainted.persons.len(),
                "baseline violations excluded from targeting"
            );
        }
        tainted
    }

    fn excludes(&self, table: &str, id: u64, person_id: u64) -> bool {
        self.persons.contains(&person_id) || self.rows.contains(&RowRef::new(table, id))
    }
}

struct InjectionState {
    dataset: Dataset,
    tainted: Tainted,
    rng: Option<ChaCha8Rng>,
}

impl InjectionState {
    fn eligible(&self, table: &str, id: u64, person_id: u64) -> bool {
        !self.tainted.excludes(table, id, person_id)
    }

    fn alive(&self, person_id: u64) -> bool {
        self.dataset
            .person(person_id)
            .is_some_and(|person| person.alive)
    }

    /// Eligible targets for `rule`, in id order or shuffled when seeded.
    fn candidates(&mut self, rule: RuleId) -> Result<Vec<Candidate>, String> {
        let (mut candidates, empty) = match rule {
            RuleId::DuplicateActiveResidency => {
                if self.dataset.addresses.len() < 2 {
                    return Err("no second address to move into".to_string());
                }
                (
                    self.single_active_residencies(),
                    "no alive person with exactly one eligible active residency",
                )
            }
            RuleId::ExpiredButActiveLicense => (
                self.dataset
                    .driving_licenses
                    .iter()
                    .filter(|row| {
                        row.status == RecordStatus::Active
                            && self.eligible(DRIVING_LICENSES, row.id, row.person_id)
                    })
                    .map(|row| Candidate {
                        person_id: row.person_id,
                        row_id: row.id,
                    })
                    .collect::<Vec<_>>(),
                "no eligible active license",
            ),
            RuleId::FutureStartResidency => (
                self.dataset
                    .residencies
                    .iter()
                    .filter(|row| {
                        row.status == RecordStatus::Active
                            && self.eligible(RESIDENCIES, row.id, row.person_id)
                    })
                    .map(|row| Candidate {
                        person_id: row.person_id,
                        row_id: row.id,
                    })
                    .collect::<Vec<_>>(),
                "no eligible active residency",
            ),
            RuleId::ConflictingCitizenship => {
                let Some(sentinel) = self.dataset.meta.undetermined_citizenship.as_deref() else {
                    return Err("dataset has no undetermined citizenship code".to_string());
                };
                (
                    self.dataset
                        .persons
                        .iter()
                        .filter(|person| {
                            person.main_citizenship != sentinel
                                && self.eligible(PERSONS, person.id, person.id)
                        })
                        .map(|person| Candidate {
                            person_id: person.id,
                            row_id: person.id,
                        })
                        .collect::<Vec<_>>(),
                    "no eligible person with a determined citizenship",
                )
            }
            other => return Err(format!("rule '{other}' has no injectable violation")),
        };

        if candidates.is_empty() {
            return Err(empty.to_string());
        }
        candidates.sort_by_key(|candidate| (candidate.row_id, candidate.person_id));
        if let Some(rng) = self.rng.as_mut() {
            candidates.shuffle(rng);
        }
        Ok(candidates)
    }

    fn single_active_residencies(&self) -> Vec<Candidate> {
        let mut active: BTreeMap<u64, Vec<&Residency>> = BTreeMap::new();
        for row in &self.dataset.residencies {
            if row.status == RecordStatus::Active {
                active.entry(row.person_id).or_default().push(row);
            }
        }
        active
            .into_iter()
            .filter_map(|(person_id, rows)| match rows.as_slice() {
                [row] if self.alive(person_id)
                    && self.eligible(PERSONS, person_id, person_id)
                    && self.eligible(RESIDENCIES, row.id, person_id) =>
                {
                    Some(Candidate {
                        person_id,
                        row_id: row.id,
                    })
                }
                _ => None,
            })
            .collect()
    }

    fn apply(&mut self, rule: RuleId, target: Candidate) -> Result<RowRef, String> {
        match rule {
            RuleId::DuplicateActiveResidency => self.duplicate_active_residency(target),
            RuleId::ExpiredButActiveLicense => self.expired_but_active_license(target),
            RuleId::FutureStartResidency => self.future_start_residency(target),
            RuleId::ConflictingCitizenship => self.conflicting_citizenship(target),
            other => Err(format!("rule '{other}' has no injectable violation")),
        }
    }

    fn duplicate_active_residency(&mut self, target: Candidate) -> Result<RowRef, String> {
        let current = self
            .dataset
            .residencies
            .iter()
            .find(|row| row.id == target.row_id)
            .ok_or_else(|| format!("residency {} vanished", target.row_id))?;
        let (current_address, current_start) = (current.address_id, current.start_date);

        let addresses = self
            .dataset
            .addresses
            .iter()
            .filter(|address| address.id != current_address)
            .map(|address| address.id)
            .collect::<Vec<_>>();
        let reference = self.dataset.meta.reference_date;
        let span = reference
            .signed_duration_since(current_start)
            .num_days()
            .max(0) as u64;
        let (address_id, offset) = match self.rng.as_mut() {
            Some(rng) => (addresses.choose(rng).copied(), rng.random_range(0..=span)),
            None => (addresses.first().copied(), span / 2),
        };
        let address_id = address_id.ok_or_else(|| "no second address to move into".to_string())?;

        let id = self.dataset.next_residency_id();
        self.dataset.residencies.push(Residency {
            id,
            person_id: target.person_id,
            address_id,
            status: RecordStatus::Active,
            start_date: current_start + Days::new(offset),
            end_date: None,
        });
        Ok(RowRef::new(PERSONS, target.person_id))
    }

    fn expired_but_active_license(&mut self, target: Candidate) -> Result<RowRef, String> {
        let expiry = self.dataset.meta.reference_date - Days::new(EXPIRED_LICENSE_DAYS);
        let license = self
            .dataset
            .driving_licenses
            .iter_mut()
            .find(|row| row.id == target.row_id)
            .ok_or_else(|| format!("license {} vanished", target.row_id))?;
        license.expiry_date = expiry;
        license.issue_date = license.issue_date.min(expiry);
        Ok(RowRef::new(DRIVING_LICENSES, target.row_id))
    }

    fn future_start_residency(&mut self, target: Candidate) -> Result<RowRef, String> {
        let start = self.dataset.meta.reference_date + Days::new(FUTURE_START_DAYS);
        let residency = self
            .dataset
            .residencies
            .iter_mut()
            .find(|row| row.id == target.row_id)
            .ok_or_else(|| format!("residency {} vanished", target.row_id))?;
        residency.start_date = start;
        Ok(RowRef::new(RESIDENCIES, target.row_id))
    }

    fn conflicting_citizenship(&mut self, target: Candidate) -> Result<RowRef, String> {
        let sentinel = self
            .dataset
            .meta
            .undetermined_citizenship
            .clone()
            .ok_or_else(|| "dataset has no undetermined citizenship code".to_string())?;
        let person = self
            .dataset
            .persons
            .iter_mut()
            .find(|person| person.id == target.person_id)
            .ok_or_else(|| format!("person {} vanished", target.person_id))?;
        let previous = std::mem::replace(&mut person.main_citizenship, sentinel);
        person.additional_citizenships.push(previous);
        person.additional_citizenships.sort();
        person.additional_citizenships.dedup();
        Ok(RowRef::new(PERSONS, target.person_id))
    }
}
