//! Iteration controller: randomized (class, refactoring) trials accepted
//! only when a tracked metric improves.

pub mod log;
pub mod stats;

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::core::{Progress, Result};
use crate::metrics::{Evaluation, MetricEngine, MetricKind};
use crate::model::{Location, Snapshot};
use crate::refactor::{build, RefactoringKind};

pub use stats::{Dissonance, IterationResult, Statistics, Tally};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The desired number of accepted refactorings was reached.
    Completed,
    /// `max_trials` feasible attempts were made.
    TrialLimit,
    /// A whole pass over every class found nothing feasible.
    Exhausted,
}

/// Outcome of a controller run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: Vec<IterationResult>,
    pub trials: usize,
    pub stop: StopReason,
    pub initial: BTreeMap<MetricKind, Evaluation>,
    pub last: BTreeMap<MetricKind, Evaluation>,
    /// Snapshot with every accepted refactoring applied.
    pub snapshot: Snapshot,
}

impl RunOutcome {
    pub fn accepted(&self) -> usize {
        self.results.len()
    }

    pub fn statistics(&self, metrics: &[MetricKind]) -> Statistics {
        Statistics::from_results(&self.results, metrics)
    }

    pub fn dissonance(&self, metrics: &[MetricKind]) -> Dissonance {
        Dissonance::from_results(&self.results, metrics)
    }
}

/// Drives trials over a baseline snapshot.
pub struct Controller<'c> {
    config: &'c ExperimentConfig,
    engine: MetricEngine,
    progress: Progress,
}

impl<'c> Controller<'c> {
    pub fn new(config: &'c ExperimentConfig, engine: MetricEngine) -> Self {
        Self {
            config,
            engine,
            progress: Progress::hidden(config.desired_refactorings),
        }
    }

    /// Report accepted refactorings on `progress`.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Run until `desired_refactorings` trials are accepted, or a stop
    /// condition holds.
    ///
    /// Target locations are taken from the initial snapshot; locations made
    /// stale by accepted refactorings are skipped.
    pub fn run(&self, initial: Snapshot, rng: &mut dyn RngCore) -> Result<RunOutcome> {
        let tracked = self.config.tracked_metrics();
        let accepting = self.config.accepting_metrics();
        let locations = initial.class_locations();

        let first = self.engine.evaluate_all(&initial, &tracked);
        let mut before = first.clone();
        let mut current = initial;
        let mut results: Vec<IterationResult> = Vec::new();
        let mut trials = 0;

        let stop = 'run: loop {
            if locations.is_empty() {
                break 'run StopReason::Exhausted;
            }
            let mut classes = locations.clone();
            classes.shuffle(rng);
            let mut feasible = false;

            while let Some(target) = classes.pop() {
                let mut kinds: Vec<RefactoringKind> = self.config.catalogue.clone();
                kinds.shuffle(rng);

                while let Some(kind) = kinds.pop() {
                    if results.len() >= self.config.desired_refactorings {
                        break 'run StopReason::Completed;
                    }
                    if self.config.max_trials > 0 && trials >= self.config.max_trials {
                        break 'run StopReason::TrialLimit;
                    }
                    if current.get_class(&target).is_none() {
                        warn!(location = %target, "Skipping stale location");
                        break;
                    }

                    let mut refactor = match build(kind, &current, &target) {
                        Ok(refactor) => refactor,
                        Err(e) if e.is_stale_location() => {
                            warn!(%kind, location = %target, error = %e, "Skipping stale attempt");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    if !refactor.is_possible() {
                        continue;
                    }
                    feasible = true;
                    trials += 1;
                    refactor.perform(rng)?;

                    let after = self.engine.evaluate_all(refactor.result(), &tracked);
                    let outcome = IterationResult::classify(kind, target.clone(), &before, &after);
                    if outcome.improves_any(accepting) {
                        current = refactor.into_result();
                        before = after;
                        results.push(outcome);
                        self.progress.inc();
                        self.progress.set_message(format!("{trials} trials"));
                        debug!(%kind, location = %target, accepted = results.len(), "Accepted");
                    } else {
                        refactor.undo();
                    }

                    if trials % 100 == 0 {
                        info!(
                            trials,
                            accepted = results.len(),
                            classes_left = classes.len(),
                            "Progress"
                        );
                    }
                }
            }

            if results.len() >= self.config.desired_refactorings {
                break 'run StopReason::Completed;
            }
            if !feasible {
                warn!("No feasible refactoring left in a full pass over every class");
                break 'run StopReason::Exhausted;
            }
        };

        self.progress.finish(&format!("{} accepted", results.len()));
        info!(accepted = results.len(), trials, ?stop, "Run finished");
        Ok(RunOutcome {
            results,
            trials,
            stop,
            initial: first,
            last: before,
            snapshot: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcceptPolicy;
    use crate::parser::parse_sources;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LIBRARY: &str = r#"
class Base:
    def __init__(self):
        self.cache = {}
        self.size = 0

    def helper(self):
        return 42

    def grow(self):
        self.size = self.size + 1


class Sub(Base):
    def run(self):
        return self.helper() + len(self.cache)


class Other(Base):
    def idle(self):
        return None
"#;

    fn config(desired: usize) -> ExperimentConfig {
        ExperimentConfig {
            desired_refactorings: desired,
            max_trials: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_accepted_trials_improve_a_metric() {
        let snap = parse_sources([("lib.py", LIBRARY)]).unwrap();
        let config = config(2);
        let controller = Controller::new(&config, MetricEngine::default());
        let outcome = controller
            .run(snap.clone(), &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert!(outcome.accepted() <= 2);
        assert!(outcome.trials >= outcome.accepted());
        for result in &outcome.results {
            assert!(result.improves_any(&config.report_metrics));
        }
        if outcome.accepted() == 0 {
            assert_eq!(outcome.snapshot, snap);
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let snap = parse_sources([("lib.py", LIBRARY)]).unwrap();
        let config = config(3);
        let controller = Controller::new(&config, MetricEngine::default());
        let a = controller
            .run(snap.clone(), &mut StdRng::seed_from_u64(17))
            .unwrap();
        let b = controller.run(snap, &mut StdRng::seed_from_u64(17)).unwrap();
        assert_eq!(a.snapshot, b.snapshot);
        assert_eq!(a.trials, b.trials);
        let kinds = |o: &RunOutcome| o.results.iter().map(|r| r.kind).collect::<Vec<_>>();
        assert_eq!(kinds(&a), kinds(&b));
    }

    #[test]
    fn test_nothing_feasible_stops() {
        let snap = parse_sources([("lib.py", "class Lonely:\n    pass\n")]).unwrap();
        let config = config(5);
        let outcome = Controller::new(&config, MetricEngine::default())
            .run(snap.clone(), &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.trials, 0);
        assert_eq!(outcome.snapshot, snap);
    }

    #[test]
    fn test_trial_limit() {
        let snap = parse_sources([("lib.py", LIBRARY)]).unwrap();
        let config = ExperimentConfig {
            desired_refactorings: 1_000,
            max_trials: 3,
            accept_policy: AcceptPolicy::Subset,
            fitness_metrics: vec![MetricKind::Fanin],
            ..Default::default()
        };
        let outcome = Controller::new(&config, MetricEngine::default())
            .run(snap, &mut StdRng::seed_from_u64(8))
            .unwrap();
        assert!(outcome.trials <= 3);
        assert_ne!(outcome.stop, StopReason::Completed);
    }

    #[test]
    fn test_collapsed_classes_leave_stale_locations() {
        let chain = "class A:\n    pass\n\n\nclass B(A):\n    pass\n\n\nclass C(B):\n    pass\n\n\nclass D(C):\n    pass\n";
        let snap = parse_sources([("lib.py", chain)]).unwrap();
        let config = ExperimentConfig {
            desired_refactorings: 10,
            catalogue: vec![RefactoringKind::CollapseHierarchy],
            max_trials: 50,
            ..Default::default()
        };
        let outcome = Controller::new(&config, MetricEngine::default())
            .run(snap, &mut StdRng::seed_from_u64(4))
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.accepted(), 2);
        assert_eq!(outcome.trials, 2);
        assert_eq!(outcome.snapshot.class_count(), 2);
        assert!(outcome
            .snapshot
            .get_class(&Location::new("lib.py", 3))
            .is_none());
    }

    #[test]
    fn test_empty_snapshot() {
        let config = config(1);
        let outcome = Controller::new(&config, MetricEngine::default())
            .run(Snapshot::default(), &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(outcome.stop, StopReason::Exhausted);
    }
}
