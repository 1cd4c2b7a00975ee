//! Per-trial classification and the summaries derived from it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::metrics::{Change, Evaluation, MetricKind};
use crate::model::Location;
use crate::refactor::RefactoringKind;

/// Outcome of one accepted refactoring: how every reported metric moved
/// and where it ended up.
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    pub kind: RefactoringKind,
    pub target: Location,
    pub changes: BTreeMap<MetricKind, Change>,
    pub values: BTreeMap<MetricKind, f64>,
}

impl IterationResult {
    /// Classify every metric present in both maps.
    pub fn classify(
        kind: RefactoringKind,
        target: Location,
        before: &BTreeMap<MetricKind, Evaluation>,
        after: &BTreeMap<MetricKind, Evaluation>,
    ) -> Self {
        let mut changes = BTreeMap::new();
        let mut values = BTreeMap::new();
        for (metric, now) in after {
            if let Some(prev) = before.get(metric) {
                changes.insert(*metric, now.change_from(prev));
                values.insert(*metric, now.value);
            }
        }
        Self {
            kind,
            target,
            changes,
            values,
        }
    }

    pub fn change(&self, metric: MetricKind) -> Option<Change> {
        self.changes.get(&metric).copied()
    }

    pub fn better_count(&self) -> usize {
        self.changes.values().filter(|c| **c == Change::Better).count()
    }

    /// Whether any of `metrics` improved.
    pub fn improves_any(&self, metrics: &[MetricKind]) -> bool {
        metrics
            .iter()
            .any(|m| self.change(*m) == Some(Change::Better))
    }
}

/// Better / static / worse counts of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub better: usize,
    #[serde(rename = "static")]
    pub unchanged: usize,
    pub worse: usize,
}

impl Tally {
    fn record(&mut self, change: Change) {
        match change {
            Change::Better => self.better += 1,
            Change::Static => self.unchanged += 1,
            Change::Worse => self.worse += 1,
        }
    }
}

/// How often each metric went up, stayed, or went down over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub tallies: BTreeMap<MetricKind, Tally>,
    #[serde(skip)]
    order: Vec<MetricKind>,
}

impl Statistics {
    pub fn from_results(results: &[IterationResult], metrics: &[MetricKind]) -> Self {
        let mut tallies: BTreeMap<MetricKind, Tally> =
            metrics.iter().map(|m| (*m, Tally::default())).collect();
        for result in results {
            for metric in metrics {
                if let (Some(change), Some(tally)) = (result.change(*metric), tallies.get_mut(metric))
                {
                    tally.record(change);
                }
            }
        }
        Self {
            tallies,
            order: metrics.to_vec(),
        }
    }

    pub fn tally(&self, metric: MetricKind) -> Tally {
        self.tallies.get(&metric).copied().unwrap_or_default()
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for metric in &self.order {
            let t = self.tally(*metric);
            writeln!(f, "{metric} {}up {}= {}down", t.better, t.unchanged, t.worse)?;
        }
        Ok(())
    }
}

/// Relationship between the movements of two metrics on the same trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// Both moved the same way, or neither moved.
    Agreement,
    /// Exactly one of them moved.
    Dissonant,
    /// One improved while the other got worse.
    Conflicted,
}

impl PairOutcome {
    pub fn classify(a: Change, b: Change) -> Self {
        match (a, b) {
            (Change::Better, Change::Worse) | (Change::Worse, Change::Better) => Self::Conflicted,
            (Change::Static, Change::Static) => Self::Agreement,
            (Change::Static, _) | (_, Change::Static) => Self::Dissonant,
            _ => Self::Agreement,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairCounts {
    pub agreement: usize,
    pub dissonant: usize,
    pub conflicted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricPair {
    pub first: MetricKind,
    pub second: MetricKind,
    pub counts: PairCounts,
}

/// Agreement / dissonance counts for every ordered pair of metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dissonance {
    pub pairs: Vec<MetricPair>,
}

impl Dissonance {
    pub fn from_results(results: &[IterationResult], metrics: &[MetricKind]) -> Self {
        let mut pairs = Vec::new();
        for &first in metrics {
            for &second in metrics {
                if first == second {
                    continue;
                }
                let mut counts = PairCounts::default();
                for result in results {
                    let (Some(a), Some(b)) = (result.change(first), result.change(second)) else {
                        continue;
                    };
                    match PairOutcome::classify(a, b) {
                        PairOutcome::Agreement => counts.agreement += 1,
                        PairOutcome::Dissonant => counts.dissonant += 1,
                        PairOutcome::Conflicted => counts.conflicted += 1,
                    }
                }
                pairs.push(MetricPair {
                    first,
                    second,
                    counts,
                });
            }
        }
        Self { pairs }
    }

    pub fn get(&self, first: MetricKind, second: MetricKind) -> Option<PairCounts> {
        self.pairs
            .iter()
            .find(|p| p.first == first && p.second == second)
            .map(|p| p.counts)
    }
}

impl fmt::Display for Dissonance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pair in &self.pairs {
            writeln!(f, "{} vs {}", pair.first, pair.second)?;
            writeln!(
                f,
                "Agreement: {}, Dissonant: {}, Conflicted: {}",
                pair.counts.agreement, pair.counts.dissonant, pair.counts.conflicted
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(changes: &[(MetricKind, Change)]) -> IterationResult {
        IterationResult {
            kind: RefactoringKind::PullUpMethod,
            target: Location::new("m.py", 0),
            changes: changes.iter().copied().collect(),
            values: changes.iter().map(|(m, _)| (*m, 0.5)).collect(),
        }
    }

    #[test]
    fn test_classify_against_before() {
        let eval = |kind, value| Evaluation {
            kind,
            value,
            direction: kind.direction(Default::default()),
        };
        let before: BTreeMap<_, _> = [
            (MetricKind::Lscc, eval(MetricKind::Lscc, 0.4)),
            (MetricKind::Cbo, eval(MetricKind::Cbo, 2.0)),
        ]
        .into();
        let after: BTreeMap<_, _> = [
            (MetricKind::Lscc, eval(MetricKind::Lscc, 0.5)),
            (MetricKind::Cbo, eval(MetricKind::Cbo, 2.0)),
        ]
        .into();
        let r = IterationResult::classify(
            RefactoringKind::PushDownMethod,
            Location::new("m.py", 1),
            &before,
            &after,
        );
        assert_eq!(r.change(MetricKind::Lscc), Some(Change::Better));
        assert_eq!(r.change(MetricKind::Cbo), Some(Change::Static));
        assert_eq!(r.better_count(), 1);
        assert!(r.improves_any(&[MetricKind::Lscc]));
        assert!(!r.improves_any(&[MetricKind::Cbo, MetricKind::Tcc]));
    }

    #[test]
    fn test_statistics_lines() {
        let metrics = [MetricKind::Lscc, MetricKind::Cbo];
        let results = vec![
            result(&[(MetricKind::Lscc, Change::Better), (MetricKind::Cbo, Change::Worse)]),
            result(&[(MetricKind::Lscc, Change::Better), (MetricKind::Cbo, Change::Static)]),
        ];
        let stats = Statistics::from_results(&results, &metrics);
        assert_eq!(
            stats.tally(MetricKind::Lscc),
            Tally {
                better: 2,
                unchanged: 0,
                worse: 0
            }
        );
        assert_eq!(stats.to_string(), "LSCC 2up 0= 0down\nCBO 0up 1= 1down\n");
    }

    #[test]
    fn test_pair_outcomes() {
        use Change::*;
        assert_eq!(PairOutcome::classify(Better, Better), PairOutcome::Agreement);
        assert_eq!(PairOutcome::classify(Worse, Worse), PairOutcome::Agreement);
        assert_eq!(PairOutcome::classify(Static, Static), PairOutcome::Agreement);
        assert_eq!(PairOutcome::classify(Better, Static), PairOutcome::Dissonant);
        assert_eq!(PairOutcome::classify(Static, Worse), PairOutcome::Dissonant);
        assert_eq!(PairOutcome::classify(Better, Worse), PairOutcome::Conflicted);
    }

    #[test]
    fn test_dissonance_covers_ordered_pairs() {
        let metrics = [MetricKind::Lscc, MetricKind::Cbo, MetricKind::Dit];
        let results = vec![
            result(&[
                (MetricKind::Lscc, Change::Better),
                (MetricKind::Cbo, Change::Worse),
                (MetricKind::Dit, Change::Static),
            ]),
            result(&[
                (MetricKind::Lscc, Change::Better),
                (MetricKind::Cbo, Change::Better),
                (MetricKind::Dit, Change::Static),
            ]),
        ];
        let dissonance = Dissonance::from_results(&results, &metrics);
        assert_eq!(dissonance.pairs.len(), 6);
        assert_eq!(
            dissonance.get(MetricKind::Lscc, MetricKind::Cbo),
            Some(PairCounts {
                agreement: 1,
                dissonant: 0,
                conflicted: 1
            })
        );
        assert_eq!(
            dissonance.get(MetricKind::Dit, MetricKind::Lscc).unwrap().dissonant,
            2
        );
        assert!(dissonance
            .to_string()
            .starts_with("LSCC vs CBO\nAgreement: 1, Dissonant: 0, Conflicted: 1\n"));
    }
}
