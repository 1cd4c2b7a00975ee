//! Serializable summaries printed by the CLI commands.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::experiment::{RunOutcome, StopReason};
use crate::metrics::{ClassMetrics, Direction, Evaluation, MetricKind};
use crate::refactor::RefactoringKind;
use crate::search::{GenerationReport, SearchOutcome};

/// Aggregate of one metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub metric: MetricKind,
    pub value: f64,
    pub direction: Direction,
}

impl From<&Evaluation> for MetricRow {
    fn from(eval: &Evaluation) -> Self {
        Self {
            metric: eval.kind,
            value: eval.value,
            direction: eval.direction,
        }
    }
}

/// One class with its metric values as flat columns.
#[derive(Debug, Clone, Serialize)]
pub struct ClassRow {
    pub file: String,
    pub class: String,
    pub methods: usize,
    pub fields: usize,
    #[serde(flatten)]
    pub values: BTreeMap<MetricKind, f64>,
}

impl From<ClassMetrics> for ClassRow {
    fn from(m: ClassMetrics) -> Self {
        Self {
            file: m.file,
            class: m.class_name,
            methods: m.methods,
            fields: m.fields,
            values: m.values,
        }
    }
}

/// Output of the `metrics` command.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub library: String,
    pub classes: usize,
    pub metrics: Vec<MetricRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_class: Option<Vec<ClassRow>>,
}

impl MetricsReport {
    pub fn new(
        library: impl Into<String>,
        classes: usize,
        evaluations: &BTreeMap<MetricKind, Evaluation>,
        order: &[MetricKind],
    ) -> Self {
        Self {
            library: library.into(),
            classes,
            metrics: order
                .iter()
                .filter_map(|m| evaluations.get(m))
                .map(MetricRow::from)
                .collect(),
            per_class: None,
        }
    }

    pub fn with_classes(mut self, classes: Vec<ClassMetrics>) -> Self {
        self.per_class = Some(classes.into_iter().map(ClassRow::from).collect());
        self
    }
}

/// Start and end value of a metric over a run, with its tally.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDelta {
    pub metric: MetricKind,
    pub before: f64,
    pub after: f64,
    pub better: usize,
    #[serde(rename = "static")]
    pub unchanged: usize,
    pub worse: usize,
}

/// Output of the `run` command.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub library: String,
    pub seed: u64,
    pub accepted: usize,
    pub trials: usize,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    pub metrics: Vec<MetricDelta>,
}

impl RunSummary {
    pub fn new(library: impl Into<String>, seed: u64, outcome: &RunOutcome, metrics: &[MetricKind]) -> Self {
        let stats = outcome.statistics(metrics);
        let metrics = metrics
            .iter()
            .filter_map(|&metric| {
                let before = outcome.initial.get(&metric)?.value;
                let after = outcome.last.get(&metric)?.value;
                let tally = stats.tally(metric);
                Some(MetricDelta {
                    metric,
                    before,
                    after,
                    better: tally.better,
                    unchanged: tally.unchanged,
                    worse: tally.worse,
                })
            })
            .collect();
        Self {
            library: library.into(),
            seed,
            accepted: outcome.accepted(),
            trials: outcome.trials,
            stop: outcome.stop,
            log: None,
            metrics,
        }
    }
}

/// One gene of the best series, flattened for tables.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesStep {
    pub step: usize,
    pub kind: RefactoringKind,
    pub file: String,
    pub index: usize,
}

/// Output of the `search` command.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub library: String,
    pub seed: u64,
    pub baseline: f64,
    pub best_fitness: f64,
    pub series: Vec<SeriesStep>,
    pub generations: Vec<GenerationReport>,
}

impl SearchSummary {
    pub fn new(library: impl Into<String>, seed: u64, outcome: SearchOutcome) -> Self {
        Self {
            library: library.into(),
            seed,
            baseline: outcome.baseline,
            best_fitness: outcome.best_fitness,
            series: outcome
                .best
                .into_iter()
                .enumerate()
                .map(|(i, gene)| SeriesStep {
                    step: i + 1,
                    kind: gene.kind,
                    file: gene.location.file,
                    index: gene.location.index,
                })
                .collect(),
            generations: outcome.generations,
        }
    }
}

/// A row of the `catalogue` command.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogueEntry {
    pub name: &'static str,
    pub description: &'static str,
}

impl CatalogueEntry {
    pub fn all() -> Vec<Self> {
        RefactoringKind::ALL
            .iter()
            .map(|kind| Self {
                name: kind.as_str(),
                description: kind.description(),
            })
            .collect()
    }
}
