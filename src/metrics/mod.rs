//! Metric engine: per-class cohesion and coupling values, weights, and
//! weighted snapshot aggregates.

pub mod cohesion;
pub mod coupling;
pub mod structure;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::Error;
use crate::model::{Location, Snapshot};
use coupling::ReferenceGraph;
use structure::ClassStructure;

/// Metrics the engine can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricKind {
    Lscc,
    Tcc,
    Cc,
    Scom,
    Lcom5,
    Cbo,
    Rfc,
    Dit,
    Fanin,
    Fanout,
    Ca,
}

impl MetricKind {
    pub const ALL: [MetricKind; 11] = [
        Self::Lscc,
        Self::Tcc,
        Self::Cc,
        Self::Scom,
        Self::Lcom5,
        Self::Cbo,
        Self::Rfc,
        Self::Dit,
        Self::Fanin,
        Self::Fanout,
        Self::Ca,
    ];

    /// Metrics tracked when the configuration names none.
    pub fn defaults() -> Vec<MetricKind> {
        vec![
            Self::Lscc,
            Self::Tcc,
            Self::Cc,
            Self::Scom,
            Self::Lcom5,
            Self::Cbo,
            Self::Rfc,
            Self::Dit,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lscc => "LSCC",
            Self::Tcc => "TCC",
            Self::Cc => "CC",
            Self::Scom => "SCOM",
            Self::Lcom5 => "LCOM5",
            Self::Cbo => "CBO",
            Self::Rfc => "RFC",
            Self::Dit => "DIT",
            Self::Fanin => "FANIN",
            Self::Fanout => "FANOUT",
            Self::Ca => "CA",
        }
    }

    /// Which way is an improvement. DIT has no fixed answer.
    pub fn direction(&self, dit: Direction) -> Direction {
        match self {
            Self::Lscc
            | Self::Tcc
            | Self::Cc
            | Self::Scom
            | Self::Lcom5
            | Self::Rfc
            | Self::Fanin => Direction::Higher,
            Self::Cbo | Self::Fanout | Self::Ca => Direction::Lower,
            Self::Dit => dit,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown metric: {s}")))
    }
}

/// Improvement direction of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    #[default]
    Lower,
}

/// How a metric moved between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Better,
    Static,
    Worse,
}

/// Aggregate value of one metric over a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub kind: MetricKind,
    pub value: f64,
    pub direction: Direction,
}

impl Evaluation {
    /// Movement from `before` to `self`. Equality compares the aggregate
    /// value only.
    pub fn change_from(&self, before: &Evaluation) -> Change {
        if self.value == before.value {
            return Change::Static;
        }
        let increased = self.value > before.value;
        match (self.direction, increased) {
            (Direction::Higher, true) | (Direction::Lower, false) => Change::Better,
            _ => Change::Worse,
        }
    }

    pub fn is_better_than(&self, before: &Evaluation) -> bool {
        self.change_from(before) == Change::Better
    }
}

/// Weighted mean `Σ(w·m)/Σw`, or `0.0` when every weight is zero.
pub fn weighted_aggregate(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (mut total, mut weight) = (0.0, 0.0);
    for (value, w) in pairs {
        total += w * value;
        weight += w;
    }
    if weight == 0.0 {
        0.0
    } else {
        total / weight
    }
}

/// Per-class metric values, as printed by the `metrics` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub file: String,
    pub class_name: String,
    pub methods: usize,
    pub fields: usize,
    pub values: BTreeMap<MetricKind, f64>,
}

/// Everything measured on one snapshot, computed once and queried per
/// metric.
pub struct SnapshotMetrics {
    classes: Vec<(Location, ClassStructure)>,
    references: ReferenceGraph,
    depths: HashMap<Location, usize>,
}

impl SnapshotMetrics {
    pub fn compute(snapshot: &Snapshot) -> Self {
        let classes = snapshot
            .classes()
            .map(|(loc, class)| (loc, ClassStructure::from_class(class)))
            .collect();
        Self {
            classes,
            references: ReferenceGraph::build(snapshot),
            depths: coupling::inheritance_depths(snapshot),
        }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Value and weight of `kind` for one class.
    pub fn class_value(&self, kind: MetricKind, loc: &Location, s: &ClassStructure) -> (f64, f64) {
        match kind {
            MetricKind::Lscc => (cohesion::lscc(s), cohesion::lscc_weight(s)),
            MetricKind::Tcc => (cohesion::tcc(s), cohesion::pair_weight(s)),
            MetricKind::Cc => (cohesion::cc(s), cohesion::pair_weight(s)),
            MetricKind::Scom => (cohesion::scom(s), cohesion::scom_weight(s)),
            MetricKind::Lcom5 => (cohesion::lcom5(s), cohesion::lcom5_weight(s)),
            MetricKind::Cbo => (s.receivers.len() as f64, 1.0),
            MetricKind::Rfc => ((s.method_count + s.external_calls.len()) as f64, 1.0),
            MetricKind::Dit => (self.depths.get(loc).copied().unwrap_or(0) as f64, 1.0),
            MetricKind::Fanin => (self.references.fan_in(loc) as f64, 1.0),
            MetricKind::Fanout => (self.references.fan_out(loc) as f64, 1.0),
            MetricKind::Ca => (self.references.afferent(loc) as f64, 1.0),
        }
    }

    /// Snapshot-level value of `kind`. DIT is the deepest class; every
    /// other metric is the weighted mean over classes.
    pub fn aggregate(&self, kind: MetricKind) -> f64 {
        if kind == MetricKind::Dit {
            return self.depths.values().copied().max().unwrap_or(0) as f64;
        }
        weighted_aggregate(
            self.classes
                .iter()
                .map(|(loc, s)| self.class_value(kind, loc, s)),
        )
    }

    pub fn per_class(&self, kinds: &[MetricKind]) -> Vec<ClassMetrics> {
        self.classes
            .iter()
            .map(|(loc, s)| ClassMetrics {
                file: loc.file.clone(),
                class_name: s.name.clone(),
                methods: s.k(),
                fields: s.l(),
                values: kinds
                    .iter()
                    .map(|&k| (k, self.class_value(k, loc, s).0))
                    .collect(),
            })
            .collect()
    }
}

/// Evaluates snapshots under a fixed direction policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricEngine {
    dit_direction: Direction,
}

impl MetricEngine {
    pub fn new(dit_direction: Direction) -> Self {
        Self { dit_direction }
    }

    pub fn evaluate(&self, snapshot: &Snapshot, kind: MetricKind) -> Evaluation {
        self.evaluate_all(snapshot, &[kind])[&kind]
    }

    /// Evaluate several metrics, sharing one structural pass.
    pub fn evaluate_all(
        &self,
        snapshot: &Snapshot,
        kinds: &[MetricKind],
    ) -> BTreeMap<MetricKind, Evaluation> {
        let measured = SnapshotMetrics::compute(snapshot);
        kinds
            .iter()
            .map(|&kind| {
                (
                    kind,
                    Evaluation {
                        kind,
                        value: measured.aggregate(kind),
                        direction: kind.direction(self.dit_direction),
                    },
                )
            })
            .collect()
    }
}
