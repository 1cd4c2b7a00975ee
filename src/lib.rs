//! Refit - metric-guided refactoring of Python class hierarchies.
//!
//! Refit parses a Python library into an in-memory model, applies
//! inheritance refactorings (push down, pull up, extract and collapse
//! hierarchy, delegation) to speculative copies, and keeps a copy only
//! when a cohesion or coupling metric improves.
//!
//! # Metrics
//!
//! LSCC, TCC, CC, SCOM, LCOM5, CBO, RFC, DIT, FANIN, FANOUT, CA
//!
//! # Example
//!
//! ```no_run
//! use refit::metrics::{MetricEngine, MetricKind};
//! use refit::parser::parse_library;
//!
//! let snapshot = parse_library("target_libraries/jinja2").unwrap();
//! let engine = MetricEngine::default();
//! let lscc = engine.evaluate(&snapshot, MetricKind::Lscc);
//! println!("{} classes, LSCC {:.4}", snapshot.class_count(), lscc.value);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod experiment;
pub mod metrics;
pub mod model;
pub mod output;
pub mod parser;
pub mod refactor;
pub mod search;

pub use core::{Error, Result};
pub use model::Snapshot;
