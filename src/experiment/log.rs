//! Plain-text run log.
//!
//! ```text
//! LSCC    CBO
//! 0.41, 2.5,
//! LSCC 1up 0= 0down
//! CBO 0up 1= 0down
//! LSCC vs CBO
//! Agreement: 0, Dissonant: 1, Conflicted: 0
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::stats::{Dissonance, IterationResult, Statistics};
use crate::core::Result;
use crate::metrics::MetricKind;

/// `<dir>/<library>_<accepted>[_<suffix>].log.txt`
pub fn log_path(dir: &Path, library: &str, accepted: usize, suffix: Option<&str>) -> PathBuf {
    let name = match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{library}_{accepted}_{suffix}.log.txt"),
        None => format!("{library}_{accepted}.log.txt"),
    };
    dir.join(name)
}

/// Render the header, one row per accepted refactoring, and the summary
/// blocks.
pub fn render(results: &[IterationResult], metrics: &[MetricKind]) -> String {
    let mut out = String::new();
    for metric in metrics {
        let _ = write!(out, "{metric}    ");
    }
    out.push('\n');

    for result in results {
        for metric in metrics {
            if let Some(value) = result.values.get(metric) {
                let _ = write!(out, "{value}, ");
            }
        }
        out.push('\n');
    }

    out.push_str(&Statistics::from_results(results, metrics).to_string());
    out.push_str(&Dissonance::from_results(results, metrics).to_string());
    out
}

/// Write the log for a finished run, creating `dir` when needed.
pub fn write_log(
    dir: &Path,
    library: &str,
    suffix: Option<&str>,
    results: &[IterationResult],
    metrics: &[MetricKind],
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = log_path(dir, library, results.len(), suffix);
    fs::write(&path, render(results, metrics))?;
    info!(path = %path.display(), rows = results.len(), "Wrote run log");
    Ok(path)
}
