//! Progress reporting for long-running experiment loops.

use indicatif::{ProgressBar, ProgressStyle};

/// Style templates for progress bars.
pub mod styles {
    use super::*;

    /// Bar counting accepted refactorings toward the desired total.
    pub fn accepted() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} accepted {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }

    /// Bar counting finished generations of a search run.
    pub fn generations() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.green/white}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

/// Thin wrapper over an indicatif bar that can be hidden for tests and
/// non-interactive runs.
#[derive(Clone)]
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Create a visible bar counting accepted refactorings.
    pub fn accepted(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(styles::accepted());
        Self { bar }
    }

    /// Create a visible bar counting search generations.
    pub fn generations(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(styles::generations());
        bar.set_prefix("search");
        Self { bar }
    }

    /// Create a hidden bar.
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self { bar }
    }

    /// Advance by one.
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Replace the trailing message.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish and leave the final state on screen.
    pub fn finish(&self, msg: &str) {
        self.bar.finish_with_message(msg.to_string());
    }
}
