//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::metrics::{Direction, MetricKind};
use crate::refactor::RefactoringKind;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Iteration controller settings.
    pub experiment: ExperimentConfig,
    /// Metric policy.
    pub metrics: MetricsConfig,
    /// Run log location.
    pub output: OutputConfig,
    /// Genetic search settings.
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Env vars with the `REFIT_` prefix
    /// override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::from(Serialized::defaults(Self::default())).merge(Toml::file_exact(path)),
        )
    }

    /// Load `refit.toml` from `dir` when present, defaults otherwise.
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::extract(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(dir.join("refit.toml"))),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed("REFIT_").split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller or search driver cannot run with.
    pub fn validate(&self) -> Result<()> {
        let e = &self.experiment;
        if e.catalogue.is_empty() {
            return Err(Error::config("experiment.catalogue is empty"));
        }
        if e.report_metrics.is_empty() {
            return Err(Error::config("experiment.report_metrics is empty"));
        }
        if e.accept_policy == AcceptPolicy::Subset && e.fitness_metrics.is_empty() {
            return Err(Error::config(
                "accept_policy = \"subset\" needs at least one fitness metric",
            ));
        }

        let s = &self.search;
        if s.population < 2 {
            return Err(Error::config("search.population must be at least 2"));
        }
        if s.tournament == 0 || s.tournament > s.population {
            return Err(Error::config(format!(
                "search.tournament must be between 1 and {}",
                s.population
            )));
        }
        if !(0.0..=1.0).contains(&s.mutation_rate) {
            return Err(Error::config("search.mutation_rate must be within 0..=1"));
        }
        if s.series_len == 0 {
            return Err(Error::config("search.series_len must be at least 1"));
        }
        if s.targets.is_empty() {
            return Err(Error::config("search.targets is empty"));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Directory holding the selected library's sources.
    pub fn library_path(&self) -> PathBuf {
        self.experiment.library_path()
    }
}

/// The code bases the experiment was designed around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    #[default]
    Asciimatics,
    Jinja2,
    Pyflakes,
    /// `libraries_root` is the library itself.
    Custom,
}

impl Library {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asciimatics => "asciimatics",
            Self::Jinja2 => "jinja2",
            Self::Pyflakes => "pyflakes",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a speculative refactoring is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptPolicy {
    /// Any reported metric strictly improves.
    #[default]
    Any,
    /// Any of `fitness_metrics` strictly improves.
    Subset,
}

/// Iteration controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub library: Library,
    /// Directory containing one sub-directory per library.
    pub libraries_root: PathBuf,
    /// Accepted refactorings after which the run stops.
    pub desired_refactorings: usize,
    /// RNG seed; a fresh one is drawn and logged when absent.
    pub seed: Option<u64>,
    pub accept_policy: AcceptPolicy,
    /// Metrics consulted by the `subset` policy.
    pub fitness_metrics: Vec<MetricKind>,
    /// Metrics compared, logged, and summarised.
    pub report_metrics: Vec<MetricKind>,
    /// Transformation types the controller may try.
    pub catalogue: Vec<RefactoringKind>,
    /// Feasible attempts after which the run gives up. 0 leaves the run
    /// bounded only by the success count.
    pub max_trials: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            library: Library::default(),
            libraries_root: PathBuf::from("target_libraries"),
            desired_refactorings: 200,
            seed: None,
            accept_policy: AcceptPolicy::default(),
            fitness_metrics: vec![MetricKind::Lscc],
            report_metrics: MetricKind::defaults(),
            catalogue: RefactoringKind::ALL.to_vec(),
            max_trials: 0,
        }
    }
}

impl ExperimentConfig {
    pub fn library_path(&self) -> PathBuf {
        match self.library {
            Library::Custom => self.libraries_root.clone(),
            library => self.libraries_root.join(library.as_str()),
        }
    }

    /// Metrics whose improvement makes a trial acceptable.
    pub fn accepting_metrics(&self) -> &[MetricKind] {
        match self.accept_policy {
            AcceptPolicy::Any => &self.report_metrics,
            AcceptPolicy::Subset => &self.fitness_metrics,
        }
    }

    /// Every metric the controller needs evaluated, report order first.
    pub fn tracked_metrics(&self) -> Vec<MetricKind> {
        let mut metrics = self.report_metrics.clone();
        for metric in &self.fitness_metrics {
            if !metrics.contains(metric) {
                metrics.push(*metric);
            }
        }
        metrics
    }
}

/// Metric policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Which way DIT improves.
    pub dit_direction: Direction,
}

/// Run log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub log_dir: PathBuf,
    /// Appended to the log file name as `_<suffix>`.
    pub suffix: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            suffix: None,
        }
    }
}

/// One term of the search fitness: `weight * aggregate(metric)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessTarget {
    pub metric: MetricKind,
    /// Sign and scale; negative for metrics where lower is better.
    pub weight: f64,
}

/// Genetic search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub population: usize,
    /// Contestants per tournament selection.
    pub tournament: usize,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    pub generations: usize,
    /// Refactorings per candidate series.
    pub series_len: usize,
    pub targets: Vec<FitnessTarget>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population: 20,
            tournament: 5,
            mutation_rate: 0.2,
            generations: 10,
            series_len: 15,
            targets: vec![
                FitnessTarget {
                    metric: MetricKind::Lscc,
                    weight: 1.0,
                },
                FitnessTarget {
                    metric: MetricKind::Cbo,
                    weight: -1.0,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.experiment.desired_refactorings, 200);
        assert_eq!(config.experiment.catalogue.len(), 14);
        assert_eq!(config.experiment.max_trials, 0);
        assert_eq!(config.metrics.dit_direction, Direction::Lower);
        assert_eq!(config.search.population, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "refit.toml",
                r#"
[experiment]
library = "jinja2"
desired_refactorings = 5
seed = 42
accept_policy = "subset"
fitness_metrics = ["SCOM", "CBO"]
catalogue = ["PushDownMethod", "PullUpField"]
max_trials = 500

[metrics]
dit_direction = "higher"

[output]
suffix = "trial"
"#,
            )?;
            let config = Config::from_file("refit.toml").unwrap();
            let e = &config.experiment;
            assert_eq!(e.library, Library::Jinja2);
            assert_eq!(e.desired_refactorings, 5);
            assert_eq!(e.seed, Some(42));
            assert_eq!(e.accepting_metrics(), &[MetricKind::Scom, MetricKind::Cbo]);
            assert_eq!(
                e.catalogue,
                vec![RefactoringKind::PushDownMethod, RefactoringKind::PullUpField]
            );
            assert_eq!(e.max_trials, 500);
            assert_eq!(config.metrics.dit_direction, Direction::Higher);
            assert_eq!(config.output.suffix.as_deref(), Some("trial"));
            assert_eq!(config.output.log_dir, PathBuf::from("log"));
            Ok(())
        });
    }

    #[test]
    fn test_from_file_errors_on_missing_file() {
        let err = Config::from_file("/nonexistent/path/refit.toml").unwrap_err();
        assert!(err.to_string().contains("not found"), "got: {err}");
    }

    #[test]
    fn test_load_default_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load_default(".").unwrap();
            assert_eq!(config.search.series_len, 15);
            Ok(())
        });
    }

    #[test]
    fn test_env_var_overrides_file_value() {
        Jail::expect_with(|jail| {
            jail.create_file("refit.toml", "[search]\ngenerations = 3")?;
            jail.set_env("REFIT_SEARCH__GENERATIONS", "7");
            let config = Config::load_default(".").unwrap();
            assert_eq!(config.search.generations, 7);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("refit.toml", "[search]\ntournament = 50")?;
            assert!(Config::load_default(".").is_err());
            jail.create_file("refit.toml", "[experiment]\nlibrary = \"django\"")?;
            assert!(Config::load_default(".").is_err());
            jail.create_file("refit.toml", "[experiment]\ncatalogue = []")?;
            assert!(Config::load_default(".").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_library_path() {
        let mut e = ExperimentConfig::default();
        assert_eq!(
            e.library_path(),
            PathBuf::from("target_libraries/asciimatics")
        );
        e.library = Library::Custom;
        e.libraries_root = PathBuf::from("/src/project");
        assert_eq!(e.library_path(), PathBuf::from("/src/project"));
    }

    #[test]
    fn test_tracked_metrics_merges_fitness() {
        let e = ExperimentConfig {
            report_metrics: vec![MetricKind::Lscc, MetricKind::Cbo],
            fitness_metrics: vec![MetricKind::Cbo, MetricKind::Fanin],
            ..Default::default()
        };
        assert_eq!(
            e.tracked_metrics(),
            vec![MetricKind::Lscc, MetricKind::Cbo, MetricKind::Fanin]
        );
        assert_eq!(e.accepting_metrics(), &[MetricKind::Lscc, MetricKind::Cbo]);
    }

    #[test]
    fn test_to_toml_round_trips_through_loader() {
        Jail::expect_with(|jail| {
            let mut config = Config::default();
            config.experiment.seed = Some(9);
            jail.create_file("refit.toml", &config.to_toml().unwrap())?;
            let loaded = Config::from_file("refit.toml").unwrap();
            assert_eq!(loaded.experiment.seed, Some(9));
            assert_eq!(loaded.search.targets, config.search.targets);
            Ok(())
        });
    }
}
