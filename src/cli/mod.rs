//! CLI implementation using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, Library};

/// Refit - metric-guided refactoring of Python class hierarchies.
#[derive(Parser)]
#[command(name = "refit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory searched for refit.toml
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "markdown")]
    pub format: OutputFormat,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply random refactorings, keeping those that improve a metric
    #[command(alias = "r")]
    Run(RunArgs),

    /// Evaluate the configured metrics on a library
    #[command(alias = "m")]
    Metrics(MetricsArgs),

    /// Genetic search for a refactoring series
    #[command(alias = "ga")]
    Search(SearchArgs),

    /// List the available transformations
    #[command(alias = "ls")]
    Catalogue,

    /// Print the effective configuration as TOML
    Config,
}

/// Library selection shared by every command that parses code.
#[derive(Args, Default)]
pub struct LibraryArgs {
    /// Library under the libraries root
    #[arg(short, long, value_enum)]
    pub library: Option<Library>,

    /// Libraries root, or the library itself with `--library custom`
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Args, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    /// RNG seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Accepted refactorings to stop after
    #[arg(short, long)]
    pub desired: Option<usize>,

    /// Suffix for the log file name
    #[arg(long)]
    pub suffix: Option<String>,

    /// Feasible attempts to give up after (0 = unbounded)
    #[arg(long)]
    pub max_trials: Option<usize>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Default)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    /// Include per-class values
    #[arg(long)]
    pub per_class: bool,
}

#[derive(Args, Default)]
pub struct SearchArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    /// RNG seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Generations to evolve
    #[arg(short, long)]
    pub generations: Option<usize>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
    Text,
}

impl LibraryArgs {
    /// Fold the flags into `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(library) = self.library {
            config.experiment.library = library;
        }
        if let Some(root) = &self.root {
            config.experiment.libraries_root = root.clone();
        }
    }
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        self.library.apply(config);
        if let Some(seed) = self.seed {
            config.experiment.seed = Some(seed);
        }
        if let Some(desired) = self.desired {
            config.experiment.desired_refactorings = desired;
        }
        if let Some(suffix) = &self.suffix {
            config.output.suffix = Some(suffix.clone());
        }
        if let Some(max_trials) = self.max_trials {
            config.experiment.max_trials = max_trials;
        }
    }
}

impl SearchArgs {
    pub fn apply(&self, config: &mut Config) {
        self.library.apply(config);
        if let Some(seed) = self.seed {
            config.experiment.seed = Some(seed);
        }
        if let Some(generations) = self.generations {
            config.search.generations = generations;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["refit", "catalogue"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(matches!(cli.format, OutputFormat::Markdown));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Command::Catalogue));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli =
            Cli::try_parse_from(["refit", "-f", "json", "-c", "refit.toml", "-v", "config"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("refit.toml")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Config));
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "refit", "run", "--library", "jinja2", "--seed", "7", "--desired", "12", "--suffix",
            "a", "--max-trials", "50",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.experiment.library, Library::Jinja2);
        assert_eq!(config.experiment.seed, Some(7));
        assert_eq!(config.experiment.desired_refactorings, 12);
        assert_eq!(config.output.suffix.as_deref(), Some("a"));
        assert_eq!(config.experiment.max_trials, 50);
    }

    #[test]
    fn test_run_without_flags_keeps_config() {
        let cli = Cli::try_parse_from(["refit", "r"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.experiment.desired_refactorings, 200);
        assert_eq!(config.experiment.seed, None);
    }

    #[test]
    fn test_search_overrides() {
        let cli = Cli::try_parse_from([
            "refit", "search", "--library", "custom", "--root", "lib", "-g", "4",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.search.generations, 4);
        assert_eq!(config.library_path(), PathBuf::from("lib"));
    }

    #[test]
    fn test_metrics_per_class() {
        let cli = Cli::try_parse_from(["refit", "metrics", "--per-class"]).unwrap();
        assert!(matches!(cli.command, Command::Metrics(MetricsArgs { per_class: true, .. })));
    }

    #[test]
    fn test_unknown_library_rejected() {
        assert!(Cli::try_parse_from(["refit", "run", "--library", "numpy"]).is_err());
    }
}
