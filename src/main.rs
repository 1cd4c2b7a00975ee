//! Refit CLI - metric-guided refactoring of Python class hierarchies.

use std::io::stdout;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use refit::cli::{Cli, Command, MetricsArgs, RunArgs, SearchArgs};
use refit::config::Config;
use refit::core::Progress;
use refit::experiment::{log::write_log, Controller};
use refit::metrics::{MetricEngine, SnapshotMetrics};
use refit::model::Snapshot;
use refit::output::{CatalogueEntry, Format, MetricsReport, RunSummary, SearchSummary};
use refit::parser::parse_library;
use refit::search::{GeneticSearch, SeriesEvaluator};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default(&cli.path)?,
    };
    let format = Format::from(cli.format);

    match cli.command {
        Command::Run(args) => run_experiment(&mut config, &args, format),
        Command::Metrics(args) => run_metrics(&mut config, &args, format),
        Command::Search(args) => run_search(&mut config, &args, format),
        Command::Catalogue => {
            format.format(&CatalogueEntry::all(), &mut stdout())?;
            Ok(())
        }
        Command::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load(config: &Config) -> anyhow::Result<Snapshot> {
    config.validate()?;
    let path = config.library_path();
    let snapshot = parse_library(&path)
        .with_context(|| format!("failed to load library {}", path.display()))?;
    info!(
        library = %config.experiment.library,
        classes = snapshot.class_count(),
        "Library loaded"
    );
    Ok(snapshot)
}

/// Configured seed, or a fresh one that is logged so the run can be replayed.
fn seed(config: &Config) -> u64 {
    config.experiment.seed.unwrap_or_else(|| {
        let seed = rand::random();
        info!(seed, "Drew a fresh seed");
        seed
    })
}

fn run_experiment(config: &mut Config, args: &RunArgs, format: Format) -> anyhow::Result<()> {
    args.apply(config);
    let snapshot = load(config)?;
    let seed = seed(config);
    let mut rng = StdRng::seed_from_u64(seed);

    let experiment = &config.experiment;
    let progress = if args.quiet {
        Progress::hidden(experiment.desired_refactorings)
    } else {
        Progress::accepted(experiment.desired_refactorings)
    };
    let engine = MetricEngine::new(config.metrics.dit_direction);
    let outcome = Controller::new(experiment, engine)
        .with_progress(progress)
        .run(snapshot, &mut rng)?;

    let metrics = &experiment.report_metrics;
    let library = experiment.library.to_string();
    let log = write_log(
        &config.output.log_dir,
        &library,
        config.output.suffix.as_deref(),
        &outcome.results,
        metrics,
    )?;
    eprintln!("{} {}", "Log written to".green(), log.display());

    let mut summary = RunSummary::new(library, seed, &outcome, metrics);
    summary.log = Some(log.display().to_string());
    format.format(&summary, &mut stdout())?;
    Ok(())
}

fn run_metrics(config: &mut Config, args: &MetricsArgs, format: Format) -> anyhow::Result<()> {
    args.library.apply(config);
    let snapshot = load(config)?;
    let metrics = &config.experiment.report_metrics;
    let engine = MetricEngine::new(config.metrics.dit_direction);

    let evaluations = engine.evaluate_all(&snapshot, metrics);
    let mut report = MetricsReport::new(
        config.experiment.library.to_string(),
        snapshot.class_count(),
        &evaluations,
        metrics,
    );
    if args.per_class {
        report = report.with_classes(SnapshotMetrics::compute(&snapshot).per_class(metrics));
    }
    format.format(&report, &mut stdout())?;
    Ok(())
}

fn run_search(config: &mut Config, args: &SearchArgs, format: Format) -> anyhow::Result<()> {
    args.apply(config);
    let snapshot = load(config)?;
    let seed = seed(config);
    let mut rng = StdRng::seed_from_u64(seed);

    let engine = MetricEngine::new(config.metrics.dit_direction);
    let evaluator = SeriesEvaluator::new(&snapshot, engine, &config.search.targets);
    let progress = if args.quiet {
        Progress::hidden(config.search.generations)
    } else {
        Progress::generations(config.search.generations)
    };
    let outcome = GeneticSearch::new(&config.search, &config.experiment.catalogue, evaluator)
        .with_progress(progress)
        .run(&mut rng)?;

    if outcome.best_fitness > outcome.baseline {
        eprintln!(
            "{} {:.4} -> {:.4}",
            "Fitness improved".green(),
            outcome.baseline,
            outcome.best_fitness
        );
    } else {
        eprintln!("{}", "No series beat the untouched library".yellow());
    }
    let summary = SearchSummary::new(config.experiment.library.to_string(), seed, outcome);
    format.format(&summary, &mut stdout())?;
    Ok(())
}
