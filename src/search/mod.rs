//! Genetic search for refactoring series that maximise a weighted metric
//! fitness.
//!
//! A candidate is a fixed-length series of `(kind, location)` genes drawn
//! from the original class locations. Genes whose location went stale
//! under earlier genes of the same series are skipped.

pub mod cache;
pub mod genetic;

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FitnessTarget, SearchConfig};
use crate::core::{Error, Progress, Result};
use crate::metrics::{MetricEngine, MetricKind};
use crate::model::{Location, Snapshot};
use crate::refactor::{build, RefactoringKind};

pub use cache::FitnessCache;
use genetic::{by_fitness, crossover, mutate, tournament, GenePool};

/// One step of a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Gene {
    pub kind: RefactoringKind,
    pub location: Location,
}

/// Applies series to a base snapshot and scores the result.
pub struct SeriesEvaluator<'a> {
    base: &'a Snapshot,
    engine: MetricEngine,
    targets: &'a [FitnessTarget],
}

impl<'a> SeriesEvaluator<'a> {
    pub fn new(base: &'a Snapshot, engine: MetricEngine, targets: &'a [FitnessTarget]) -> Self {
        Self {
            base,
            engine,
            targets,
        }
    }

    /// Apply every gene in order, each on the previous gene's result.
    pub fn apply(&self, series: &[Gene], rng: &mut dyn RngCore) -> Result<Snapshot> {
        let mut current = self.base.clone();
        for gene in series {
            if current.get_class(&gene.location).is_none() {
                warn!(location = %gene.location, kind = %gene.kind, "Skipping stale gene");
                continue;
            }
            let mut refactor = match build(gene.kind, &current, &gene.location) {
                Ok(refactor) => refactor,
                Err(e) if e.is_stale_location() => {
                    warn!(location = %gene.location, error = %e, "Skipping stale gene");
                    continue;
                }
                Err(e) => return Err(e),
            };
            refactor.perform(rng)?;
            current = refactor.into_result();
        }
        Ok(current)
    }

    /// `Σ weight · aggregate(metric)` of a snapshot.
    pub fn score(&self, snapshot: &Snapshot) -> f64 {
        let metrics: Vec<MetricKind> = self.targets.iter().map(|t| t.metric).collect();
        let evaluations = self.engine.evaluate_all(snapshot, &metrics);
        self.targets
            .iter()
            .map(|t| t.weight * evaluations[&t.metric].value)
            .sum()
    }

    pub fn fitness(&self, series: &[Gene], rng: &mut dyn RngCore) -> Result<f64> {
        Ok(self.score(&self.apply(series, rng)?))
    }
}

/// Cache behaviour and best fitness of one generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub best_fitness: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Result of a search run.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Fitness of the untouched library.
    pub baseline: f64,
    pub best: Vec<Gene>,
    pub best_fitness: f64,
    pub generations: Vec<GenerationReport>,
}

/// Tournament-selection genetic search with elitist survival.
pub struct GeneticSearch<'a> {
    config: &'a SearchConfig,
    catalogue: &'a [RefactoringKind],
    evaluator: SeriesEvaluator<'a>,
    cache: FitnessCache,
    progress: Progress,
}

impl<'a> GeneticSearch<'a> {
    pub fn new(
        config: &'a SearchConfig,
        catalogue: &'a [RefactoringKind],
        evaluator: SeriesEvaluator<'a>,
    ) -> Self {
        Self {
            config,
            catalogue,
            evaluator,
            cache: FitnessCache::new(),
            progress: Progress::hidden(config.generations),
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &FitnessCache {
        &self.cache
    }

    fn fitness(&mut self, series: &[Gene], rng: &mut dyn RngCore) -> Result<f64> {
        let evaluator = &self.evaluator;
        self.cache
            .get_or_try_insert_with(series, || evaluator.fitness(series, rng))
    }

    fn fitness_all(&mut self, population: &[Vec<Gene>], rng: &mut dyn RngCore) -> Result<Vec<f64>> {
        population.iter().map(|s| self.fitness(s, rng)).collect()
    }

    pub fn run(&mut self, rng: &mut dyn RngCore) -> Result<SearchOutcome> {
        let locations = self.evaluator.base.class_locations();
        if locations.is_empty() || self.catalogue.is_empty() {
            return Err(Error::InvalidArgument(
                "nothing to search: no classes or no refactoring kinds".to_string(),
            ));
        }
        let pool = GenePool {
            kinds: self.catalogue,
            locations: &locations,
        };
        let size = self.config.population;
        let baseline = self.evaluator.score(self.evaluator.base);

        let mut best = pool.series(self.config.series_len, rng);
        let mut best_fitness = self.fitness(&best, rng)?;
        let mut population: Vec<Vec<Gene>> = (0..size)
            .map(|_| pool.series(self.config.series_len, rng))
            .collect();
        let mut reports = Vec::with_capacity(self.config.generations);

        for generation in 1..=self.config.generations {
            let scores = self.fitness_all(&population, rng)?;
            let mut offspring: Vec<Vec<Gene>> = Vec::with_capacity(size);
            while offspring.len() < size {
                let p1 = &population[tournament(&scores, self.config.tournament, rng)];
                let p2 = &population[tournament(&scores, self.config.tournament, rng)];
                let (mut c1, mut c2) = crossover(p1, p2, rng);
                mutate(&mut c1, self.config.mutation_rate, &pool, rng);
                mutate(&mut c2, self.config.mutation_rate, &pool, rng);
                offspring.push(c1);
                if offspring.len() < size {
                    offspring.push(c2);
                }
            }

            population.extend(offspring);
            let scores = self.fitness_all(&population, rng)?;
            let mut ranked: Vec<(f64, Vec<Gene>)> = scores.into_iter().zip(population).collect();
            ranked.sort_by(|a, b| by_fitness(b.0, a.0));
            ranked.truncate(size);

            let leader = ranked[0].0;
            if by_fitness(leader, best_fitness).is_gt() {
                best = ranked[0].1.clone();
                best_fitness = leader;
                info!(generation, fitness = best_fitness, "New best series");
            }
            population = ranked.into_iter().map(|(_, s)| s).collect();

            reports.push(GenerationReport {
                generation,
                best_fitness,
                cache_hits: self.cache.hits(),
                cache_misses: self.cache.misses(),
            });
            debug!(
                generation,
                hits = self.cache.hits(),
                misses = self.cache.misses(),
                "Fitness cache"
            );
            self.cache.reset_counters();
            self.progress.inc();
        }

        self.progress.finish(&format!("best {best_fitness:.4}"));
        Ok(SearchOutcome {
            baseline,
            best,
            best_fitness,
            generations: reports,
        })
    }

    /// Forget cached fitness before searching under another configuration.
    pub fn reset(&mut self) {
        self.cache.reset();
    }
}
