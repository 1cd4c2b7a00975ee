//! Genetic operators over refactoring series.

use std::cmp::Ordering;

use rand::seq::{index, SliceRandom};
use rand::{Rng, RngCore};

use super::Gene;
use crate::model::Location;
use crate::refactor::RefactoringKind;

/// The pool genes are drawn from.
pub struct GenePool<'p> {
    pub kinds: &'p [RefactoringKind],
    pub locations: &'p [Location],
}

impl GenePool<'_> {
    /// A uniformly random gene, `None` when either side is empty.
    pub fn gene(&self, rng: &mut dyn RngCore) -> Option<Gene> {
        let kind = *self.kinds.choose(rng)?;
        let location = self.locations.choose(rng)?.clone();
        Some(Gene { kind, location })
    }

    pub fn series(&self, len: usize, rng: &mut dyn RngCore) -> Vec<Gene> {
        (0..len).filter_map(|_| self.gene(rng)).collect()
    }
}

/// Index of the fittest of `k` distinct random contestants.
pub fn tournament(fitness: &[f64], k: usize, rng: &mut dyn RngCore) -> usize {
    if fitness.is_empty() {
        return 0;
    }
    let k = k.clamp(1, fitness.len());
    index::sample(rng, fitness.len(), k)
        .into_iter()
        .max_by(|&a, &b| by_fitness(fitness[a], fitness[b]))
        .unwrap_or(0)
}

/// One-point crossover at a random cut.
pub fn crossover(a: &[Gene], b: &[Gene], rng: &mut dyn RngCore) -> (Vec<Gene>, Vec<Gene>) {
    let len = a.len().min(b.len());
    if len == 0 {
        return (a.to_vec(), b.to_vec());
    }
    let cut = rng.gen_range(0..len);
    let first = a[..cut].iter().chain(&b[cut..]).cloned().collect();
    let second = b[..cut].iter().chain(&a[cut..]).cloned().collect();
    (first, second)
}

/// Replace each gene with a fresh one with probability `rate`.
pub fn mutate(series: &mut [Gene], rate: f64, pool: &GenePool<'_>, rng: &mut dyn RngCore) {
    for gene in series.iter_mut() {
        if rng.gen_bool(rate) {
            if let Some(fresh) = pool.gene(rng) {
                *gene = fresh;
            }
        }
    }
}

/// Total order on fitness values, NaN lowest.
pub fn by_fitness(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool_parts() -> (Vec<RefactoringKind>, Vec<Location>) {
        (
            RefactoringKind::ALL.to_vec(),
            (0..4).map(|i| Location::new("a.py", i)).collect(),
        )
    }

    #[test]
    fn test_series_length() {
        let (kinds, locations) = pool_parts();
        let pool = GenePool {
            kinds: &kinds,
            locations: &locations,
        };
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(pool.series(15, &mut rng).len(), 15);

        let empty = GenePool {
            kinds: &kinds,
            locations: &[],
        };
        assert!(empty.series(3, &mut rng).is_empty());
    }

    #[test]
    fn test_tournament_with_whole_population_picks_best() {
        let fitness = [0.1, 0.9, f64::NAN, 0.5];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(tournament(&fitness, 4, &mut rng), 1);
        }
    }

    #[test]
    fn test_crossover_preserves_genes() {
        let (kinds, locations) = pool_parts();
        let pool = GenePool {
            kinds: &kinds,
            locations: &locations,
        };
        let mut rng = StdRng::seed_from_u64(9);
        let a = pool.series(6, &mut rng);
        let b = pool.series(6, &mut rng);
        let (c, d) = crossover(&a, &b, &mut rng);
        assert_eq!(c.len(), 6);
        assert_eq!(d.len(), 6);
        for i in 0..6 {
            assert!(
                (c[i] == a[i] && d[i] == b[i]) || (c[i] == b[i] && d[i] == a[i]),
                "gene {i} came from neither parent"
            );
        }
    }

    #[test]
    fn test_mutation_rates() {
        let (kinds, locations) = pool_parts();
        let pool = GenePool {
            kinds: &kinds,
            locations: &locations,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let original = pool.series(10, &mut rng);

        let mut untouched = original.clone();
        mutate(&mut untouched, 0.0, &pool, &mut rng);
        assert_eq!(untouched, original);

        let mut mutated = original.clone();
        mutate(&mut mutated, 1.0, &pool, &mut rng);
        assert_eq!(mutated.len(), original.len());
    }

    #[test]
    fn test_by_fitness_orders_nan_last() {
        let mut values = vec![0.3, f64::NAN, -1.0, 2.0];
        values.sort_by(|a, b| by_fitness(*b, *a));
        assert_eq!(&values[..3], &[2.0, 0.3, -1.0]);
        assert!(values[3].is_nan());
    }
}
