//! Selection primitives
//!
//! The rank comparator the breeders sort with, plus the selection
//! methods pipelines draw parents from: the ES selector (which must be
//! invoked exactly once per produced child under the ES strategies),
//! plain tournament selection, and the SPEA2 archive tournament.

use std::cmp::Ordering;

use rand::Rng;

use crate::population::Individual;

use super::pipeline::BreedContext;

/// Rank comparator: best individuals sort to the lowest indexes
///
/// An individual sorts after another iff the other's fitness strictly
/// dominates it. Mutually non-dominated individuals compare equal, so
/// their relative order is whatever the sort leaves.
pub fn rank_compare(a: &Individual, b: &Individual) -> Ordering {
    if b.fitness.better_than(&a.fitness) {
        Ordering::Greater
    } else if a.fitness.better_than(&b.fitness) {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// A way of picking one parent out of the current subpopulation
pub trait SelectionMethod: Send + Sync {
    /// Clone this method for a breeding thread
    fn clone_method(&self) -> Box<dyn SelectionMethod>;

    /// Pick a parent
    fn select<'a>(&self, subpop: usize, ctx: &mut BreedContext<'a>) -> &'a Individual;
}

/// Evolution-Strategies selection
///
/// Stateless: returns the parent at sorted index `prev_count % mu` of
/// the current subpopulation and advances the breeder's per-thread
/// counter. The ES breeders verify the counter advanced exactly once
/// per produced child, which is what guarantees (μ,λ) semantics through
/// an arbitrary pipeline graph.
#[derive(Clone, Debug, Default)]
pub struct EsSelection;

impl EsSelection {
    /// Create an ES selector
    pub fn new() -> Self {
        Self
    }
}

impl SelectionMethod for EsSelection {
    fn clone_method(&self) -> Box<dyn SelectionMethod> {
        Box::new(self.clone())
    }

    fn select<'a>(&self, _subpop: usize, ctx: &mut BreedContext<'a>) -> &'a Individual {
        ctx.es_select()
    }
}

/// Tournament selection over the whole subpopulation
#[derive(Clone, Debug)]
pub struct TournamentSelection {
    /// Number of individuals competing per pick
    pub size: usize,
}

impl TournamentSelection {
    /// Create a tournament of the given size
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "tournament size must be at least 1");
        Self { size }
    }
}

impl SelectionMethod for TournamentSelection {
    fn clone_method(&self) -> Box<dyn SelectionMethod> {
        Box::new(self.clone())
    }

    fn select<'a>(&self, _subpop: usize, ctx: &mut BreedContext<'a>) -> &'a Individual {
        assert!(!ctx.parents.is_empty(), "cannot select from an empty subpopulation");
        let mut best = ctx.rng.gen_range(0..ctx.parents.len());
        for _ in 1..self.size {
            let challenger = ctx.rng.gen_range(0..ctx.parents.len());
            if ctx.parents[challenger]
                .fitness
                .better_than(&ctx.parents[best].fitness)
            {
                best = challenger;
            }
        }
        &ctx.parents[best]
    }
}

/// Tournament selection restricted to the SPEA2 archive
///
/// Competes on the SPEA2 ranking scalar (lower is better) and only draws
/// from the archive block, which the SPEA2 breeder keeps in the last
/// `archive_size` slots of the old subpopulation.
#[derive(Clone, Debug)]
pub struct Spea2TournamentSelection {
    /// Number of individuals competing per pick
    pub size: usize,
}

impl Spea2TournamentSelection {
    /// Create an archive tournament of the given size
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "tournament size must be at least 1");
        Self { size }
    }
}

impl SelectionMethod for Spea2TournamentSelection {
    fn clone_method(&self) -> Box<dyn SelectionMethod> {
        Box::new(self.clone())
    }

    fn select<'a>(&self, _subpop: usize, ctx: &mut BreedContext<'a>) -> &'a Individual {
        let archive_size = ctx
            .archive
            .expect("SPEA2 tournament selection outside the SPEA2 breeder");
        let len = ctx.parents.len();
        assert!(
            archive_size >= 1 && archive_size <= len,
            "archive size {archive_size} out of range for subpopulation of {len}"
        );
        let first = len - archive_size;
        let mut best = ctx.rng.gen_range(first..len);
        for _ in 1..self.size {
            let challenger = ctx.rng.gen_range(first..len);
            if ctx.parents[challenger].fitness.as_spea2().spea2_fitness
                < ctx.parents[best].fitness.as_spea2().spea2_fitness
            {
                best = challenger;
            }
        }
        &ctx.parents[best]
    }
}
