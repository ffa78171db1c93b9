//! Breeding pipelines
//!
//! A breeding pipeline is a user-composable graph of operators that
//! emits individuals on demand. Pipelines are prototypes: each breeding
//! thread clones its own copy before producing, so pipeline state never
//! crosses threads.
//!
//! The [`BreedContext`] carries everything a pipeline may touch during
//! one thread's run over one subpopulation: the thread's generator, the
//! species parameters, the (rank-sorted) parent array, and the explicit
//! ES-selection counter the ES breeders audit after every produced
//! child.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::BreedError;
use crate::genome::Genome;
use crate::population::{Individual, Species};
use crate::rng::MersenneTwister;

use super::selection::SelectionMethod;

/// Per-thread breeding context
pub struct BreedContext<'a> {
    /// Index of the breeding thread running this pipeline
    pub thread: usize,
    /// The thread's private generator
    pub rng: &'a mut MersenneTwister,
    /// Species of the subpopulation being bred
    pub species: &'a Species,
    /// The current subpopulation the pipeline selects from.
    /// ES breeders rank-sort this before threads start.
    pub parents: &'a [Individual],
    /// Number of ES parents; the top `mu` of `parents` are eligible.
    /// Zero outside an ES breeder.
    pub mu: usize,
    /// SPEA2 archive size; the archive occupies the last slots of
    /// `parents`. `None` outside the SPEA2 breeder.
    pub archive: Option<usize>,
    es_count: usize,
}

impl<'a> BreedContext<'a> {
    /// Create a context with no ES or archive configuration
    pub fn new(
        thread: usize,
        rng: &'a mut MersenneTwister,
        species: &'a Species,
        parents: &'a [Individual],
    ) -> Self {
        Self {
            thread,
            rng,
            species,
            parents,
            mu: 0,
            archive: None,
            es_count: 0,
        }
    }

    /// Configure the ES parent count
    pub fn with_mu(mut self, mu: usize) -> Self {
        self.mu = mu;
        self
    }

    /// Configure the SPEA2 archive size
    pub fn with_archive(mut self, archive_size: usize) -> Self {
        self.archive = Some(archive_size);
        self
    }

    /// Draw the next ES parent and advance the selection counter
    ///
    /// Returns the parent at sorted index `prev_count % mu`. The breeder
    /// verifies the counter advanced exactly once per produced child;
    /// calling this from a pipeline that is not running under an ES
    /// breeder is a configuration bug.
    pub fn es_select(&mut self) -> &'a Individual {
        assert!(
            self.mu > 0,
            "ES selection invoked outside an ES breeder (mu is unset)"
        );
        let index = self.es_count % self.mu;
        self.es_count += 1;
        &self.parents[index]
    }

    /// Number of ES selections made so far by this thread
    pub fn es_selections(&self) -> usize {
        self.es_count
    }
}

/// A source of bred individuals
///
/// `produce` writes `n` individuals into `out` starting at `start` and
/// returns how many it produced. ES breeders require exactly one per
/// call and audit the ES-selection counter around each call.
pub trait BreedingPipeline: Send + Sync {
    /// Clone this pipeline for a breeding thread
    fn clone_pipeline(&self) -> Box<dyn BreedingPipeline>;

    /// Hook called once per thread per subpopulation before producing
    fn prepare_to_produce(&mut self, _subpop: usize, _ctx: &mut BreedContext<'_>) {}

    /// Produce `n` individuals into `out[start..]`
    fn produce(
        &mut self,
        n: usize,
        start: usize,
        subpop: usize,
        out: &mut [Individual],
        ctx: &mut BreedContext<'_>,
    ) -> Result<usize, BreedError>;

    /// Hook called once per thread per subpopulation after producing
    fn finish_producing(&mut self, _subpop: usize, _ctx: &mut BreedContext<'_>) {}
}

/// Pipeline that selects one parent and emits a mutated clone
///
/// Mutation is per-variant: Gaussian perturbation clamped to the species
/// gene bounds for real vectors, uniform reset for integer vectors, bit
/// flips for bit vectors, and leaf-symbol randomization for trees. The
/// per-gene probability and step come from the species.
pub struct MutationPipeline {
    source: Box<dyn SelectionMethod>,
}

impl MutationPipeline {
    /// Create a mutation pipeline drawing parents from `source`
    pub fn new(source: Box<dyn SelectionMethod>) -> Self {
        Self { source }
    }

    fn mutate(genome: &mut Genome, species: &Species, rng: &mut MersenneTwister) {
        let prob = species.mutation_prob;
        match genome {
            Genome::FloatVector(v) => {
                for gene in v.iter_mut() {
                    if rng.gen_bool(prob) {
                        let step: f64 = rng.sample(StandardNormal);
                        *gene += species.mutation_sigma * step;
                        *gene = gene.clamp(species.gene_min, species.gene_max);
                    }
                }
            }
            Genome::IntVector(v) => {
                for gene in v.iter_mut() {
                    if rng.gen_bool(prob) {
                        *gene = rng.gen_range(species.gene_min..species.gene_max) as i32;
                    }
                }
            }
            Genome::LongVector(v) => {
                for gene in v.iter_mut() {
                    if rng.gen_bool(prob) {
                        *gene = rng.gen_range(species.gene_min..species.gene_max) as i64;
                    }
                }
            }
            Genome::BitVector(v) => {
                for gene in v.iter_mut() {
                    if rng.gen_bool(prob) {
                        *gene = !*gene;
                    }
                }
            }
            Genome::Tree(t) => {
                if rng.gen_bool(prob) {
                    t.randomize_leaves(rng);
                }
            }
        }
    }
}

impl BreedingPipeline for MutationPipeline {
    fn clone_pipeline(&self) -> Box<dyn BreedingPipeline> {
        Box::new(Self {
            source: self.source.clone_method(),
        })
    }

    fn produce(
        &mut self,
        n: usize,
        start: usize,
        subpop: usize,
        out: &mut [Individual],
        ctx: &mut BreedContext<'_>,
    ) -> Result<usize, BreedError> {
        for slot in start..start + n {
            let mut child = self.source.select(subpop, ctx).clone();
            Self::mutate(&mut child.genome, ctx.species, ctx.rng);
            child.touch_genome();
            out[slot] = child;
        }
        Ok(n)
    }
}

/// Pipeline that crosses two selected parents and emits one child
///
/// One-point crossover over vector genomes; the child takes the first
/// parent's prefix and the second parent's suffix, then passes through
/// the same per-variant mutation as [`MutationPipeline`]. Tree genomes
/// fall back to cloning the first parent.
pub struct CrossoverPipeline {
    source: Box<dyn SelectionMethod>,
}

impl CrossoverPipeline {
    /// Create a crossover pipeline drawing both parents from `source`
    pub fn new(source: Box<dyn SelectionMethod>) -> Self {
        Self { source }
    }

    fn cross(a: &Genome, b: &Genome, rng: &mut MersenneTwister) -> Genome {
        fn one_point<T: Clone>(a: &[T], b: &[T], rng: &mut MersenneTwister) -> Vec<T> {
            if a.is_empty() || a.len() != b.len() {
                return a.to_vec();
            }
            let cut = rng.gen_range(0..a.len());
            let mut child = a[..cut].to_vec();
            child.extend_from_slice(&b[cut..]);
            child
        }
        match (a, b) {
            (Genome::IntVector(x), Genome::IntVector(y)) => {
                Genome::IntVector(one_point(x, y, rng))
            }
            (Genome::LongVector(x), Genome::LongVector(y)) => {
                Genome::LongVector(one_point(x, y, rng))
            }
            (Genome::FloatVector(x), Genome::FloatVector(y)) => {
                Genome::FloatVector(one_point(x, y, rng))
            }
            (Genome::BitVector(x), Genome::BitVector(y)) => {
                Genome::BitVector(one_point(x, y, rng))
            }
            _ => a.clone(),
        }
    }
}

impl BreedingPipeline for CrossoverPipeline {
    fn clone_pipeline(&self) -> Box<dyn BreedingPipeline> {
        Box::new(Self {
            source: self.source.clone_method(),
        })
    }

    fn produce(
        &mut self,
        n: usize,
        start: usize,
        subpop: usize,
        out: &mut [Individual],
        ctx: &mut BreedContext<'_>,
    ) -> Result<usize, BreedError> {
        for slot in start..start + n {
            let first = self.source.select(subpop, ctx).clone();
            let second = self.source.select(subpop, ctx);
            let mut child = first.clone();
            child.genome = Self::cross(&first.genome, &second.genome, ctx.rng);
            MutationPipeline::mutate(&mut child.genome, ctx.species, ctx.rng);
            child.touch_genome();
            out[slot] = child;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::selection::EsSelection;
    use crate::fitness::Fitness;
    use crate::params::Parameters;
    use crate::population::SpeciesId;
    use rand_core::SeedableRng;

    fn species() -> Species {
        let mut p = Parameters::new();
        p.set("pop.subpop.0.species", "float-vector");
        p.set("pop.subpop.0.genome-size", "3");
        p.set("pop.subpop.0.min-gene", "-10.0");
        p.set("pop.subpop.0.max-gene", "10.0");
        Species::from_params(&p, 0, SpeciesId(0)).unwrap()
    }

    fn parents(species: &Species, n: usize) -> Vec<Individual> {
        (0..n)
            .map(|i| {
                let mut ind = species.new_individual();
                ind.set_fitness(Fitness::Scalar(-(i as f64)));
                ind
            })
            .collect()
    }

    #[test]
    fn test_es_select_walks_top_mu() {
        let sp = species();
        let inds = parents(&sp, 5);
        let mut rng = MersenneTwister::seed_from_u64(1);
        let mut ctx = BreedContext::new(0, &mut rng, &sp, &inds).with_mu(2);
        assert_eq!(ctx.es_select().fitness, Fitness::Scalar(0.0));
        assert_eq!(ctx.es_select().fitness, Fitness::Scalar(-1.0));
        assert_eq!(ctx.es_select().fitness, Fitness::Scalar(0.0));
        assert_eq!(ctx.es_selections(), 3);
    }

    #[test]
    #[should_panic(expected = "outside an ES breeder")]
    fn test_es_select_requires_mu() {
        let sp = species();
        let inds = parents(&sp, 2);
        let mut rng = MersenneTwister::seed_from_u64(1);
        let mut ctx = BreedContext::new(0, &mut rng, &sp, &inds);
        ctx.es_select();
    }

    #[test]
    fn test_mutation_pipeline_produces_unevaluated_child() {
        let sp = species();
        let inds = parents(&sp, 4);
        let mut rng = MersenneTwister::seed_from_u64(2);
        let mut ctx = BreedContext::new(0, &mut rng, &sp, &inds).with_mu(2);
        let mut pipeline = MutationPipeline::new(Box::new(EsSelection::new()));
        let mut out = vec![sp.new_individual()];
        let produced = pipeline.produce(1, 0, 0, &mut out, &mut ctx).unwrap();
        assert_eq!(produced, 1);
        assert!(!out[0].evaluated);
        assert_eq!(ctx.es_selections(), 1);
    }

    #[test]
    fn test_mutation_respects_gene_bounds() {
        let sp = species();
        let inds = parents(&sp, 2);
        let mut rng = MersenneTwister::seed_from_u64(3);
        let mut ctx = BreedContext::new(0, &mut rng, &sp, &inds).with_mu(2);
        let mut pipeline = MutationPipeline::new(Box::new(EsSelection::new()));
        let mut out = vec![sp.new_individual()];
        for _ in 0..50 {
            pipeline.produce(1, 0, 0, &mut out, &mut ctx).unwrap();
            if let Genome::FloatVector(v) = &out[0].genome {
                assert!(v.iter().all(|g| (-10.0..=10.0).contains(g)));
            }
        }
    }

    #[test]
    fn test_crossover_uses_two_selections() {
        let sp = species();
        let inds = parents(&sp, 4);
        let mut rng = MersenneTwister::seed_from_u64(4);
        let mut ctx = BreedContext::new(0, &mut rng, &sp, &inds).with_mu(4);
        let mut pipeline = CrossoverPipeline::new(Box::new(EsSelection::new()));
        let mut out = vec![sp.new_individual()];
        pipeline.produce(1, 0, 0, &mut out, &mut ctx).unwrap();
        assert_eq!(ctx.es_selections(), 2);
    }
}
