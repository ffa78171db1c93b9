//! (μ,λ) and (μ+λ) Evolution-Strategies breeding
//!
//! The ES breeder ranks each subpopulation, takes the top μ as parents,
//! and drives the breeding pipelines to produce λ children in parallel.
//! It also derives the one-fifth-rule comparison for each subpopulation:
//! whether more, fewer, or exactly one fifth of the children beat their
//! parents, which mutation operators may use to adapt their step size.
//!
//! Every produced child must come from exactly one ES selection. The
//! breeder audits the per-thread selection counter after each `produce`
//! call and fails the generation if a pipeline selected zero or several
//! times.

use serde::{Deserialize, Serialize};

use crate::error::{BreedError, EngineResult, ErrorSink, SetupError};
use crate::params::Parameters;
use crate::population::{Individual, Population, Species};
use crate::rng::MersenneTwister;
use crate::state::EvolutionState;

use super::pipeline::BreedContext;
use super::selection::rank_compare;
use super::Breeder;

/// Which ES survival strategy the breeder implements
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum EsStrategy {
    /// (μ,λ): the next generation is the λ children; parents are discarded
    #[default]
    MuCommaLambda,
    /// (μ+λ): the μ parents are carried into the next generation
    /// alongside the λ children
    MuPlusLambda,
}

/// One-fifth-rule comparison for a subpopulation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// Fewer than one fifth of the children beat their parents
    UnderOneFifthBetter,
    /// Exactly one fifth of the children beat their parents
    #[default]
    ExactlyOneFifthBetter,
    /// More than one fifth of the children beat their parents
    OverOneFifthBetter,
}

impl Comparison {
    /// The comparison as a sign: -1 under, 0 exact, 1 over
    pub fn signum(self) -> i8 {
        match self {
            Comparison::UnderOneFifthBetter => -1,
            Comparison::ExactlyOneFifthBetter => 0,
            Comparison::OverOneFifthBetter => 1,
        }
    }
}

/// Evolution-Strategies breeder implementing (μ,λ) and (μ+λ)
#[derive(Debug)]
pub struct EsBreeder {
    /// Number of parents per subpopulation
    pub mu: Vec<usize>,
    /// Number of children per subpopulation
    pub lambda: Vec<usize>,
    /// One-fifth-rule comparison per subpopulation, derived at the start
    /// of each generation from the previous one
    pub comparison: Vec<Comparison>,
    /// The previous generation, kept for the one-fifth statistics
    pub parent_population: Option<Population>,
    strategy: EsStrategy,
}

impl EsBreeder {
    /// Create a (μ,λ) breeder
    ///
    /// Requires `mu[s] >= 1`, `lambda[s] >= 1`, and λ a multiple of μ
    /// for every subpopulation.
    pub fn mu_comma_lambda(mu: Vec<usize>, lambda: Vec<usize>) -> Result<Self, SetupError> {
        Self::new(mu, lambda, EsStrategy::MuCommaLambda)
    }

    /// Create a (μ+λ) breeder
    pub fn mu_plus_lambda(mu: Vec<usize>, lambda: Vec<usize>) -> Result<Self, SetupError> {
        Self::new(mu, lambda, EsStrategy::MuPlusLambda)
    }

    fn new(mu: Vec<usize>, lambda: Vec<usize>, strategy: EsStrategy) -> Result<Self, SetupError> {
        assert_eq!(mu.len(), lambda.len(), "mu and lambda must cover the same subpopulations");
        let mut sink = ErrorSink::new();
        for (s, (&m, &l)) in mu.iter().zip(lambda.iter()).enumerate() {
            Self::validate(s, m, l, &mut sink);
        }
        sink.exit_if_errors()?;
        let n = mu.len();
        Ok(Self {
            mu,
            lambda,
            comparison: vec![Comparison::default(); n],
            parent_population: None,
            strategy,
        })
    }

    fn validate(subpop: usize, mu: usize, lambda: usize, sink: &mut ErrorSink) {
        if lambda == 0 {
            sink.error(SetupError::BadEsConfiguration {
                path: format!("es.lambda.{subpop}"),
                message: "lambda must be an integer >= 1".to_string(),
            });
        }
        if mu == 0 {
            sink.error(SetupError::BadEsConfiguration {
                path: format!("es.mu.{subpop}"),
                message: "mu must be an integer >= 1".to_string(),
            });
        } else if lambda % mu != 0 {
            sink.error(SetupError::BadEsConfiguration {
                path: format!("es.mu.{subpop}"),
                message: "lambda must be a multiple of mu".to_string(),
            });
        }
    }

    /// Build a (μ,λ) breeder from `es.mu.<s>` / `es.lambda.<s>` parameters
    pub fn from_params(params: &Parameters, num_subpops: usize) -> Result<Self, SetupError> {
        let mut sink = ErrorSink::new();
        let mut mu = vec![0usize; num_subpops];
        let mut lambda = vec![0usize; num_subpops];
        for s in 0..num_subpops {
            lambda[s] = params.get_int(&format!("es.lambda.{s}"), 0)?.max(0) as usize;
            mu[s] = params.get_int(&format!("es.mu.{s}"), 0)?.max(0) as usize;
            Self::validate(s, mu[s], lambda[s], &mut sink);
        }
        sink.exit_if_errors()?;
        let n = num_subpops;
        Ok(Self {
            mu,
            lambda,
            comparison: vec![Comparison::default(); n],
            parent_population: None,
            strategy: EsStrategy::MuCommaLambda,
        })
    }

    /// Derive the one-fifth comparison for each subpopulation
    ///
    /// A child at index `i` is compared against the parent at sorted
    /// index `i / (λ/μ)` of the previous generation. Runs only when a
    /// previous generation exists.
    fn gather_statistics(&mut self, population: &Population) {
        let Some(parents) = &self.parent_population else {
            return;
        };
        for (s, subpop) in population.subpops.iter().enumerate() {
            let lambda = self.lambda[s];
            let per_parent = lambda / self.mu[s];
            let mut children_better = 0usize;
            for i in 0..lambda {
                let parent = i / per_parent;
                if subpop.individuals[i]
                    .fitness
                    .better_than(&parents.subpops[s].individuals[parent].fitness)
                {
                    children_better += 1;
                }
            }
            let threshold = lambda as f64 / 5.0;
            self.comparison[s] = if (children_better as f64) > threshold {
                Comparison::OverOneFifthBetter
            } else if (children_better as f64) < threshold {
                Comparison::UnderOneFifthBetter
            } else {
                Comparison::ExactlyOneFifthBetter
            };
        }
    }

    fn validate_population(&self, population: &Population) -> Result<(), BreedError> {
        if population.num_subpops() != self.mu.len() {
            return Err(BreedError::SubpopulationCountMismatch {
                expected: self.mu.len(),
                actual: population.num_subpops(),
            });
        }
        for (s, subpop) in population.subpops.iter().enumerate() {
            if subpop.len() < self.mu[s] {
                return Err(BreedError::SubpopulationTooSmall {
                    subpop: s,
                    size: subpop.len(),
                    mu: self.mu[s],
                });
            }
        }
        Ok(())
    }

    /// Resize every subpopulation of `population` to its λ, filling new
    /// slots with species prototypes
    fn set_to_lambda(&self, population: &mut Population, species: &[Species]) {
        for (s, subpop) in population.subpops.iter_mut().enumerate() {
            let lambda = self.lambda[s];
            let prototype = &species[subpop.species.0];
            subpop
                .individuals
                .resize_with(lambda, || prototype.new_individual());
        }
    }

    /// Breed one thread's slot ranges, one chunk per subpopulation
    ///
    /// After every `produce` call the ES-selection counter must have
    /// advanced by exactly one and the child must be of the subpopulation
    /// species.
    fn breed_chunk(
        thread: usize,
        chunks: Vec<&mut [Individual]>,
        rng: &mut MersenneTwister,
        population: &Population,
        species: &[Species],
        mu: &[usize],
    ) -> Result<(), BreedError> {
        for (s, chunk) in chunks.into_iter().enumerate() {
            let subpop = &population.subpops[s];
            let sp = &species[subpop.species.0];
            let mut pipeline = sp.pipeline_prototype.clone_pipeline();
            let mut ctx =
                BreedContext::new(thread, &mut *rng, sp, &subpop.individuals).with_mu(mu[s]);
            pipeline.prepare_to_produce(s, &mut ctx);
            for slot in 0..chunk.len() {
                let before = ctx.es_selections();
                let produced = pipeline.produce(1, slot, s, &mut *chunk, &mut ctx)?;
                if produced != 1 {
                    return Err(BreedError::WrongProductionCount {
                        subpop: s,
                        produced,
                    });
                }
                let uses = ctx.es_selections() - before;
                if uses != 1 {
                    return Err(BreedError::EsSelectionMisuse { subpop: s, uses });
                }
                if !chunk[slot].genome.same_variant(&sp.genome_prototype) {
                    return Err(BreedError::WrongSpecies { subpop: s });
                }
            }
            pipeline.finish_producing(s, &mut ctx);
        }
        Ok(())
    }
}

impl Breeder for EsBreeder {
    /// Breed the next generation
    ///
    /// Gathers one-fifth statistics against the previous generation,
    /// rank-sorts each subpopulation (best at index 0), snapshots it as
    /// the parent population, and produces λ children per subpopulation
    /// across the configured breeding threads. Each thread owns a
    /// disjoint slot range; the last thread absorbs the remainder.
    fn breed_population(&mut self, state: &mut EvolutionState) -> EngineResult<Population> {
        self.gather_statistics(&state.population);
        self.validate_population(&state.population)?;

        for subpop in &mut state.population.subpops {
            subpop.individuals.sort_by(rank_compare);
        }
        self.parent_population = Some(state.population.clone());

        let mut newpop = state.population.empty_clone();
        self.set_to_lambda(&mut newpop, &state.species);

        let threads = state.breedthreads.max(1);
        assert!(
            state.random.len() >= threads,
            "need one generator per breeding thread ({} < {threads})",
            state.random.len()
        );
        let num_subpops = newpop.num_subpops();

        // Divvy the lambda slots: thread t gets [t*(lambda/T), (t+1)*(lambda/T)),
        // with the last thread absorbing the remainder.
        let mut per_thread: Vec<Vec<&mut [Individual]>> = Vec::with_capacity(threads);
        {
            let mut rests: Vec<&mut [Individual]> = newpop
                .subpops
                .iter_mut()
                .map(|s| s.individuals.as_mut_slice())
                .collect();
            for t in 0..threads {
                let mut chunks = Vec::with_capacity(num_subpops);
                for (s, rest_slot) in rests.iter_mut().enumerate() {
                    let lambda = self.lambda[s];
                    let n = if t + 1 < threads {
                        lambda / threads
                    } else {
                        lambda - (lambda / threads) * (threads - 1)
                    };
                    let rest = std::mem::take(rest_slot);
                    let (chunk, tail) = rest.split_at_mut(n);
                    *rest_slot = tail;
                    chunks.push(chunk);
                }
                per_thread.push(chunks);
            }
        }

        let population = &state.population;
        let species = state.species.as_slice();
        let mu = self.mu.as_slice();
        let rngs = &mut state.random[..threads];

        let results: Vec<Result<(), BreedError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = per_thread
                .into_iter()
                .zip(rngs.iter_mut())
                .enumerate()
                .map(|(t, (chunks, rng))| {
                    scope.spawn(move || {
                        Self::breed_chunk(t, chunks, rng, population, species, mu)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });
        for result in results {
            result?;
        }

        // (mu+lambda): carry the sorted top-mu parents into the new
        // generation; (mu,lambda) returns the children as-is.
        if self.strategy == EsStrategy::MuPlusLambda {
            for (s, subpop) in newpop.subpops.iter_mut().enumerate() {
                let parents = &state.population.subpops[s].individuals[..self.mu[s]];
                subpop.individuals.extend(parents.iter().cloned());
            }
        }
        Ok(newpop)
    }
}
