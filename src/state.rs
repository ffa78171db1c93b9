//! Evolution state
//!
//! The [`EvolutionState`] owns one generation of evolution: the species
//! arena, the population, and the per-thread random generators. The
//! top-level loop it runs is deliberately minimal (evaluate, then breed);
//! it exists because slaves can re-evolve received individuals locally
//! for a bounded time, which needs a self-contained state they can spin
//! up and drive.
//!
//! State variants are resolved from the `state` parameter through a
//! registry of constructors built at program start.

use std::collections::HashMap;

use crate::breed::Breeder;
use crate::error::{EngineResult, SetupError};
use crate::eval::problem::SimpleProblem;
use crate::params::Parameters;
use crate::population::{Population, Species, SpeciesId, Subpopulation};
use crate::rng::MersenneTwister;

/// Outcome of one [`EvolutionState::evolve`] step
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvolveOutcome {
    /// More generations remain
    NotDone,
    /// The configured number of generations has been reached
    Success,
    /// Evolution cannot continue
    Failure,
}

/// One self-contained evolutionary run
#[derive(Debug)]
pub struct EvolutionState {
    /// The parameter database this state was built from
    pub params: Parameters,
    /// Species arena; individuals refer into it by [`SpeciesId`]
    pub species: Vec<Species>,
    /// The current generation's population
    pub population: Population,
    /// Per-thread generators; breeding thread `t` draws from `random[t]`
    pub random: Vec<MersenneTwister>,
    /// Number of breeding threads
    pub breedthreads: usize,
    /// Current generation number
    pub generation: usize,
    /// Generation count after which `evolve` reports success
    pub num_generations: usize,
}

impl EvolutionState {
    /// Build a state from parameters
    ///
    /// Reads `seed` (`time` for wall clock), `breedthreads`,
    /// `generations`, `pop.subpops`, and the per-subpopulation species
    /// and size parameters. Initial individuals are prototype clones
    /// with randomized genes.
    pub fn from_params(params: Parameters) -> Result<Self, SetupError> {
        let breedthreads = params.get_int("breedthreads", 1)?.max(1) as usize;
        let num_generations = params.get_int("generations", 1)?.max(1) as usize;

        let mut random = Vec::with_capacity(breedthreads);
        match params.get_string("seed") {
            Some("time") => {
                for _ in 0..breedthreads {
                    random.push(MersenneTwister::from_time());
                }
            }
            Some(value) => {
                let seed: u32 = value.parse().map_err(|_| SetupError::BadParameter {
                    path: "seed".to_string(),
                    message: format!("expected an integer or \"time\", found {value:?}"),
                })?;
                for t in 0..breedthreads {
                    random.push(MersenneTwister::new(seed.wrapping_add(t as u32)));
                }
            }
            None => {
                for t in 0..breedthreads {
                    random.push(MersenneTwister::new(4357u32.wrapping_add(t as u32)));
                }
            }
        }

        let num_subpops = params.get_int("pop.subpops", 1)?.max(1) as usize;
        let mut species = Vec::with_capacity(num_subpops);
        let mut subpops = Vec::with_capacity(num_subpops);
        for s in 0..num_subpops {
            let sp = Species::from_params(&params, s, SpeciesId(s))?;
            let size = params.get_int(&format!("pop.subpop.{s}.size"), 0)?.max(0) as usize;
            let mut individuals = Vec::with_capacity(size);
            for _ in 0..size {
                let mut ind = sp.new_individual();
                ind.genome
                    .randomize(&mut random[0], sp.gene_min, sp.gene_max);
                individuals.push(ind);
            }
            let mut subpop = Subpopulation::new(SpeciesId(s), individuals);
            if params.contains(&format!("pop.subpop.{s}.archive-size")) {
                let archive = params.require_int(&format!("pop.subpop.{s}.archive-size"))?;
                subpop = subpop.with_archive_size(archive.max(0) as usize);
            }
            species.push(sp);
            subpops.push(subpop);
        }

        Ok(Self {
            params,
            species,
            population: Population::new(subpops),
            random,
            breedthreads,
            generation: 0,
            num_generations,
        })
    }

    /// The species an individual of `id` belongs to
    pub fn species(&self, id: SpeciesId) -> &Species {
        &self.species[id.0]
    }

    /// Make sure subpopulation `index` exists, creating it (and its
    /// species) from the parameters if needed
    ///
    /// Used by the slave, which learns subpopulation numbers from the
    /// master rather than from its own configuration.
    pub fn ensure_subpop(&mut self, index: usize) -> Result<(), SetupError> {
        while self.population.subpops.len() <= index {
            let s = self.population.subpops.len();
            if s >= self.species.len() {
                let sp = Species::from_params(&self.params, s, SpeciesId(s))?;
                self.species.push(sp);
            }
            self.population
                .subpops
                .push(Subpopulation::new(SpeciesId(s), Vec::new()));
        }
        Ok(())
    }

    /// Run one generation: evaluate everything unevaluated, then breed
    ///
    /// Returns [`EvolveOutcome::Success`] once the configured generation
    /// count is reached, [`EvolveOutcome::NotDone`] otherwise.
    pub fn evolve(
        &mut self,
        breeder: &mut dyn Breeder,
        problem: &dyn SimpleProblem,
    ) -> EngineResult<EvolveOutcome> {
        for (s, subpop) in self.population.subpops.iter_mut().enumerate() {
            for ind in &mut subpop.individuals {
                if !ind.evaluated {
                    problem.evaluate(ind, s, 0);
                }
            }
        }

        self.generation += 1;
        if self.generation >= self.num_generations {
            return Ok(EvolveOutcome::Success);
        }

        let newpop = breeder.breed_population(self)?;
        self.population = newpop;
        Ok(EvolveOutcome::NotDone)
    }
}

/// Constructor registry for `state` class tags
pub struct StateRegistry {
    map: HashMap<&'static str, fn(Parameters) -> Result<EvolutionState, SetupError>>,
}

impl StateRegistry {
    /// Resolve a tag and construct the state
    pub fn create(&self, tag: &str, params: Parameters) -> Result<EvolutionState, SetupError> {
        let ctor = self.map.get(tag).ok_or_else(|| SetupError::UnknownTag {
            path: "state".to_string(),
            tag: tag.to_string(),
        })?;
        ctor(params)
    }
}

/// The standard state registry
pub fn state_registry() -> StateRegistry {
    let mut map: HashMap<&'static str, fn(Parameters) -> Result<EvolutionState, SetupError>> =
        HashMap::new();
    map.insert("simple", EvolutionState::from_params);
    StateRegistry { map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breed::EsBreeder;
    use crate::eval::problem::SphereProblem;

    fn params() -> Parameters {
        let mut p = Parameters::new();
        p.set("seed", "42");
        p.set("generations", "3");
        p.set("pop.subpops", "1");
        p.set("pop.subpop.0.species", "float-vector");
        p.set("pop.subpop.0.genome-size", "3");
        p.set("pop.subpop.0.size", "4");
        p.set("pop.subpop.0.min-gene", "-5.0");
        p.set("pop.subpop.0.max-gene", "5.0");
        p.set("es.mu.0", "2");
        p.set("es.lambda.0", "8");
        p
    }

    #[test]
    fn test_from_params_builds_population() {
        let state = EvolutionState::from_params(params()).unwrap();
        assert_eq!(state.population.num_subpops(), 1);
        assert_eq!(state.population.subpops[0].len(), 4);
        assert_eq!(state.num_generations, 3);
        assert!(!state.population.subpops[0].individuals[0].evaluated);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let mut a = EvolutionState::from_params(params()).unwrap();
        let mut b = EvolutionState::from_params(params()).unwrap();
        assert_eq!(a.random[0].next_word(), b.random[0].next_word());
        assert_eq!(
            a.population.subpops[0].individuals,
            b.population.subpops[0].individuals
        );
    }

    #[test]
    fn test_evolve_runs_to_success() {
        let mut state = EvolutionState::from_params(params()).unwrap();
        let mut breeder = EsBreeder::from_params(&state.params, 1).unwrap();
        let problem = SphereProblem;
        let mut outcome = EvolveOutcome::NotDone;
        let mut steps = 0;
        while outcome == EvolveOutcome::NotDone {
            outcome = state.evolve(&mut breeder, &problem).unwrap();
            steps += 1;
            assert!(steps <= 3, "evolve did not terminate");
        }
        assert_eq!(outcome, EvolveOutcome::Success);
        // intermediate generations were bred to lambda
        assert_eq!(state.population.subpops[0].len(), 8);
        assert!(state.population.subpops[0]
            .individuals
            .iter()
            .all(|i| i.evaluated));
    }

    #[test]
    fn test_ensure_subpop_grows() {
        let mut p = params();
        p.set("pop.subpop.1.species", "bit-vector");
        let mut state = EvolutionState::from_params(p).unwrap();
        assert_eq!(state.population.num_subpops(), 1);
        state.ensure_subpop(1).unwrap();
        assert_eq!(state.population.num_subpops(), 2);
        assert_eq!(state.species.len(), 2);
    }

    #[test]
    fn test_state_registry() {
        let registry = state_registry();
        assert!(registry.create("simple", params()).is_ok());
        let err = registry.create("quantum", params()).unwrap_err();
        assert!(matches!(err, SetupError::UnknownTag { .. }));
    }
}
