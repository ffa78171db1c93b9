//! Breeding: pipelines, selection, and the population-level breeders
//!
//! Breeders consume the current population and produce the next one.
//! The heavy lifting happens in per-thread breeding pipelines cloned
//! from the species prototypes; the breeders handle selection
//! statistics, slot allocation, and the invariants that make the
//! strategies correct (one ES selection per child, archive placement).

pub mod mu_lambda;
pub mod pipeline;
pub mod selection;
pub mod spea2;

pub use mu_lambda::{Comparison, EsBreeder, EsStrategy};
pub use pipeline::{BreedContext, BreedingPipeline, CrossoverPipeline, MutationPipeline};
pub use selection::{
    rank_compare, EsSelection, SelectionMethod, Spea2TournamentSelection, TournamentSelection,
};
pub use spea2::{assign_spea2_fitness, Spea2Breeder};

use crate::error::EngineResult;
use crate::population::Population;
use crate::state::EvolutionState;

/// A population-level breeding strategy
pub trait Breeder {
    /// Produce the next generation from the state's current population
    ///
    /// The current population may be reordered (breeders rank-sort it);
    /// the returned population replaces it.
    fn breed_population(&mut self, state: &mut EvolutionState) -> EngineResult<Population>;
}

/// Prelude for the breed module
pub mod prelude {
    pub use super::mu_lambda::{Comparison, EsBreeder, EsStrategy};
    pub use super::pipeline::{BreedContext, BreedingPipeline, CrossoverPipeline, MutationPipeline};
    pub use super::selection::{
        rank_compare, EsSelection, SelectionMethod, Spea2TournamentSelection, TournamentSelection,
    };
    pub use super::spea2::{assign_spea2_fitness, Spea2Breeder};
    pub use super::Breeder;
}
