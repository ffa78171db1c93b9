//! Populations, subpopulations, and individuals
//!
//! The population is an ordered array of subpopulations; each
//! subpopulation is an ordered array of individuals of one species.
//! Breeders produce a new population by cloning the empty shell and
//! refilling it, so the evolution state always owns exactly one
//! generation.

pub mod species;

pub use species::{Species, SpeciesId};

use serde::{Deserialize, Serialize};

use crate::fitness::Fitness;
use crate::genome::Genome;

/// An evolvable entity: genome, fitness, and an evaluated flag
///
/// `evaluated` is true iff the fitness was produced against the current
/// genome; breeding clears it. The species handle is an index into the
/// evolution state's species arena, shared by every individual of the
/// subpopulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// The genome
    pub genome: Genome,
    /// The fitness, meaningful only when `evaluated` is true
    pub fitness: Fitness,
    /// True iff `fitness` reflects the current genome
    pub evaluated: bool,
    /// Index into the species arena
    pub species: SpeciesId,
}

impl Individual {
    /// Create an unevaluated individual
    pub fn new(genome: Genome, fitness: Fitness, species: SpeciesId) -> Self {
        Self {
            genome,
            fitness,
            evaluated: false,
            species,
        }
    }

    /// Replace the fitness and mark the individual evaluated
    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = fitness;
        self.evaluated = true;
    }

    /// Mark the genome as changed, invalidating the fitness
    pub fn touch_genome(&mut self) {
        self.evaluated = false;
    }
}

/// An ordered array of individuals of one species
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subpopulation {
    /// Species of every individual in this subpopulation
    pub species: SpeciesId,
    /// The individuals, in slot order
    pub individuals: Vec<Individual>,
    /// SPEA2 archive size; the archive occupies the last `archive_size`
    /// slots after elites are loaded. `None` for non-SPEA2 runs.
    pub archive_size: Option<usize>,
}

impl Subpopulation {
    /// Create a subpopulation with the given individuals
    pub fn new(species: SpeciesId, individuals: Vec<Individual>) -> Self {
        Self {
            species,
            individuals,
            archive_size: None,
        }
    }

    /// Attach a SPEA2 archive size
    pub fn with_archive_size(mut self, archive_size: usize) -> Self {
        self.archive_size = Some(archive_size);
        self
    }

    /// Number of individuals
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// True if the subpopulation holds no individuals
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// A copy with the same species and archive size but no individuals
    pub fn empty_clone(&self) -> Subpopulation {
        Subpopulation {
            species: self.species,
            individuals: Vec::new(),
            archive_size: self.archive_size,
        }
    }
}

/// An ordered array of subpopulations
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Population {
    /// The subpopulations, in order
    pub subpops: Vec<Subpopulation>,
}

impl Population {
    /// Create a population from subpopulations
    pub fn new(subpops: Vec<Subpopulation>) -> Self {
        Self { subpops }
    }

    /// A population with the same shape but empty individual arrays
    pub fn empty_clone(&self) -> Population {
        Population {
            subpops: self.subpops.iter().map(Subpopulation::empty_clone).collect(),
        }
    }

    /// Number of subpopulations
    pub fn num_subpops(&self) -> usize {
        self.subpops.len()
    }
}

/// Prelude for the population module
pub mod prelude {
    pub use super::species::{Species, SpeciesId};
    pub use super::{Individual, Population, Subpopulation};
}
