//! Species: shared prototypes for a subpopulation
//!
//! A species carries the prototypes every individual of a subpopulation
//! is cloned from (genome shape, fitness kind and bounds, breeding
//! pipeline) plus the operator parameters the pipelines read.
//! Individuals hold a [`SpeciesId`] into the evolution state's species
//! arena rather than a back-pointer.
//!
//! Class tags from the parameter file are resolved through registries
//! built at program start instead of reflection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::breed::pipeline::BreedingPipeline;
use crate::breed::selection::{EsSelection, Spea2TournamentSelection, TournamentSelection};
use crate::breed::MutationPipeline;
use crate::error::SetupError;
use crate::fitness::{Fitness, MultiObjectiveFitness, ObjectiveBounds, Spea2Fitness};
use crate::genome::{Genome, TreeNode};
use crate::params::Parameters;

use super::Individual;

/// Index into the species arena owned by the evolution state
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub usize);

/// Shared prototypes and operator parameters for one subpopulation
pub struct Species {
    /// Arena index of this species
    pub id: SpeciesId,
    /// Genome every individual starts from
    pub genome_prototype: Genome,
    /// Fitness every individual starts from
    pub fitness_prototype: Fitness,
    /// Breeding pipeline, cloned per breeding thread before use
    pub pipeline_prototype: Box<dyn BreedingPipeline>,
    /// Per-gene mutation probability
    pub mutation_prob: f64,
    /// Gaussian mutation step for numeric genomes
    pub mutation_sigma: f64,
    /// Lower gene bound for numeric genomes
    pub gene_min: f64,
    /// Upper gene bound for numeric genomes
    pub gene_max: f64,
}

impl std::fmt::Debug for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Species")
            .field("id", &self.id)
            .field("genome", &self.genome_prototype.kind())
            .field("fitness", &self.fitness_prototype.kind())
            .finish_non_exhaustive()
    }
}

impl Species {
    /// Clone the prototypes into a fresh, unevaluated individual
    pub fn new_individual(&self) -> Individual {
        Individual::new(
            self.genome_prototype.clone(),
            self.fitness_prototype.clone(),
            self.id,
        )
    }

    /// Build a species from `pop.subpop.<s>.*` parameters
    ///
    /// Recognized keys (with defaults): `species` (genome tag, required),
    /// `genome-size` (8), `fitness` (`scalar`), `pipe` (`es-mutation`),
    /// `mutation-prob` (1.0), `mutation-sigma` (1.0), `min-gene` (0.0),
    /// `max-gene` (1.0). Multi-objective fitnesses read the global
    /// `multi.*` parameters.
    pub fn from_params(
        params: &Parameters,
        subpop: usize,
        id: SpeciesId,
    ) -> Result<Self, SetupError> {
        let base = format!("pop.subpop.{subpop}");
        let genome_tag = params.require_string(&format!("{base}.species"))?;
        let genome_size = params.get_int(&format!("{base}.genome-size"), 8)? as usize;
        let genome_prototype = genome_registry().create(genome_tag, genome_size).map_err(
            |_| SetupError::UnknownTag {
                path: format!("{base}.species"),
                tag: genome_tag.to_string(),
            },
        )?;

        let fitness_tag = params
            .get_string(&format!("{base}.fitness"))
            .unwrap_or("scalar");
        let fitness_prototype = match fitness_tag {
            "scalar" => Fitness::Scalar(0.0),
            "multi" | "spea2" => {
                let bounds = ObjectiveBounds::from_params(params)?;
                let maximize = params.get_bool("multi.maximize", true)?;
                let base_fitness = MultiObjectiveFitness::new(bounds, maximize);
                if fitness_tag == "multi" {
                    Fitness::Multi(base_fitness)
                } else {
                    Fitness::Spea2(Spea2Fitness::new(base_fitness))
                }
            }
            other => {
                return Err(SetupError::UnknownTag {
                    path: format!("{base}.fitness"),
                    tag: other.to_string(),
                })
            }
        };

        let pipe_tag = params
            .get_string(&format!("{base}.pipe"))
            .unwrap_or("es-mutation");
        let pipeline_prototype = pipeline_registry().create(pipe_tag).map_err(|_| {
            SetupError::UnknownTag {
                path: format!("{base}.pipe"),
                tag: pipe_tag.to_string(),
            }
        })?;

        Ok(Self {
            id,
            genome_prototype,
            fitness_prototype,
            pipeline_prototype,
            mutation_prob: params.get_float(&format!("{base}.mutation-prob"), 1.0)?,
            mutation_sigma: params.get_float(&format!("{base}.mutation-sigma"), 1.0)?,
            gene_min: params.get_float(&format!("{base}.min-gene"), 0.0)?,
            gene_max: params.get_float(&format!("{base}.max-gene"), 1.0)?,
        })
    }
}

/// Registry of genome constructors by class tag
pub struct GenomeRegistry {
    map: HashMap<&'static str, fn(usize) -> Genome>,
}

impl GenomeRegistry {
    /// Look up a tag and build a genome of `len` genes
    pub fn create(&self, tag: &str, len: usize) -> Result<Genome, SetupError> {
        let ctor = self.map.get(tag).ok_or_else(|| SetupError::UnknownTag {
            path: "species".to_string(),
            tag: tag.to_string(),
        })?;
        Ok(ctor(len))
    }
}

/// The standard genome registry
pub fn genome_registry() -> GenomeRegistry {
    let mut map: HashMap<&'static str, fn(usize) -> Genome> = HashMap::new();
    map.insert("int-vector", |len| Genome::IntVector(vec![0; len]));
    map.insert("long-vector", |len| Genome::LongVector(vec![0; len]));
    map.insert("float-vector", |len| Genome::FloatVector(vec![0.0; len]));
    map.insert("bit-vector", |len| Genome::BitVector(vec![false; len]));
    map.insert("tree", |_| Genome::Tree(TreeNode::leaf(0)));
    GenomeRegistry { map }
}

/// Registry of breeding-pipeline constructors by class tag
pub struct PipelineRegistry {
    map: HashMap<&'static str, fn() -> Box<dyn BreedingPipeline>>,
}

impl PipelineRegistry {
    /// Look up a tag and build a pipeline prototype
    pub fn create(&self, tag: &str) -> Result<Box<dyn BreedingPipeline>, SetupError> {
        let ctor = self.map.get(tag).ok_or_else(|| SetupError::UnknownTag {
            path: "pipe".to_string(),
            tag: tag.to_string(),
        })?;
        Ok(ctor())
    }
}

/// The standard pipeline registry
pub fn pipeline_registry() -> PipelineRegistry {
    let mut map: HashMap<&'static str, fn() -> Box<dyn BreedingPipeline>> = HashMap::new();
    map.insert("es-mutation", || {
        Box::new(MutationPipeline::new(Box::new(EsSelection::new())))
    });
    map.insert("tournament-mutation", || {
        Box::new(MutationPipeline::new(Box::new(TournamentSelection::new(2))))
    });
    map.insert("spea2-tournament-mutation", || {
        Box::new(MutationPipeline::new(Box::new(
            Spea2TournamentSelection::new(2),
        )))
    });
    PipelineRegistry { map }
}
