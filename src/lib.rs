//! # evolink
//!
//! An evolutionary breeding and selection engine with a master/slave
//! distributed evaluation protocol.
//!
//! The crate has two halves that meet at the population types:
//!
//! - **Breeding and selection**: the (μ,λ) / (μ+λ) Evolution-Strategies
//!   breeder with one-fifth-rule statistics and a strictly audited
//!   once-per-child ES selection, and the SPEA2 breeder that maintains a
//!   fixed-size archive of non-dominated individuals by iterative
//!   nearest-neighbor pruning.
//! - **Distributed evaluation**: a TCP protocol by which a master hands
//!   batches of individuals to slave processes, which evaluate (or
//!   briefly re-evolve) them and stream back individuals or fitness
//!   deltas. The master's Mersenne-Twister state rides along so the
//!   pseudo-random stream survives checkpoints and process hops.
//!
//! ## Quick start
//!
//! Running a slave against a master at `localhost:9917`:
//!
//! ```rust,no_run
//! use evolink::eval::{Slave, SphereProblem};
//! use evolink::params::Parameters;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut params = Parameters::new();
//!     params.set("eval.master.host", "127.0.0.1");
//!     params.set("eval.master.port", "9917");
//!     params.set("pop.subpop.0.species", "float-vector");
//!
//!     let mut slave = Slave::new(params, Box::new(SphereProblem), None)?;
//!     slave.run()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! - [`fitness`]: scalar, Pareto multi-objective, and SPEA2 fitnesses
//! - [`genome`]: the genome variants the engine carries
//! - [`population`]: individuals, subpopulations, and the species arena
//! - [`breed`]: pipelines, selection primitives, and the breeders
//! - [`codec`]: binary and text encodings of individuals
//! - [`wire`]: framed deflate stream compression
//! - [`rng`]: MT19937 with transferable state
//! - [`eval`]: problem forms and the slave runtime
//! - [`state`]: the evolution state and its registry
//! - [`params`]: the parameter-database surface
//! - [`error`]: error types and the setup error sink

pub mod breed;
pub mod codec;
pub mod error;
pub mod eval;
pub mod fitness;
pub mod genome;
pub mod params;
pub mod population;
pub mod rng;
pub mod state;
pub mod wire;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::breed::prelude::*;
    pub use crate::codec::prelude::*;
    pub use crate::error::*;
    pub use crate::eval::prelude::*;
    pub use crate::fitness::prelude::*;
    pub use crate::genome::prelude::*;
    pub use crate::params::Parameters;
    pub use crate::population::prelude::*;
    pub use crate::rng::MersenneTwister;
    pub use crate::state::{state_registry, EvolutionState, EvolveOutcome};
    pub use crate::wire::prelude::*;
}
