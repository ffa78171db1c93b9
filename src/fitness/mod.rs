//! Fitness model
//!
//! This module provides the fitness representations the engine selects
//! on: a totally ordered scalar, a Pareto multi-objective fitness with
//! per-objective bounds, and the SPEA2 extension that adds the scalar
//! archive-ranking value.
//!
//! Comparing fitnesses of different kinds (or multi-objective fitnesses
//! that disagree on direction or objective count) is a programming error
//! and panics.

pub mod multi;
pub mod spea2;

pub use multi::{MultiObjectiveFitness, ObjectiveBounds};
pub use spea2::Spea2Fitness;

use serde::{Deserialize, Serialize};

/// A fitness value attached to an individual
///
/// Selection and breeding dispatch on the variant. The comparison
/// operations follow the Pareto rules for the multi-objective variants
/// and plain numeric order for the scalar variant (higher is better).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Fitness {
    /// A single real value, totally ordered, higher is better
    Scalar(f64),
    /// Multi-objective fitness with Pareto dominance
    Multi(MultiObjectiveFitness),
    /// Multi-objective fitness extended with the SPEA2 ranking scalar
    Spea2(Spea2Fitness),
}

impl Fitness {
    /// Strict dominance: true iff `self` beats `other`
    ///
    /// Scalar fitnesses compare numerically. Multi-objective fitnesses
    /// use Pareto strict dominance (at least as good everywhere, strictly
    /// better somewhere). Panics if the two fitnesses are of different
    /// kinds.
    pub fn better_than(&self, other: &Fitness) -> bool {
        match (self, other) {
            (Fitness::Scalar(a), Fitness::Scalar(b)) => a > b,
            (Fitness::Multi(a), Fitness::Multi(b)) => a.better_than(b),
            (Fitness::Spea2(a), Fitness::Spea2(b)) => a.base.better_than(&b.base),
            (a, b) => panic!(
                "attempt to compare fitnesses of different kinds: {} vs {}",
                a.kind(),
                b.kind()
            ),
        }
    }

    /// True iff neither fitness dominates the other
    pub fn equivalent_to(&self, other: &Fitness) -> bool {
        match (self, other) {
            (Fitness::Scalar(a), Fitness::Scalar(b)) => a == b,
            (Fitness::Multi(a), Fitness::Multi(b)) => a.equivalent_to(b),
            (Fitness::Spea2(a), Fitness::Spea2(b)) => a.base.equivalent_to(&b.base),
            (a, b) => panic!(
                "attempt to compare fitnesses of different kinds: {} vs {}",
                a.kind(),
                b.kind()
            ),
        }
    }

    /// Collapse to a single scalar
    ///
    /// Scalar fitness returns its value; multi-objective fitness returns
    /// the maximum objective. This is a fallback for scalar-only
    /// consumers; selection must not rely on it.
    pub fn fitness_scalar(&self) -> f64 {
        match self {
            Fitness::Scalar(v) => *v,
            Fitness::Multi(f) => f.fitness_scalar() as f64,
            Fitness::Spea2(f) => f.base.fitness_scalar() as f64,
        }
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Fitness::Scalar(_) => "scalar",
            Fitness::Multi(_) => "multi-objective",
            Fitness::Spea2(_) => "spea2",
        }
    }

    /// The multi-objective payload, if this fitness has one
    pub fn as_multi(&self) -> Option<&MultiObjectiveFitness> {
        match self {
            Fitness::Scalar(_) => None,
            Fitness::Multi(f) => Some(f),
            Fitness::Spea2(f) => Some(&f.base),
        }
    }

    /// The SPEA2 payload; panics if this is not a SPEA2 fitness
    ///
    /// The SPEA2 breeder owns its subpopulations, so a non-SPEA2 fitness
    /// reaching it is a configuration bug.
    pub fn as_spea2(&self) -> &Spea2Fitness {
        match self {
            Fitness::Spea2(f) => f,
            other => panic!("expected a SPEA2 fitness, found {}", other.kind()),
        }
    }

    /// Mutable SPEA2 payload; panics if this is not a SPEA2 fitness
    pub fn as_spea2_mut(&mut self) -> &mut Spea2Fitness {
        match self {
            Fitness::Spea2(f) => f,
            other => panic!("expected a SPEA2 fitness, found {}", other.kind()),
        }
    }
}

/// Prelude for the fitness module
pub mod prelude {
    pub use super::multi::{MultiObjectiveFitness, ObjectiveBounds};
    pub use super::spea2::Spea2Fitness;
    pub use super::Fitness;
}
