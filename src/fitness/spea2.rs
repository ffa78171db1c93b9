//! SPEA2 fitness extension
//!
//! Extends the multi-objective fitness with the auxiliary values the
//! SPEA2 archive builder computes: the strength-based ranking scalar the
//! archive is sorted on, plus the raw strength and the k-th
//! nearest-neighbor density term it is assembled from. Values below 1
//! mark non-dominated individuals.

use serde::{Deserialize, Serialize};

use super::multi::MultiObjectiveFitness;

/// Multi-objective fitness carrying the SPEA2 ranking scalar
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spea2Fitness {
    /// The underlying objective vector
    pub base: MultiObjectiveFitness,
    /// Combined rank: raw strength-based fitness plus density.
    /// Assigned by the archive builder; < 1 means non-dominated.
    pub spea2_fitness: f64,
    /// Number of individuals this one dominates
    pub strength: f64,
    /// Distance to the k-th nearest neighbor, the density ingredient
    pub kth_nn_distance: f64,
}

impl Spea2Fitness {
    /// Wrap a multi-objective fitness with unranked SPEA2 values
    pub fn new(base: MultiObjectiveFitness) -> Self {
        Self {
            base,
            spea2_fitness: 0.0,
            strength: 0.0,
            kth_nn_distance: 0.0,
        }
    }

    /// Euclidean distance to another individual in objective space
    pub fn calc_distance(&self, other: &Spea2Fitness) -> f64 {
        self.base.distance_to(&other.base)
    }
}

// The archive-ranking values are derived, not identity.
impl PartialEq for Spea2Fitness {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}
