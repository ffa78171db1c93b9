//! Multi-objective fitness and per-objective bounds
//!
//! Objectives are `f32` so the in-memory representation round-trips the
//! binary wire encoding bit for bit. The bounds vector is one shared
//! allocation per species; cloning a fitness clones the objective values
//! and shares the bounds handle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SetupError;
use crate::params::Parameters;

/// Per-objective minimum and maximum values, shared across a species
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBounds {
    min: Vec<f32>,
    max: Vec<f32>,
}

impl ObjectiveBounds {
    /// Create bounds from explicit per-objective vectors
    ///
    /// Requires `min.len() == max.len()` and `min[i] < max[i]` for every
    /// objective.
    pub fn new(min: Vec<f32>, max: Vec<f32>) -> Result<Self, SetupError> {
        assert_eq!(min.len(), max.len(), "bounds vectors must have equal length");
        for (i, (lo, hi)) in min.iter().zip(max.iter()).enumerate() {
            if lo >= hi {
                return Err(SetupError::BadObjectiveBounds { objective: i });
            }
        }
        Ok(Self { min, max })
    }

    /// Create bounds with the same range for every objective
    pub fn uniform(num_objectives: usize, min: f32, max: f32) -> Result<Self, SetupError> {
        Self::new(vec![min; num_objectives], vec![max; num_objectives])
    }

    /// Load bounds from `multi.num-objectives` / `multi.min[.i]` /
    /// `multi.max[.i]` parameters
    ///
    /// `multi.min` and `multi.max` give the all-objective defaults
    /// (0.0 and 1.0 when absent); the indexed forms override per
    /// objective.
    pub fn from_params(params: &Parameters) -> Result<Arc<Self>, SetupError> {
        let n = params.require_int("multi.num-objectives")?;
        if n < 1 {
            return Err(SetupError::BadParameter {
                path: "multi.num-objectives".to_string(),
                message: "the number of objectives must be an integer >= 1".to_string(),
            });
        }
        let n = n as usize;
        let default_min = params.get_float("multi.min", 0.0)? as f32;
        let default_max = params.get_float("multi.max", 1.0)? as f32;
        let mut min = vec![default_min; n];
        let mut max = vec![default_max; n];
        for i in 0..n {
            min[i] = params.get_float(&format!("multi.min.{i}"), min[i] as f64)? as f32;
            max[i] = params.get_float(&format!("multi.max.{i}"), max[i] as f64)? as f32;
        }
        Ok(Arc::new(Self::new(min, max)?))
    }

    /// Number of objectives
    pub fn num_objectives(&self) -> usize {
        self.min.len()
    }

    /// Minimum bound for objective `i`
    pub fn min(&self, i: usize) -> f32 {
        self.min[i]
    }

    /// Maximum bound for objective `i`
    pub fn max(&self, i: usize) -> f32 {
        self.max[i]
    }

    /// The worst legal value for objective `i` under the given direction
    pub fn worst(&self, i: usize, maximize: bool) -> f32 {
        if maximize {
            self.min[i]
        } else {
            self.max[i]
        }
    }
}

/// An ordered sequence of real objectives with a direction flag
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiObjectiveFitness {
    objectives: Vec<f32>,
    maximize: bool,
    bounds: Arc<ObjectiveBounds>,
}

impl MultiObjectiveFitness {
    /// Create a fitness with all objectives at the worst bound
    pub fn new(bounds: Arc<ObjectiveBounds>, maximize: bool) -> Self {
        let objectives = (0..bounds.num_objectives())
            .map(|i| bounds.worst(i, maximize))
            .collect();
        Self {
            objectives,
            maximize,
            bounds,
        }
    }

    /// The objective values
    pub fn objectives(&self) -> &[f32] {
        &self.objectives
    }

    /// Objective value `i`
    pub fn objective(&self, i: usize) -> f32 {
        self.objectives[i]
    }

    /// True if higher objective values are better
    pub fn is_maximizing(&self) -> bool {
        self.maximize
    }

    /// The shared bounds handle
    pub fn bounds(&self) -> &Arc<ObjectiveBounds> {
        &self.bounds
    }

    /// Replace the objective values
    ///
    /// The length must match the configured number of objectives. Any
    /// non-finite entry is replaced by the worst bound for that objective
    /// and a warning is emitted.
    pub fn set_objectives(&mut self, mut new: Vec<f32>) {
        assert_eq!(
            new.len(),
            self.objectives.len(),
            "new objective array length {} does not match configured length {}",
            new.len(),
            self.objectives.len()
        );
        for (i, value) in new.iter_mut().enumerate() {
            if !value.is_finite() {
                let worst = self.bounds.worst(i, self.maximize);
                warn!(
                    objective = i,
                    bad = %value,
                    replacement = worst,
                    "bad objective value, setting to worst value for that objective"
                );
                *value = worst;
            }
        }
        self.objectives = new;
    }

    fn check_comparable(&self, other: &MultiObjectiveFitness) {
        assert_eq!(
            self.maximize, other.maximize,
            "attempt to compare multi-objective fitnesses with different directions"
        );
        assert_eq!(
            self.objectives.len(),
            other.objectives.len(),
            "attempt to compare multi-objective fitnesses with different numbers of objectives"
        );
    }

    /// Pareto strict dominance
    ///
    /// True iff `self` is at least as good as `other` on every objective
    /// and strictly better on at least one.
    pub fn better_than(&self, other: &MultiObjectiveFitness) -> bool {
        self.check_comparable(other);
        let mut beats = false;
        for (a, b) in self.objectives.iter().zip(other.objectives.iter()) {
            let (a, b) = if self.maximize { (a, b) } else { (b, a) };
            if a > b {
                beats = true;
            } else if a < b {
                return false;
            }
        }
        beats
    }

    /// True iff neither side dominates the other
    pub fn equivalent_to(&self, other: &MultiObjectiveFitness) -> bool {
        !self.better_than(other) && !other.better_than(self)
    }

    /// The maximum objective value
    ///
    /// A fallback for scalar-only consumers; selection must not rely on
    /// this.
    pub fn fitness_scalar(&self) -> f32 {
        self.objectives
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Euclidean distance to another fitness in objective space
    pub fn distance_to(&self, other: &MultiObjectiveFitness) -> f64 {
        self.check_comparable(other);
        self.objectives
            .iter()
            .zip(other.objectives.iter())
            .map(|(a, b)| {
                let d = (*a as f64) - (*b as f64);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

// Bounds are a shared handle, not part of a fitness's identity.
impl PartialEq for MultiObjectiveFitness {
    fn eq(&self, other: &Self) -> bool {
        self.maximize == other.maximize && self.objectives == other.objectives
    }
}
