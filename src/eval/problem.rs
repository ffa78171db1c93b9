//! Problem forms
//!
//! A problem form is what a slave applies to the individuals it
//! receives: either one individual at a time (simple) or a group that
//! must be evaluated together (grouped, used by coevolution). Problems
//! write fitness back into the individual and mark it evaluated.

use crate::fitness::Fitness;
use crate::genome::Genome;
use crate::population::Individual;

/// A problem evaluated one individual at a time
pub trait SimpleProblem: Send + Sync {
    /// Evaluate `ind` and store its fitness
    fn evaluate(&self, ind: &mut Individual, subpop: usize, thread: usize);
}

/// A problem evaluated on groups of individuals together
pub trait GroupedProblem: Send + Sync {
    /// Evaluate the group; `update_fitness[i]` marks the individuals
    /// whose fitness should be written, and `count_victories_only`
    /// requests win-counting instead of raw scores
    fn evaluate_group(
        &self,
        inds: &mut [Individual],
        update_fitness: &[bool],
        count_victories_only: bool,
        thread: usize,
    );
}

/// The sphere benchmark: negated sum of squared genes, maximized at zero
///
/// Bit genomes score their set bits, trees their node count, so every
/// genome variant gets a usable scalar.
#[derive(Clone, Copy, Debug, Default)]
pub struct SphereProblem;

impl SphereProblem {
    fn score(genome: &Genome) -> f64 {
        match genome {
            Genome::IntVector(v) => v.iter().map(|g| (*g as f64) * (*g as f64)).sum(),
            Genome::LongVector(v) => v.iter().map(|g| (*g as f64) * (*g as f64)).sum(),
            Genome::FloatVector(v) => v.iter().map(|g| g * g).sum(),
            Genome::BitVector(v) => v.iter().filter(|b| **b).count() as f64,
            Genome::Tree(t) => t.size() as f64,
        }
    }
}

impl SimpleProblem for SphereProblem {
    fn evaluate(&self, ind: &mut Individual, _subpop: usize, _thread: usize) {
        let score = -Self::score(&ind.genome);
        ind.set_fitness(Fitness::Scalar(score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::SpeciesId;

    #[test]
    fn test_sphere_is_maximized_at_origin() {
        let mut origin = Individual::new(
            Genome::FloatVector(vec![0.0, 0.0]),
            Fitness::Scalar(0.0),
            SpeciesId(0),
        );
        let mut off = Individual::new(
            Genome::FloatVector(vec![3.0, 4.0]),
            Fitness::Scalar(0.0),
            SpeciesId(0),
        );
        SphereProblem.evaluate(&mut origin, 0, 0);
        SphereProblem.evaluate(&mut off, 0, 0);
        assert!(origin.evaluated && off.evaluated);
        assert_eq!(origin.fitness, Fitness::Scalar(0.0));
        assert_eq!(off.fitness, Fitness::Scalar(-25.0));
        assert!(origin.fitness.better_than(&off.fitness));
    }
}
