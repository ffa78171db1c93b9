//! Breeder integration tests
//!
//! Drives the ES and SPEA2 breeders through whole generations and checks
//! the population-level contracts: child counts, one-fifth statistics,
//! selection discipline, and archive placement.

use evolink::breed::{
    assign_spea2_fitness, Breeder, Comparison, CrossoverPipeline, EsBreeder, EsSelection,
    Spea2Breeder,
};
use evolink::breed::{BreedContext, BreedingPipeline};
use evolink::error::{BreedError, EngineError};
use evolink::fitness::Fitness;
use evolink::genome::Genome;
use evolink::params::Parameters;
use evolink::population::Individual;
use evolink::state::EvolutionState;

fn es_params(mu: usize, lambda: usize, size: usize, mutation_prob: f64) -> Parameters {
    let mut p = Parameters::new();
    p.set("seed", "123");
    p.set("pop.subpops", "1");
    p.set("pop.subpop.0.species", "float-vector");
    p.set("pop.subpop.0.genome-size", "2");
    p.set("pop.subpop.0.size", &size.to_string());
    p.set("pop.subpop.0.mutation-prob", &mutation_prob.to_string());
    p.set("es.mu.0", &mu.to_string());
    p.set("es.lambda.0", &lambda.to_string());
    p
}

fn es_setup(mu: usize, lambda: usize, size: usize, mutation_prob: f64) -> (EvolutionState, EsBreeder) {
    let p = es_params(mu, lambda, size, mutation_prob);
    let state = EvolutionState::from_params(p.clone()).unwrap();
    let breeder = EsBreeder::from_params(&p, 1).unwrap();
    (state, breeder)
}

fn set_scalar_fitness(state: &mut EvolutionState, subpop: usize, values: &[f64]) {
    let inds = &mut state.population.subpops[subpop].individuals;
    assert_eq!(inds.len(), values.len());
    for (ind, value) in inds.iter_mut().zip(values) {
        ind.set_fitness(Fitness::Scalar(*value));
    }
}

/// Two generations, mu=2, lambda=10, three of ten children beat their
/// parents: more than lambda/5, so the comparison reads over-one-fifth.
#[test]
fn one_fifth_rule_over_threshold() {
    let (mut state, mut breeder) = es_setup(2, 10, 2, 0.0);
    set_scalar_fitness(&mut state, 0, &[10.0, 5.0]);

    state.population = breeder.breed_population(&mut state).unwrap();
    assert_eq!(state.population.subpops[0].len(), 10);

    // children 0..4 answer to parent 0 (fitness 10), 5..9 to parent 1
    // (fitness 5); make children 0, 1, and 5 strictly better
    let children: Vec<f64> = (0..10)
        .map(|i| match i {
            0 | 1 => 11.0,
            5 => 6.0,
            _ => 0.0,
        })
        .collect();
    set_scalar_fitness(&mut state, 0, &children);

    state.population = breeder.breed_population(&mut state).unwrap();
    assert_eq!(breeder.comparison[0], Comparison::OverOneFifthBetter);
}

/// Same setup with exactly two better children: lambda/5 exactly.
#[test]
fn one_fifth_rule_exact() {
    let (mut state, mut breeder) = es_setup(2, 10, 2, 0.0);
    set_scalar_fitness(&mut state, 0, &[10.0, 5.0]);
    state.population = breeder.breed_population(&mut state).unwrap();

    let children: Vec<f64> = (0..10)
        .map(|i| match i {
            0 => 11.0,
            5 => 6.0,
            _ => 0.0,
        })
        .collect();
    set_scalar_fitness(&mut state, 0, &children);

    state.population = breeder.breed_population(&mut state).unwrap();
    assert_eq!(breeder.comparison[0], Comparison::ExactlyOneFifthBetter);
}

#[test]
fn one_fifth_rule_under_threshold() {
    let (mut state, mut breeder) = es_setup(2, 10, 2, 0.0);
    set_scalar_fitness(&mut state, 0, &[10.0, 5.0]);
    state.population = breeder.breed_population(&mut state).unwrap();

    set_scalar_fitness(&mut state, 0, &[0.0; 10]);
    state.population = breeder.breed_population(&mut state).unwrap();
    assert_eq!(breeder.comparison[0], Comparison::UnderOneFifthBetter);
}

/// After breeding, every subpopulation holds exactly lambda children and
/// the comparison is one of the three legal values.
#[test]
fn bred_population_has_lambda_children() {
    let (mut state, mut breeder) = es_setup(3, 9, 5, 1.0);
    set_scalar_fitness(&mut state, 0, &[5.0, 4.0, 3.0, 2.0, 1.0]);
    let newpop = breeder.breed_population(&mut state).unwrap();
    assert_eq!(newpop.subpops[0].len(), 9);
    assert!([-1, 0, 1].contains(&breeder.comparison[0].signum()));
    assert!(newpop.subpops[0].individuals.iter().all(|i| !i.evaluated));
}

/// With mutation off, each child is a clone of the ES-selected parent:
/// the selector walks the top-mu round robin, so children alternate
/// between the two best genomes.
#[test]
fn es_selection_draws_parents_from_top_mu() {
    let (mut state, mut breeder) = es_setup(2, 10, 4, 0.0);
    for (i, ind) in state.population.subpops[0]
        .individuals
        .iter_mut()
        .enumerate()
    {
        ind.genome = Genome::FloatVector(vec![i as f64, i as f64]);
        ind.set_fitness(Fitness::Scalar(-(i as f64)));
    }
    // best two by fitness are individuals 0 and 1
    let newpop = breeder.breed_population(&mut state).unwrap();
    for (slot, child) in newpop.subpops[0].individuals.iter().enumerate() {
        let parent = (slot % 2) as f64;
        assert_eq!(
            child.genome,
            Genome::FloatVector(vec![parent, parent]),
            "child {slot} should clone sorted parent {}",
            slot % 2
        );
    }
}

#[test]
fn breeding_splits_slots_across_threads() {
    let mut p = es_params(2, 12, 4, 1.0);
    p.set("breedthreads", "3");
    let mut state = EvolutionState::from_params(p.clone()).unwrap();
    let mut breeder = EsBreeder::from_params(&p, 1).unwrap();
    set_scalar_fitness(&mut state, 0, &[4.0, 3.0, 2.0, 1.0]);

    let newpop = breeder.breed_population(&mut state).unwrap();
    assert_eq!(newpop.subpops[0].len(), 12);
    assert!(newpop.subpops[0].individuals.iter().all(|i| !i.evaluated));
}

/// The last thread absorbs the remainder when lambda does not divide
/// evenly across threads.
#[test]
fn remainder_slots_go_to_the_last_thread() {
    let mut p = es_params(1, 7, 2, 1.0);
    p.set("breedthreads", "3");
    let mut state = EvolutionState::from_params(p.clone()).unwrap();
    let mut breeder = EsBreeder::from_params(&p, 1).unwrap();
    set_scalar_fitness(&mut state, 0, &[2.0, 1.0]);

    let newpop = breeder.breed_population(&mut state).unwrap();
    assert_eq!(newpop.subpops[0].len(), 7);
}

/// A pipeline that never touches the ES selector trips the
/// once-per-child audit.
#[test]
fn pipeline_selecting_zero_times_is_fatal() {
    struct NoSelectPipeline;
    impl BreedingPipeline for NoSelectPipeline {
        fn clone_pipeline(&self) -> Box<dyn BreedingPipeline> {
            Box::new(NoSelectPipeline)
        }
        fn produce(
            &mut self,
            n: usize,
            start: usize,
            _subpop: usize,
            out: &mut [Individual],
            ctx: &mut BreedContext<'_>,
        ) -> Result<usize, BreedError> {
            for slot in start..start + n {
                out[slot] = ctx.species.new_individual();
            }
            Ok(n)
        }
    }

    let (mut state, mut breeder) = es_setup(2, 10, 2, 0.0);
    set_scalar_fitness(&mut state, 0, &[2.0, 1.0]);
    state.species[0].pipeline_prototype = Box::new(NoSelectPipeline);

    let err = breeder.breed_population(&mut state).unwrap_err();
    match err {
        EngineError::Breed(BreedError::EsSelectionMisuse { uses, .. }) => assert_eq!(uses, 0),
        other => panic!("expected an ES selection audit failure, got {other}"),
    }
}

/// Crossover selects two parents per child, which is one too many under
/// the ES strategies.
#[test]
fn pipeline_selecting_twice_is_fatal() {
    let (mut state, mut breeder) = es_setup(2, 10, 2, 0.0);
    set_scalar_fitness(&mut state, 0, &[2.0, 1.0]);
    state.species[0].pipeline_prototype =
        Box::new(CrossoverPipeline::new(Box::new(EsSelection::new())));

    let err = breeder.breed_population(&mut state).unwrap_err();
    match err {
        EngineError::Breed(BreedError::EsSelectionMisuse { uses, .. }) => assert_eq!(uses, 2),
        other => panic!("expected an ES selection audit failure, got {other}"),
    }
}

#[test]
fn subpopulation_smaller_than_mu_is_rejected() {
    let (mut state, mut breeder) = es_setup(4, 8, 2, 1.0);
    set_scalar_fitness(&mut state, 0, &[2.0, 1.0]);
    let err = breeder.breed_population(&mut state).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Breed(BreedError::SubpopulationTooSmall { subpop: 0, size: 2, mu: 4 })
    ));
}

/// (mu+lambda) carries the sorted top-mu parents into the new
/// generation alongside the children.
#[test]
fn mu_plus_lambda_keeps_parents() {
    let p = es_params(2, 6, 4, 0.0);
    let mut state = EvolutionState::from_params(p).unwrap();
    let mut breeder = EsBreeder::mu_plus_lambda(vec![2], vec![6]).unwrap();
    for (i, ind) in state.population.subpops[0]
        .individuals
        .iter_mut()
        .enumerate()
    {
        ind.genome = Genome::FloatVector(vec![i as f64, i as f64]);
        ind.set_fitness(Fitness::Scalar(-(i as f64)));
    }

    let newpop = breeder.breed_population(&mut state).unwrap();
    assert_eq!(newpop.subpops[0].len(), 8);
    // the last two slots are the parents, still evaluated
    let parents = &newpop.subpops[0].individuals[6..];
    assert!(parents.iter().all(|i| i.evaluated));
    assert_eq!(parents[0].genome, Genome::FloatVector(vec![0.0, 0.0]));
    assert_eq!(parents[1].genome, Genome::FloatVector(vec![1.0, 1.0]));
}

fn spea2_state() -> EvolutionState {
    let mut p = Parameters::new();
    p.set("seed", "9");
    p.set("pop.subpops", "1");
    p.set("pop.subpop.0.species", "float-vector");
    p.set("pop.subpop.0.genome-size", "2");
    p.set("pop.subpop.0.size", "5");
    p.set("pop.subpop.0.fitness", "spea2");
    p.set("pop.subpop.0.pipe", "spea2-tournament-mutation");
    p.set("pop.subpop.0.archive-size", "3");
    p.set("multi.num-objectives", "2");
    EvolutionState::from_params(p).unwrap()
}

/// Five evenly spaced non-dominated points pruned to an archive of
/// three: the iterative pruning removes the most crowded points (the
/// center first, then one shoulder), and the archive sits in the last
/// three slots of both the old and the new population.
#[test]
fn spea2_breed_places_pruned_archive_in_top_slots() {
    let mut state = spea2_state();
    let points: [[f32; 2]; 5] = [
        [0.0, 1.0],
        [0.25, 0.75],
        [0.5, 0.5],
        [0.75, 0.25],
        [1.0, 0.0],
    ];
    for (ind, point) in state.population.subpops[0]
        .individuals
        .iter_mut()
        .zip(points.iter())
    {
        ind.fitness.as_spea2_mut().base.set_objectives(point.to_vec());
        ind.evaluated = true;
    }
    assign_spea2_fitness(&mut state.population.subpops[0].individuals);

    let mut breeder = Spea2Breeder::new();
    let newpop = breeder.breed_population(&mut state).unwrap();
    assert_eq!(newpop.subpops[0].len(), 5);

    let archive_points = |inds: &[Individual]| -> Vec<Vec<f32>> {
        let mut points: Vec<Vec<f32>> = inds
            .iter()
            .map(|i| i.fitness.as_spea2().base.objectives().to_vec())
            .collect();
        points.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());
        points
    };
    let expected = vec![vec![0.0, 1.0], vec![0.75, 0.25], vec![1.0, 0.0]];

    // archive in the top block of the new population
    assert_eq!(archive_points(&newpop.subpops[0].individuals[2..]), expected);
    // and rotated to the top block of the old population
    assert_eq!(
        archive_points(&state.population.subpops[0].individuals[2..]),
        expected
    );
    // the non-elite slots were bred fresh
    assert!(newpop.subpops[0].individuals[..2]
        .iter()
        .all(|i| !i.evaluated));
}

#[test]
fn spea2_requires_an_archive_size() {
    let mut state = spea2_state();
    state.population.subpops[0].archive_size = None;
    for ind in &mut state.population.subpops[0].individuals {
        ind.evaluated = true;
    }
    let mut breeder = Spea2Breeder::new();
    assert!(breeder.breed_population(&mut state).is_err());
}
