//! SPEA2 archive breeding
//!
//! The SPEA2 breeder carries a fixed-size archive of the best-so-far
//! non-dominated individuals between generations. Out of N evaluated
//! individuals it keeps a front of size A: all non-dominated individuals
//! fit the archive directly; when there are too many, the archive is
//! pruned iteratively by dropping the individual with the nearest
//! neighbor in the still-overpopulated archive.
//!
//! All undominated individuals have a SPEA2 ranking below 1, so after
//! sorting they precede every dominated one no matter what; the hard
//! work only happens when there are too many undominated.
//!
//! The distance matrix and the per-row sorted index lists are reused
//! across generations; they grow but never shrink. This is safe because
//! elite loading runs on a single thread before breeding threads start.

use tracing::debug;

use crate::error::{BreedError, EngineResult, SetupError};
use crate::population::{Individual, Population, Species};
use crate::rng::MersenneTwister;
use crate::state::EvolutionState;

use super::pipeline::BreedContext;
use super::Breeder;

/// Breeder that maintains the SPEA2 archive in the last `archive_size`
/// slots of each old subpopulation and refills the rest through the
/// breeding pipelines
#[derive(Default)]
pub struct Spea2Breeder {
    distances: Vec<Vec<f64>>,
    sorted_index: Vec<Vec<usize>>,
}

impl Spea2Breeder {
    /// Create a breeder with empty scratch buffers
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_scratch(&mut self, n: usize) {
        if self.distances.len() < n {
            self.distances = vec![vec![0.0; n]; n];
            self.sorted_index = vec![vec![0; n]; n];
        }
    }

    /// Build the archive out of `old`
    ///
    /// Sorts `old` ascending by SPEA2 ranking, keeps every non-dominated
    /// individual (ranking < 1) plus enough of the best dominated ones to
    /// reach `archive_size`, and prunes by nearest-neighbor density when
    /// the non-dominated front is too large. The survivors are cloned
    /// into the top of `new_inds` and rotated to the top of `old`, where
    /// the archive tournament expects them.
    pub fn load_elites(
        &mut self,
        old: &mut Vec<Individual>,
        new_inds: &mut [Individual],
        archive_size: usize,
    ) {
        let len = old.len();
        assert!(
            archive_size >= 1 && archive_size <= len,
            "archive size {archive_size} out of range for subpopulation of {len}"
        );

        old.sort_by(|a, b| {
            let a = a.fitness.as_spea2().spea2_fitness;
            let b = b.fitness.as_spea2().spea2_fitness;
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });

        // Count the candidates: the first archive_size entries stay
        // unconditionally, and beyond that only non-dominated ones
        // (ranking < 1) survive. Sorting put all of those in front.
        let mut removed = vec![false; len];
        let mut n_index = 1usize;
        for x in 0..len {
            if n_index > archive_size && old[x].fitness.as_spea2().spea2_fitness >= 1.0 {
                removed[x] = true;
            } else {
                n_index += 1;
            }
        }
        n_index -= 1;

        if n_index > archive_size {
            self.truncate_by_density(old, &mut removed, n_index, archive_size);
        }

        // Compact the survivors and clone them into the top block of the
        // new population, best ranking at the highest index.
        let survivors: Vec<usize> = (0..n_index).filter(|&i| !removed[i]).collect();
        debug_assert_eq!(survivors.len(), archive_size);
        let new_len = new_inds.len();
        for (k, &idx) in survivors.iter().enumerate() {
            new_inds[new_len - 1 - k] = old[idx].clone();
        }

        // Rotate the old array so the archive occupies the last
        // archive_size slots; the archive tournament depends on the
        // survivors living in the high indexes. The displaced dominated
        // individuals fill the low slots and are never selected.
        let mut archive = Vec::with_capacity(archive_size);
        let mut others = Vec::with_capacity(len - archive_size);
        let mut survivor_set = vec![false; len];
        for &idx in &survivors {
            survivor_set[idx] = true;
        }
        for (i, ind) in std::mem::take(old).into_iter().enumerate() {
            if survivor_set[i] {
                archive.push(ind);
            } else {
                others.push(ind);
            }
        }
        old.extend(others);
        old.extend(archive.into_iter().rev());
    }

    /// Iteratively drop the candidate with the nearest neighbor until
    /// only `archive_size` remain
    fn truncate_by_density(
        &mut self,
        old: &[Individual],
        removed: &mut [bool],
        n_index: usize,
        archive_size: usize,
    ) {
        debug!(candidates = n_index, archive_size, "truncating the archive");
        self.ensure_scratch(n_index);
        let distances = &mut self.distances;
        let sorted_index = &mut self.sorted_index;

        for y in 0..n_index {
            for z in y + 1..n_index {
                let d = old[y]
                    .fitness
                    .as_spea2()
                    .calc_distance(old[z].fitness.as_spea2());
                distances[y][z] = d;
                distances[z][y] = d;
            }
            // Every row's nearest entry is itself at -1: an n-way tie
            // that prunes nobody, skipped by starting the scans at rank 1.
            distances[y][y] = -1.0;
        }

        // Per-row index lists sorted ascending by distance; insertion
        // sort beats quicksort at these sizes.
        for i in 0..n_index {
            sorted_index[i][0] = 0;
            for j in 1..n_index {
                let mut k = j;
                while k > 0 && distances[i][j] < distances[i][sorted_index[i][k - 1]] {
                    sorted_index[i][k] = sorted_index[i][k - 1];
                    k -= 1;
                }
                sorted_index[i][k] = j;
            }
        }

        let mut mf = n_index;
        while mf > archive_size {
            // The row whose distance sequence (from rank 1 on) is
            // lexicographically smallest loses.
            let mut minpos = 0;
            for i in 1..n_index {
                for j in 1..mf {
                    let dist_i = distances[i][sorted_index[i][j]];
                    let dist_min = distances[minpos][sorted_index[minpos][j]];
                    if dist_i < dist_min {
                        minpos = i;
                        break;
                    } else if dist_i > dist_min {
                        break;
                    }
                }
            }

            // Kill minpos: its distances become infinite in both
            // directions and it bubbles to the end of every row's valid
            // prefix.
            for i in 0..n_index {
                distances[i][minpos] = f64::INFINITY;
                distances[minpos][i] = f64::INFINITY;
                let row = &mut sorted_index[i];
                for j in 1..mf - 1 {
                    if row[j] == minpos {
                        row.swap(j, j + 1);
                    }
                }
            }
            removed[minpos] = true;
            mf -= 1;
        }
    }

    fn breed_chunk(
        thread: usize,
        chunks: Vec<&mut [Individual]>,
        rng: &mut MersenneTwister,
        population: &Population,
        species: &[Species],
        archives: &[usize],
    ) -> Result<(), BreedError> {
        for (s, chunk) in chunks.into_iter().enumerate() {
            let subpop = &population.subpops[s];
            let sp = &species[subpop.species.0];
            let mut pipeline = sp.pipeline_prototype.clone_pipeline();
            let mut ctx = BreedContext::new(thread, &mut *rng, sp, &subpop.individuals)
                .with_archive(archives[s]);
            pipeline.prepare_to_produce(s, &mut ctx);
            for slot in 0..chunk.len() {
                let produced = pipeline.produce(1, slot, s, &mut *chunk, &mut ctx)?;
                if produced != 1 {
                    return Err(BreedError::WrongProductionCount {
                        subpop: s,
                        produced,
                    });
                }
                if !chunk[slot].genome.same_variant(&sp.genome_prototype) {
                    return Err(BreedError::WrongSpecies { subpop: s });
                }
            }
            pipeline.finish_producing(s, &mut ctx);
        }
        Ok(())
    }
}

impl Breeder for Spea2Breeder {
    /// Breed the next generation
    ///
    /// Loads the archive into the top block of the new population on the
    /// main thread, then refills the remaining slots through the
    /// breeding pipelines across the configured threads. Pipelines
    /// select from the old population, whose archive now sits in the
    /// high indexes.
    fn breed_population(&mut self, state: &mut EvolutionState) -> EngineResult<Population> {
        let mut newpop = state.population.empty_clone();
        let mut archives = Vec::with_capacity(newpop.num_subpops());
        for (s, subpop) in newpop.subpops.iter_mut().enumerate() {
            let len = state.population.subpops[s].len();
            let sp = &state.species[subpop.species.0];
            subpop.individuals.resize_with(len, || sp.new_individual());
            archives.push(state.population.subpops[s].archive_size.ok_or_else(|| {
                SetupError::MissingParameter(format!("pop.subpop.{s}.archive-size"))
            })?);
        }

        // Archive construction runs on the main thread before any
        // breeding thread exists; the scratch matrices rely on that.
        for s in 0..newpop.num_subpops() {
            let old = &mut state.population.subpops[s].individuals;
            let new_inds = &mut newpop.subpops[s].individuals;
            self.load_elites(old, new_inds, archives[s]);
        }

        let threads = state.breedthreads.max(1);
        assert!(
            state.random.len() >= threads,
            "need one generator per breeding thread ({} < {threads})",
            state.random.len()
        );
        let num_subpops = newpop.num_subpops();

        // Divvy the non-elite slots; the archive block at the top is
        // already filled and stays untouched.
        let regions: Vec<usize> = newpop
            .subpops
            .iter()
            .enumerate()
            .map(|(s, sp)| sp.individuals.len() - archives[s])
            .collect();
        let mut per_thread: Vec<Vec<&mut [Individual]>> = Vec::with_capacity(threads);
        {
            let mut rests: Vec<&mut [Individual]> = newpop
                .subpops
                .iter_mut()
                .enumerate()
                .map(|(s, sp)| &mut sp.individuals[..regions[s]])
                .collect();
            for t in 0..threads {
                let mut chunks = Vec::with_capacity(num_subpops);
                for (s, rest_slot) in rests.iter_mut().enumerate() {
                    let region = regions[s];
                    let n = if t + 1 < threads {
                        region / threads
                    } else {
                        region - (region / threads) * (threads - 1)
                    };
                    let rest = std::mem::take(rest_slot);
                    let (chunk, tail) = rest.split_at_mut(n);
                    *rest_slot = tail;
                    chunks.push(chunk);
                }
                per_thread.push(chunks);
            }
        }

        let population = &state.population;
        let species = state.species.as_slice();
        let archives_ref = archives.as_slice();
        let rngs = &mut state.random[..threads];

        let results: Vec<Result<(), BreedError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = per_thread
                .into_iter()
                .zip(rngs.iter_mut())
                .enumerate()
                .map(|(t, (chunks, rng))| {
                    scope.spawn(move || {
                        Self::breed_chunk(t, chunks, rng, population, species, archives_ref)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });
        for result in results {
            result?;
        }
        Ok(newpop)
    }
}

/// Assign SPEA2 rankings to a whole subpopulation
///
/// Strength is the number of individuals one dominates; the raw fitness
/// is the summed strength of one's dominators; the density term is
/// `1 / (2 + d_k)` with `d_k` the distance to the k-th nearest neighbor,
/// k = sqrt(N). Non-dominated individuals end up with rankings below 1.
pub fn assign_spea2_fitness(individuals: &mut [Individual]) {
    let n = individuals.len();
    if n == 0 {
        return;
    }

    let mut strength = vec![0.0f64; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && individuals[i].fitness.better_than(&individuals[j].fitness) {
                strength[i] += 1.0;
            }
        }
    }

    let mut raw = vec![0.0f64; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && individuals[j].fitness.better_than(&individuals[i].fitness) {
                raw[i] += strength[j];
            }
        }
    }

    let k = (n as f64).sqrt() as usize;
    let mut neighbor_distances = Vec::with_capacity(n.saturating_sub(1));
    for i in 0..n {
        neighbor_distances.clear();
        for j in 0..n {
            if i != j {
                neighbor_distances.push(
                    individuals[i]
                        .fitness
                        .as_spea2()
                        .calc_distance(individuals[j].fitness.as_spea2()),
                );
            }
        }
        neighbor_distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let kth = match neighbor_distances.last() {
            Some(_) => neighbor_distances[k.min(neighbor_distances.len() - 1)],
            None => 0.0,
        };

        let fitness = individuals[i].fitness.as_spea2_mut();
        fitness.strength = strength[i];
        fitness.kth_nn_distance = kth;
        fitness.spea2_fitness = raw[i] + 1.0 / (2.0 + kth);
    }
}
