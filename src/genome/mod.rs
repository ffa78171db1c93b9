//! Genome representations
//!
//! A genome is one of a small set of variants: an ordered vector of
//! integers, longs, or floats, a bit vector, or an expression tree. The
//! engine never interprets genome contents; it clones, mutates through
//! breeding pipelines, and serializes them. The tagged representation
//! keeps serialization and species dispatch in one place.

pub mod tree;

pub use tree::TreeNode;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// An evolvable genome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Genome {
    /// Ordered sequence of 32-bit integers
    IntVector(Vec<i32>),
    /// Ordered sequence of 64-bit integers
    LongVector(Vec<i64>),
    /// Ordered sequence of reals
    FloatVector(Vec<f64>),
    /// Ordered sequence of bits
    BitVector(Vec<bool>),
    /// Expression tree
    Tree(TreeNode),
}

impl Genome {
    /// Number of genes (nodes, for trees)
    pub fn len(&self) -> usize {
        match self {
            Genome::IntVector(v) => v.len(),
            Genome::LongVector(v) => v.len(),
            Genome::FloatVector(v) => v.len(),
            Genome::BitVector(v) => v.len(),
            Genome::Tree(t) => t.size(),
        }
    }

    /// True if the genome has no genes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the variant, for species tags and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Genome::IntVector(_) => "int-vector",
            Genome::LongVector(_) => "long-vector",
            Genome::FloatVector(_) => "float-vector",
            Genome::BitVector(_) => "bit-vector",
            Genome::Tree(_) => "tree",
        }
    }

    /// True if both genomes are the same variant
    pub fn same_variant(&self, other: &Genome) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Return a copy resized to `len` genes
    ///
    /// The shorter prefix of the existing genes is copied into a fresh
    /// array starting at index 0; new slots are zero (false for bits).
    /// Tree genomes do not have a length to set; the tree is returned
    /// unchanged.
    pub fn with_length(&self, len: usize) -> Genome {
        fn resize<T: Clone + Default>(v: &[T], len: usize) -> Vec<T> {
            let mut out = vec![T::default(); len];
            let n = v.len().min(len);
            out[..n].clone_from_slice(&v[..n]);
            out
        }
        match self {
            Genome::IntVector(v) => Genome::IntVector(resize(v, len)),
            Genome::LongVector(v) => Genome::LongVector(resize(v, len)),
            Genome::FloatVector(v) => Genome::FloatVector(resize(v, len)),
            Genome::BitVector(v) => Genome::BitVector(resize(v, len)),
            Genome::Tree(t) => Genome::Tree(t.clone()),
        }
    }

    /// Randomize the genes in place
    ///
    /// Numeric variants draw uniformly from `[lo, hi)` (truncated for the
    /// integer variants); bits are fair coin flips. Tree genomes keep
    /// their structure and randomize leaf symbols.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, lo: f64, hi: f64) {
        match self {
            Genome::IntVector(v) => {
                for g in v.iter_mut() {
                    *g = rng.gen_range(lo..hi) as i32;
                }
            }
            Genome::LongVector(v) => {
                for g in v.iter_mut() {
                    *g = rng.gen_range(lo..hi) as i64;
                }
            }
            Genome::FloatVector(v) => {
                for g in v.iter_mut() {
                    *g = rng.gen_range(lo..hi);
                }
            }
            Genome::BitVector(v) => {
                for g in v.iter_mut() {
                    *g = rng.gen_bool(0.5);
                }
            }
            Genome::Tree(t) => t.randomize_leaves(rng),
        }
    }
}

/// Prelude for the genome module
pub mod prelude {
    pub use super::tree::TreeNode;
    pub use super::Genome;
}
