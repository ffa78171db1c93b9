//! Expression-tree genome
//!
//! A minimal tree representation: each node carries an opaque symbol and
//! its children. The engine only needs structure (for cloning, sizing,
//! and serialization); symbol meaning belongs to the problem.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One node of a tree genome
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Problem-defined symbol
    pub symbol: i32,
    /// Child subtrees, in order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// A leaf node
    pub fn leaf(symbol: i32) -> Self {
        Self {
            symbol,
            children: Vec::new(),
        }
    }

    /// An internal node
    pub fn branch(symbol: i32, children: Vec<TreeNode>) -> Self {
        Self { symbol, children }
    }

    /// Total number of nodes in this subtree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Depth of this subtree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeNode::depth)
            .max()
            .unwrap_or(0)
    }

    /// Replace every leaf symbol with a random value in `0..256`
    pub fn randomize_leaves<R: Rng>(&mut self, rng: &mut R) {
        if self.children.is_empty() {
            self.symbol = rng.gen_range(0..256);
        } else {
            for child in &mut self.children {
                child.randomize_leaves(rng);
            }
        }
    }
}
