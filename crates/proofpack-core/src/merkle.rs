//! Merkle anchoring over ordered receipt batches.
//!
//! Tree shape:
//! - Leaves are the receipts' [`Receipt::leaf_digest`], in batch order
//! - A level with an odd count pairs its last node with itself
//! - Parents are [`hash_pair`] of the two children, left first
//! - The empty batch has the fixed root `dual_hash(b"empty")`
//!
//! The duplication rule is part of the wire contract: promoting the
//! unpaired node instead would produce different roots for the same batch.
//! Trees are rebuilt from the batch whenever they are needed.

use serde::{Deserialize, Serialize};

use crate::crypto::{dual_hash, hash_pair, Digest};
use crate::error::ValidationError;
use crate::receipt::Receipt;

/// Marker hashed to produce the root of an empty batch.
pub const EMPTY_BATCH_MARKER: &[u8] = b"empty";

/// Root of the empty batch.
pub fn empty_root() -> Digest {
    dual_hash(EMPTY_BATCH_MARKER)
}

/// Which side of the path node a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

/// Everything needed to recompute a root from one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Digest of the proven leaf.
    pub leaf: Digest,
    /// Position of the leaf in the batch.
    pub leaf_index: usize,
    /// Number of receipts in the batch.
    pub batch_size: usize,
    /// Siblings from the leaf level up to just below the root.
    pub steps: Vec<ProofStep>,
}

impl InclusionProof {
    /// Check the proof against a root.
    ///
    /// `Ok(false)` means the digests do not reproduce `expected_root`.
    /// `Err` means the proof itself is inconsistent.
    pub fn verify(&self, leaf: &Digest, expected_root: &Digest) -> Result<bool, ValidationError> {
        self.check_shape()?;
        Ok(self.fold(leaf) == *expected_root)
    }

    /// Replay the proof from `leaf`, returning the root it implies.
    pub fn fold(&self, leaf: &Digest) -> Digest {
        self.steps.iter().fold(*leaf, |current, step| match step.side {
            Side::Left => hash_pair(&step.sibling, &current),
            Side::Right => hash_pair(&current, &step.sibling),
        })
    }

    fn check_shape(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::MalformedProof(
                "empty batch has no members".into(),
            ));
        }
        if self.leaf_index >= self.batch_size {
            return Err(ValidationError::IndexOutOfRange {
                index: self.leaf_index,
                len: self.batch_size,
            });
        }
        let depth = tree_depth(self.batch_size);
        if self.steps.len() != depth {
            return Err(ValidationError::MalformedProof(format!(
                "{} steps for a batch of {} (depth {})",
                self.steps.len(),
                self.batch_size,
                depth
            )));
        }
        let mut index = self.leaf_index;
        for (level, step) in self.steps.iter().enumerate() {
            let expected = if index % 2 == 0 { Side::Right } else { Side::Left };
            if step.side != expected {
                return Err(ValidationError::MalformedProof(format!(
                    "step {level} has side {:?}, leaf index {} implies {:?}",
                    step.side, self.leaf_index, expected
                )));
            }
            index /= 2;
        }
        Ok(())
    }
}

/// Number of pairing rounds needed to reduce `len` leaves to one root.
pub fn tree_depth(len: usize) -> usize {
    let mut depth = 0;
    let mut width = len;
    while width > 1 {
        width = (width + 1) / 2;
        depth += 1;
    }
    depth
}

/// Hash one level into the next.
fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_pair(left, right)
        })
        .collect()
}

/// A fully materialized tree over one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` holds the leaves, the last level holds the root alone.
    /// Empty for the empty batch.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build the tree over a batch of receipts.
    pub fn build(batch: &[Receipt]) -> Self {
        Self::from_leaves(batch.iter().map(Receipt::leaf_digest).collect())
    }

    /// Build the tree over precomputed leaf digests.
    pub fn from_leaves(leaves: Vec<Digest>) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }
        let mut levels = vec![leaves];
        while let Some(top) = levels.last().filter(|l| l.len() > 1) {
            let next = next_level(top);
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> Digest {
        self.levels
            .last()
            .and_then(|top| top.first())
            .copied()
            .unwrap_or_else(empty_root)
    }

    pub fn leaves(&self) -> &[Digest] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.leaves().len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of pairing rounds between the leaves and the root.
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Index of the first leaf equal to `leaf`.
    pub fn position_of(&self, leaf: &Digest) -> Option<usize> {
        self.leaves().iter().position(|l| l == leaf)
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Result<InclusionProof, ValidationError> {
        let leaves = self.leaves();
        let leaf = *leaves.get(index).ok_or(ValidationError::IndexOutOfRange {
            index,
            len: leaves.len(),
        })?;

        let mut steps = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.depth()] {
            let (sibling_pos, side) = if position % 2 == 0 {
                (position + 1, Side::Right)
            } else {
                (position - 1, Side::Left)
            };
            // An unpaired last node is its own sibling
            let sibling = level.get(sibling_pos).unwrap_or(&level[position]);
            steps.push(ProofStep {
                sibling: *sibling,
                side,
            });
            position /= 2;
        }

        Ok(InclusionProof {
            leaf,
            leaf_index: index,
            batch_size: leaves.len(),
            steps,
        })
    }
}

/// Root of a batch. Never fails: the empty batch has a fixed root.
pub fn compute_root(batch: &[Receipt]) -> Digest {
    let mut level: Vec<Digest> = batch.iter().map(Receipt::leaf_digest).collect();
    if level.is_empty() {
        return empty_root();
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build the inclusion proof for `batch[index]`.
pub fn build_inclusion_proof(
    batch: &[Receipt],
    index: usize,
) -> Result<InclusionProof, ValidationError> {
    if index >= batch.len() {
        return Err(ValidationError::IndexOutOfRange {
            index,
            len: batch.len(),
        });
    }
    MerkleTree::build(batch).proof(index)
}

/// Verify a proof given digests in their string form.
///
/// Returns `Ok(false)` on a mismatch. Malformed digests or an inconsistent
/// proof are errors.
pub fn verify_inclusion_proof(
    leaf_digest: &str,
    proof: &InclusionProof,
    expected_root: &str,
) -> Result<bool, ValidationError> {
    let leaf = Digest::parse(leaf_digest)?;
    let root = Digest::parse(expected_root)?;
    proof.verify(&leaf, &root)
}
