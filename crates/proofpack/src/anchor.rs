//! Anchor manifests: the exchanged record of one anchored batch.
//!
//! A manifest commits to a batch by its Merkle root and carries enough
//! context (tenant, size, time range, per-leaf digests) for a verifier to
//! recompute the root from the same ordered batch and, on mismatch, say
//! which positions changed.

use proofpack_core::crypto::dual_algorithm_names;
use proofpack_core::receipt::fields;
use proofpack_core::{
    compute_root, ensure_available, payload_from, CoreError, Digest, EncodingError, MerkleTree,
    Payload, Receipt, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Receipt type under which manifests are emitted.
pub const ANCHOR_RECEIPT_TYPE: &str = "anchor";

/// Summary of one anchored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorManifest {
    pub merkle_root: Digest,
    pub batch_size: usize,
    pub tenant_id: String,
    pub hash_algos: Vec<String>,
    /// Earliest receipt timestamp. `None` for the empty batch.
    pub first_timestamp: Option<String>,
    /// Latest receipt timestamp. `None` for the empty batch.
    pub last_timestamp: Option<String>,
    /// Leaf digests in batch order.
    #[serde(default)]
    pub leaf_hashes: Vec<Digest>,
}

impl AnchorManifest {
    /// Describe a batch belonging to `tenant_id`.
    ///
    /// Every receipt must carry `tenant_id`; a mixed batch fails with
    /// [`ValidationError::TenantMismatch`]. The empty batch is valid and
    /// anchors to the empty root.
    pub fn for_batch(tenant_id: &str, batch: &[Receipt]) -> Result<Self, ValidationError> {
        if tenant_id.trim().is_empty() {
            return Err(ValidationError::EmptyTenantId);
        }
        if let Some(stray) = batch.iter().find(|r| r.tenant_id() != tenant_id) {
            return Err(ValidationError::TenantMismatch {
                expected: tenant_id.to_string(),
                found: stray.tenant_id().to_string(),
            });
        }

        let tree = MerkleTree::build(batch);
        // Fixed-width timestamps sort lexically in time order
        let first_timestamp = batch.iter().map(Receipt::timestamp).min().map(str::to_string);
        let last_timestamp = batch.iter().map(Receipt::timestamp).max().map(str::to_string);

        Ok(Self {
            merkle_root: tree.root(),
            batch_size: batch.len(),
            tenant_id: tenant_id.to_string(),
            hash_algos: dual_algorithm_names(),
            first_timestamp,
            last_timestamp,
            leaf_hashes: tree.leaves().to_vec(),
        })
    }

    /// The manifest as an anchor receipt payload.
    ///
    /// `tenant_id` is left out: it is a reserved receipt field and the
    /// anchor receipt carries it itself.
    pub fn to_payload(&self) -> Result<Payload, EncodingError> {
        let mut payload = payload_from(self)?;
        payload.remove(fields::TENANT_ID);
        Ok(payload)
    }

    /// Recover a manifest from an emitted anchor receipt.
    pub fn from_receipt(receipt: &Receipt) -> Result<Self, ValidationError> {
        if receipt.receipt_type() != ANCHOR_RECEIPT_TYPE {
            return Err(ValidationError::InvalidField {
                field: fields::RECEIPT_TYPE,
                reason: format!(
                    "expected '{ANCHOR_RECEIPT_TYPE}', got '{}'",
                    receipt.receipt_type()
                ),
            });
        }
        let mut payload = receipt.payload().clone();
        payload.insert(fields::TENANT_ID.into(), receipt.tenant_id().into());
        serde_json::from_value(payload.into()).map_err(|e| ValidationError::InvalidField {
            field: "manifest",
            reason: e.to_string(),
        })
    }
}

/// Outcome of checking a batch against its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The batch reproduces the anchored root.
    Intact,
    /// The batch does not reproduce the anchored root.
    Tampered {
        expected: Digest,
        actual: Digest,
        /// Positions whose leaf differs from the manifest, when the
        /// manifest carries leaf digests.
        changed_leaves: Vec<usize>,
    },
}

impl Verdict {
    pub fn is_intact(&self) -> bool {
        matches!(self, Verdict::Intact)
    }
}

/// Recompute the root of `batch` and compare it to the manifest.
///
/// A manifest naming an algorithm this build cannot compute is an error,
/// not a mismatch.
pub fn verify_batch(manifest: &AnchorManifest, batch: &[Receipt]) -> Result<Verdict, CoreError> {
    ensure_available(&manifest.hash_algos)?;

    let actual = compute_root(batch);
    if actual == manifest.merkle_root && batch.len() == manifest.batch_size {
        return Ok(Verdict::Intact);
    }

    let leaves: Vec<Digest> = batch.iter().map(Receipt::leaf_digest).collect();
    let changed_leaves = if manifest.leaf_hashes.is_empty() {
        Vec::new()
    } else {
        let longest = leaves.len().max(manifest.leaf_hashes.len());
        (0..longest)
            .filter(|&i| leaves.get(i) != manifest.leaf_hashes.get(i))
            .collect()
    };

    Ok(Verdict::Tampered {
        expected: manifest.merkle_root,
        actual,
        changed_leaves,
    })
}
