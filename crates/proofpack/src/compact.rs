//! Compaction: folding a span of old receipts into one summary record.
//!
//! A [`Compaction`] groups the span by receipt type and keeps the leaf
//! digest of every member, so the summary still commits to each original
//! receipt while the receipts themselves can be archived.

use std::collections::BTreeMap;

use proofpack_core::receipt::fields;
use proofpack_core::{
    canonicalize, compute_root, dual_hash, payload_from, CoreError, Digest, EncodingError,
    MerkleTree, Payload, Receipt, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Receipt type under which compaction summaries are emitted.
pub const COMPACTION_RECEIPT_TYPE: &str = "compaction";

/// Prefix of a group's receipt type.
pub const COMPACTED_PREFIX: &str = "compacted_";

/// All receipts of one type within a compacted span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactedGroup {
    /// `compacted_<original type>`.
    pub receipt_type: String,
    pub count: usize,
    /// Leaf digests of the members, in span order.
    pub original_hashes: Vec<Digest>,
}

/// Record counts on either side of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub before: usize,
    pub after: usize,
}

/// Summary of one compacted span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compaction {
    pub tenant_id: String,
    /// Positions `[start, end)` of the compacted receipts in the ledger.
    pub input_span: [usize; 2],
    /// Positions of the groups in the summary.
    pub output_span: [usize; 2],
    pub counts: Counts,
    /// Root over the input receipts.
    pub before_root: Digest,
    /// Root over the groups.
    pub after_root: Digest,
    /// Every input receipt is accounted for by exactly one group entry.
    pub hash_continuity: bool,
    pub groups: Vec<CompactedGroup>,
}

impl Compaction {
    /// Summarize the receipts covering `span`.
    ///
    /// The span must be as long as `receipts` and every receipt must belong
    /// to `tenant_id`. Groups are ordered by receipt type.
    pub fn summarize(
        tenant_id: &str,
        span: (usize, usize),
        receipts: &[Receipt],
    ) -> Result<Self, CoreError> {
        if tenant_id.trim().is_empty() {
            return Err(ValidationError::EmptyTenantId.into());
        }
        let (start, end) = span;
        if end < start || end - start != receipts.len() {
            return Err(ValidationError::InvalidField {
                field: "input_span",
                reason: format!("[{start}, {end}) does not cover {} receipts", receipts.len()),
            }
            .into());
        }
        if let Some(stray) = receipts.iter().find(|r| r.tenant_id() != tenant_id) {
            return Err(ValidationError::TenantMismatch {
                expected: tenant_id.to_string(),
                found: stray.tenant_id().to_string(),
            }
            .into());
        }

        let mut by_type: BTreeMap<&str, Vec<Digest>> = BTreeMap::new();
        for receipt in receipts {
            by_type
                .entry(receipt.receipt_type())
                .or_default()
                .push(receipt.leaf_digest());
        }
        let groups: Vec<CompactedGroup> = by_type
            .into_iter()
            .map(|(receipt_type, original_hashes)| CompactedGroup {
                receipt_type: format!("{COMPACTED_PREFIX}{receipt_type}"),
                count: original_hashes.len(),
                original_hashes,
            })
            .collect();

        let mut compaction = Self {
            tenant_id: tenant_id.to_string(),
            input_span: [start, end],
            output_span: [0, groups.len()],
            counts: Counts {
                before: receipts.len(),
                after: groups.len(),
            },
            before_root: compute_root(receipts),
            after_root: group_root(&groups)?,
            hash_continuity: false,
            groups,
        };
        compaction.hash_continuity = compaction.violation(receipts).is_none();
        Ok(compaction)
    }

    /// Describe the first way this summary fails to account for
    /// `receipts`, or `None` if it accounts for each exactly once.
    pub fn violation(&self, receipts: &[Receipt]) -> Option<String> {
        if self.counts.before != receipts.len() {
            return Some(format!(
                "counts.before is {} but the span holds {} receipts",
                self.counts.before,
                receipts.len()
            ));
        }
        let grouped: usize = self.groups.iter().map(|g| g.count).sum();
        if grouped != self.counts.before {
            return Some(format!(
                "groups hold {grouped} receipts, counts.before is {}",
                self.counts.before
            ));
        }
        if let Some(group) = self.groups.iter().find(|g| g.count != g.original_hashes.len()) {
            return Some(format!(
                "group {} counts {} but lists {} hashes",
                group.receipt_type,
                group.count,
                group.original_hashes.len()
            ));
        }
        if self.counts.after != self.groups.len() {
            return Some(format!(
                "counts.after is {} but the summary holds {} groups",
                self.counts.after,
                self.groups.len()
            ));
        }

        let mut kept: Vec<Digest> = self
            .groups
            .iter()
            .flat_map(|g| g.original_hashes.iter().copied())
            .collect();
        let mut input: Vec<Digest> = receipts.iter().map(Receipt::leaf_digest).collect();
        kept.sort_unstable();
        input.sort_unstable();
        if kept != input {
            return Some("group hashes differ from the input receipts".to_string());
        }

        if self.before_root != compute_root(receipts) {
            return Some(format!("before_root {} does not match the span", self.before_root));
        }
        None
    }

    /// The summary as a compaction receipt payload, without the reserved
    /// `tenant_id`.
    pub fn to_payload(&self) -> Result<Payload, EncodingError> {
        let mut payload = payload_from(self)?;
        payload.remove(fields::TENANT_ID);
        Ok(payload)
    }

    /// Recover a summary from an emitted compaction receipt.
    pub fn from_receipt(receipt: &Receipt) -> Result<Self, ValidationError> {
        if receipt.receipt_type() != COMPACTION_RECEIPT_TYPE {
            return Err(ValidationError::InvalidField {
                field: fields::RECEIPT_TYPE,
                reason: format!(
                    "expected '{COMPACTION_RECEIPT_TYPE}', got '{}'",
                    receipt.receipt_type()
                ),
            });
        }
        let mut payload = receipt.payload().clone();
        payload.insert(fields::TENANT_ID.into(), receipt.tenant_id().into());
        serde_json::from_value(payload.into()).map_err(|e| ValidationError::InvalidField {
            field: "compaction",
            reason: e.to_string(),
        })
    }
}

fn group_root(groups: &[CompactedGroup]) -> Result<Digest, EncodingError> {
    let leaves = groups
        .iter()
        .map(|g| Ok(dual_hash(canonicalize(g)?.as_bytes())))
        .collect::<Result<Vec<_>, EncodingError>>()?;
    Ok(MerkleTree::from_leaves(leaves).root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofpack_core::{empty_root, FixedClock, ReceiptBuilder};

    fn receipt(receipt_type: &str, tenant: &str, seq: i64) -> Receipt {
        ReceiptBuilder::new(receipt_type, tenant)
            .field("seq", seq)
            .build(&FixedClock::from_millis(seq))
            .unwrap()
    }

    fn span() -> Vec<Receipt> {
        vec![
            receipt("ingest", "t1", 0),
            receipt("verify", "t1", 1),
            receipt("ingest", "t1", 2),
            receipt("anchor", "t1", 3),
            receipt("ingest", "t1", 4),
        ]
    }

    #[test]
    fn test_groups_by_type() {
        let receipts = span();
        let compaction = Compaction::summarize("t1", (10, 15), &receipts).unwrap();

        let types: Vec<&str> = compaction.groups.iter().map(|g| g.receipt_type.as_str()).collect();
        assert_eq!(types, vec!["compacted_anchor", "compacted_ingest", "compacted_verify"]);
        assert_eq!(compaction.counts, Counts { before: 5, after: 3 });
        assert_eq!(compaction.input_span, [10, 15]);
        assert_eq!(compaction.output_span, [0, 3]);
        assert_eq!(compaction.before_root, compute_root(&receipts));
        assert!(compaction.hash_continuity);

        let ingest = &compaction.groups[1];
        assert_eq!(ingest.count, 3);
        assert_eq!(
            ingest.original_hashes,
            vec![receipts[0].leaf_digest(), receipts[2].leaf_digest(), receipts[4].leaf_digest()]
        );
        assert!(compaction.violation(&receipts).is_none());
    }

    #[test]
    fn test_empty_span() {
        let compaction = Compaction::summarize("t1", (7, 7), &[]).unwrap();
        assert_eq!(compaction.counts, Counts { before: 0, after: 0 });
        assert_eq!(compaction.before_root, empty_root());
        assert_eq!(compaction.after_root, empty_root());
        assert!(compaction.hash_continuity);
    }

    #[test]
    fn test_after_root_tracks_groups() {
        let receipts = span();
        let a = Compaction::summarize("t1", (0, 5), &receipts).unwrap();
        let b = Compaction::summarize("t1", (0, 4), &receipts[..4]).unwrap();
        assert_ne!(a.after_root, b.after_root);
        assert_ne!(a.before_root, a.after_root);
    }

    #[test]
    fn test_span_must_cover_receipts() {
        let err = Compaction::summarize("t1", (0, 3), &span()).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::InvalidField { field: "input_span", .. })
        ));
        assert!(Compaction::summarize("t1", (5, 0), &span()).is_err());
    }

    #[test]
    fn test_mixed_tenants_rejected() {
        let mut receipts = span();
        receipts.push(receipt("ingest", "t2", 5));
        let err = Compaction::summarize("t1", (0, 6), &receipts).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::TenantMismatch {
                expected: "t1".into(),
                found: "t2".into()
            })
        );
    }

    #[test]
    fn test_violation_detects_lost_receipt() {
        let receipts = span();
        let mut compaction = Compaction::summarize("t1", (0, 5), &receipts).unwrap();
        compaction.groups[1].original_hashes.pop();
        compaction.groups[1].count -= 1;

        let violation = compaction.violation(&receipts).unwrap();
        assert!(violation.contains("groups hold 4"), "{violation}");
    }

    #[test]
    fn test_violation_detects_substituted_receipt() {
        let receipts = span();
        let mut compaction = Compaction::summarize("t1", (0, 5), &receipts).unwrap();
        compaction.groups[0].original_hashes[0] = receipt("anchor", "t1", 99).leaf_digest();
        assert_eq!(
            compaction.violation(&receipts).as_deref(),
            Some("group hashes differ from the input receipts")
        );

        // Same summary, different span
        let fresh = Compaction::summarize("t1", (0, 5), &receipts).unwrap();
        let mut other = receipts.clone();
        other[2] = receipt("ingest", "t1", 42);
        assert!(fresh.violation(&other).is_some());
    }

    #[test]
    fn test_payload_roundtrip_through_receipt() {
        let compaction = Compaction::summarize("t1", (0, 5), &span()).unwrap();
        let payload = compaction.to_payload().unwrap();
        assert!(!payload.contains_key("tenant_id"));
        assert_eq!(payload["input_span"], serde_json::json!([0, 5]));

        let summary = ReceiptBuilder::new(COMPACTION_RECEIPT_TYPE, "t1")
            .payload(payload)
            .build(&FixedClock::from_millis(100))
            .unwrap();
        assert_eq!(Compaction::from_receipt(&summary).unwrap(), compaction);
        assert!(Compaction::from_receipt(&receipt("ingest", "t1", 0)).is_err());
    }
}
