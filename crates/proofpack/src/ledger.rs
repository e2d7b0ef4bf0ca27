//! The Ledger: unified API for emitting, anchoring, verifying and
//! compacting receipts.
//!
//! The Ledger brings together the pure receipt primitives, a clock and an
//! emission sink. It is the only place where receipts leave the process
//! and the only place a verification failure turns into a [`StopRule`].

use proofpack_core::{
    build_receipt, payload_from, validate_receipt, Clock, Digest, InclusionProof, Payload,
    Receipt, SystemClock,
};
use serde::Serialize;
use serde_json::json;

use crate::anchor::{verify_batch, AnchorManifest, Verdict, ANCHOR_RECEIPT_TYPE};
use crate::compact::{Compaction, COMPACTION_RECEIPT_TYPE};
use crate::config::CoreConfig;
use crate::error::{LedgerError, Result, StopRule};
use crate::sink::EmitSink;

/// Receipt type recording a verification outcome.
pub const VERIFY_RECEIPT_TYPE: &str = "verify";

/// Receipt type recording a detected anomaly.
pub const ANOMALY_RECEIPT_TYPE: &str = "anomaly";

/// An anchored batch: the manifest and the receipt that published it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub manifest: AnchorManifest,
    pub receipt: Receipt,
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Building and emitting receipts
/// - Anchoring batches under a Merkle root
/// - Verifying batches and single receipts against an anchor
/// - Compacting a span of receipts into a summary
///
/// A disabled ledger builds and emits nothing, but still verifies.
pub struct Ledger<S: EmitSink, C: Clock = SystemClock> {
    /// Configuration, validated at construction.
    config: CoreConfig,
    /// Where emitted receipts go.
    sink: S,
    /// Source of receipt timestamps.
    clock: C,
}

impl<S: EmitSink> Ledger<S, SystemClock> {
    /// Create a ledger stamped with wall-clock time.
    pub fn new(config: CoreConfig, sink: S) -> Result<Self> {
        Self::with_clock(config, sink, SystemClock)
    }
}

impl<S: EmitSink, C: Clock> Ledger<S, C> {
    /// Create a ledger with an explicit clock.
    ///
    /// Fails if the configuration names an algorithm this build cannot
    /// compute.
    pub fn with_clock(config: CoreConfig, sink: S, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            clock,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Emission
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a receipt and hand it to the sink.
    ///
    /// Returns `None` when the ledger is disabled.
    pub fn emit(
        &self,
        receipt_type: &str,
        tenant_id: &str,
        payload: Payload,
    ) -> Result<Option<Receipt>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let receipt = build_receipt(receipt_type, payload, tenant_id, &self.clock)?;
        self.sink.emit(&receipt)?;
        tracing::debug!(
            receipt_type = receipt.receipt_type(),
            tenant_id = receipt.tenant_id(),
            payload_hash = %receipt.payload_hash(),
            "emitted receipt"
        );
        Ok(Some(receipt))
    }

    /// Emit a receipt whose payload is any serializable object.
    pub fn emit_serializable<T: Serialize + ?Sized>(
        &self,
        receipt_type: &str,
        tenant_id: &str,
        payload: &T,
    ) -> Result<Option<Receipt>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let payload = payload_from(payload)?;
        self.emit(receipt_type, tenant_id, payload)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Anchoring
    // ─────────────────────────────────────────────────────────────────────────

    /// Anchor a single-tenant batch and emit an `"anchor"` receipt.
    ///
    /// Returns `None` when the ledger is disabled.
    pub fn anchor(&self, tenant_id: &str, batch: &[Receipt]) -> Result<Option<Anchor>> {
        if !self.config.enabled {
            return Ok(None);
        }
        if batch.len() > self.config.max_batch_size {
            return Err(LedgerError::BatchTooLarge {
                size: batch.len(),
                max: self.config.max_batch_size,
            });
        }

        let mut manifest = AnchorManifest::for_batch(tenant_id, batch)?;
        manifest.hash_algos = self.config.hash_algos.clone();

        let receipt = build_receipt(
            ANCHOR_RECEIPT_TYPE,
            manifest.to_payload()?,
            tenant_id,
            &self.clock,
        )?;
        self.sink.emit(&receipt)?;

        tracing::info!(
            tenant_id,
            batch_size = manifest.batch_size,
            merkle_root = %manifest.merkle_root,
            "anchored batch"
        );
        Ok(Some(Anchor { manifest, receipt }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Check a batch against its manifest.
    ///
    /// Emits a `"verify"` receipt with the outcome. On mismatch also emits
    /// an `"anomaly"` receipt and halts with [`StopRule`], even when the
    /// sink rejects those receipts.
    pub fn verify_bundle(
        &self,
        manifest: &AnchorManifest,
        batch: &[Receipt],
    ) -> Result<Option<Receipt>> {
        let verdict = verify_batch(manifest, batch)?;
        let outcome = if verdict.is_intact() { "intact" } else { "tampered" };
        let record = object(json!({
            "stage": "bundle",
            "merkle_root": manifest.merkle_root,
            "batch_size": batch.len(),
            "outcome": outcome,
        }));

        let (expected, actual, changed_leaves) = match verdict {
            Verdict::Intact => return self.emit(VERIFY_RECEIPT_TYPE, &manifest.tenant_id, record),
            Verdict::Tampered {
                expected,
                actual,
                changed_leaves,
            } => (expected, actual, changed_leaves),
        };

        tracing::warn!(
            tenant_id = %manifest.tenant_id,
            %expected,
            %actual,
            ?changed_leaves,
            "anchor mismatch"
        );
        let stop = StopRule::new(format!(
            "anchor mismatch for tenant {}: expected {expected}, got {actual}",
            manifest.tenant_id
        ));
        let anomaly = object(json!({
            "anomaly_type": "anchor_mismatch",
            "stage": "bundle",
            "expected": expected,
            "actual": actual,
            "changed_leaves": changed_leaves,
        }));
        Err(self.halt(
            &manifest.tenant_id,
            stop,
            vec![(VERIFY_RECEIPT_TYPE, record), (ANOMALY_RECEIPT_TYPE, anomaly)],
        ))
    }

    /// Check one receipt against an inclusion proof and an anchored root.
    ///
    /// A receipt whose payload no longer matches its `payload_hash`, or a
    /// proof that does not reach `root`, halts with [`StopRule`] after an
    /// `"anomaly"` receipt is emitted. A malformed proof is a plain
    /// validation error.
    pub fn verify_receipt(
        &self,
        receipt: &Receipt,
        proof: &InclusionProof,
        root: &Digest,
    ) -> Result<Option<Receipt>> {
        if let Err(e) = validate_receipt(receipt) {
            tracing::warn!(
                tenant_id = receipt.tenant_id(),
                leaf_index = proof.leaf_index,
                error = %e,
                "receipt failed validation"
            );
            let anomaly = receipt_anomaly(receipt, proof, root, "payload_mismatch");
            let stop = StopRule::caused_by("receipt failed validation", e);
            return Err(self.halt(
                receipt.tenant_id(),
                stop,
                vec![(ANOMALY_RECEIPT_TYPE, anomaly)],
            ));
        }

        let leaf = receipt.leaf_digest();
        let included = proof.verify(&leaf, root)?;

        let outcome = if included { "included" } else { "not_included" };
        let record = object(json!({
            "stage": "inclusion",
            "leaf": leaf,
            "leaf_index": proof.leaf_index,
            "merkle_root": root,
            "outcome": outcome,
        }));

        if included {
            return self.emit(VERIFY_RECEIPT_TYPE, receipt.tenant_id(), record);
        }

        tracing::warn!(
            tenant_id = receipt.tenant_id(),
            leaf_index = proof.leaf_index,
            %root,
            "inclusion proof mismatch"
        );
        let stop = StopRule::new(format!(
            "receipt at index {} is not included under root {root}",
            proof.leaf_index
        ));
        let anomaly = receipt_anomaly(receipt, proof, root, "proof_mismatch");
        Err(self.halt(
            receipt.tenant_id(),
            stop,
            vec![(VERIFY_RECEIPT_TYPE, record), (ANOMALY_RECEIPT_TYPE, anomaly)],
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compaction
    // ─────────────────────────────────────────────────────────────────────────

    /// Summarize the receipts covering `span` into one `"compaction"`
    /// receipt.
    ///
    /// The summary must account for every input receipt exactly once. A
    /// summary that cannot be built, or that loses or invents a receipt,
    /// emits an `"anomaly"` receipt and halts with [`StopRule`]. Returns
    /// `None` when the ledger is disabled, after the checks have run.
    pub fn compact(
        &self,
        tenant_id: &str,
        span: (usize, usize),
        receipts: &[Receipt],
    ) -> Result<Option<Receipt>> {
        let compaction = match Compaction::summarize(tenant_id, span, receipts) {
            Ok(compaction) => compaction,
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "compaction failed");
                let anomaly = object(json!({
                    "anomaly_type": "compact_failure",
                    "stage": "compact",
                    "error": e.to_string(),
                }));
                let stop = StopRule::caused_by("compaction failed", e);
                return Err(self.halt(tenant_id, stop, vec![(ANOMALY_RECEIPT_TYPE, anomaly)]));
            }
        };

        if let Some(violation) = compaction.violation(receipts) {
            tracing::warn!(tenant_id, %violation, "compaction invariant violated");
            let anomaly = object(json!({
                "anomaly_type": "compact_invariant_violation",
                "stage": "compact",
                "error": violation,
            }));
            let stop = StopRule::new(format!("compaction invariant violation: {violation}"));
            return Err(self.halt(tenant_id, stop, vec![(ANOMALY_RECEIPT_TYPE, anomaly)]));
        }

        let recorded = self.emit(COMPACTION_RECEIPT_TYPE, tenant_id, compaction.to_payload()?)?;
        tracing::info!(
            tenant_id,
            before = compaction.counts.before,
            after = compaction.counts.after,
            before_root = %compaction.before_root,
            "compacted receipts"
        );
        Ok(recorded)
    }

    /// Record the receipts describing a halt, then return the halt.
    ///
    /// A record the sink rejects becomes the cause of the [`StopRule`]
    /// instead of replacing it.
    fn halt(&self, tenant_id: &str, stop: StopRule, records: Vec<(&str, Payload)>) -> LedgerError {
        for (receipt_type, payload) in records {
            if let Err(e) = self.emit(receipt_type, tenant_id, payload) {
                tracing::error!(tenant_id, receipt_type, error = %e, "failed to record halt");
                return StopRule::caused_by(stop.reason(), e).into();
            }
        }
        stop.into()
    }
}

fn receipt_anomaly(
    receipt: &Receipt,
    proof: &InclusionProof,
    root: &Digest,
    anomaly_type: &str,
) -> Payload {
    object(json!({
        "anomaly_type": anomaly_type,
        "stage": "inclusion",
        "leaf_index": proof.leaf_index,
        "expected": root,
        "actual": proof.fold(&receipt.leaf_digest()),
    }))
}

fn object(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::sink::MemorySink;
    use proofpack_core::{build_inclusion_proof, compute_root, FixedClock, ValidationError};
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts a fixed number of receipts, then fails every write.
    struct FailingSink {
        accepted: AtomicUsize,
        limit: usize,
        inner: MemorySink,
    }

    impl FailingSink {
        fn after(limit: usize) -> Self {
            Self {
                accepted: AtomicUsize::new(0),
                limit,
                inner: MemorySink::new(),
            }
        }
    }

    impl EmitSink for FailingSink {
        fn emit(&self, receipt: &Receipt) -> std::result::Result<(), SinkError> {
            if self.accepted.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(SinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.emit(receipt)
        }
    }

    fn failing_ledger(limit: usize) -> Ledger<FailingSink, FixedClock> {
        Ledger::with_clock(
            CoreConfig::default(),
            FailingSink::after(limit),
            FixedClock::from_millis(1_736_870_400_000),
        )
        .unwrap()
    }

    fn ledger() -> Ledger<MemorySink, FixedClock> {
        Ledger::with_clock(
            CoreConfig::default(),
            MemorySink::new(),
            FixedClock::from_millis(1_736_870_400_000),
        )
        .unwrap()
    }

    fn emit_three<S: EmitSink>(ledger: &Ledger<S, FixedClock>) -> Vec<Receipt> {
        ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let mut payload = Payload::new();
                payload.insert(k.to_string(), json!(i + 1));
                ledger.emit("ingest", "t1", payload).unwrap().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_emit_reaches_sink() {
        let ledger = ledger();
        let receipt = ledger
            .emit("ingest", "t1", object(json!({"a": 1})))
            .unwrap()
            .unwrap();
        assert_eq!(ledger.sink().receipts(), vec![receipt]);
    }

    #[test]
    fn test_emit_rejects_before_sink() {
        let ledger = ledger();
        let err = ledger
            .emit("ingest", "t1", object(json!({"tenant_id": "t2"})))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(ref e) if e.as_validation() == Some(&ValidationError::ReservedField("tenant_id".into()))
        ));
        assert!(ledger.sink().is_empty());
    }

    #[test]
    fn test_disabled_ledger_emits_nothing() {
        let ledger = Ledger::with_clock(CoreConfig::disabled(), MemorySink::new(), FixedClock::from_millis(0)).unwrap();
        assert!(ledger.emit("ingest", "t1", Payload::new()).unwrap().is_none());
        assert!(ledger.anchor("t1", &[]).unwrap().is_none());
        assert!(ledger.sink().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CoreConfig {
            hash_algos: vec!["SHA256".into()],
            ..CoreConfig::default()
        };
        assert!(Ledger::new(config, MemorySink::new()).is_err());
    }

    #[test]
    fn test_anchor_emits_manifest_receipt() {
        let ledger = ledger();
        let batch = emit_three(&ledger);
        let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();

        assert_eq!(anchor.manifest.merkle_root, compute_root(&batch));
        assert_eq!(anchor.receipt.receipt_type(), "anchor");
        assert_eq!(AnchorManifest::from_receipt(&anchor.receipt).unwrap(), anchor.manifest);
        assert_eq!(ledger.sink().of_type("anchor").len(), 1);
    }

    #[test]
    fn test_anchor_enforces_batch_limit() {
        let config = CoreConfig {
            max_batch_size: 2,
            ..CoreConfig::default()
        };
        let ledger = Ledger::with_clock(config, MemorySink::new(), FixedClock::from_millis(0)).unwrap();
        let batch = emit_three(&ledger);
        assert!(matches!(
            ledger.anchor("t1", &batch),
            Err(LedgerError::BatchTooLarge { size: 3, max: 2 })
        ));
    }

    #[test]
    fn test_verify_bundle_intact() {
        let ledger = ledger();
        let batch = emit_three(&ledger);
        let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();

        let verify = ledger.verify_bundle(&anchor.manifest, &batch).unwrap().unwrap();
        assert_eq!(verify.get("outcome").unwrap(), "intact");
        assert!(ledger.sink().of_type("anomaly").is_empty());
    }

    #[test]
    fn test_verify_bundle_tampered_halts() {
        let ledger = ledger();
        let mut batch = emit_three(&ledger);
        let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();

        batch[1] = ledger
            .emit("ingest", "t1", object(json!({"b": 99})))
            .unwrap()
            .unwrap();
        let err = ledger.verify_bundle(&anchor.manifest, &batch).unwrap_err();
        assert!(err.is_halting());

        let anomalies = ledger.sink().of_type("anomaly");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].get("anomaly_type").unwrap(), "anchor_mismatch");
        assert_eq!(anomalies[0].get("changed_leaves").unwrap(), &json!([1]));
        assert_eq!(ledger.sink().of_type("verify")[0].get("outcome").unwrap(), "tampered");
    }

    #[test]
    fn test_verify_receipt() {
        let ledger = ledger();
        let batch = emit_three(&ledger);
        let root = compute_root(&batch);
        let proof = build_inclusion_proof(&batch, 1).unwrap();

        let verify = ledger.verify_receipt(&batch[1], &proof, &root).unwrap().unwrap();
        assert_eq!(verify.get("outcome").unwrap(), "included");

        // Right proof, wrong receipt
        let err = ledger.verify_receipt(&batch[0], &proof, &root).unwrap_err();
        assert!(matches!(err, LedgerError::Stop(_)));
        assert_eq!(
            ledger.sink().of_type("anomaly")[0].get("anomaly_type").unwrap(),
            "proof_mismatch"
        );
    }

    #[test]
    fn test_verify_receipt_edited_payload_halts() {
        let ledger = ledger();
        let batch = emit_three(&ledger);
        let root = compute_root(&batch);
        let proof = build_inclusion_proof(&batch, 1).unwrap();

        let mut map = batch[1].to_map();
        map.insert("b".into(), json!(99));
        let edited = Receipt::from_map(map).unwrap();

        let err = ledger.verify_receipt(&edited, &proof, &root).unwrap_err();
        match err {
            LedgerError::Stop(stop) => {
                assert_eq!(stop.reason(), "receipt failed validation");
                assert!(stop.source().is_some());
            }
            other => panic!("expected StopRule, got {other:?}"),
        }
        let anomalies = ledger.sink().of_type("anomaly");
        assert_eq!(anomalies[0].get("anomaly_type").unwrap(), "payload_mismatch");
        assert!(ledger.sink().of_type("verify").is_empty());
    }

    #[test]
    fn test_verify_receipt_malformed_proof_is_not_halting() {
        let ledger = ledger();
        let batch = emit_three(&ledger);
        let mut proof = build_inclusion_proof(&batch, 1).unwrap();
        proof.steps.pop();

        let err = ledger
            .verify_receipt(&batch[1], &proof, &compute_root(&batch))
            .unwrap_err();
        assert!(!err.is_halting());
    }

    #[test]
    fn test_disabled_ledger_still_halts_on_tamper() {
        let enabled = ledger();
        let batch = emit_three(&enabled);
        let manifest = AnchorManifest::for_batch("t1", &batch).unwrap();

        let disabled = Ledger::with_clock(CoreConfig::disabled(), MemorySink::new(), FixedClock::from_millis(0)).unwrap();
        assert!(disabled.verify_bundle(&manifest, &batch).unwrap().is_none());
        assert!(disabled.verify_bundle(&manifest, &batch[..2]).unwrap_err().is_halting());
        assert!(disabled.sink().is_empty());
    }

    #[test]
    fn test_sink_failure_does_not_mask_tamper() {
        let ledger = failing_ledger(3);
        let batch = emit_three(&ledger);
        let manifest = AnchorManifest::for_batch("t1", &batch).unwrap();

        let err = ledger.verify_bundle(&manifest, &batch[..2]).unwrap_err();
        assert!(err.is_halting(), "{err:?}");
        match err {
            LedgerError::Stop(stop) => {
                assert!(stop.reason().starts_with("anchor mismatch"));
                assert!(stop.source().is_some());
            }
            other => panic!("expected StopRule, got {other:?}"),
        }

        // An intact batch surfaces the sink failure as-is
        let err = ledger.verify_bundle(&manifest, &batch).unwrap_err();
        assert!(matches!(err, LedgerError::Sink(_)));
    }

    #[test]
    fn test_sink_failure_does_not_mask_proof_mismatch() {
        let ledger = failing_ledger(3);
        let batch = emit_three(&ledger);
        let root = compute_root(&batch);
        let proof = build_inclusion_proof(&batch, 1).unwrap();

        let err = ledger.verify_receipt(&batch[0], &proof, &root).unwrap_err();
        assert!(matches!(err, LedgerError::Stop(ref stop) if stop.reason().contains("not included")));
    }

    #[test]
    fn test_sink_failure_after_verify_still_halts() {
        // The verify record lands, the anomaly record does not
        let ledger = failing_ledger(4);
        let batch = emit_three(&ledger);
        let manifest = AnchorManifest::for_batch("t1", &batch).unwrap();

        let err = ledger.verify_bundle(&manifest, &batch[..2]).unwrap_err();
        assert!(matches!(err, LedgerError::Stop(_)));
        assert_eq!(ledger.sink().inner.of_type("verify").len(), 1);
        assert!(ledger.sink().inner.of_type("anomaly").is_empty());
    }

    #[test]
    fn test_compact_emits_summary() {
        let ledger = ledger();
        let batch = emit_three(&ledger);

        let summary = ledger.compact("t1", (0, 3), &batch).unwrap().unwrap();
        assert_eq!(summary.receipt_type(), "compaction");
        assert_eq!(summary.get("counts").unwrap(), &json!({"before": 3, "after": 1}));
        assert_eq!(summary.get("hash_continuity").unwrap(), &json!(true));

        let compaction = Compaction::from_receipt(&summary).unwrap();
        assert_eq!(compaction.groups[0].receipt_type, "compacted_ingest");
        assert_eq!(compaction.before_root, compute_root(&batch));
        assert!(ledger.sink().of_type("anomaly").is_empty());
    }

    #[test]
    fn test_compact_bad_span_halts() {
        let ledger = ledger();
        let batch = emit_three(&ledger);

        let err = ledger.compact("t1", (0, 2), &batch).unwrap_err();
        assert!(err.is_halting());
        let anomalies = ledger.sink().of_type("anomaly");
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].get("anomaly_type").unwrap(), "compact_failure");
        assert_eq!(anomalies[0].get("stage").unwrap(), "compact");
        assert!(ledger.sink().of_type("compaction").is_empty());
    }

    #[test]
    fn test_disabled_ledger_compacts_nothing() {
        let enabled = ledger();
        let batch = emit_three(&enabled);

        let disabled = Ledger::with_clock(CoreConfig::disabled(), MemorySink::new(), FixedClock::from_millis(0)).unwrap();
        assert!(disabled.compact("t1", (0, 3), &batch).unwrap().is_none());
        assert!(disabled.compact("t2", (0, 3), &batch).unwrap_err().is_halting());
        assert!(disabled.sink().is_empty());
    }
}
