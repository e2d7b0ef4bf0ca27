//! End-to-end pipeline: emit, anchor, ship, verify.

use std::fs;
use std::sync::Arc;

use proofpack::core::{FixedClock, Payload};
use proofpack::{
    build_inclusion_proof, read_json_lines, AnchorManifest, CoreConfig, JsonLinesSink, Ledger,
    LedgerError, MemorySink, Receipt,
};
use serde::Serialize;
use serde_json::json;

const T0: i64 = 1_736_870_400_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn memory_ledger() -> Ledger<MemorySink, FixedClock> {
    Ledger::with_clock(CoreConfig::default(), MemorySink::new(), FixedClock::from_millis(T0)).unwrap()
}

fn ingest(ledger: &Ledger<MemorySink, FixedClock>, values: &[serde_json::Value]) -> Vec<Receipt> {
    values
        .iter()
        .map(|v| ledger.emit("ingest", "t1", payload(v.clone())).unwrap().unwrap())
        .collect()
}

#[test]
fn test_anchor_then_verify_every_member() {
    init_tracing();
    let ledger = memory_ledger();
    let batch = ingest(&ledger, &[json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]);

    let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();
    ledger.verify_bundle(&anchor.manifest, &batch).unwrap();

    for (i, r) in batch.iter().enumerate() {
        let proof = build_inclusion_proof(&batch, i).unwrap();
        ledger
            .verify_receipt(r, &proof, &anchor.manifest.merkle_root)
            .unwrap();
    }

    let sink = ledger.sink();
    assert_eq!(sink.of_type("ingest").len(), 3);
    assert_eq!(sink.of_type("anchor").len(), 1);
    assert_eq!(sink.of_type("verify").len(), 4);
    assert!(sink.of_type("anomaly").is_empty());
}

#[test]
fn test_tampered_member_halts_pipeline() {
    init_tracing();
    let ledger = memory_ledger();
    let batch = ingest(&ledger, &[json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]);
    let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();
    let proof = build_inclusion_proof(&batch, 1).unwrap();

    let mut tampered = batch.clone();
    tampered[1] = ledger
        .emit("ingest", "t1", payload(json!({"b": 99})))
        .unwrap()
        .unwrap();

    let err = ledger.verify_bundle(&anchor.manifest, &tampered).unwrap_err();
    assert!(matches!(err, LedgerError::Stop(_)));
    assert!(err.to_string().starts_with("stoprule:"));

    let err = ledger
        .verify_receipt(&tampered[1], &proof, &anchor.manifest.merkle_root)
        .unwrap_err();
    assert!(err.is_halting());

    assert_eq!(ledger.sink().of_type("anomaly").len(), 2);
}

#[test]
fn test_json_lines_file_roundtrip() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipts.jsonl");

    let file = fs::File::create(&path).unwrap();
    let ledger = Ledger::with_clock(
        CoreConfig::default(),
        JsonLinesSink::new(file),
        FixedClock::from_millis(T0),
    )
    .unwrap();

    #[derive(Serialize)]
    struct Ingest<'a> {
        source_type: &'a str,
        rows: u32,
    }

    let batch: Vec<Receipt> = (0..5)
        .map(|rows| {
            ledger
                .emit_serializable("ingest", "t1", &Ingest { source_type: "csv", rows })
                .unwrap()
                .unwrap()
        })
        .collect();
    let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();

    let written = fs::read_to_string(&path).unwrap();
    let replayed = read_json_lines(&written).unwrap();
    assert_eq!(replayed.len(), 6);

    // A verifier holding only the file can recover and check the anchor
    let (members, anchors): (Vec<_>, Vec<_>) = replayed
        .into_iter()
        .partition(|r| r.receipt_type() == "ingest");
    assert_eq!(members, batch);

    let manifest = AnchorManifest::from_receipt(&anchors[0]).unwrap();
    assert_eq!(manifest, anchor.manifest);

    let verifier = memory_ledger();
    verifier.verify_bundle(&manifest, &members).unwrap();
}

#[test]
fn test_disabled_config_from_json() {
    let config = CoreConfig::from_json_str(r#"{"enabled": false}"#).unwrap();
    let sink = Arc::new(MemorySink::new());
    let ledger = Ledger::new(config, Arc::clone(&sink)).unwrap();

    assert!(!ledger.is_enabled());
    assert!(ledger.emit("ingest", "t1", payload(json!({"a": 1}))).unwrap().is_none());
    assert!(sink.is_empty());
}

#[test]
fn test_mixed_tenant_batch_rejected() {
    let ledger = memory_ledger();
    let mut batch = ingest(&ledger, &[json!({"a": 1})]);
    batch.push(
        ledger
            .emit("ingest", "t2", payload(json!({"a": 1})))
            .unwrap()
            .unwrap(),
    );

    let err = ledger.anchor("t1", &batch).unwrap_err();
    assert!(matches!(err, LedgerError::Core(_)));
    assert!(!err.is_halting());
    assert!(ledger.sink().of_type("anchor").is_empty());
}

#[test]
fn test_large_batch_anchor() {
    let ledger = memory_ledger();
    let values: Vec<_> = (0..257).map(|i| json!({ "seq": i })).collect();
    let batch = ingest(&ledger, &values);
    let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();

    for i in [0, 128, 255, 256] {
        let proof = build_inclusion_proof(&batch, i).unwrap();
        assert!(proof
            .verify(&batch[i].leaf_digest(), &anchor.manifest.merkle_root)
            .unwrap());
    }
}
