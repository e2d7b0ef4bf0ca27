//! # ProofPack
//!
//! The unified API for ProofPack receipts: emit audit records, anchor them
//! in batches under a Merkle root, and verify batches or single receipts
//! later.
//!
//! ## Overview
//!
//! - **Receipts**: Immutable records carrying a dual SHA-256/BLAKE3 hash of
//!   their payload
//! - **Anchors**: Merkle roots over ordered single-tenant batches, published
//!   as `"anchor"` receipts
//! - **Verification**: Recomputing a root or replaying an inclusion proof;
//!   a mismatch halts the pipeline with a [`StopRule`]
//! - **Compaction**: Folding a span of old receipts into one summary that
//!   still commits to every original leaf
//!
//! ## Usage
//!
//! ```rust
//! use proofpack::{CoreConfig, Ledger, MemorySink};
//! use proofpack::core::{build_inclusion_proof, FixedClock, Payload};
//!
//! let ledger = Ledger::with_clock(
//!     CoreConfig::default(),
//!     MemorySink::new(),
//!     FixedClock::from_millis(1_736_870_400_000),
//! )
//! .unwrap();
//!
//! let mut payload = Payload::new();
//! payload.insert("rows".into(), 42.into());
//! let receipt = ledger.emit("ingest", "t1", payload).unwrap().unwrap();
//!
//! let batch = vec![receipt];
//! let anchor = ledger.anchor("t1", &batch).unwrap().unwrap();
//!
//! let proof = build_inclusion_proof(&batch, 0).unwrap();
//! ledger
//!     .verify_receipt(&batch[0], &proof, &anchor.manifest.merkle_root)
//!     .unwrap();
//! ```
//!
//! ## Re-exports
//!
//! `proofpack::core` is the pure primitives crate (canonical JSON, dual
//! hashing, receipt construction, Merkle trees).

pub mod anchor;
pub mod compact;
pub mod config;
pub mod error;
pub mod ledger;
pub mod sink;

pub use proofpack_core as core;

pub use anchor::{verify_batch, AnchorManifest, Verdict, ANCHOR_RECEIPT_TYPE};
pub use compact::{CompactedGroup, Compaction, Counts, COMPACTION_RECEIPT_TYPE};
pub use config::{CoreConfig, DEFAULT_MAX_BATCH_SIZE};
pub use error::{LedgerError, OrStop, Result, SinkError, StopRule};
pub use ledger::{Anchor, Ledger, ANOMALY_RECEIPT_TYPE, VERIFY_RECEIPT_TYPE};
pub use sink::{read_json_lines, EmitSink, JsonLinesSink, MemorySink};

pub use proofpack_core::{
    build_inclusion_proof, build_receipt, compute_root, dual_hash, verify_inclusion_proof, Digest,
    InclusionProof, Payload, Receipt, ReceiptBuilder,
};
