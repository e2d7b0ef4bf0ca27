//! # ProofPack Core
//!
//! Pure primitives for ProofPack receipts: canonical JSON, dual hashing,
//! receipt construction, and Merkle anchoring.
//!
//! This crate contains no I/O, no logging, no global state. Every function
//! is a deterministic computation over its arguments and safe to call from
//! any number of threads.
//!
//! ## Key Types
//!
//! - [`Digest`] - `"<sha256 hex>:<blake3 hex>"` dual digest
//! - [`Receipt`] - Immutable audit record with a payload hash
//! - [`MerkleTree`] - Tree over an ordered batch of receipts
//! - [`InclusionProof`] - Sibling path proving one receipt is in a batch
//!
//! ## Example
//!
//! ```rust
//! use proofpack_core::{build_receipt, compute_root, build_inclusion_proof, FixedClock, Payload};
//!
//! let clock = FixedClock::from_millis(1_736_870_400_000);
//! let batch: Vec<_> = ["a", "b", "c"]
//!     .iter()
//!     .map(|k| {
//!         let mut payload = Payload::new();
//!         payload.insert(k.to_string(), 1.into());
//!         build_receipt("ingest", payload, "t1", &clock).unwrap()
//!     })
//!     .collect();
//!
//! let root = compute_root(&batch);
//! let proof = build_inclusion_proof(&batch, 1).unwrap();
//! assert!(proof.verify(&batch[1].leaf_digest(), &root).unwrap());
//! ```

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod receipt;
pub mod validation;

pub use canonical::{canonical_object, canonical_value, canonicalize, CanonicalBytes};
pub use crypto::{dual_hash, ensure_available, hash_pair, Digest, HashAlgorithm};
pub use error::{CoreError, EncodingError, ValidationError};
pub use merkle::{
    build_inclusion_proof, compute_root, empty_root, verify_inclusion_proof, InclusionProof,
    MerkleTree, ProofStep, Side,
};
pub use receipt::{
    build_receipt, payload_from, Clock, FixedClock, Payload, Receipt, ReceiptBuilder, SystemClock,
};
pub use validation::{validate_receipt, validate_receipt_structure};
