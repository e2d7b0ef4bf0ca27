//! # ProofPack Testkit
//!
//! Testing utilities for ProofPack receipts.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known inputs with expected digests for cross-implementation verification
//! - **Generators**: Proptest strategies for payloads, receipts and batches
//! - **Fixtures**: A tenant, a stepping clock and a memory sink wired to a ledger
//!
//! ## Golden Vectors
//!
//! ```rust
//! use proofpack_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     assert!(matches, "{name}: {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use proofpack_testkit::generators::{ReceiptParams, receipt_from_params};
//!
//! proptest! {
//!     #[test]
//!     fn leaf_is_deterministic(params: ReceiptParams) {
//!         let r1 = receipt_from_params(&params);
//!         let r2 = receipt_from_params(&params);
//!         prop_assert_eq!(r1.leaf_digest(), r2.leaf_digest());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use proofpack_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let batch = fixture.make_batch(3);
//! let anchor = fixture.ledger().anchor("t1", &batch).unwrap();
//! assert!(anchor.is_some());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_tenant_fixtures, SteppingClock, TestFixture};
pub use generators::{receipt_from_params, ReceiptParams};
pub use vectors::{all_vectors, hash_vectors, verify_all_vectors, GoldenVector, HashVector};
