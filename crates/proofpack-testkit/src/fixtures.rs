//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use proofpack::{CoreConfig, Ledger, MemorySink};
use proofpack_core::{build_receipt, Clock, Payload, Receipt};
use serde_json::json;

/// 2025-01-14T16:00:00Z in milliseconds.
pub const EPOCH_MS: i64 = 1_736_870_400_000;

/// A clock that advances one millisecond every time it is read.
///
/// Gives each receipt in a fixture a distinct, increasing timestamp.
#[derive(Debug)]
pub struct SteppingClock {
    next_ms: AtomicI64,
}

impl SteppingClock {
    pub fn starting_at(millis: i64) -> Self {
        Self {
            next_ms: AtomicI64::new(millis),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.next_ms.fetch_add(1, Ordering::Relaxed);
        DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// A test fixture with a tenant, a deterministic clock and a memory sink.
pub struct TestFixture {
    pub tenant_id: String,
    pub clock: Arc<SteppingClock>,
    pub sink: Arc<MemorySink>,
}

impl TestFixture {
    /// Create a fixture for tenant `t1`.
    pub fn new() -> Self {
        Self::for_tenant("t1")
    }

    /// Create a fixture for a given tenant.
    pub fn for_tenant(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            clock: Arc::new(SteppingClock::starting_at(EPOCH_MS)),
            sink: Arc::new(MemorySink::new()),
        }
    }

    /// A ledger writing to this fixture's sink.
    pub fn ledger(&self) -> Ledger<Arc<MemorySink>, Arc<SteppingClock>> {
        self.ledger_with(CoreConfig::default())
    }

    /// A ledger with a custom configuration.
    pub fn ledger_with(&self, config: CoreConfig) -> Ledger<Arc<MemorySink>, Arc<SteppingClock>> {
        Ledger::with_clock(config, Arc::clone(&self.sink), Arc::clone(&self.clock))
            .expect("fixture configuration is valid")
    }

    /// Build an `"ingest"` receipt for this tenant.
    pub fn make_receipt(&self, payload: Payload) -> Receipt {
        build_receipt("ingest", payload, &self.tenant_id, self.clock.as_ref())
            .expect("fixture payloads carry no reserved keys")
    }

    /// Build a batch of `len` receipts, each carrying its position.
    pub fn make_batch(&self, len: usize) -> Vec<Receipt> {
        (0..len)
            .map(|i| {
                let mut payload = Payload::new();
                payload.insert("seq".into(), json!(i));
                payload.insert("source_type".into(), json!("fixture"));
                self.make_receipt(payload)
            })
            .collect()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create fixtures for several tenants.
pub fn multi_tenant_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::for_tenant(&format!("tenant-{i}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofpack::{build_inclusion_proof, compute_root};

    #[test]
    fn test_stepping_clock_orders_receipts() {
        let fixture = TestFixture::new();
        let batch = fixture.make_batch(3);
        assert_eq!(batch[0].timestamp(), "2025-01-14T16:00:00.000000Z");
        assert_eq!(batch[2].timestamp(), "2025-01-14T16:00:00.002000Z");
        assert!(batch.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    }

    #[test]
    fn test_fixture_ledger_shares_sink() {
        let fixture = TestFixture::new();
        let ledger = fixture.ledger();
        let batch = fixture.make_batch(4);

        let anchor = ledger.anchor(&fixture.tenant_id, &batch).unwrap().unwrap();
        assert_eq!(anchor.manifest.merkle_root, compute_root(&batch));
        assert_eq!(fixture.sink.of_type("anchor").len(), 1);

        let proof = build_inclusion_proof(&batch, 3).unwrap();
        ledger
            .verify_receipt(&batch[3], &proof, &anchor.manifest.merkle_root)
            .unwrap();
    }

    #[test]
    fn test_multi_tenant() {
        let tenants = multi_tenant_fixtures(3);
        let roots: Vec<_> = tenants
            .iter()
            .map(|t| compute_root(&t.make_batch(2)))
            .collect();
        assert_ne!(roots[0], roots[1]);
        assert_ne!(roots[1], roots[2]);
    }
}
