//! Ledger configuration.
//!
//! Built once at startup and handed to [`crate::Ledger::new`]. There is no
//! process-wide switch; turning receipts off means constructing a ledger
//! with `enabled: false`.

use proofpack_core::{crypto::dual_algorithm_names, ensure_available};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Default cap on receipts per anchored batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Configuration for the Ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Whether receipts are emitted and batches anchored at all.
    pub enabled: bool,
    /// Hash algorithms the deployment expects, by name.
    pub hash_algos: Vec<String>,
    /// Largest batch `Ledger::anchor` accepts.
    pub max_batch_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hash_algos: dual_algorithm_names(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl CoreConfig {
    /// A configuration with receipts switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Check the configuration can be served by this build.
    pub fn validate(&self) -> Result<()> {
        ensure_available(&self.hash_algos)?;
        if self.max_batch_size == 0 {
            return Err(LedgerError::Config("max_batch_size must be positive".into()));
        }
        Ok(())
    }
}
