//! Emission sinks: where built receipts go.
//!
//! The builder in the core never writes anything. The [`crate::Ledger`]
//! hands each receipt it builds to an [`EmitSink`], which owns all I/O and
//! its failure policy.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use proofpack_core::Receipt;

use crate::error::SinkError;

/// Destination for emitted receipts.
pub trait EmitSink: Send + Sync {
    /// Record one receipt.
    fn emit(&self, receipt: &Receipt) -> Result<(), SinkError>;
}

impl<S: EmitSink + ?Sized> EmitSink for Arc<S> {
    fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        (**self).emit(receipt)
    }
}

impl<S: EmitSink + ?Sized> EmitSink for Box<S> {
    fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        (**self).emit(receipt)
    }
}

/// In-memory sink.
///
/// Keeps every receipt in emission order. Thread-safe via Mutex.
#[derive(Debug, Default)]
pub struct MemorySink {
    receipts: Mutex<Vec<Receipt>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Receipts of one type, in emission order.
    pub fn of_type(&self, receipt_type: &str) -> Vec<Receipt> {
        self.receipts()
            .into_iter()
            .filter(|r| r.receipt_type() == receipt_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.receipts.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything emitted so far.
    pub fn drain(&self) -> Vec<Receipt> {
        self.receipts
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl EmitSink for MemorySink {
    fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        self.receipts
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(receipt.clone());
        Ok(())
    }
}

/// Writes one canonical JSON receipt per line and flushes after each.
///
/// Lines are the receipt's canonical form, so a line can be hashed or
/// re-anchored without re-serializing.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|_| SinkError::Poisoned)
    }
}

impl JsonLinesSink<io::Stdout> {
    /// A sink that writes to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> EmitSink for JsonLinesSink<W> {
    fn emit(&self, receipt: &Receipt) -> Result<(), SinkError> {
        let line = receipt.canonical_bytes();
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Read receipts back from JSON lines. Blank lines are skipped.
pub fn read_json_lines(input: &str) -> Result<Vec<Receipt>, serde_json::Error> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}
