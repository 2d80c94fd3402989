//! Merge bookkeeping for voter account unification.
//!
//! This crate provides:
//! - `MergeStatusRow`: the per-(from, to) record of which merge steps completed
//! - `MergeLedgerReader` / `MergeLedgerWriter` trait boundaries
//! - `InMemoryMergeLedger` implementation for tests and embedding
//! - `MergeLogEntry` / `MergeLogSink`: the append-only diagnostic trail
//! - `InMemoryMergeLog`, bounded, dropping the oldest rows when full
//!
//! Ledger rows are facts the orchestrator consults on every run. Log rows are
//! never read back by the orchestrator.

pub mod error;
pub mod log;
pub mod memory;
pub mod status;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use log::{InMemoryMergeLog, MergeLogEntry, DEFAULT_LOG_CAPACITY};
pub use memory::InMemoryMergeLedger;
pub use status::{MergeStatusRow, StepStatus};
pub use traits::{MergeLedger, MergeLedgerReader, MergeLedgerWriter, MergeLogSink};
