use unify_types::{MergePair, MergeStep};

use crate::error::LedgerResult;
use crate::log::MergeLogEntry;
use crate::status::MergeStatusRow;

/// Read boundary for merge status rows.
pub trait MergeLedgerReader: Send + Sync {
    /// The row for `pair`, if any merge has been attempted for it.
    fn status(&self, pair: &MergePair) -> LedgerResult<Option<MergeStatusRow>>;

    /// Every pair with a row, in key order.
    fn pairs(&self) -> LedgerResult<Vec<MergePair>>;
}

/// Write boundary for merge status rows.
pub trait MergeLedgerWriter: Send + Sync {
    /// Fetch the row for `pair`, creating an all-pending row if absent.
    fn open(&self, pair: &MergePair) -> LedgerResult<MergeStatusRow>;

    /// Persist that `step` finished successfully in `milliseconds`.
    fn mark_step_complete(
        &self,
        pair: &MergePair,
        step: MergeStep,
        milliseconds: u64,
    ) -> LedgerResult<()>;
}

/// A full ledger backend.
pub trait MergeLedger: MergeLedgerReader + MergeLedgerWriter {}

impl<T> MergeLedger for T where T: MergeLedgerReader + MergeLedgerWriter {}

/// Append-only sink for merge log rows.
///
/// Implementations may drop rows under load; nothing reads them back into
/// merge decisions.
pub trait MergeLogSink: Send + Sync {
    fn append(&self, entry: MergeLogEntry) -> LedgerResult<()>;
}
