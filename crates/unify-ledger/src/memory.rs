use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracing::debug;
use unify_types::{MergePair, MergeStep};

use crate::error::{LedgerError, LedgerResult};
use crate::status::MergeStatusRow;
use crate::traits::{MergeLedgerReader, MergeLedgerWriter};

/// In-memory merge status ledger for tests, the CLI and embedding.
pub struct InMemoryMergeLedger {
    rows: RwLock<BTreeMap<MergePair, MergeStatusRow>>,
    unavailable: AtomicBool,
}

impl InMemoryMergeLedger {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Build a ledger holding previously persisted rows.
    pub fn from_rows(rows: impl IntoIterator<Item = MergeStatusRow>) -> Self {
        let map = rows.into_iter().map(|row| (row.pair.clone(), row)).collect();
        Self {
            rows: RwLock::new(map),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Every row, in pair order.
    pub fn rows(&self) -> LedgerResult<Vec<MergeStatusRow>> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(rows.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// While set, every write fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger writes disabled".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryMergeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryMergeLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMergeLedger")
            .field("row_count", &self.len())
            .finish()
    }
}

impl MergeLedgerReader for InMemoryMergeLedger {
    fn status(&self, pair: &MergePair) -> LedgerResult<Option<MergeStatusRow>> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(rows.get(pair).cloned())
    }

    fn pairs(&self) -> LedgerResult<Vec<MergePair>> {
        let rows = self.rows.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(rows.keys().cloned().collect())
    }
}

impl MergeLedgerWriter for InMemoryMergeLedger {
    fn open(&self, pair: &MergePair) -> LedgerResult<MergeStatusRow> {
        if let Some(row) = self.status(pair)? {
            return Ok(row);
        }
        self.check_available()?;
        let mut rows = self.rows.write().map_err(|_| LedgerError::LockPoisoned)?;
        let row = rows.entry(pair.clone()).or_insert_with(|| {
            debug!(%pair, "ledger row created");
            MergeStatusRow::new(pair.clone())
        });
        Ok(row.clone())
    }

    fn mark_step_complete(
        &self,
        pair: &MergePair,
        step: MergeStep,
        milliseconds: u64,
    ) -> LedgerResult<()> {
        self.check_available()?;
        let mut rows = self.rows.write().map_err(|_| LedgerError::LockPoisoned)?;
        let row = rows
            .get_mut(pair)
            .ok_or_else(|| LedgerError::PairNotFound(pair.to_string()))?;
        row.mark_complete(step, milliseconds);
        Ok(())
    }
}
