use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use unify_types::{MergePair, MergeStep, VoterId};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::MergeLogSink;

/// Rows kept by [`InMemoryMergeLog::new`] before the oldest are dropped.
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// One step execution for one pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeLogEntry {
    pub from_voter_we_vote_id: VoterId,
    pub to_voter_we_vote_id: VoterId,
    pub step_name: MergeStep,
    pub step_duration_ms: u64,
    pub success: bool,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

impl MergeLogEntry {
    pub fn new(
        pair: &MergePair,
        step: MergeStep,
        step_duration_ms: u64,
        success: bool,
        status: impl Into<String>,
    ) -> Self {
        Self {
            from_voter_we_vote_id: pair.from.clone(),
            to_voter_we_vote_id: pair.to.clone(),
            step_name: step,
            step_duration_ms,
            success,
            status: status.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_for(&self, pair: &MergePair) -> bool {
        self.from_voter_we_vote_id.matches(&pair.from) && self.to_voter_we_vote_id.matches(&pair.to)
    }
}

/// Bounded in-memory merge log. When full, the oldest row is dropped.
pub struct InMemoryMergeLog {
    entries: RwLock<VecDeque<MergeLogEntry>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl InMemoryMergeLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Rebuild a log from persisted rows, keeping the newest `DEFAULT_LOG_CAPACITY`.
    pub fn from_entries(entries: impl IntoIterator<Item = MergeLogEntry>) -> Self {
        let mut rows: VecDeque<MergeLogEntry> = entries.into_iter().collect();
        let excess = rows.len().saturating_sub(DEFAULT_LOG_CAPACITY);
        rows.drain(..excess);
        Self {
            entries: RwLock::new(rows),
            capacity: DEFAULT_LOG_CAPACITY,
            dropped: AtomicU64::new(excess as u64),
        }
    }

    pub fn entries(&self) -> LedgerResult<Vec<MergeLogEntry>> {
        let entries = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(entries.iter().cloned().collect())
    }

    pub fn entries_for(&self, pair: &MergePair) -> LedgerResult<Vec<MergeLogEntry>> {
        let entries = self.entries.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(entries.iter().filter(|e| e.is_for(pair)).cloned().collect())
    }

    /// Number of rows evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryMergeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeLogSink for InMemoryMergeLog {
    fn append(&self, entry: MergeLogEntry) -> LedgerResult<()> {
        let mut entries = self.entries.write().map_err(|_| LedgerError::LockPoisoned)?;
        while entries.len() >= self.capacity {
            entries.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped.is_power_of_two() {
                warn!(dropped, "merge log full, dropping oldest rows");
            }
        }
        entries.push_back(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(from: &str, to: &str) -> MergePair {
        MergePair::new(VoterId::new(from), VoterId::new(to)).unwrap()
    }

    #[test]
    fn append_and_filter_by_pair() {
        let log = InMemoryMergeLog::new();
        let ab = pair("a", "b");
        let cd = pair("c", "d");
        log.append(MergeLogEntry::new(&ab, MergeStep::MoveOrganization, 4, true, "ok"))
            .unwrap();
        log.append(MergeLogEntry::new(&cd, MergeStep::MoveDonations, 2, false, "FAILED"))
            .unwrap();
        assert_eq!(log.entries().unwrap().len(), 2);
        let rows = log.entries_for(&ab).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].step_name, MergeStep::MoveOrganization);
    }

    #[test]
    fn full_log_drops_oldest() {
        let log = InMemoryMergeLog::with_capacity(2);
        let p = pair("a", "b");
        for step in [MergeStep::MoveEmail, MergeStep::MoveSms, MergeStep::MoveFacebook] {
            log.append(MergeLogEntry::new(&p, step, 1, false, "x")).unwrap();
        }
        let rows = log.entries().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].step_name, MergeStep::MoveSms);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn entry_serializes_persisted_shape() {
        let entry = MergeLogEntry::new(&pair("a", "b"), MergeStep::MergeVoterRow, 8, true, "done");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["from_voter_we_vote_id"], "a");
        assert_eq!(json["step_name"], "merge-voter-row");
        assert_eq!(json["step_duration_ms"], 8);
    }
}
