use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use unify_ledger::{MergeLedger, MergeLogEntry, MergeLogSink, MergeStatusRow};
use unify_store::RecordStore;
use unify_types::{MergePair, MergeStep};

use crate::config::MergeConfig;
use crate::lock::PairLocks;
use crate::mover::{MoveContext, MoveOutcome, Mover};
use crate::movers::default_movers;
use crate::notify::Notifier;

// ---------------------------------------------------------------------------
// StepReport
// ---------------------------------------------------------------------------

/// What happened to one step during an orchestrator call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcomeKind {
    Succeeded,
    /// The ledger already had the step complete; the mover was not run.
    AlreadyComplete,
    Failed,
    /// Skipped because an earlier step failed and the sweep was stopped.
    NotRun,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: MergeStep,
    pub outcome: StepOutcomeKind,
    pub milliseconds: u64,
    pub moved: usize,
    pub deleted: usize,
    pub detail: String,
}

impl StepReport {
    fn skipped(step: MergeStep, outcome: StepOutcomeKind) -> Self {
        Self {
            step,
            outcome,
            milliseconds: 0,
            moved: 0,
            deleted: 0,
            detail: String::new(),
        }
    }

    fn from_outcome(step: MergeStep, outcome: &MoveOutcome, milliseconds: u64) -> Self {
        Self {
            step,
            outcome: if outcome.success() {
                StepOutcomeKind::Succeeded
            } else {
                StepOutcomeKind::Failed
            },
            milliseconds,
            moved: outcome.moved,
            deleted: outcome.deleted,
            detail: outcome.status(),
        }
    }

    pub fn failed(&self) -> bool {
        self.outcome == StepOutcomeKind::Failed
    }
}

// ---------------------------------------------------------------------------
// MergeReport
// ---------------------------------------------------------------------------

/// The aggregate result of one orchestrator call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub pair: MergePair,
    /// Every step is complete and `total-merge` was recorded.
    pub success: bool,
    pub steps: Vec<StepReport>,
    /// False when the ledger could not be opened and progress was not persisted.
    pub tracked: bool,
    /// Another merge of the same pair was already running; nothing was done.
    pub in_progress: bool,
    pub elapsed: Duration,
}

impl MergeReport {
    fn refused(pair: MergePair) -> Self {
        Self {
            pair,
            success: false,
            steps: Vec::new(),
            tracked: false,
            in_progress: true,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failed_steps(&self) -> Vec<MergeStep> {
        self.steps
            .iter()
            .filter(|s| s.failed())
            .map(|s| s.step)
            .collect()
    }

    pub fn step(&self, step: MergeStep) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// The flat, human-readable status line returned to callers.
    pub fn status_string(&self) -> String {
        if self.in_progress {
            return "MERGE_IN_PROGRESS".to_string();
        }
        let mut parts = Vec::new();
        if !self.tracked {
            parts.push("LEDGER_UNAVAILABLE".to_string());
        }
        for step in self.steps.iter().filter(|s| s.failed()) {
            parts.push(format!("FAILED-{}: {}", step.step.status_token(), step.detail));
        }
        parts.push(if self.success {
            "MERGE_COMPLETE".to_string()
        } else {
            "MERGE_INCOMPLETE".to_string()
        });
        parts.join(" ")
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pair, self.status_string())
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// MergeOrchestrator
// ---------------------------------------------------------------------------

/// Runs the movers for a pair in fixed order, consulting and updating the
/// merge status ledger.
///
/// The sweep is best-effort: a failing step is left pending in the ledger
/// and the remaining steps still run. Calling again with the same pair
/// resumes, skipping every step the ledger already has complete.
pub struct MergeOrchestrator {
    movers: Vec<Box<dyn Mover>>,
    config: MergeConfig,
    locks: PairLocks,
}

impl MergeOrchestrator {
    /// An orchestrator with no movers. Use [`Self::add_mover`] or
    /// [`Self::with_default_steps`].
    pub fn new(config: MergeConfig) -> Self {
        Self {
            movers: Vec::new(),
            config,
            locks: PairLocks::new(),
        }
    }

    /// An orchestrator running the full mover sequence.
    pub fn with_default_steps(config: MergeConfig, notifier: Arc<dyn Notifier>) -> Self {
        let mut orchestrator = Self::new(config);
        for mover in default_movers(&orchestrator.config, notifier) {
            orchestrator.add_mover(mover);
        }
        orchestrator
    }

    /// Append a mover to the end of the sequence.
    pub fn add_mover(&mut self, mover: Box<dyn Mover>) {
        self.movers.push(mover);
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn mover_count(&self) -> usize {
        self.movers.len()
    }

    /// Merge `pair.from` into `pair.to`. Never returns an error; every
    /// failure is folded into the report.
    pub fn merge_accounts(
        &self,
        pair: &MergePair,
        store: &dyn RecordStore,
        ledger: &dyn MergeLedger,
        log: &dyn MergeLogSink,
    ) -> MergeReport {
        let Some(_guard) = self.locks.try_acquire(pair) else {
            warn!(%pair, "merge already in progress for pair");
            return MergeReport::refused(pair.clone());
        };
        let merge_start = Instant::now();

        let (mut row, tracked) = match ledger.open(pair) {
            Ok(row) => (row, true),
            Err(err) => {
                warn!(%pair, error = %err, "merge ledger unavailable; running untracked");
                (MergeStatusRow::new(pair.clone()), false)
            }
        };

        let mut steps = Vec::with_capacity(self.movers.len() + 1);
        let mut stopped = false;

        for mover in &self.movers {
            let step = mover.step();
            if stopped {
                steps.push(StepReport::skipped(step, StepOutcomeKind::NotRun));
                continue;
            }
            if row.is_step_complete(step) {
                debug!(%pair, %step, "step already complete");
                steps.push(StepReport::skipped(step, StepOutcomeKind::AlreadyComplete));
                continue;
            }

            let step_start = Instant::now();
            let outcome = match MoveContext::load(pair, store) {
                Ok(context) => mover.run(&context, store),
                Err(err) => {
                    let mut outcome = MoveOutcome::default();
                    outcome.errors.push(err.to_string());
                    outcome
                }
            };
            let milliseconds = millis(step_start.elapsed());
            let report = StepReport::from_outcome(step, &outcome, milliseconds);

            if outcome.success() {
                row.mark_complete(step, milliseconds);
                if tracked {
                    if let Err(err) = ledger.mark_step_complete(pair, step, milliseconds) {
                        warn!(%pair, %step, error = %err, "could not record step completion");
                    }
                }
                info!(%pair, %step, elapsed_ms = milliseconds, moved = outcome.moved, deleted = outcome.deleted, "step complete");
                if step.logged_unconditionally() || self.config.log_successful_steps {
                    self.write_log(log, pair, step, milliseconds, true, &report.detail);
                }
            } else {
                warn!(%pair, %step, elapsed_ms = milliseconds, status = %report.detail, "step failed");
                self.write_log(log, pair, step, milliseconds, false, &report.detail);
                stopped = self.config.stop_on_first_failure;
            }
            steps.push(report);
        }

        let all_done = steps.iter().all(|s| {
            matches!(
                s.outcome,
                StepOutcomeKind::Succeeded | StepOutcomeKind::AlreadyComplete
            )
        });
        let total_ms = millis(merge_start.elapsed());
        let total = if row.total_merge_complete {
            StepReport::skipped(MergeStep::TotalMerge, StepOutcomeKind::AlreadyComplete)
        } else if all_done {
            row.mark_complete(MergeStep::TotalMerge, total_ms);
            if tracked {
                if let Err(err) = ledger.mark_step_complete(pair, MergeStep::TotalMerge, total_ms) {
                    warn!(%pair, error = %err, "could not record merge completion");
                }
            }
            self.write_log(log, pair, MergeStep::TotalMerge, total_ms, true, "merge complete");
            StepReport {
                step: MergeStep::TotalMerge,
                outcome: StepOutcomeKind::Succeeded,
                milliseconds: total_ms,
                moved: 0,
                deleted: 0,
                detail: "merge complete".to_string(),
            }
        } else {
            let failed = steps.iter().filter(|s| s.failed()).count();
            let detail = format!("{failed} step(s) failed");
            self.write_log(log, pair, MergeStep::TotalMerge, total_ms, false, &detail);
            StepReport::skipped(MergeStep::TotalMerge, StepOutcomeKind::NotRun)
        };
        steps.push(total);

        let report = MergeReport {
            pair: pair.clone(),
            success: row.total_merge_complete,
            steps,
            tracked,
            in_progress: false,
            elapsed: merge_start.elapsed(),
        };
        info!(%pair, success = report.success, tracked, elapsed_ms = millis(report.elapsed), "merge finished");
        report
    }

    fn write_log(
        &self,
        log: &dyn MergeLogSink,
        pair: &MergePair,
        step: MergeStep,
        milliseconds: u64,
        success: bool,
        status: &str,
    ) {
        let entry = MergeLogEntry::new(pair, step, milliseconds, success, status);
        if let Err(err) = log.append(entry) {
            debug!(%pair, %step, error = %err, "merge log row dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::{guarded, MovePattern};
    use unify_ledger::{InMemoryMergeLedger, InMemoryMergeLog, MergeLedgerReader};
    use unify_store::{InMemoryRecordStore, VoterRepository};
    use unify_types::{Voter, VoterId};

    struct FixedMover {
        step: MergeStep,
        fail: bool,
    }

    impl Mover for FixedMover {
        fn step(&self) -> MergeStep {
            self.step
        }

        fn pattern(&self) -> MovePattern {
            MovePattern::Reassign
        }

        fn run(&self, _context: &MoveContext, _store: &dyn RecordStore) -> MoveOutcome {
            let fail = self.fail;
            guarded(|outcome| {
                if fail {
                    outcome.errors.push("boom".into());
                } else {
                    outcome.moved += 1;
                }
                Ok(())
            })
        }
    }

    fn setup() -> (InMemoryRecordStore, MergePair) {
        let store = InMemoryRecordStore::new();
        store.save_voter(&Voter::new(VoterId::new("a"))).unwrap();
        store.save_voter(&Voter::new(VoterId::new("b"))).unwrap();
        (store, MergePair::new(VoterId::new("a"), VoterId::new("b")).unwrap())
    }

    fn orchestrator(config: MergeConfig, failing: MergeStep) -> MergeOrchestrator {
        let mut orchestrator = MergeOrchestrator::new(config);
        for step in [MergeStep::RepairPositions, MergeStep::MovePositions, MergeStep::MergeVoterRow] {
            orchestrator.add_mover(Box::new(FixedMover {
                step,
                fail: step == failing,
            }));
        }
        orchestrator
    }

    #[test]
    fn failure_does_not_stop_the_sweep_by_default() {
        let (store, pair) = setup();
        let ledger = InMemoryMergeLedger::new();
        let log = InMemoryMergeLog::new();
        let orchestrator = orchestrator(MergeConfig::default(), MergeStep::MovePositions);

        let report = orchestrator.merge_accounts(&pair, &store, &ledger, &log);
        assert!(!report.success);
        assert_eq!(report.failed_steps(), vec![MergeStep::MovePositions]);
        assert!(report.status_string().contains("FAILED-MOVE_POSITIONS"));
        assert_eq!(
            report.step(MergeStep::MergeVoterRow).map(|s| s.outcome),
            Some(StepOutcomeKind::Succeeded)
        );

        let row = ledger.status(&pair).unwrap().unwrap();
        assert!(row.is_step_complete(MergeStep::RepairPositions));
        assert!(!row.is_step_complete(MergeStep::MovePositions));
        assert!(row.is_step_complete(MergeStep::MergeVoterRow));
        assert!(!row.total_merge_complete);
    }

    #[test]
    fn stop_on_first_failure_leaves_rest_not_run() {
        let (store, pair) = setup();
        let ledger = InMemoryMergeLedger::new();
        let log = InMemoryMergeLog::new();
        let orchestrator = orchestrator(MergeConfig::verbose(), MergeStep::MovePositions);

        let report = orchestrator.merge_accounts(&pair, &store, &ledger, &log);
        assert_eq!(
            report.step(MergeStep::MergeVoterRow).map(|s| s.outcome),
            Some(StepOutcomeKind::NotRun)
        );
        // verbose logs every success as well as the failure and the total row
        assert_eq!(log.entries().unwrap().len(), 3);
    }

    #[test]
    fn logs_only_failures_and_first_class_steps() {
        let (store, pair) = setup();
        let ledger = InMemoryMergeLedger::new();
        let log = InMemoryMergeLog::new();
        let orchestrator = orchestrator(MergeConfig::default(), MergeStep::TotalMerge);

        let report = orchestrator.merge_accounts(&pair, &store, &ledger, &log);
        assert!(report.success);
        assert_eq!(report.status_string(), "MERGE_COMPLETE");
        let steps: Vec<MergeStep> = log.entries().unwrap().iter().map(|e| e.step_name).collect();
        assert_eq!(steps, vec![MergeStep::MergeVoterRow, MergeStep::TotalMerge]);
    }

    #[test]
    fn missing_voter_fails_every_step() {
        let store = InMemoryRecordStore::new();
        let pair = MergePair::new(VoterId::new("a"), VoterId::new("b")).unwrap();
        let ledger = InMemoryMergeLedger::new();
        let log = InMemoryMergeLog::new();
        let orchestrator = orchestrator(MergeConfig::default(), MergeStep::TotalMerge);

        let report = orchestrator.merge_accounts(&pair, &store, &ledger, &log);
        assert!(!report.success);
        assert_eq!(report.failed_steps().len(), 3);
    }

    #[test]
    fn held_pair_is_refused() {
        let (store, pair) = setup();
        let ledger = InMemoryMergeLedger::new();
        let log = InMemoryMergeLog::new();
        let orchestrator = orchestrator(MergeConfig::default(), MergeStep::TotalMerge);

        let _held = orchestrator.locks.try_acquire(&pair).unwrap();
        let report = orchestrator.merge_accounts(&pair, &store, &ledger, &log);
        assert!(report.in_progress);
        assert!(!report.success);
        assert_eq!(report.status_string(), "MERGE_IN_PROGRESS");
        assert!(ledger.status(&pair).unwrap().is_none());
    }

    #[test]
    fn default_sequence_has_every_step_but_total() {
        let orchestrator = MergeOrchestrator::with_default_steps(
            MergeConfig::default(),
            Arc::new(crate::notify::RecordingNotifier::new()),
        );
        assert_eq!(orchestrator.mover_count(), MergeStep::ORDER.len() - 1);
    }
}
