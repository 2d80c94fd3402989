use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use unify_types::{MergePair, MergeStep};

/// Completion record for one step of one pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub complete: bool,
    pub milliseconds: u64,
}

/// The persisted progress of merging `pair.from` into `pair.to`.
///
/// Steps missing from `steps` are pending. A row is created on the first
/// merge attempt for a pair, updated in place as steps finish, and never
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStatusRow {
    pub pair: MergePair,
    #[serde(default)]
    pub steps: BTreeMap<MergeStep, StepStatus>,
    pub total_merge_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MergeStatusRow {
    pub fn new(pair: MergePair) -> Self {
        let now = Utc::now();
        Self {
            pair,
            steps: BTreeMap::new(),
            total_merge_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_step_complete(&self, step: MergeStep) -> bool {
        if step == MergeStep::TotalMerge {
            return self.total_merge_complete;
        }
        self.steps.get(&step).is_some_and(|s| s.complete)
    }

    pub fn step_milliseconds(&self, step: MergeStep) -> u64 {
        self.steps.get(&step).map_or(0, |s| s.milliseconds)
    }

    pub fn mark_complete(&mut self, step: MergeStep, milliseconds: u64) {
        self.steps.insert(
            step,
            StepStatus {
                complete: true,
                milliseconds,
            },
        );
        if step == MergeStep::TotalMerge {
            self.total_merge_complete = true;
        }
        self.updated_at = Utc::now();
    }

    /// Steps still pending, in execution order.
    pub fn pending_steps(&self) -> Vec<MergeStep> {
        MergeStep::ORDER
            .iter()
            .copied()
            .filter(|step| !self.is_step_complete(*step))
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        MergeStep::ORDER.len() - self.pending_steps().len()
    }

    /// The flat column shape of the persisted row:
    /// `from_voter_we_vote_id`, `to_voter_we_vote_id`, then one
    /// `<step>_complete` / `<step>_milliseconds` pair per step.
    pub fn to_columns(&self) -> BTreeMap<String, Value> {
        let mut columns = BTreeMap::new();
        columns.insert(
            "from_voter_we_vote_id".to_string(),
            Value::from(self.pair.from.as_str()),
        );
        columns.insert(
            "to_voter_we_vote_id".to_string(),
            Value::from(self.pair.to.as_str()),
        );
        for step in MergeStep::ORDER {
            let stem = step.column_stem();
            columns.insert(
                format!("{stem}_complete"),
                Value::from(self.is_step_complete(step)),
            );
            columns.insert(
                format!("{stem}_milliseconds"),
                Value::from(self.step_milliseconds(step)),
            );
        }
        columns
    }
}
