use std::fmt;

use serde::{Deserialize, Serialize};
use unify_store::{RecordStore, StoreError, StoreResult};
use unify_types::{MergePair, MergeStep, OrganizationId, Voter};

// ---------------------------------------------------------------------------
// MovePattern
// ---------------------------------------------------------------------------

/// How a mover resolves collisions between "from" and "to" rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePattern {
    /// Update the foreign key from "from" to "to".
    Reassign,
    /// Reassign, but delete the "from" copy when "to" already has an equivalent.
    ReassignOrDeleteDuplicate,
    /// Fold one first-class entity into another and delete the source.
    MergeThenDeleteSource,
}

// ---------------------------------------------------------------------------
// MoveContext
// ---------------------------------------------------------------------------

/// What a mover knows about the pair it is working on.
///
/// Re-read from the store before every step so that later movers see the
/// linked organization produced by `move-organization`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveContext {
    pub pair: MergePair,
    pub from_linked_organization: Option<OrganizationId>,
    pub to_linked_organization: Option<OrganizationId>,
}

impl MoveContext {
    /// A context with no linked organizations (useful for tests).
    pub fn minimal(pair: MergePair) -> Self {
        Self {
            pair,
            from_linked_organization: None,
            to_linked_organization: None,
        }
    }

    pub fn load(pair: &MergePair, store: &dyn RecordStore) -> StoreResult<Self> {
        let from = require_voter(store, &pair.from)?;
        let to = require_voter(store, &pair.to)?;
        Ok(Self {
            pair: pair.clone(),
            from_linked_organization: from.linked_organization_id,
            to_linked_organization: to.linked_organization_id,
        })
    }
}

/// Read a voter that must exist.
pub(crate) fn require_voter(
    store: &dyn RecordStore,
    id: &unify_types::VoterId,
) -> StoreResult<Voter> {
    store
        .voter(id)?
        .ok_or_else(|| StoreError::not_found("voter", id))
}

// ---------------------------------------------------------------------------
// MoveOutcome
// ---------------------------------------------------------------------------

/// Counters and messages from one mover run.
///
/// A run succeeds when no row failed and no store call aborted it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub moved: usize,
    pub deleted: usize,
    pub not_moved: usize,
    pub notes: Vec<String>,
    pub errors: Vec<String>,
}

impl MoveOutcome {
    pub fn success(&self) -> bool {
        self.not_moved == 0 && self.errors.is_empty()
    }

    /// Nothing was touched.
    pub fn is_noop(&self) -> bool {
        self.moved == 0 && self.deleted == 0 && self.not_moved == 0
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// One row could not be written; siblings keep going.
    pub fn row_failed(&mut self, row: impl fmt::Display, err: &StoreError) {
        self.not_moved += 1;
        self.errors.push(format!("{row}: {err}"));
    }

    /// Short human-readable summary.
    pub fn status(&self) -> String {
        let mut parts = vec![format!("moved {}", self.moved)];
        if self.deleted > 0 {
            parts.push(format!("deleted {}", self.deleted));
        }
        if self.not_moved > 0 {
            parts.push(format!("not moved {}", self.not_moved));
        }
        parts.extend(self.notes.iter().cloned());
        parts.extend(self.errors.iter().cloned());
        parts.join(", ")
    }
}

/// Run `body`, turning an aborting store error into a failed outcome.
pub fn guarded<F>(body: F) -> MoveOutcome
where
    F: FnOnce(&mut MoveOutcome) -> StoreResult<()>,
{
    let mut outcome = MoveOutcome::default();
    if let Err(err) = body(&mut outcome) {
        outcome.errors.push(err.to_string());
    }
    outcome
}

// ---------------------------------------------------------------------------
// Mover trait
// ---------------------------------------------------------------------------

/// One named, idempotent data-migration step.
///
/// Movers never return errors: store failures are caught and reported in the
/// [`MoveOutcome`]. Running a mover with nothing left to move is a successful
/// no-op that writes nothing.
///
/// The trait is object-safe and `Send + Sync` so movers can be stored in a
/// `Vec<Box<dyn Mover>>`.
pub trait Mover: Send + Sync {
    /// The ledger step this mover completes.
    fn step(&self) -> MergeStep;

    fn pattern(&self) -> MovePattern;

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome;
}
