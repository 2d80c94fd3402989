use tracing::debug;
use unify_store::{RecordStore, StoreResult};
use unify_types::{ItemDomain, MergeStep, VoterId};

use crate::mover::{guarded, MoveContext, MoveOutcome, MovePattern, Mover};

/// Repairs positions of both voters before they are moved, and again as the
/// last consistency sweep.
///
/// A position held by a voter with a linked organization must carry that
/// organization. A position attributed to the voter's linked organization
/// but held by another voter id is re-owned by the voter.
pub struct PositionRepairMover {
    step: MergeStep,
}

impl PositionRepairMover {
    pub fn initial() -> Self {
        Self {
            step: MergeStep::RepairPositions,
        }
    }

    pub fn final_sweep() -> Self {
        Self {
            step: MergeStep::FinalPositionRepair,
        }
    }
}

impl Mover for PositionRepairMover {
    fn step(&self) -> MergeStep {
        self.step
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::Reassign
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            repair_positions_for(&context.pair.from, store, outcome)?;
            repair_positions_for(&context.pair.to, store, outcome)
        })
    }
}

pub(crate) fn repair_positions_for(
    voter_id: &VoterId,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let Some(voter) = store.voter(voter_id)? else {
        return Ok(());
    };
    let Some(org) = voter.linked_organization_id else {
        return Ok(());
    };

    for mut position in store.items_referencing(ItemDomain::Position, voter_id)? {
        if !position.voter_id.matches(voter_id) {
            continue;
        }
        if position
            .organization_id
            .as_ref()
            .is_some_and(|held| held.matches(&org))
        {
            continue;
        }
        position.organization_id = Some(org.clone());
        match store.save_item(&position) {
            Ok(()) => outcome.moved += 1,
            Err(err) => outcome.row_failed(format!("position {}", position.id), &err),
        }
    }

    for mut position in store.items_for_organization(ItemDomain::Position, &org)? {
        if position.voter_id.matches(voter_id) {
            continue;
        }
        position.voter_id = voter_id.clone();
        match store.save_item(&position) {
            Ok(()) => outcome.moved += 1,
            Err(err) => outcome.row_failed(format!("position {}", position.id), &err),
        }
    }

    debug!(voter = %voter_id, repaired = outcome.moved, "positions repaired");
    Ok(())
}
