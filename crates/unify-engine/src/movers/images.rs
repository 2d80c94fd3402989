use tracing::debug;
use unify_store::RecordStore;
use unify_types::MergeStep;

use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};

/// Pushes the merged voter's profile images onto its linked organization.
pub struct ImageMover;

impl Mover for ImageMover {
    fn step(&self) -> MergeStep {
        MergeStep::MoveImages
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::Reassign
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            let to = require_voter(store, &context.pair.to)?;
            if to.profile_images.is_empty() {
                return Ok(());
            }
            let Some(org_id) = &to.linked_organization_id else {
                return Ok(());
            };
            let Some(mut org) = store.organization(org_id)? else {
                return Ok(());
            };
            if org.profile_images == to.profile_images {
                return Ok(());
            }
            org.profile_images = to.profile_images.clone();
            store.save_organization(&org)?;
            outcome.moved += 1;
            debug!(organization = %org_id, "profile images copied");
            Ok(())
        })
    }
}
