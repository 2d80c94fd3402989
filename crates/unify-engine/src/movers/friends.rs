use tracing::debug;
use unify_store::{RecordStore, StoreResult};
use unify_types::{Invitation, ItemDomain, MergeStep, VoterId};

use crate::mover::{guarded, MoveContext, MoveOutcome, MovePattern, Mover};
use crate::movers::items::move_items;

/// Moves friend edges, suggested-friend edges and friend invitations.
///
/// An edge or invitation that would connect "to" with itself is deleted, as
/// is one that duplicates an edge "to" already has with the same voter.
pub struct FriendsMover;

impl Mover for FriendsMover {
    fn step(&self) -> MergeStep {
        MergeStep::MoveFriends
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::ReassignOrDeleteDuplicate
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            move_items(ItemDomain::Friend, context, store, outcome)?;
            move_items(ItemDomain::SuggestedFriend, context, store, outcome)?;
            move_invitations(context, store, outcome)
        })
    }
}

fn rewrite(voter: &VoterId, from: &VoterId, to: &VoterId) -> VoterId {
    if voter.matches(from) {
        to.clone()
    } else {
        voter.clone()
    }
}

fn move_invitations(
    context: &MoveContext,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let from = &context.pair.from;
    let to = &context.pair.to;

    let invitations = store.invitations_referencing(from)?;
    if invitations.is_empty() {
        return Ok(());
    }
    let mut held: Vec<Invitation> = store
        .invitations_referencing(to)?
        .into_iter()
        .filter(|inv| !inv.references(from))
        .collect();

    for invitation in invitations {
        let mut updated = invitation.clone();
        updated.sender_voter_id = rewrite(&updated.sender_voter_id, from, to);
        updated.recipient_voter_id = updated
            .recipient_voter_id
            .as_ref()
            .map(|recipient| rewrite(recipient, from, to));

        let self_invite = updated
            .recipient_voter_id
            .as_ref()
            .is_some_and(|recipient| recipient.matches(&updated.sender_voter_id));
        let duplicate = held.iter().any(|other| {
            other.sender_voter_id.matches(&updated.sender_voter_id)
                && other.recipient_voter_id.is_some()
                && other.recipient_voter_id == updated.recipient_voter_id
        });

        if self_invite || duplicate {
            match store.delete_invitation(invitation.id) {
                Ok(_) => outcome.deleted += 1,
                Err(err) => outcome.row_failed(format!("invitation {}", invitation.id), &err),
            }
            continue;
        }

        match store.save_invitation(&updated) {
            Ok(()) => {
                outcome.moved += 1;
                held.push(updated);
            }
            Err(err) => outcome.row_failed(format!("invitation {}", invitation.id), &err),
        }
    }

    debug!(moved = outcome.moved, deleted = outcome.deleted, "invitations moved");
    Ok(())
}
