use tracing::{info, warn};
use unify_store::{RecordStore, StoreResult};
use unify_types::{MergeStep, SocialNetwork, Voter, VoterId};

use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};

/// Copies scalar profile fields from "from" onto "to" and strips "from".
///
/// Runs after every domain has been repointed. Fields already set on "to"
/// are never overwritten; bit-flag fields are combined. The "from" row is
/// kept as a tombstone with its unique-constrained fields cleared.
pub struct VoterRowMover;

impl Mover for VoterRowMover {
    fn step(&self) -> MergeStep {
        MergeStep::MergeVoterRow
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::Reassign
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            let from = require_voter(store, &context.pair.from)?;
            let to = require_voter(store, &context.pair.to)?;

            let donor = with_linked_social_ids(store, &from, &to.we_vote_id)?;
            let merged_to = merged_profile(&donor, &to);
            let stripped_from = strip(store, &from, outcome)?;
            let merged_to = drop_dangling_organization(store, merged_to, outcome)?;

            // "from" first: the cleared fields are unique across voters.
            if stripped_from != from {
                store.save_voter(&stripped_from)?;
                outcome.moved += 1;
            }
            if merged_to != to {
                store.save_voter(&merged_to)?;
                outcome.moved += 1;
            }
            info!(from = %from.we_vote_id, to = %to.we_vote_id, "voter rows merged");
            Ok(())
        })
    }
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    let empty = target.as_deref().map_or(true, |v| v.trim().is_empty());
    if empty {
        if let Some(value) = source.as_deref().filter(|v| !v.trim().is_empty()) {
            *target = Some(value.to_string());
        }
    }
}

/// "to" with every missing profile field filled from "from".
pub(crate) fn merged_profile(from: &Voter, to: &Voter) -> Voter {
    let mut merged = to.clone();
    if merged.first_name.is_none() && merged.last_name.is_none() {
        merged.first_name = from.first_name.clone();
        merged.last_name = from.last_name.clone();
    } else {
        fill(&mut merged.first_name, &from.first_name);
        fill(&mut merged.last_name, &from.last_name);
    }
    fill(&mut merged.facebook_id, &from.facebook_id);
    if merged.twitter_id.is_none() && from.twitter_id.is_some() {
        merged.twitter_id = from.twitter_id.clone();
        merged.twitter_screen_name = from.twitter_screen_name.clone();
    }
    fill(&mut merged.twitter_screen_name, &from.twitter_screen_name);
    if merged.profile_images.is_empty() {
        merged.profile_images = from.profile_images.clone();
    }
    merged.notification_settings_flags |= from.notification_settings_flags;
    merged.interface_status_flags |= from.interface_status_flags;
    merged.data_to_preserve |= from.data_to_preserve;
    if from.date_joined < merged.date_joined {
        merged.date_joined = from.date_joined;
    }
    merged
}

/// `from` keeping only the cached social ids that `to` holds the identity
/// link for. A stale cached id would otherwise become a second claim.
fn with_linked_social_ids(
    store: &dyn RecordStore,
    from: &Voter,
    to: &VoterId,
) -> StoreResult<Voter> {
    let mut donor = from.clone();
    if let Some(id) = &from.facebook_id {
        if !holds_identity(store, SocialNetwork::Facebook, to, id)? {
            donor.facebook_id = None;
        }
    }
    if let Some(id) = &from.twitter_id {
        if !holds_identity(store, SocialNetwork::Twitter, to, id)? {
            donor.twitter_id = None;
            donor.twitter_screen_name = None;
        }
    }
    Ok(donor)
}

fn holds_identity(
    store: &dyn RecordStore,
    network: SocialNetwork,
    voter: &VoterId,
    external_id: &str,
) -> StoreResult<bool> {
    Ok(store
        .identity_link_for_voter(network, voter)?
        .is_some_and(|link| link.external_id == external_id.trim()))
}

/// "from" with its unique-constrained fields cleared.
///
/// A linked organization is only cleared when it no longer exists; a live
/// one is left for `move-organization` to resolve on a later run.
fn strip(store: &dyn RecordStore, from: &Voter, outcome: &mut MoveOutcome) -> StoreResult<Voter> {
    let mut stripped = from.clone();
    stripped.clear_email();
    stripped.clear_sms();
    stripped.facebook_id = None;
    stripped.twitter_id = None;
    stripped.twitter_screen_name = None;
    if let Some(org) = &from.linked_organization_id {
        if store.organization(org)?.is_some() {
            outcome.note(format!("from still owns organization {org}"));
            warn!(voter = %from.we_vote_id, organization = %org, "from voter still owns an organization");
        } else {
            stripped.linked_organization_id = None;
        }
    }
    Ok(stripped)
}

fn drop_dangling_organization(
    store: &dyn RecordStore,
    mut voter: Voter,
    outcome: &mut MoveOutcome,
) -> StoreResult<Voter> {
    if let Some(org) = voter.linked_organization_id.clone() {
        if store.organization(&org)?.is_none() {
            voter.linked_organization_id = None;
            outcome.note(format!("cleared dangling organization link {org}"));
        }
    }
    Ok(voter)
}
