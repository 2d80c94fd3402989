use tracing::{debug, info, warn};
use unify_store::{RecordStore, StoreResult};
use unify_types::{
    ItemDomain, MergePair, MergeStep, Organization, OrganizationId, SocialNetwork, Voter, VoterId,
};

use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};

/// Moves the "from" voter's organization to the "to" voter.
///
/// When both voters own a distinct organization the two are folded into one:
/// the survivor absorbs the other's missing profile fields, identity links,
/// attributed items and followers, and the other is deleted. The survivor is
/// the "to" organization unless only the "from" organization is tied to a
/// third-party identity.
///
/// Every run ends by checking that the "to" voter's linked organization is
/// owned by the "to" voter and is the organization its identity links name,
/// and repairs both if not.
pub struct OrganizationMover;

impl Mover for OrganizationMover {
    fn step(&self) -> MergeStep {
        MergeStep::MoveOrganization
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::MergeThenDeleteSource
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            move_organization(&context.pair, store, outcome)?;
            heal_ownership(&context.pair, store, outcome)?;
            for network in SocialNetwork::ALL {
                reconcile_identity_organization(&context.pair.to, network, store, outcome)?;
            }
            Ok(())
        })
    }
}

/// Load the organization a voter points at, treating a dangling pointer as none.
fn linked_organization(
    store: &dyn RecordStore,
    voter: &Voter,
    outcome: &mut MoveOutcome,
) -> StoreResult<Option<Organization>> {
    let Some(id) = &voter.linked_organization_id else {
        return Ok(None);
    };
    let organization = store.organization(id)?;
    if organization.is_none() {
        outcome.note(format!("{} links missing organization {id}", voter.we_vote_id));
    }
    Ok(organization)
}

pub(crate) fn move_organization(
    pair: &MergePair,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let mut from = require_voter(store, &pair.from)?;
    let mut to = require_voter(store, &pair.to)?;
    let from_org = linked_organization(store, &from, outcome)?;
    let to_org = linked_organization(store, &to, outcome)?;

    match (from_org, to_org) {
        (None, _) => {
            if from.linked_organization_id.is_some() {
                from.linked_organization_id = None;
                store.save_voter(&from)?;
            }
        }
        (Some(org), None) => {
            // Clear "from" first: the linked organization column is unique.
            from.linked_organization_id = None;
            store.save_voter(&from)?;
            to.linked_organization_id = Some(org.we_vote_id.clone());
            store.save_voter(&to)?;
            let mut org = org;
            org.owner_voter_id = Some(to.we_vote_id.clone());
            store.save_organization(&org)?;
            outcome.moved += 1;
            info!(organization = %org.we_vote_id, to = %to.we_vote_id, "organization transferred");
        }
        (Some(f), Some(t)) if f.we_vote_id.matches(&t.we_vote_id) => {
            from.linked_organization_id = None;
            store.save_voter(&from)?;
        }
        (Some(f), Some(t)) => {
            let (survivor, dead) = choose_survivor(store, f, t)?;
            if !merge_organizations(store, survivor.clone(), &dead, outcome)? {
                // Both links stay so the next run folds the remainder.
                return Ok(());
            }
            from.linked_organization_id = None;
            store.save_voter(&from)?;
            if !to
                .linked_organization_id
                .as_ref()
                .is_some_and(|id| id.matches(&survivor.we_vote_id))
            {
                to.linked_organization_id = Some(survivor.we_vote_id.clone());
                store.save_voter(&to)?;
            }
        }
    }
    Ok(())
}

/// Pick which of two organizations survives a fold.
fn choose_survivor(
    store: &dyn RecordStore,
    from_org: Organization,
    to_org: Organization,
) -> StoreResult<(Organization, Organization)> {
    let from_linked = !store
        .organization_identity_links_for(&from_org.we_vote_id)?
        .is_empty();
    let to_linked = !store
        .organization_identity_links_for(&to_org.we_vote_id)?
        .is_empty();
    if from_linked && !to_linked {
        Ok((from_org, to_org))
    } else {
        Ok((to_org, from_org))
    }
}

/// Fold `dead` into `survivor` and delete `dead`. Returns whether `dead`
/// was deleted; it is kept while any of its rows failed to move.
///
/// Owner pointers are not touched here; callers fix voter links afterwards.
pub(crate) fn merge_organizations(
    store: &dyn RecordStore,
    mut survivor: Organization,
    dead: &Organization,
    outcome: &mut MoveOutcome,
) -> StoreResult<bool> {
    let failed_before = outcome.not_moved;
    let survivor_id = survivor.we_vote_id.clone();
    let dead_id = dead.we_vote_id.clone();

    if survivor.absorb_missing(dead) {
        store.save_organization(&survivor)?;
    }

    for mut link in store.organization_identity_links_for(&dead_id)? {
        link.organization_id = survivor_id.clone();
        match store.save_organization_identity_link(&link) {
            Ok(()) => outcome.moved += 1,
            Err(err) => outcome.row_failed(format!("{} link {}", link.network, link.external_id), &err),
        }
    }

    for domain in ItemDomain::ALL.iter().filter(|d| d.carries_organization()) {
        for mut item in store.items_for_organization(*domain, &dead_id)? {
            item.organization_id = Some(survivor_id.clone());
            match store.save_item(&item) {
                Ok(()) => outcome.moved += 1,
                Err(err) => outcome.row_failed(format!("{domain} {}", item.id), &err),
            }
        }
    }

    repoint_followers(store, &survivor_id, &dead_id, outcome)?;

    if outcome.not_moved > failed_before {
        warn!(survivor = %survivor_id, dead = %dead_id, "organization kept; rows still point at it");
        return Ok(false);
    }
    store.delete_organization(&dead_id)?;
    outcome.deleted += 1;
    info!(survivor = %survivor_id, deleted = %dead_id, "organizations merged");
    Ok(true)
}

/// Follows of the dead organization become follows of the survivor.
fn repoint_followers(
    store: &dyn RecordStore,
    survivor: &OrganizationId,
    dead: &OrganizationId,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let mut following: Vec<_> = store
        .items_with_subject(ItemDomain::FollowOrganization, survivor.as_str())?
        .into_iter()
        .map(|follow| follow.voter_id)
        .collect();

    for mut follow in store.items_with_subject(ItemDomain::FollowOrganization, dead.as_str())? {
        if following.iter().any(|voter| voter.matches(&follow.voter_id)) {
            match store.delete_item(follow.id) {
                Ok(_) => outcome.deleted += 1,
                Err(err) => outcome.row_failed(format!("follow {}", follow.id), &err),
            }
            continue;
        }
        follow.subject = Some(survivor.as_str().to_string());
        match store.save_item(&follow) {
            Ok(()) => {
                outcome.moved += 1;
                following.push(follow.voter_id);
            }
            Err(err) => outcome.row_failed(format!("follow {}", follow.id), &err),
        }
    }
    Ok(())
}

/// Make "to" and its linked organization point at each other.
fn heal_ownership(
    pair: &MergePair,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let mut to = require_voter(store, &pair.to)?;
    let Some(org_id) = to.linked_organization_id.clone() else {
        return Ok(());
    };
    match store.organization(&org_id)? {
        None => {
            to.linked_organization_id = None;
            store.save_voter(&to)?;
            outcome.note(format!("cleared dangling organization link {org_id}"));
            warn!(voter = %to.we_vote_id, organization = %org_id, "dangling organization link cleared");
        }
        Some(mut org) if !org.is_owned_by(&to.we_vote_id) => {
            org.owner_voter_id = Some(to.we_vote_id.clone());
            store.save_organization(&org)?;
            outcome.note(format!("repaired owner of {org_id}"));
            debug!(voter = %to.we_vote_id, organization = %org_id, "organization owner repaired");
        }
        Some(_) => {}
    }
    Ok(())
}

/// Make the organization tied to a voter's identity on `network` the
/// voter's own linked organization.
///
/// A second organization named by the identity is folded into the voter's;
/// a link to a deleted organization is repointed; a voter without an
/// organization adopts an unclaimed one.
pub(crate) fn reconcile_identity_organization(
    voter_id: &VoterId,
    network: SocialNetwork,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let Some(mut voter) = store.voter(voter_id)? else {
        return Ok(());
    };
    let Some(link) = store.identity_link_for_voter(network, voter_id)? else {
        return Ok(());
    };
    let Some(mut org_link) = store.organization_identity_link(network, &link.external_id)? else {
        return Ok(());
    };
    let named = store.organization(&org_link.organization_id)?;
    let own = match &voter.linked_organization_id {
        Some(id) => store.organization(id)?,
        None => None,
    };

    match (own, named) {
        (Some(own), _) if own.we_vote_id.matches(&org_link.organization_id) => {}
        (Some(own), None) => {
            org_link.organization_id = own.we_vote_id.clone();
            store.save_organization_identity_link(&org_link)?;
            outcome.note(format!("repointed {network} organization link to {}", own.we_vote_id));
            warn!(%network, external_id = %org_link.external_id, organization = %own.we_vote_id, "organization link repointed");
        }
        (Some(own), Some(other)) => {
            let own_id = own.we_vote_id.clone();
            if merge_organizations(store, own, &other, outcome)? {
                release_organization(store, &other, voter_id)?;
                outcome.note(format!("folded {} into {own_id} for {network}", other.we_vote_id));
            }
        }
        (None, Some(mut other)) => {
            if claimed_by_other(store, &other, voter_id)? {
                outcome.note(format!("{network} organization {} belongs to another voter", other.we_vote_id));
                return Ok(());
            }
            voter.linked_organization_id = Some(other.we_vote_id.clone());
            store.save_voter(&voter)?;
            other.owner_voter_id = Some(voter.we_vote_id.clone());
            store.save_organization(&other)?;
            outcome.moved += 1;
            info!(voter = %voter_id, organization = %other.we_vote_id, "identity organization adopted");
        }
        (None, None) => {}
    }
    Ok(())
}

/// Another voter owns `org` and links back to it.
fn claimed_by_other(
    store: &dyn RecordStore,
    org: &Organization,
    voter_id: &VoterId,
) -> StoreResult<bool> {
    let Some(owner_id) = org.owner_voter_id.as_ref().filter(|id| !id.matches(voter_id)) else {
        return Ok(false);
    };
    Ok(store.voter(owner_id)?.is_some_and(|owner| {
        owner
            .linked_organization_id
            .as_ref()
            .is_some_and(|id| id.matches(&org.we_vote_id))
    }))
}

/// Clear the link of whichever other voter pointed at a deleted organization.
fn release_organization(
    store: &dyn RecordStore,
    deleted: &Organization,
    keep: &VoterId,
) -> StoreResult<()> {
    let Some(owner_id) = deleted.owner_voter_id.as_ref().filter(|id| !id.matches(keep)) else {
        return Ok(());
    };
    if let Some(mut owner) = store.voter(owner_id)? {
        if owner
            .linked_organization_id
            .as_ref()
            .is_some_and(|id| id.matches(&deleted.we_vote_id))
        {
            owner.linked_organization_id = None;
            store.save_voter(&owner)?;
        }
    }
    Ok(())
}
