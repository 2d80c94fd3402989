use tracing::info;
use unify_store::RecordStore;
use unify_types::{MergeStep, SocialNetwork, Voter};

use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};

/// Moves the "from" voter's Facebook, Twitter or Apple identity link.
///
/// If "to" already has its own link for the network, the "from" link is
/// deleted: a voter holds at most one link per network and the surviving
/// account's link wins.
pub struct IdentityLinkMover {
    network: SocialNetwork,
}

impl IdentityLinkMover {
    pub fn new(network: SocialNetwork) -> Self {
        Self { network }
    }
}

/// The voter's cached id for `network`, if the voter row caches one.
fn cached_id(network: SocialNetwork, voter: &Voter) -> Option<&str> {
    match network {
        SocialNetwork::Facebook => voter.facebook_id.as_deref(),
        SocialNetwork::Twitter => voter.twitter_id.as_deref(),
        SocialNetwork::Apple => None,
    }
}

fn set_cached_id(network: SocialNetwork, voter: &mut Voter, external_id: Option<String>) {
    match network {
        SocialNetwork::Facebook => voter.facebook_id = external_id,
        SocialNetwork::Twitter => voter.twitter_id = external_id,
        SocialNetwork::Apple => {}
    }
}

impl Mover for IdentityLinkMover {
    fn step(&self) -> MergeStep {
        match self.network {
            SocialNetwork::Facebook => MergeStep::MoveFacebook,
            SocialNetwork::Twitter => MergeStep::MoveTwitter,
            SocialNetwork::Apple => MergeStep::MoveApple,
        }
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::ReassignOrDeleteDuplicate
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        let network = self.network;
        guarded(|outcome| {
            let from_id = &context.pair.from;
            let to_id = &context.pair.to;
            let Some(mut link) = store.identity_link_for_voter(network, from_id)? else {
                return Ok(());
            };
            let external_id = link.external_id.clone();

            if store.identity_link_for_voter(network, to_id)?.is_some() {
                store.delete_identity_link(network, &external_id)?;
                outcome.deleted += 1;
            } else {
                link.voter_id = to_id.clone();
                store.save_identity_link(&link)?;
                outcome.moved += 1;

                let mut to = require_voter(store, to_id)?;
                if cached_id(network, &to).is_none() && network != SocialNetwork::Apple {
                    set_cached_id(network, &mut to, Some(external_id.clone()));
                    store.save_voter(&to)?;
                }
            }

            let mut from = require_voter(store, from_id)?;
            if cached_id(network, &from) == Some(external_id.as_str()) {
                set_cached_id(network, &mut from, None);
                if network == SocialNetwork::Twitter {
                    from.twitter_screen_name = None;
                }
                store.save_voter(&from)?;
            }
            info!(%network, %external_id, from = %from_id, to = %to_id, "identity link moved");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unify_store::{IdentityLinkRepository, InMemoryRecordStore, VoterRepository};
    use unify_types::{IdentityLink, MergePair, VoterId};

    fn v(id: &str) -> VoterId {
        VoterId::new(id)
    }

    fn setup() -> (InMemoryRecordStore, MoveContext) {
        let store = InMemoryRecordStore::new();
        let mut from = Voter::new(v("from"));
        from.facebook_id = Some("1001".into());
        store.save_voter(&from).unwrap();
        store.save_voter(&Voter::new(v("to"))).unwrap();
        let context = MoveContext::minimal(MergePair::new(v("from"), v("to")).unwrap());
        (store, context)
    }

    #[test]
    fn link_moves_when_to_has_none() {
        let (store, context) = setup();
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Facebook, "1001", v("from")))
            .unwrap();

        let outcome = IdentityLinkMover::new(SocialNetwork::Facebook).run(&context, &store);
        assert!(outcome.success(), "{}", outcome.status());
        let link = store.identity_link(SocialNetwork::Facebook, "1001").unwrap().unwrap();
        assert_eq!(link.voter_id, v("to"));
        assert_eq!(store.voter(&v("to")).unwrap().unwrap().facebook_id.as_deref(), Some("1001"));
        assert_eq!(store.voter(&v("from")).unwrap().unwrap().facebook_id, None);
    }

    #[test]
    fn to_link_wins() {
        let (store, context) = setup();
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Facebook, "1001", v("from")))
            .unwrap();
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Facebook, "2002", v("to")))
            .unwrap();

        let outcome = IdentityLinkMover::new(SocialNetwork::Facebook).run(&context, &store);
        assert!(outcome.success());
        assert_eq!(outcome.deleted, 1);
        assert!(store.identity_link(SocialNetwork::Facebook, "1001").unwrap().is_none());
        assert!(store
            .identity_link_for_voter(SocialNetwork::Facebook, &v("from"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn apple_link_moves_without_cache() {
        let (store, context) = setup();
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Apple, "apple-1", v("from")))
            .unwrap();
        let outcome = IdentityLinkMover::new(SocialNetwork::Apple).run(&context, &store);
        assert!(outcome.success());
        assert_eq!(IdentityLinkMover::new(SocialNetwork::Apple).step(), MergeStep::MoveApple);
        let link = store.identity_link(SocialNetwork::Apple, "apple-1").unwrap().unwrap();
        assert_eq!(link.voter_id, v("to"));
    }

    #[test]
    fn missing_link_is_a_noop() {
        let (store, context) = setup();
        let writes = store.write_count().unwrap();
        let outcome = IdentityLinkMover::new(SocialNetwork::Twitter).run(&context, &store);
        assert!(outcome.success());
        assert_eq!(store.write_count().unwrap(), writes);
    }
}
