use tracing::debug;
use unify_store::{RecordStore, StoreResult};
use unify_types::{DuplicateKey, ItemDomain, MergeStep, OwnedItem, VoterId};

use crate::mover::{guarded, MoveContext, MoveOutcome, MovePattern, Mover};

/// Moves every row of one [`ItemDomain`] from "from" to "to".
///
/// Domains without a duplicate key are plain reassigns. Domains with one
/// delete the "from" copy when "to" already holds an equivalent row, and
/// drop edges that would point a voter at itself.
pub struct ItemMover {
    step: MergeStep,
    domain: ItemDomain,
}

impl ItemMover {
    pub fn new(step: MergeStep, domain: ItemDomain) -> Self {
        Self { step, domain }
    }

    pub fn domain(&self) -> ItemDomain {
        self.domain
    }
}

impl Mover for ItemMover {
    fn step(&self) -> MergeStep {
        self.step
    }

    fn pattern(&self) -> MovePattern {
        match self.domain.duplicate_key() {
            DuplicateKey::None => MovePattern::Reassign,
            _ => MovePattern::ReassignOrDeleteDuplicate,
        }
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| move_items(self.domain, context, store, outcome))
    }
}

/// Whether `candidate` (already rewritten to "to") duplicates one of `held`.
fn duplicates(candidate: &OwnedItem, held: &[OwnedItem], to: &VoterId) -> bool {
    match candidate.domain.duplicate_key() {
        DuplicateKey::None => false,
        DuplicateKey::Subject => held.iter().any(|other| {
            other.id != candidate.id
                && other.voter_id.matches(to)
                && other.subject.is_some()
                && other.subject.as_deref().map(str::to_ascii_lowercase)
                    == candidate.subject.as_deref().map(str::to_ascii_lowercase)
        }),
        DuplicateKey::Counterpart => {
            let wanted = candidate.other_side(to);
            held.iter()
                .any(|other| other.id != candidate.id && wanted.is_some() && other.other_side(to) == wanted)
        }
    }
}

fn is_self_edge(item: &OwnedItem) -> bool {
    item.counterpart_voter_id
        .as_ref()
        .is_some_and(|counterpart| counterpart.matches(&item.voter_id))
}

/// Reassign or delete every `domain` row still referencing "from".
pub(crate) fn move_items(
    domain: ItemDomain,
    context: &MoveContext,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let from = &context.pair.from;
    let to = &context.pair.to;

    let items = store.items_referencing(domain, from)?;
    if items.is_empty() {
        return Ok(());
    }
    let mut held = match domain.duplicate_key() {
        DuplicateKey::None => Vec::new(),
        _ => store.items_referencing(domain, to)?,
    };

    for item in items {
        let mut updated = item.clone();
        if updated.voter_id.matches(from) {
            updated.voter_id = to.clone();
        }
        if updated
            .counterpart_voter_id
            .as_ref()
            .is_some_and(|counterpart| counterpart.matches(from))
        {
            updated.counterpart_voter_id = Some(to.clone());
        }

        if is_self_edge(&updated) || duplicates(&updated, &held, to) {
            match store.delete_item(item.id) {
                Ok(_) => outcome.deleted += 1,
                Err(err) => outcome.row_failed(format!("{domain} {}", item.id), &err),
            }
            continue;
        }

        if domain.carries_organization() && updated.voter_id.matches(to) {
            let stale = match &updated.organization_id {
                None => true,
                Some(org) => context
                    .from_linked_organization
                    .as_ref()
                    .is_some_and(|from_org| from_org.matches(org)),
            };
            if stale {
                if let Some(to_org) = &context.to_linked_organization {
                    updated.organization_id = Some(to_org.clone());
                }
            }
        }

        match store.save_item(&updated) {
            Ok(()) => {
                outcome.moved += 1;
                held.push(updated);
            }
            Err(err) => outcome.row_failed(format!("{domain} {}", item.id), &err),
        }
    }

    debug!(
        %domain,
        moved = outcome.moved,
        deleted = outcome.deleted,
        not_moved = outcome.not_moved,
        "items moved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use unify_store::{FaultTarget, InMemoryRecordStore, OwnedItemRepository};
    use unify_types::{ItemId, MergePair, OrganizationId};

    fn setup() -> (InMemoryRecordStore, MoveContext) {
        let pair = MergePair::new(VoterId::new("from"), VoterId::new("to")).unwrap();
        (InMemoryRecordStore::new(), MoveContext::minimal(pair))
    }

    fn item(store: &InMemoryRecordStore, domain: ItemDomain, voter: &str) -> OwnedItem {
        let item = OwnedItem::new(store.next_item_id().unwrap(), domain, VoterId::new(voter));
        store.save_item(&item).unwrap();
        item
    }

    #[test]
    fn reassigns_every_row() {
        let (store, context) = setup();
        for _ in 0..3 {
            item(&store, ItemDomain::Donation, "from");
        }
        item(&store, ItemDomain::Donation, "someone-else");

        let mover = ItemMover::new(MergeStep::MoveDonations, ItemDomain::Donation);
        assert_eq!(mover.pattern(), MovePattern::Reassign);
        let outcome = mover.run(&context, &store);
        assert!(outcome.success());
        assert_eq!(outcome.moved, 3);
        assert!(store
            .items_referencing(ItemDomain::Donation, &VoterId::new("from"))
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .items_referencing(ItemDomain::Donation, &VoterId::new("to"))
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn second_run_writes_nothing() {
        let (store, context) = setup();
        item(&store, ItemDomain::AnalyticsEvent, "from");
        let mover = ItemMover::new(MergeStep::MoveAnalytics, ItemDomain::AnalyticsEvent);
        assert_eq!(mover.run(&context, &store).moved, 1);

        let writes = store.write_count().unwrap();
        let again = mover.run(&context, &store);
        assert!(again.success());
        assert!(again.is_noop());
        assert_eq!(store.write_count().unwrap(), writes);
    }

    #[test]
    fn duplicate_voter_plan_is_deleted() {
        let (store, context) = setup();
        let from_plan = OwnedItem::new(ItemId(1), ItemDomain::VoterPlan, VoterId::new("from"))
            .with_subject("election-2026");
        let to_plan = OwnedItem::new(ItemId(2), ItemDomain::VoterPlan, VoterId::new("to"))
            .with_subject("election-2026");
        let other = OwnedItem::new(ItemId(3), ItemDomain::VoterPlan, VoterId::new("from"))
            .with_subject("election-2028");
        for row in [&from_plan, &to_plan, &other] {
            store.save_item(row).unwrap();
        }

        let mover = ItemMover::new(MergeStep::MoveVoterPlans, ItemDomain::VoterPlan);
        assert_eq!(mover.pattern(), MovePattern::ReassignOrDeleteDuplicate);
        let outcome = mover.run(&context, &store);
        assert!(outcome.success());
        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.moved, 1);
        let plans = store
            .items_referencing(ItemDomain::VoterPlan, &VoterId::new("to"))
            .unwrap();
        assert_eq!(plans.len(), 2);
    }

    #[test]
    fn carried_organization_follows_to_voter() {
        let (store, mut context) = setup();
        context.to_linked_organization = Some(OrganizationId::new("org-to"));
        let position = item(&store, ItemDomain::Position, "from");

        let mover = ItemMover::new(MergeStep::MovePositions, ItemDomain::Position);
        assert!(mover.run(&context, &store).success());
        let moved = store
            .items_referencing(ItemDomain::Position, &VoterId::new("to"))
            .unwrap();
        assert_eq!(moved[0].id, position.id);
        assert_eq!(moved[0].organization_id, Some(OrganizationId::new("org-to")));
    }

    #[test]
    fn failing_row_does_not_stop_siblings() {
        let (store, context) = setup();
        for _ in 0..3 {
            item(&store, ItemDomain::Donation, "from");
        }
        store.fail_writes(FaultTarget::Items(ItemDomain::Donation), 1).unwrap();

        let mover = ItemMover::new(MergeStep::MoveDonations, ItemDomain::Donation);
        let outcome = mover.run(&context, &store);
        assert!(!outcome.success());
        assert_eq!(outcome.moved, 2);
        assert_eq!(outcome.not_moved, 1);

        let retry = mover.run(&context, &store);
        assert!(retry.success());
        assert_eq!(retry.moved, 1);
    }

    proptest::proptest! {
        #[test]
        fn no_row_references_from_after_success(
            owners in proptest::collection::vec(0usize..3, 0..24),
            subjects in proptest::collection::vec(0usize..4, 24),
        ) {
            let (store, context) = setup();
            let voters = ["from", "to", "third"];
            for (index, owner) in owners.iter().enumerate() {
                let row = OwnedItem::new(
                    ItemId(index as u64 + 1),
                    ItemDomain::VoterPlan,
                    VoterId::new(voters[*owner]),
                )
                .with_subject(format!("election-{}", subjects[index]));
                store.save_item(&row).unwrap();
            }
            let before_to: std::collections::BTreeSet<_> = store
                .items_referencing(ItemDomain::VoterPlan, &VoterId::new("from"))
                .unwrap()
                .into_iter()
                .chain(store.items_referencing(ItemDomain::VoterPlan, &VoterId::new("to")).unwrap())
                .filter_map(|row| row.subject)
                .collect();

            let mover = ItemMover::new(MergeStep::MoveVoterPlans, ItemDomain::VoterPlan);
            let outcome = mover.run(&context, &store);
            proptest::prop_assert!(outcome.success());
            proptest::prop_assert!(store
                .items_referencing(ItemDomain::VoterPlan, &VoterId::new("from"))
                .unwrap()
                .is_empty());

            let after_to: std::collections::BTreeSet<_> = store
                .items_referencing(ItemDomain::VoterPlan, &VoterId::new("to"))
                .unwrap()
                .into_iter()
                .filter_map(|row| row.subject)
                .collect();
            proptest::prop_assert_eq!(before_to, after_to);
        }
    }
}
