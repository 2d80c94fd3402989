use std::collections::BTreeMap;

use tracing::{debug, warn};
use unify_store::{RecordStore, StoreResult};
use unify_types::{ChannelId, ChannelKind, ContactChannel, MergeStep, Voter, VoterId};

use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};

/// Moves email addresses or SMS numbers from "from" to "to".
///
/// Runs in four passes:
/// 1. de-duplicate rows of one value under each voter
/// 2. reassign "from" rows, deleting the less-verified copy when "to" already
///    claims the same value
/// 3. de-duplicate again under "to"
/// 4. clear the "from" voter's cached channel and heal the "to" voter's cache
pub struct ChannelMover {
    kind: ChannelKind,
}

impl ChannelMover {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }

    pub fn email() -> Self {
        Self::new(ChannelKind::Email)
    }

    pub fn sms() -> Self {
        Self::new(ChannelKind::Sms)
    }
}

impl Mover for ChannelMover {
    fn step(&self) -> MergeStep {
        match self.kind {
            ChannelKind::Email => MergeStep::MoveEmail,
            ChannelKind::Sms => MergeStep::MoveSms,
        }
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::ReassignOrDeleteDuplicate
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        let kind = self.kind;
        guarded(|outcome| {
            let from = &context.pair.from;
            let to = &context.pair.to;
            dedupe_for_voter(kind, from, store, outcome)?;
            dedupe_for_voter(kind, to, store, outcome)?;
            reassign(kind, from, to, store, outcome)?;
            dedupe_for_voter(kind, to, store, outcome)?;
            clear_cache(kind, from, store)?;
            heal_primary(kind, to, store, outcome)
        })
    }
}

// ---------------------------------------------------------------------------
// Per-kind views of the voter's cached channel
// ---------------------------------------------------------------------------

struct CachedChannel {
    value: Option<String>,
    primary_id: Option<ChannelId>,
    verified: bool,
}

fn cached(kind: ChannelKind, voter: &Voter) -> CachedChannel {
    match kind {
        ChannelKind::Email => CachedChannel {
            value: voter.email.clone(),
            primary_id: voter.primary_email_id,
            verified: voter.email_ownership_is_verified,
        },
        ChannelKind::Sms => CachedChannel {
            value: voter.normalized_sms_phone_number.clone(),
            primary_id: voter.primary_sms_id,
            verified: voter.sms_ownership_is_verified,
        },
    }
}

fn set_cached(kind: ChannelKind, voter: &mut Voter, channel: &ContactChannel) {
    match kind {
        ChannelKind::Email => {
            voter.email = Some(channel.normalized_value.clone());
            voter.primary_email_id = Some(channel.id);
            voter.email_ownership_is_verified = true;
        }
        ChannelKind::Sms => {
            voter.normalized_sms_phone_number = Some(channel.normalized_value.clone());
            voter.primary_sms_id = Some(channel.id);
            voter.sms_ownership_is_verified = true;
        }
    }
}

fn clear_cached(kind: ChannelKind, voter: &mut Voter) {
    match kind {
        ChannelKind::Email => voter.clear_email(),
        ChannelKind::Sms => voter.clear_sms(),
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Keep one row per value under `voter`: the verified one, else the oldest.
fn dedupe_for_voter(
    kind: ChannelKind,
    voter: &VoterId,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let mut by_value: BTreeMap<String, Vec<ContactChannel>> = BTreeMap::new();
    for row in store.channels_for_voter(kind, voter)? {
        by_value
            .entry(row.normalized_value.to_ascii_lowercase())
            .or_default()
            .push(row);
    }
    for (value, rows) in by_value {
        if rows.len() < 2 {
            continue;
        }
        let keep = rows
            .iter()
            .position(|row| row.ownership_is_verified)
            .unwrap_or(0);
        for (index, row) in rows.iter().enumerate() {
            if index == keep {
                continue;
            }
            match store.delete_channel(row.id) {
                Ok(_) => outcome.deleted += 1,
                Err(err) => outcome.row_failed(format!("{kind} {}", row.id), &err),
            }
        }
        debug!(%kind, %value, voter = %voter, "duplicate channel rows removed");
    }
    Ok(())
}

fn reassign(
    kind: ChannelKind,
    from: &VoterId,
    to: &VoterId,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let from_rows = store.channels_for_voter(kind, from)?;
    if from_rows.is_empty() {
        return Ok(());
    }
    let to_rows = store.channels_for_voter(kind, to)?;

    for row in from_rows {
        let existing = to_rows.iter().find(|held| held.same_value(&row));
        match existing {
            Some(held) if row.ownership_is_verified && !held.ownership_is_verified => {
                // The verified copy wins; drop the unverified one first.
                if let Err(err) = store.delete_channel(held.id) {
                    outcome.row_failed(format!("{kind} {}", held.id), &err);
                    continue;
                }
                outcome.deleted += 1;
                save_reassigned(kind, row, to, store, outcome);
            }
            Some(_) => match store.delete_channel(row.id) {
                Ok(_) => outcome.deleted += 1,
                Err(err) => outcome.row_failed(format!("{kind} {}", row.id), &err),
            },
            None => save_reassigned(kind, row, to, store, outcome),
        }
    }
    Ok(())
}

fn save_reassigned(
    kind: ChannelKind,
    mut row: ContactChannel,
    to: &VoterId,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) {
    row.voter_id = to.clone();
    match store.save_channel(&row) {
        Ok(()) => outcome.moved += 1,
        Err(err) => outcome.row_failed(format!("{kind} {}", row.id), &err),
    }
}

fn clear_cache(kind: ChannelKind, voter: &VoterId, store: &dyn RecordStore) -> StoreResult<()> {
    let mut voter = require_voter(store, voter)?;
    let cache = cached(kind, &voter);
    if cache.value.is_some() || cache.primary_id.is_some() || cache.verified {
        clear_cached(kind, &mut voter);
        store.save_voter(&voter)?;
    }
    Ok(())
}

/// Point the voter's cache at its real verified row.
///
/// Preference: the row matching the cached id, then the row matching the
/// cached value, then the first verified row. With no verified row the cache
/// is cleared.
pub(crate) fn heal_primary(
    kind: ChannelKind,
    voter_id: &VoterId,
    store: &dyn RecordStore,
    outcome: &mut MoveOutcome,
) -> StoreResult<()> {
    let mut voter = require_voter(store, voter_id)?;
    let cache = cached(kind, &voter);
    let verified: Vec<ContactChannel> = store
        .channels_for_voter(kind, voter_id)?
        .into_iter()
        .filter(|row| row.ownership_is_verified)
        .collect();

    let by_id = cache
        .primary_id
        .and_then(|id| verified.iter().find(|row| row.id == id));
    let by_value = cache.value.as_deref().and_then(|value| {
        verified
            .iter()
            .find(|row| row.normalized_value.eq_ignore_ascii_case(value))
    });
    let primary = by_id.or(by_value).or_else(|| verified.first());

    let before = voter.clone();
    match primary {
        Some(row) => set_cached(kind, &mut voter, row),
        None => clear_cached(kind, &mut voter),
    }
    if voter != before {
        store.save_voter(&voter)?;
        outcome.note(format!("healed cached {kind}"));
        warn!(%kind, voter = %voter_id, "cached primary channel healed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use unify_store::{ChannelRepository, InMemoryRecordStore, VoterRepository};
    use unify_types::MergePair;

    fn v(id: &str) -> VoterId {
        VoterId::new(id)
    }

    fn context() -> MoveContext {
        MoveContext::minimal(MergePair::new(v("from"), v("to")).unwrap())
    }

    fn channel(
        store: &InMemoryRecordStore,
        kind: ChannelKind,
        value: &str,
        voter: &str,
        verified: bool,
    ) -> ContactChannel {
        let mut row = ContactChannel::new(store.next_channel_id().unwrap(), kind, value, v(voter));
        row.ownership_is_verified = verified;
        store.save_channel(&row).unwrap();
        row
    }

    fn setup() -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new();
        store.save_voter(&Voter::new(v("from"))).unwrap();
        store.save_voter(&Voter::new(v("to"))).unwrap();
        store
    }

    #[test]
    fn verified_email_moves_and_cache_follows() {
        let store = setup();
        let row = channel(&store, ChannelKind::Email, "jane@example.org", "from", true);
        let mut from = store.voter(&v("from")).unwrap().unwrap();
        from.email = Some("jane@example.org".into());
        from.primary_email_id = Some(row.id);
        from.email_ownership_is_verified = true;
        store.save_voter(&from).unwrap();

        let outcome = ChannelMover::email().run(&context(), &store);
        assert!(outcome.success(), "{}", outcome.status());
        assert_eq!(outcome.moved, 1);

        let from = store.voter(&v("from")).unwrap().unwrap();
        let to = store.voter(&v("to")).unwrap().unwrap();
        assert_eq!(from.email, None);
        assert!(!from.signed_in_with_email());
        assert_eq!(to.email.as_deref(), Some("jane@example.org"));
        assert_eq!(to.primary_email_id, Some(row.id));
        assert!(to.signed_in_with_email());
    }

    #[test]
    fn verified_copy_beats_unverified_duplicate() {
        let store = setup();
        let verified = channel(&store, ChannelKind::Sms, "+14155550100", "from", true);
        channel(&store, ChannelKind::Sms, "+14155550100", "to", false);

        let outcome = ChannelMover::sms().run(&context(), &store);
        assert!(outcome.success(), "{}", outcome.status());
        let rows = store.channels_for_voter(ChannelKind::Sms, &v("to")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, verified.id);
        assert!(rows[0].ownership_is_verified);
        assert!(store.channels_for_voter(ChannelKind::Sms, &v("from")).unwrap().is_empty());
    }

    #[test]
    fn to_keeps_its_copy_when_equally_verified() {
        let store = setup();
        channel(&store, ChannelKind::Email, "x@y.org", "from", false);
        let kept = channel(&store, ChannelKind::Email, "x@y.org", "to", false);

        let outcome = ChannelMover::email().run(&context(), &store);
        assert!(outcome.success());
        let rows = store.channels_for_voter(ChannelKind::Email, &v("to")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, kept.id);
    }

    #[test]
    fn drifted_cache_is_healed() {
        let store = setup();
        let real = channel(&store, ChannelKind::Email, "real@example.org", "to", true);
        let mut to = store.voter(&v("to")).unwrap().unwrap();
        to.email = Some("stale@example.org".into());
        to.primary_email_id = Some(ChannelId(999));
        store.save_voter(&to).unwrap();

        let outcome = ChannelMover::email().run(&context(), &store);
        assert!(outcome.success());
        assert!(outcome.status().contains("healed"));
        let to = store.voter(&v("to")).unwrap().unwrap();
        assert_eq!(to.primary_email_id, Some(real.id));
        assert_eq!(to.email.as_deref(), Some("real@example.org"));
    }

    #[test]
    fn no_value_has_two_verified_owners_afterwards() {
        let store = setup();
        channel(&store, ChannelKind::Email, "a@x.org", "from", true);
        channel(&store, ChannelKind::Email, "a@x.org", "to", false);
        channel(&store, ChannelKind::Email, "b@x.org", "from", false);
        channel(&store, ChannelKind::Email, "b@x.org", "from", false);
        channel(&store, ChannelKind::Email, "c@x.org", "to", true);

        assert!(ChannelMover::email().run(&context(), &store).success());
        for value in ["a@x.org", "b@x.org", "c@x.org"] {
            let rows = store.channels_with_value(ChannelKind::Email, value).unwrap();
            assert_eq!(rows.len(), 1, "{value}");
            assert!(rows.iter().filter(|r| r.ownership_is_verified).count() <= 1);
        }
    }

    #[test]
    fn nothing_to_move_writes_nothing() {
        let store = setup();
        let writes = store.write_count().unwrap();
        let outcome = ChannelMover::sms().run(&context(), &store);
        assert!(outcome.success());
        assert!(outcome.is_noop());
        assert_eq!(store.write_count().unwrap(), writes);
    }
}
