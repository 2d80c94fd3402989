use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};
use unify_types::{
    ChannelId, ChannelKind, ContactChannel, DeferredMessage, DeviceId, IdentityLink, Invitation,
    ItemDomain, ItemId, Organization, OrganizationId, OrganizationIdentityLink, OwnedItem,
    SecretDigest, SocialNetwork, Voter, VoterId,
};

use crate::error::{StoreError, StoreResult};
use crate::snapshot::{DeviceSession, StoreSnapshot};
use crate::traits::{
    ChannelRepository, DeferredMessageRepository, DeviceSessionRepository, IdentityLinkRepository,
    InvitationRepository, OrganizationRepository, OwnedItemRepository, VoterRepository,
};

/// A table whose writes can be made to fail on purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    Voters,
    Organizations,
    Channels,
    IdentityLinks,
    Items(ItemDomain),
    Invitations,
    Messages,
    Sessions,
}

/// In-memory record store.
///
/// Every table is a `BTreeMap` so iteration order is stable, and all tables
/// share one `RwLock`. Voter, organization and device keys are compared
/// case-insensitively, matching how the ids are issued.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    voters: BTreeMap<String, Voter>,
    organizations: BTreeMap<String, Organization>,
    organization_links: BTreeMap<(SocialNetwork, String), OrganizationIdentityLink>,
    channels: BTreeMap<ChannelId, ContactChannel>,
    identity_links: BTreeMap<(SocialNetwork, String), IdentityLink>,
    items: BTreeMap<ItemId, OwnedItem>,
    invitations: BTreeMap<ItemId, Invitation>,
    messages: BTreeMap<ItemId, DeferredMessage>,
    sessions: BTreeMap<String, DeviceSession>,
    next_id: u64,
    faults: HashMap<FaultTarget, u32>,
    write_count: u64,
}

impl StoreState {
    /// Consume one armed fault for `target`, if any.
    fn trip(&mut self, target: FaultTarget) -> StoreResult<()> {
        if let Some(remaining) = self.faults.get_mut(&target) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                warn!(?target, "injected write fault");
                return Err(StoreError::Unavailable(format!(
                    "injected fault writing {target:?}"
                )));
            }
        }
        Ok(())
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    match (a.as_deref(), b.as_deref()) {
        (Some(a), Some(b)) => !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Build a store holding every row of `snapshot`.
    ///
    /// Rows are inserted directly; unique constraints are assumed to hold in
    /// the snapshot already.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = StoreState::default();
        let mut max_id = 0;
        for voter in snapshot.voters {
            state.voters.insert(key(voter.we_vote_id.as_str()), voter);
        }
        for org in snapshot.organizations {
            state.organizations.insert(key(org.we_vote_id.as_str()), org);
        }
        for link in snapshot.organization_identity_links {
            state
                .organization_links
                .insert((link.network, link.external_id.clone()), link);
        }
        for channel in snapshot.channels {
            max_id = max_id.max(channel.id.0);
            state.channels.insert(channel.id, channel);
        }
        for link in snapshot.identity_links {
            state
                .identity_links
                .insert((link.network, link.external_id.clone()), link);
        }
        for item in snapshot.items {
            max_id = max_id.max(item.id.0);
            state.items.insert(item.id, item);
        }
        for invitation in snapshot.invitations {
            max_id = max_id.max(invitation.id.0);
            state.invitations.insert(invitation.id, invitation);
        }
        for message in snapshot.messages {
            max_id = max_id.max(message.id.0);
            state.messages.insert(message.id, message);
        }
        for session in snapshot.device_sessions {
            state.sessions.insert(key(session.device_id.as_str()), session);
        }
        state.next_id = max_id;
        Self {
            inner: RwLock::new(state),
        }
    }

    /// Copy every table out of the store.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        let state = self.read()?;
        Ok(StoreSnapshot {
            voters: state.voters.values().cloned().collect(),
            organizations: state.organizations.values().cloned().collect(),
            organization_identity_links: state.organization_links.values().cloned().collect(),
            channels: state.channels.values().cloned().collect(),
            identity_links: state.identity_links.values().cloned().collect(),
            items: state.items.values().cloned().collect(),
            invitations: state.invitations.values().cloned().collect(),
            messages: state.messages.values().cloned().collect(),
            device_sessions: state.sessions.values().cloned().collect(),
        })
    }

    /// Allocate an id for a new item, invitation or message row.
    pub fn next_item_id(&self) -> StoreResult<ItemId> {
        Ok(ItemId(self.write()?.allocate()))
    }

    /// Allocate an id for a new contact channel row.
    pub fn next_channel_id(&self) -> StoreResult<ChannelId> {
        Ok(ChannelId(self.write()?.allocate()))
    }

    /// Make the next `times` writes to `target` fail with `Unavailable`.
    pub fn fail_writes(&self, target: FaultTarget, times: u32) -> StoreResult<()> {
        self.write()?.faults.insert(target, times);
        Ok(())
    }

    /// Make every write to `target` fail until [`Self::clear_faults`].
    pub fn fail_writes_always(&self, target: FaultTarget) -> StoreResult<()> {
        self.fail_writes(target, u32::MAX)
    }

    pub fn clear_faults(&self) -> StoreResult<()> {
        self.write()?.faults.clear();
        Ok(())
    }

    /// Number of row mutations applied since the store was created.
    pub fn write_count(&self) -> StoreResult<u64> {
        Ok(self.read()?.write_count)
    }

    /// Every item of `domain`, in id order.
    pub fn items_in_domain(&self, domain: ItemDomain) -> StoreResult<Vec<OwnedItem>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|item| item.domain == domain)
            .cloned()
            .collect())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("InMemoryRecordStore");
        match self.read() {
            Ok(state) => debug
                .field("voters", &state.voters.len())
                .field("organizations", &state.organizations.len())
                .field("channels", &state.channels.len())
                .field("items", &state.items.len())
                .finish(),
            Err(_) => debug.field("poisoned", &true).finish(),
        }
    }
}

impl VoterRepository for InMemoryRecordStore {
    fn voter(&self, id: &VoterId) -> StoreResult<Option<Voter>> {
        Ok(self.read()?.voters.get(&key(id.as_str())).cloned())
    }

    fn save_voter(&self, voter: &Voter) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Voters)?;
        let own_key = key(voter.we_vote_id.as_str());
        for (other_key, other) in &state.voters {
            if *other_key == own_key {
                continue;
            }
            if same_text(&voter.email, &other.email) {
                return Err(StoreError::UniqueViolation {
                    field: "email",
                    value: voter.email.clone().unwrap_or_default(),
                });
            }
            if voter.primary_email_id.is_some() && voter.primary_email_id == other.primary_email_id
            {
                return Err(StoreError::UniqueViolation {
                    field: "primary_email_id",
                    value: format!("{:?}", voter.primary_email_id),
                });
            }
            if voter.primary_sms_id.is_some() && voter.primary_sms_id == other.primary_sms_id {
                return Err(StoreError::UniqueViolation {
                    field: "primary_sms_id",
                    value: format!("{:?}", voter.primary_sms_id),
                });
            }
            if let (Some(mine), Some(theirs)) =
                (&voter.linked_organization_id, &other.linked_organization_id)
            {
                if mine.matches(theirs) {
                    return Err(StoreError::UniqueViolation {
                        field: "linked_organization_id",
                        value: mine.to_string(),
                    });
                }
            }
        }
        state.voters.insert(own_key, voter.clone());
        state.write_count += 1;
        debug!(voter = %voter.we_vote_id, "voter saved");
        Ok(())
    }

    fn voters_claiming(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Vec<Voter>> {
        let wanted = external_id.trim();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        Ok(state
            .voters
            .values()
            .filter(|voter| {
                let cached = match network {
                    SocialNetwork::Facebook => voter.facebook_id.as_deref(),
                    SocialNetwork::Twitter => voter.twitter_id.as_deref(),
                    SocialNetwork::Apple => None,
                };
                cached.is_some_and(|id| id.trim() == wanted)
            })
            .cloned()
            .collect())
    }
}

impl OrganizationRepository for InMemoryRecordStore {
    fn organization(&self, id: &OrganizationId) -> StoreResult<Option<Organization>> {
        Ok(self.read()?.organizations.get(&key(id.as_str())).cloned())
    }

    fn save_organization(&self, organization: &Organization) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Organizations)?;
        state
            .organizations
            .insert(key(organization.we_vote_id.as_str()), organization.clone());
        state.write_count += 1;
        Ok(())
    }

    fn delete_organization(&self, id: &OrganizationId) -> StoreResult<bool> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Organizations)?;
        let removed = state.organizations.remove(&key(id.as_str())).is_some();
        if removed {
            state.write_count += 1;
            debug!(organization = %id, "organization deleted");
        }
        Ok(removed)
    }

    fn organization_identity_link(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Option<OrganizationIdentityLink>> {
        Ok(self
            .read()?
            .organization_links
            .get(&(network, external_id.trim().to_string()))
            .cloned())
    }

    fn organization_identity_links_for(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<OrganizationIdentityLink>> {
        Ok(self
            .read()?
            .organization_links
            .values()
            .filter(|link| link.organization_id.matches(organization))
            .cloned()
            .collect())
    }

    fn save_organization_identity_link(&self, link: &OrganizationIdentityLink) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Organizations)?;
        state
            .organization_links
            .insert((link.network, link.external_id.trim().to_string()), link.clone());
        state.write_count += 1;
        Ok(())
    }
}

impl ChannelRepository for InMemoryRecordStore {
    fn channel(&self, id: ChannelId) -> StoreResult<Option<ContactChannel>> {
        Ok(self.read()?.channels.get(&id).cloned())
    }

    fn channels_for_voter(
        &self,
        kind: ChannelKind,
        voter: &VoterId,
    ) -> StoreResult<Vec<ContactChannel>> {
        let state = self.read()?;
        let mut rows: Vec<ContactChannel> = state
            .channels
            .values()
            .filter(|c| c.kind == kind && c.voter_id.matches(voter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn channels_with_value(
        &self,
        kind: ChannelKind,
        normalized_value: &str,
    ) -> StoreResult<Vec<ContactChannel>> {
        let state = self.read()?;
        let wanted = normalized_value.trim();
        let mut rows: Vec<ContactChannel> = state
            .channels
            .values()
            .filter(|c| c.kind == kind && c.normalized_value.eq_ignore_ascii_case(wanted))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn channel_by_secret(
        &self,
        kind: ChannelKind,
        digest: &SecretDigest,
    ) -> StoreResult<Option<ContactChannel>> {
        let state = self.read()?;
        Ok(state
            .channels
            .values()
            .find(|c| c.kind == kind && c.secret_digest.as_ref() == Some(digest))
            .cloned())
    }

    fn save_channel(&self, channel: &ContactChannel) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Channels)?;
        if channel.ownership_is_verified {
            let clash = state.channels.values().any(|other| {
                other.id != channel.id && other.ownership_is_verified && other.same_value(channel)
            });
            if clash {
                return Err(StoreError::UniqueViolation {
                    field: "verified_channel_value",
                    value: channel.normalized_value.clone(),
                });
            }
        }
        state.channels.insert(channel.id, channel.clone());
        state.write_count += 1;
        Ok(())
    }

    fn delete_channel(&self, id: ChannelId) -> StoreResult<bool> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Channels)?;
        let removed = state.channels.remove(&id).is_some();
        if removed {
            state.write_count += 1;
        }
        Ok(removed)
    }
}

impl IdentityLinkRepository for InMemoryRecordStore {
    fn identity_link(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Option<IdentityLink>> {
        Ok(self
            .read()?
            .identity_links
            .get(&(network, external_id.trim().to_string()))
            .cloned())
    }

    fn identity_link_by_secret(
        &self,
        network: SocialNetwork,
        digest: &SecretDigest,
    ) -> StoreResult<Option<IdentityLink>> {
        let state = self.read()?;
        Ok(state
            .identity_links
            .values()
            .find(|l| l.network == network && l.secret_digest.as_ref() == Some(digest))
            .cloned())
    }

    fn identity_link_for_voter(
        &self,
        network: SocialNetwork,
        voter: &VoterId,
    ) -> StoreResult<Option<IdentityLink>> {
        let state = self.read()?;
        Ok(state
            .identity_links
            .values()
            .find(|l| l.network == network && l.voter_id.matches(voter))
            .cloned())
    }

    fn save_identity_link(&self, link: &IdentityLink) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::IdentityLinks)?;
        let link_key = (link.network, link.external_id.trim().to_string());
        let clash = state
            .identity_links
            .iter()
            .any(|(k, other)| *k != link_key && other.network == link.network && other.voter_id.matches(&link.voter_id));
        if clash {
            return Err(StoreError::UniqueViolation {
                field: "identity_link_voter",
                value: format!("{}:{}", link.network, link.voter_id),
            });
        }
        state.identity_links.insert(link_key, link.clone());
        state.write_count += 1;
        Ok(())
    }

    fn delete_identity_link(&self, network: SocialNetwork, external_id: &str) -> StoreResult<bool> {
        let mut state = self.write()?;
        state.trip(FaultTarget::IdentityLinks)?;
        let removed = state
            .identity_links
            .remove(&(network, external_id.trim().to_string()))
            .is_some();
        if removed {
            state.write_count += 1;
        }
        Ok(removed)
    }
}

impl OwnedItemRepository for InMemoryRecordStore {
    fn items_referencing(&self, domain: ItemDomain, voter: &VoterId) -> StoreResult<Vec<OwnedItem>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|item| item.domain == domain && item.references(voter))
            .cloned()
            .collect())
    }

    fn items_for_organization(
        &self,
        domain: ItemDomain,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<OwnedItem>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .filter(|item| {
                item.domain == domain
                    && item
                        .organization_id
                        .as_ref()
                        .is_some_and(|org| org.matches(organization))
            })
            .cloned()
            .collect())
    }

    fn items_with_subject(&self, domain: ItemDomain, subject: &str) -> StoreResult<Vec<OwnedItem>> {
        let state = self.read()?;
        let wanted = subject.trim();
        Ok(state
            .items
            .values()
            .filter(|item| {
                item.domain == domain
                    && item
                        .subject
                        .as_deref()
                        .is_some_and(|s| s.trim().eq_ignore_ascii_case(wanted))
            })
            .cloned()
            .collect())
    }

    fn save_item(&self, item: &OwnedItem) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Items(item.domain))?;
        state.items.insert(item.id, item.clone());
        state.write_count += 1;
        Ok(())
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<bool> {
        let mut state = self.write()?;
        let Some(domain) = state.items.get(&id).map(|item| item.domain) else {
            return Ok(false);
        };
        state.trip(FaultTarget::Items(domain))?;
        state.items.remove(&id);
        state.write_count += 1;
        Ok(true)
    }
}

impl InvitationRepository for InMemoryRecordStore {
    fn invitation_by_secret(&self, digest: &SecretDigest) -> StoreResult<Option<Invitation>> {
        let state = self.read()?;
        Ok(state
            .invitations
            .values()
            .find(|inv| inv.secret_digest.as_ref() == Some(digest))
            .cloned())
    }

    fn invitations_referencing(&self, voter: &VoterId) -> StoreResult<Vec<Invitation>> {
        let state = self.read()?;
        Ok(state
            .invitations
            .values()
            .filter(|inv| inv.references(voter))
            .cloned()
            .collect())
    }

    fn save_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Invitations)?;
        state.invitations.insert(invitation.id, invitation.clone());
        state.write_count += 1;
        Ok(())
    }

    fn delete_invitation(&self, id: ItemId) -> StoreResult<bool> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Invitations)?;
        let removed = state.invitations.remove(&id).is_some();
        if removed {
            state.write_count += 1;
        }
        Ok(removed)
    }
}

impl DeferredMessageRepository for InMemoryRecordStore {
    fn pending_messages_from(&self, sender: &VoterId) -> StoreResult<Vec<DeferredMessage>> {
        let state = self.read()?;
        Ok(state
            .messages
            .values()
            .filter(|m| !m.released && m.sender_voter_id.matches(sender))
            .cloned()
            .collect())
    }

    fn save_message(&self, message: &DeferredMessage) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Messages)?;
        state.messages.insert(message.id, message.clone());
        state.write_count += 1;
        Ok(())
    }
}

impl DeviceSessionRepository for InMemoryRecordStore {
    fn voter_for_device(&self, device: &DeviceId) -> StoreResult<Option<VoterId>> {
        Ok(self
            .read()?
            .sessions
            .get(&key(device.as_str()))
            .map(|s| s.voter_id.clone()))
    }

    fn bind_device(&self, device: &DeviceId, voter: &VoterId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.trip(FaultTarget::Sessions)?;
        state.sessions.insert(
            key(device.as_str()),
            DeviceSession {
                device_id: device.clone(),
                voter_id: voter.clone(),
            },
        );
        state.write_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RecordStore;

    fn voter(id: &str) -> Voter {
        Voter::new(VoterId::new(id))
    }

    #[test]
    fn save_and_read_voter_case_insensitively() {
        let store = InMemoryRecordStore::new();
        store.save_voter(&voter("wv01voter1")).unwrap();
        let found = store.voter(&VoterId::new("WV01VOTER1")).unwrap();
        assert!(found.is_some());
        assert_eq!(store.voter(&VoterId::new("wv01voter9")).unwrap(), None);
    }

    #[test]
    fn cached_email_is_unique_across_voters() {
        let store = InMemoryRecordStore::new();
        let mut a = voter("a");
        a.email = Some("jane@example.org".into());
        store.save_voter(&a).unwrap();

        let mut b = voter("b");
        b.email = Some("JANE@example.org".into());
        let err = store.save_voter(&b).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "email", .. }));

        // Re-saving the holder itself is fine.
        store.save_voter(&a).unwrap();
    }

    #[test]
    fn linked_organization_is_unique_across_voters() {
        let store = InMemoryRecordStore::new();
        let org = OrganizationId::new("wv01org1");
        let mut a = voter("a");
        a.linked_organization_id = Some(org.clone());
        store.save_voter(&a).unwrap();
        let mut b = voter("b");
        b.linked_organization_id = Some(org);
        assert!(store.save_voter(&b).is_err());
    }

    #[test]
    fn only_one_verified_channel_per_value() {
        let store = InMemoryRecordStore::new();
        let id1 = store.next_channel_id().unwrap();
        let id2 = store.next_channel_id().unwrap();
        assert_ne!(id1, id2);

        let a = ContactChannel::new(id1, ChannelKind::Email, "x@y.org", VoterId::new("a")).verified();
        store.save_channel(&a).unwrap();

        let b = ContactChannel::new(id2, ChannelKind::Email, "x@y.org", VoterId::new("b"));
        store.save_channel(&b).unwrap();
        assert!(store.save_channel(&b.clone().verified()).is_err());

        let rows = store.channels_with_value(ChannelKind::Email, "X@Y.org").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn one_identity_link_per_voter_and_network() {
        let store = InMemoryRecordStore::new();
        let v = VoterId::new("a");
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Facebook, "1001", v.clone()))
            .unwrap();
        assert!(store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Facebook, "1002", v.clone()))
            .is_err());
        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Twitter, "55", v.clone()))
            .unwrap();
        let link = store.identity_link_for_voter(SocialNetwork::Twitter, &v).unwrap();
        assert_eq!(link.map(|l| l.external_id), Some("55".to_string()));
    }

    #[test]
    fn items_referencing_sees_both_edge_sides() {
        let store = InMemoryRecordStore::new();
        let a = VoterId::new("a");
        let b = VoterId::new("b");
        let id = store.next_item_id().unwrap();
        store
            .save_item(&OwnedItem::new(id, ItemDomain::Friend, a.clone()).with_counterpart(b.clone()))
            .unwrap();
        assert_eq!(store.items_referencing(ItemDomain::Friend, &b).unwrap().len(), 1);
        assert_eq!(store.items_referencing(ItemDomain::SuggestedFriend, &b).unwrap().len(), 0);
        assert!(store.delete_item(id).unwrap());
        assert!(!store.delete_item(id).unwrap());
    }

    #[test]
    fn injected_faults_fail_then_recover() {
        let store = InMemoryRecordStore::new();
        store.fail_writes(FaultTarget::Items(ItemDomain::Donation), 1).unwrap();
        let item = OwnedItem::new(ItemId(7), ItemDomain::Donation, VoterId::new("a"));
        let err = store.save_item(&item).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.save_item(&item).unwrap();

        // Other domains are unaffected.
        store.fail_writes_always(FaultTarget::Items(ItemDomain::Position)).unwrap();
        store
            .save_item(&OwnedItem::new(ItemId(8), ItemDomain::VoterPlan, VoterId::new("a")))
            .unwrap();
        store.clear_faults().unwrap();
        store
            .save_item(&OwnedItem::new(ItemId(9), ItemDomain::Position, VoterId::new("a")))
            .unwrap();
    }

    #[test]
    fn write_count_tracks_mutations_only() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.write_count().unwrap(), 0);
        store.save_voter(&voter("a")).unwrap();
        store.voter(&VoterId::new("a")).unwrap();
        assert!(!store.delete_organization(&OrganizationId::new("missing")).unwrap());
        assert_eq!(store.write_count().unwrap(), 1);
    }

    #[test]
    fn snapshot_round_trip_keeps_ids_fresh() {
        let store = InMemoryRecordStore::new();
        store.save_voter(&voter("a")).unwrap();
        let id = store.next_item_id().unwrap();
        store
            .save_item(&OwnedItem::new(id, ItemDomain::Donation, VoterId::new("a")))
            .unwrap();
        store.bind_device(&DeviceId::new("dev-1"), &VoterId::new("a")).unwrap();

        let restored = InMemoryRecordStore::from_snapshot(store.snapshot().unwrap());
        assert_eq!(restored.snapshot().unwrap(), store.snapshot().unwrap());
        assert!(restored.next_item_id().unwrap() > id);
        assert_eq!(
            restored.voter_for_device(&DeviceId::new("DEV-1")).unwrap(),
            Some(VoterId::new("a"))
        );
    }

    #[test]
    fn signed_in_requires_a_durable_credential() {
        let store = InMemoryRecordStore::new();
        let mut v = voter("a");
        store.save_voter(&v).unwrap();
        assert!(!store.voter_is_signed_in(&v).unwrap());

        store
            .save_identity_link(&IdentityLink::new(SocialNetwork::Apple, "apple-1", v.we_vote_id.clone()))
            .unwrap();
        assert!(store.voter_is_signed_in(&v).unwrap());

        v.we_vote_id = VoterId::new("b");
        v.normalized_sms_phone_number = Some("+14155550100".into());
        v.sms_ownership_is_verified = true;
        assert!(store.voter_is_signed_in(&v).unwrap());
    }

    #[test]
    fn voters_claiming_matches_cached_social_ids() {
        let store = InMemoryRecordStore::new();
        let mut a = voter("a");
        a.twitter_id = Some("55".into());
        let mut b = voter("b");
        b.twitter_id = Some("55".into());
        store.save_voter(&a).unwrap();
        store.save_voter(&b).unwrap();
        store.save_voter(&voter("c")).unwrap();
        assert_eq!(store.voters_claiming(SocialNetwork::Twitter, "55").unwrap().len(), 2);
        assert!(store.voters_claiming(SocialNetwork::Twitter, "").unwrap().is_empty());
    }
}
