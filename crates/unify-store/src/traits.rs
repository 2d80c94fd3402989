use unify_types::{
    ChannelId, ChannelKind, ContactChannel, DeferredMessage, DeviceId, IdentityLink, Invitation,
    ItemDomain, ItemId, OrganizationId, OrganizationIdentityLink, Organization, OwnedItem,
    SecretDigest, SocialNetwork, Voter, VoterId,
};

use crate::error::StoreResult;

/// Voter rows.
pub trait VoterRepository: Send + Sync {
    /// Read a voter by id. Returns `Ok(None)` if it does not exist.
    fn voter(&self, id: &VoterId) -> StoreResult<Option<Voter>>;

    /// Insert or replace a voter row.
    ///
    /// Fails with `UniqueViolation` if another voter already holds the same
    /// cached email, primary channel id, or linked organization.
    fn save_voter(&self, voter: &Voter) -> StoreResult<()>;

    /// Voters whose cached social id for `network` equals `external_id`.
    fn voters_claiming(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Vec<Voter>>;
}

/// Organizations and the identity links that point at them.
pub trait OrganizationRepository: Send + Sync {
    fn organization(&self, id: &OrganizationId) -> StoreResult<Option<Organization>>;

    fn save_organization(&self, organization: &Organization) -> StoreResult<()>;

    /// Delete an organization. Returns `true` if it existed.
    fn delete_organization(&self, id: &OrganizationId) -> StoreResult<bool>;

    fn organization_identity_link(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Option<OrganizationIdentityLink>>;

    fn organization_identity_links_for(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<OrganizationIdentityLink>>;

    /// Insert or replace the link keyed by (network, external id).
    fn save_organization_identity_link(&self, link: &OrganizationIdentityLink) -> StoreResult<()>;
}

/// Email addresses and SMS numbers.
pub trait ChannelRepository: Send + Sync {
    fn channel(&self, id: ChannelId) -> StoreResult<Option<ContactChannel>>;

    /// Every row of `kind` claimed by `voter`, oldest first.
    fn channels_for_voter(
        &self,
        kind: ChannelKind,
        voter: &VoterId,
    ) -> StoreResult<Vec<ContactChannel>>;

    /// Every row of `kind` with this normalized value, across all voters, oldest first.
    fn channels_with_value(
        &self,
        kind: ChannelKind,
        normalized_value: &str,
    ) -> StoreResult<Vec<ContactChannel>>;

    fn channel_by_secret(
        &self,
        kind: ChannelKind,
        digest: &SecretDigest,
    ) -> StoreResult<Option<ContactChannel>>;

    fn save_channel(&self, channel: &ContactChannel) -> StoreResult<()>;

    fn delete_channel(&self, id: ChannelId) -> StoreResult<bool>;
}

/// Facebook, Twitter and Apple links, keyed by (network, external id).
pub trait IdentityLinkRepository: Send + Sync {
    fn identity_link(
        &self,
        network: SocialNetwork,
        external_id: &str,
    ) -> StoreResult<Option<IdentityLink>>;

    fn identity_link_by_secret(
        &self,
        network: SocialNetwork,
        digest: &SecretDigest,
    ) -> StoreResult<Option<IdentityLink>>;

    fn identity_link_for_voter(
        &self,
        network: SocialNetwork,
        voter: &VoterId,
    ) -> StoreResult<Option<IdentityLink>>;

    /// Insert or replace a link. A voter may hold at most one link per network.
    fn save_identity_link(&self, link: &IdentityLink) -> StoreResult<()>;

    fn delete_identity_link(&self, network: SocialNetwork, external_id: &str) -> StoreResult<bool>;
}

/// Rows of every [`ItemDomain`].
pub trait OwnedItemRepository: Send + Sync {
    /// Items of `domain` whose owner or counterpart is `voter`.
    fn items_referencing(&self, domain: ItemDomain, voter: &VoterId) -> StoreResult<Vec<OwnedItem>>;

    /// Items of `domain` carrying `organization` as their denormalized owner.
    fn items_for_organization(
        &self,
        domain: ItemDomain,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<OwnedItem>>;

    /// Items of `domain` about `subject`.
    fn items_with_subject(&self, domain: ItemDomain, subject: &str) -> StoreResult<Vec<OwnedItem>>;

    /// Insert or replace an item by id.
    fn save_item(&self, item: &OwnedItem) -> StoreResult<()>;

    fn delete_item(&self, id: ItemId) -> StoreResult<bool>;
}

/// Friend invitations.
pub trait InvitationRepository: Send + Sync {
    fn invitation_by_secret(&self, digest: &SecretDigest) -> StoreResult<Option<Invitation>>;

    fn invitations_referencing(&self, voter: &VoterId) -> StoreResult<Vec<Invitation>>;

    fn save_invitation(&self, invitation: &Invitation) -> StoreResult<()>;

    fn delete_invitation(&self, id: ItemId) -> StoreResult<bool>;
}

/// Outbound messages waiting for their sender to be nameable.
pub trait DeferredMessageRepository: Send + Sync {
    fn pending_messages_from(&self, sender: &VoterId) -> StoreResult<Vec<DeferredMessage>>;

    fn save_message(&self, message: &DeferredMessage) -> StoreResult<()>;
}

/// The device-session table: opaque device token to voter id.
pub trait DeviceSessionRepository: Send + Sync {
    fn voter_for_device(&self, device: &DeviceId) -> StoreResult<Option<VoterId>>;

    fn bind_device(&self, device: &DeviceId, voter: &VoterId) -> StoreResult<()>;
}

/// All repositories of one backend.
pub trait RecordStore:
    VoterRepository
    + OrganizationRepository
    + ChannelRepository
    + IdentityLinkRepository
    + OwnedItemRepository
    + InvitationRepository
    + DeferredMessageRepository
    + DeviceSessionRepository
{
    /// A voter holds a durable credential: a verified email or SMS number,
    /// or any social identity link.
    fn voter_is_signed_in(&self, voter: &Voter) -> StoreResult<bool> {
        if voter.signed_in_with_email() || voter.signed_in_with_sms() {
            return Ok(true);
        }
        for network in SocialNetwork::ALL {
            if self
                .identity_link_for_voter(network, &voter.we_vote_id)?
                .is_some()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<T> RecordStore for T where
    T: VoterRepository
        + OrganizationRepository
        + ChannelRepository
        + IdentityLinkRepository
        + OwnedItemRepository
        + InvitationRepository
        + DeferredMessageRepository
        + DeviceSessionRepository
{
}
