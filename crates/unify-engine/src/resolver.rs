use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use unify_store::RecordStore;
use unify_types::{
    ChannelKind, DeviceId, IdentityLink, Invitation, MergePair, SecretKey, SocialNetwork, Voter,
    VoterId,
};

use crate::error::{ResolveError, ResolveResult};
use crate::mover::MoveOutcome;
use crate::movers::{heal_primary, reconcile_identity_organization};
use crate::notify::{Notification, Notifier};

// ---------------------------------------------------------------------------
// Request / Resolution
// ---------------------------------------------------------------------------

/// A proof of identity presented by a device.
#[derive(Clone, Debug)]
pub enum Credential {
    EmailSecret(SecretKey),
    SmsSecret(SecretKey),
    FacebookSecret(SecretKey),
    FacebookIdentity(String),
    TwitterSecret(SecretKey),
    TwitterIdentity(String),
    AppleIdentity(String),
    InvitationSecret(SecretKey),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmailSecret(_) => "email_secret",
            Self::SmsSecret(_) => "sms_secret",
            Self::FacebookSecret(_) => "facebook_secret",
            Self::FacebookIdentity(_) => "facebook_identity",
            Self::TwitterSecret(_) => "twitter_secret",
            Self::TwitterIdentity(_) => "twitter_identity",
            Self::AppleIdentity(_) => "apple_identity",
            Self::InvitationSecret(_) => "invitation_secret",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolveRequest {
    pub device: DeviceId,
    pub credential: Credential,
    /// Leave an already signed-in device voter alone instead of merging it.
    pub do_not_merge_if_currently_signed_in: bool,
}

impl ResolveRequest {
    pub fn new(device: DeviceId, credential: Credential) -> Self {
        Self {
            device,
            credential,
            do_not_merge_if_currently_signed_in: false,
        }
    }

    pub fn skip_if_signed_in(mut self) -> Self {
        self.do_not_merge_if_currently_signed_in = true;
        self
    }
}

/// What the caller should do next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    /// Merge the device voter (`from`) into the credential's voter (`to`).
    Merge(MergePair),
    /// The credential already belongs to the device voter.
    AlreadySameAccount { voter: VoterId },
    /// The device voter is signed in and the caller asked not to merge it.
    MergeSkippedAlreadySignedIn { current: VoterId, target: VoterId },
    /// No voter held the identity; it is now linked to the device voter.
    LinkRepaired { voter: VoterId },
}

impl Resolution {
    pub fn pair(&self) -> Option<&MergePair> {
        match self {
            Self::Merge(pair) => Some(pair),
            _ => None,
        }
    }

    /// The voter the device should end up bound to.
    pub fn surviving_voter(&self) -> &VoterId {
        match self {
            Self::Merge(pair) => &pair.to,
            Self::AlreadySameAccount { voter } | Self::LinkRepaired { voter } => voter,
            Self::MergeSkippedAlreadySignedIn { current, .. } => current,
        }
    }

    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Merge(_) => "MERGE_READY",
            Self::AlreadySameAccount { .. } => "ALREADY_SAME_ACCOUNT",
            Self::MergeSkippedAlreadySignedIn { .. } => "MERGE_SKIPPED_ALREADY_SIGNED_IN",
            Self::LinkRepaired { .. } => "IDENTITY_LINKED",
        }
    }
}

/// Where a credential points before the merge guards are applied.
enum Target {
    Voter(VoterId),
    Linked(VoterId),
    Invitation(Invitation, VoterId),
}

fn usable_secret(secret: &SecretKey, what: &str) -> ResolveResult<()> {
    if secret.is_blank() {
        return Err(ResolveError::InvalidCredential(format!("blank {what}")));
    }
    Ok(())
}

fn usable_identity<'a>(external_id: &'a str, network: SocialNetwork) -> ResolveResult<&'a str> {
    let trimmed = external_id.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidCredential(format!("blank {network} id")));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// CredentialResolver
// ---------------------------------------------------------------------------

/// Maps a presented credential to the voter that already owns it and
/// decides whether the device voter should be merged into that voter.
///
/// Resolution never touches the merge ledger. It may repair identity data
/// on the way (verify a channel, create or repoint an identity link) and it
/// consumes friend invitations.
pub struct CredentialResolver {
    notifier: Arc<dyn Notifier>,
}

impl CredentialResolver {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn resolve(
        &self,
        request: &ResolveRequest,
        store: &dyn RecordStore,
    ) -> ResolveResult<Resolution> {
        let from_id = store
            .voter_for_device(&request.device)?
            .ok_or_else(|| ResolveError::NoSessionForDevice(request.device.to_string()))?;
        let from = store
            .voter(&from_id)?
            .ok_or_else(|| ResolveError::VoterNotFound(from_id.to_string()))?;
        debug!(device = %request.device, from = %from_id, credential = request.credential.kind(), "resolving credential");

        let target = match &request.credential {
            Credential::EmailSecret(secret) => {
                Target::Voter(self.channel_owner(ChannelKind::Email, secret, store)?)
            }
            Credential::SmsSecret(secret) => {
                Target::Voter(self.channel_owner(ChannelKind::Sms, secret, store)?)
            }
            Credential::FacebookSecret(secret) => {
                usable_secret(secret, "facebook secret")?;
                let link = store
                    .identity_link_by_secret(SocialNetwork::Facebook, &secret.digest())?
                    .ok_or_else(|| ResolveError::CredentialNotFound("facebook secret".into()))?;
                Target::Voter(link.voter_id)
            }
            Credential::TwitterSecret(secret) => {
                usable_secret(secret, "twitter secret")?;
                let link = store
                    .identity_link_by_secret(SocialNetwork::Twitter, &secret.digest())?
                    .ok_or_else(|| ResolveError::CredentialNotFound("twitter secret".into()))?;
                let external_id = link.external_id.clone();
                Target::Voter(self.repair_twitter(&external_id, Some(link), store)?)
            }
            Credential::FacebookIdentity(id) => {
                self.identity_owner(SocialNetwork::Facebook, id, &from, store)?
            }
            Credential::AppleIdentity(id) => {
                self.identity_owner(SocialNetwork::Apple, id, &from, store)?
            }
            Credential::TwitterIdentity(id) => {
                let external_id = usable_identity(id, SocialNetwork::Twitter)?;
                let link = store.identity_link(SocialNetwork::Twitter, external_id)?;
                if link.is_none() && self.twitter_claimants_are_empty(external_id, store)? {
                    self.identity_owner(SocialNetwork::Twitter, external_id, &from, store)?
                } else {
                    Target::Voter(self.repair_twitter(external_id, link, store)?)
                }
            }
            Credential::InvitationSecret(secret) => {
                usable_secret(secret, "invitation secret")?;
                let invitation = store
                    .invitation_by_secret(&secret.digest())?
                    .filter(|invitation| invitation.merge_by_secret_enabled)
                    .ok_or_else(|| ResolveError::CredentialNotFound("invitation secret".into()))?;
                let to = invitation
                    .recipient_voter_id
                    .clone()
                    .unwrap_or_else(|| from_id.clone());
                Target::Invitation(invitation, to)
            }
        };

        let (to_id, invitation) = match target {
            Target::Linked(voter) => {
                info!(voter = %voter, credential = request.credential.kind(), "identity linked to device voter");
                return Ok(Resolution::LinkRepaired { voter });
            }
            Target::Voter(voter) => (voter, None),
            Target::Invitation(invitation, voter) => (voter, Some(invitation)),
        };

        let resolution = self.guard(request, &from, &to_id, store)?;
        if let Some(invitation) = invitation {
            if !matches!(resolution, Resolution::MergeSkippedAlreadySignedIn { .. }) {
                self.consume_invitation(invitation, &to_id, store)?;
            }
        }
        info!(from = %from_id, to = %to_id, resolution = resolution.status_code(), "credential resolved");
        Ok(resolution)
    }

    fn guard(
        &self,
        request: &ResolveRequest,
        from: &Voter,
        to_id: &VoterId,
        store: &dyn RecordStore,
    ) -> ResolveResult<Resolution> {
        if to_id.matches(&from.we_vote_id) {
            return Ok(Resolution::AlreadySameAccount {
                voter: from.we_vote_id.clone(),
            });
        }
        if store.voter(to_id)?.is_none() {
            return Err(ResolveError::VoterNotFound(to_id.to_string()));
        }
        if request.do_not_merge_if_currently_signed_in && store.voter_is_signed_in(from)? {
            return Ok(Resolution::MergeSkippedAlreadySignedIn {
                current: from.we_vote_id.clone(),
                target: to_id.clone(),
            });
        }
        let pair = MergePair::new(from.we_vote_id.clone(), to_id.clone())
            .map_err(|err| ResolveError::InvalidCredential(err.to_string()))?;
        Ok(Resolution::Merge(pair))
    }

    /// The voter that owns the address behind an email or SMS secret.
    ///
    /// If another voter already holds the verified copy of the address, that
    /// voter wins. Otherwise the secret's row becomes verified.
    fn channel_owner(
        &self,
        kind: ChannelKind,
        secret: &SecretKey,
        store: &dyn RecordStore,
    ) -> ResolveResult<VoterId> {
        usable_secret(secret, &format!("{kind} secret"))?;
        let mut channel = store
            .channel_by_secret(kind, &secret.digest())?
            .ok_or_else(|| ResolveError::CredentialNotFound(format!("{kind} secret")))?;
        if channel.ownership_is_verified {
            return Ok(channel.voter_id);
        }

        let verified_elsewhere = store
            .channels_with_value(kind, &channel.normalized_value)?
            .into_iter()
            .find(|row| row.ownership_is_verified);
        if let Some(verified) = verified_elsewhere {
            debug!(%kind, owner = %verified.voter_id, "address already verified by another voter");
            return Ok(verified.voter_id);
        }

        channel.ownership_is_verified = true;
        store.save_channel(&channel)?;
        let mut outcome = MoveOutcome::default();
        heal_primary(kind, &channel.voter_id, store, &mut outcome)?;
        info!(%kind, voter = %channel.voter_id, "contact channel verified");
        Ok(channel.voter_id)
    }

    /// Owner of a Facebook, Twitter or Apple identity. An identity nobody
    /// holds is linked to the device voter if it has none for the network.
    fn identity_owner(
        &self,
        network: SocialNetwork,
        external_id: &str,
        from: &Voter,
        store: &dyn RecordStore,
    ) -> ResolveResult<Target> {
        let external_id = usable_identity(external_id, network)?;
        if let Some(link) = store.identity_link(network, external_id)? {
            return Ok(Target::Voter(link.voter_id));
        }
        if store
            .identity_link_for_voter(network, &from.we_vote_id)?
            .is_some()
        {
            return Err(ResolveError::CredentialNotFound(format!(
                "{network} identity {external_id}"
            )));
        }

        store.save_identity_link(&IdentityLink::new(
            network,
            external_id,
            from.we_vote_id.clone(),
        ))?;
        let mut voter = from.clone();
        match network {
            SocialNetwork::Facebook if voter.facebook_id.is_none() => {
                voter.facebook_id = Some(external_id.to_string());
            }
            SocialNetwork::Twitter if voter.twitter_id.is_none() => {
                voter.twitter_id = Some(external_id.to_string());
            }
            _ => {}
        }
        if &voter != from {
            store.save_voter(&voter)?;
        }
        Ok(Target::Linked(from.we_vote_id.clone()))
    }

    fn twitter_claimants_are_empty(
        &self,
        external_id: &str,
        store: &dyn RecordStore,
    ) -> ResolveResult<bool> {
        let org_link = store.organization_identity_link(SocialNetwork::Twitter, external_id)?;
        let claimants = store.voters_claiming(SocialNetwork::Twitter, external_id)?;
        Ok(org_link.is_none() && claimants.is_empty())
    }

    /// Pick the one voter that should own a Twitter identity and make the
    /// data agree.
    ///
    /// The canonical voter is the owner of the organization tied to the
    /// Twitter id, when that owner links back to it. Otherwise the holder of
    /// the identity link, then a claimant with a linked organization, then
    /// the earliest claimant. Every other voter loses its cached Twitter id,
    /// and a different organization tied to the id is folded into the
    /// canonical voter's organization.
    fn repair_twitter(
        &self,
        external_id: &str,
        link: Option<IdentityLink>,
        store: &dyn RecordStore,
    ) -> ResolveResult<VoterId> {
        let network = SocialNetwork::Twitter;
        let claimants = store.voters_claiming(network, external_id)?;

        let mut canonical = None;
        if let Some(org_link) = store.organization_identity_link(network, external_id)? {
            if let Some(org) = store.organization(&org_link.organization_id)? {
                if let Some(owner_id) = &org.owner_voter_id {
                    if let Some(owner) = store.voter(owner_id)? {
                        let links_back = owner
                            .linked_organization_id
                            .as_ref()
                            .is_some_and(|id| id.matches(&org.we_vote_id));
                        if links_back {
                            canonical = Some(owner.we_vote_id);
                        }
                    }
                }
            }
        }
        if canonical.is_none() {
            canonical = link.as_ref().map(|l| l.voter_id.clone());
        }
        if canonical.is_none() {
            canonical = claimants
                .iter()
                .find(|v| v.linked_organization_id.is_some())
                .or_else(|| claimants.iter().min_by_key(|v| v.date_joined))
                .map(|v| v.we_vote_id.clone());
        }
        let Some(mut canonical) = canonical else {
            return Err(ResolveError::CredentialNotFound(format!(
                "{network} identity {external_id}"
            )));
        };

        // A canonical voter already linked to another Twitter account keeps
        // that link; the identity stays with its current holder.
        let canonical_link = store.identity_link_for_voter(network, &canonical)?;
        let held_elsewhere = canonical_link
            .as_ref()
            .is_some_and(|l| l.external_id != external_id);
        if held_elsewhere {
            if let Some(link) = &link {
                canonical = link.voter_id.clone();
            }
        }

        match link {
            Some(mut link) if !link.voter_id.matches(&canonical) => {
                warn!(external_id, from = %link.voter_id, to = %canonical, "twitter link repointed");
                link.voter_id = canonical.clone();
                store.save_identity_link(&link)?;
            }
            Some(_) => {}
            None if canonical_link.is_none() => {
                store.save_identity_link(&IdentityLink::new(network, external_id, canonical.clone()))?;
                debug!(external_id, voter = %canonical, "twitter link created");
            }
            None => {}
        }

        for mut claimant in claimants {
            if claimant.we_vote_id.matches(&canonical) {
                continue;
            }
            claimant.twitter_id = None;
            claimant.twitter_screen_name = None;
            store.save_voter(&claimant)?;
            warn!(external_id, voter = %claimant.we_vote_id, "duplicate twitter claim cleared");
        }

        if let Some(mut voter) = store.voter(&canonical)? {
            if voter.twitter_id.is_none() {
                voter.twitter_id = Some(external_id.to_string());
                store.save_voter(&voter)?;
            }
        }

        // The organization tied to the Twitter id must be the canonical
        // voter's own organization.
        let mut outcome = MoveOutcome::default();
        reconcile_identity_organization(&canonical, network, store, &mut outcome)?;
        if !outcome.success() {
            warn!(external_id, voter = %canonical, status = %outcome.status(), "twitter organization left unreconciled");
        }
        Ok(canonical)
    }

    /// An invitation signs its recipient in once.
    fn consume_invitation(
        &self,
        mut invitation: Invitation,
        accepted_by: &VoterId,
        store: &dyn RecordStore,
    ) -> ResolveResult<()> {
        invitation.merge_by_secret_enabled = false;
        invitation.accepted = true;
        if invitation.recipient_voter_id.is_none() {
            invitation.recipient_voter_id = Some(accepted_by.clone());
        }
        store.save_invitation(&invitation)?;

        let notification = Notification::InvitationAccepted {
            inviter_voter_id: invitation.sender_voter_id.clone(),
            accepted_by_voter_id: accepted_by.clone(),
        };
        if let Err(err) = self.notifier.dispatch(notification) {
            warn!(invitation = %invitation.id, error = %err, "invitation accepted notice not sent");
        }
        Ok(())
    }
}
