use serde::{Deserialize, Serialize};

use crate::ids::{OrganizationId, VoterId};
use crate::voter::ProfileImages;

/// A public-facing profile. At most one voter owns it via
/// `Voter::linked_organization_id`, mirrored here by `owner_voter_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub we_vote_id: OrganizationId,
    pub name: Option<String>,
    pub owner_voter_id: Option<VoterId>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub facebook_id: Option<String>,
    pub twitter_user_id: Option<String>,
    pub twitter_handle: Option<String>,
    /// Cached copy of the owner's current profile images.
    pub profile_images: ProfileImages,
}

impl Organization {
    pub fn new(we_vote_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            we_vote_id,
            name: Some(name.into()),
            owner_voter_id: None,
            website: None,
            email: None,
            description: None,
            facebook_id: None,
            twitter_user_id: None,
            twitter_handle: None,
            profile_images: ProfileImages::default(),
        }
    }

    pub fn owned_by(mut self, voter: VoterId) -> Self {
        self.owner_voter_id = Some(voter);
        self
    }

    pub fn is_owned_by(&self, voter: &VoterId) -> bool {
        self.owner_voter_id.as_ref().is_some_and(|owner| owner.matches(voter))
    }

    /// Copy every profile field that is empty here but set on `other`.
    ///
    /// Returns `true` if anything changed. Ownership is never copied.
    pub fn absorb_missing(&mut self, other: &Organization) -> bool {
        let mut changed = false;
        changed |= fill(&mut self.name, &other.name);
        changed |= fill(&mut self.website, &other.website);
        changed |= fill(&mut self.email, &other.email);
        changed |= fill(&mut self.description, &other.description);
        changed |= fill(&mut self.facebook_id, &other.facebook_id);
        changed |= fill(&mut self.twitter_user_id, &other.twitter_user_id);
        changed |= fill(&mut self.twitter_handle, &other.twitter_handle);
        if self.profile_images.is_empty() && !other.profile_images.is_empty() {
            self.profile_images = other.profile_images.clone();
            changed = true;
        }
        changed
    }
}

fn fill(target: &mut Option<String>, source: &Option<String>) -> bool {
    let target_empty = target.as_deref().map_or(true, |v| v.trim().is_empty());
    match source {
        Some(value) if target_empty && !value.trim().is_empty() => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}
