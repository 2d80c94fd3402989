use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{OrganizationId, VoterId};
use crate::secret::SecretDigest;

/// Third-party identity providers a voter can sign in with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialNetwork {
    Facebook,
    Twitter,
    Apple,
}

impl SocialNetwork {
    pub const ALL: [SocialNetwork; 3] = [Self::Facebook, Self::Twitter, Self::Apple];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for SocialNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one third-party identity to exactly one voter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub network: SocialNetwork,
    /// Provider-issued id (numeric for Facebook/Twitter, opaque for Apple).
    pub external_id: String,
    pub voter_id: VoterId,
    /// Digest of the one-time secret issued when the link was verified.
    pub secret_digest: Option<SecretDigest>,
}

impl IdentityLink {
    pub fn new(network: SocialNetwork, external_id: impl Into<String>, voter_id: VoterId) -> Self {
        Self {
            network,
            external_id: external_id.into(),
            voter_id,
            secret_digest: None,
        }
    }

    pub fn with_secret(mut self, digest: SecretDigest) -> Self {
        self.secret_digest = Some(digest);
        self
    }
}

/// Maps a third-party identity to the organization that represents it publicly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationIdentityLink {
    pub network: SocialNetwork,
    pub external_id: String,
    pub organization_id: OrganizationId,
}

impl OrganizationIdentityLink {
    pub fn new(
        network: SocialNetwork,
        external_id: impl Into<String>,
        organization_id: OrganizationId,
    ) -> Self {
        Self {
            network,
            external_id: external_id.into(),
            organization_id,
        }
    }
}
