use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, VoterId};
use crate::secret::SecretDigest;

/// A friend invitation sent by one voter to another voter or email address.
///
/// The recipient's secret link can be used once to sign the recipient in.
/// After that use `merge_by_secret_enabled` is switched off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: ItemId,
    pub sender_voter_id: VoterId,
    pub recipient_voter_id: Option<VoterId>,
    pub recipient_email: Option<String>,
    pub secret_digest: Option<SecretDigest>,
    pub merge_by_secret_enabled: bool,
    pub accepted: bool,
    pub date_created: DateTime<Utc>,
}

impl Invitation {
    pub fn new(id: ItemId, sender_voter_id: VoterId, recipient_voter_id: VoterId) -> Self {
        Self {
            id,
            sender_voter_id,
            recipient_voter_id: Some(recipient_voter_id),
            recipient_email: None,
            secret_digest: None,
            merge_by_secret_enabled: true,
            accepted: false,
            date_created: Utc::now(),
        }
    }

    pub fn with_secret(mut self, digest: SecretDigest) -> Self {
        self.secret_digest = Some(digest);
        self
    }

    pub fn references(&self, voter: &VoterId) -> bool {
        self.sender_voter_id.matches(voter)
            || self
                .recipient_voter_id
                .as_ref()
                .is_some_and(|recipient| recipient.matches(voter))
    }

    /// The voter on the other end of the invitation from `voter`'s point of view.
    pub fn other_side(&self, voter: &VoterId) -> Option<&VoterId> {
        if self.sender_voter_id.matches(voter) {
            self.recipient_voter_id.as_ref()
        } else if self.references(voter) {
            Some(&self.sender_voter_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_invitation_allows_merge_by_secret() {
        let inv = Invitation::new(ItemId(1), VoterId::new("s"), VoterId::new("r"));
        assert!(inv.merge_by_secret_enabled);
        assert!(!inv.accepted);
        assert_eq!(inv.other_side(&VoterId::new("r")), Some(&VoterId::new("s")));
        assert_eq!(inv.other_side(&VoterId::new("s")), Some(&VoterId::new("r")));
    }
}
