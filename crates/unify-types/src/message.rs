use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, VoterId};

/// An outbound email or SMS held back until its sender can be named.
///
/// Invitations sent by an anonymous voter wait here; once the sending
/// account has a display name the message can be released to dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredMessage {
    pub id: ItemId,
    pub sender_voter_id: VoterId,
    pub recipient_address: String,
    pub template: String,
    pub released: bool,
    pub date_created: DateTime<Utc>,
}

impl DeferredMessage {
    pub fn new(
        id: ItemId,
        sender_voter_id: VoterId,
        recipient_address: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sender_voter_id,
            recipient_address: recipient_address.into(),
            template: template.into(),
            released: false,
            date_created: Utc::now(),
        }
    }
}
