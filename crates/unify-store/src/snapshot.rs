use serde::{Deserialize, Serialize};

use unify_types::{
    ContactChannel, DeferredMessage, DeviceId, IdentityLink, Invitation, Organization,
    OrganizationIdentityLink, OwnedItem, Voter, VoterId,
};

use crate::error::{StoreError, StoreResult};

/// One row of the device-session table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub device_id: DeviceId,
    pub voter_id: VoterId,
}

/// A full, serializable copy of every table in a record store.
///
/// Used by the CLI to persist state between invocations and by tests to
/// compare a store before and after a merge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub voters: Vec<Voter>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub organization_identity_links: Vec<OrganizationIdentityLink>,
    #[serde(default)]
    pub channels: Vec<ContactChannel>,
    #[serde(default)]
    pub identity_links: Vec<IdentityLink>,
    #[serde(default)]
    pub items: Vec<OwnedItem>,
    #[serde(default)]
    pub invitations: Vec<Invitation>,
    #[serde(default)]
    pub messages: Vec<DeferredMessage>,
    #[serde(default)]
    pub device_sessions: Vec<DeviceSession>,
}

impl StoreSnapshot {
    pub fn to_json_pretty(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.voters.len()
            + self.organizations.len()
            + self.organization_identity_links.len()
            + self.channels.len()
            + self.identity_links.len()
            + self.items.len()
            + self.invitations.len()
            + self.messages.len()
            + self.device_sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unify_types::{ItemDomain, ItemId};

    #[test]
    fn json_round_trip_preserves_rows() {
        let voter = VoterId::new("wv01voter1");
        let snapshot = StoreSnapshot {
            voters: vec![Voter::new(voter.clone())],
            items: vec![OwnedItem::new(ItemId(1), ItemDomain::Donation, voter.clone())],
            device_sessions: vec![DeviceSession {
                device_id: DeviceId::new("dev-abc"),
                voter_id: voter,
            }],
            ..Default::default()
        };
        let json = snapshot.to_json_pretty().unwrap();
        let back = StoreSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.row_count(), 3);
    }

    #[test]
    fn missing_tables_default_to_empty() {
        let snapshot = StoreSnapshot::from_json("{\"voters\": []}").unwrap();
        assert_eq!(snapshot.row_count(), 0);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = StoreSnapshot::from_json("not json").unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
