use serde::{Deserialize, Serialize};
use unify_ledger::{MergeLogEntry, MergeStatusRow};
use unify_store::StoreSnapshot;

use crate::error::{SdkError, SdkResult};

/// Everything a [`crate::MergeService`] holds, in one serializable value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceState {
    pub store: StoreSnapshot,
    pub ledger: Vec<MergeStatusRow>,
    pub log: Vec<MergeLogEntry>,
}

impl ServiceState {
    pub fn to_json_pretty(&self) -> SdkResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SdkError::State(e.to_string()))
    }

    pub fn from_json(json: &str) -> SdkResult<Self> {
        serde_json::from_str(json).map_err(|e| SdkError::State(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_an_empty_state() {
        let state = ServiceState::from_json("{}").unwrap();
        assert_eq!(state, ServiceState::default());
        assert!(ServiceState::from_json("not json").is_err());
    }
}
