use serde::{Deserialize, Serialize};
use tracing::info;
use unify_store::RecordStore;
use unify_types::{DeviceId, VoterId};

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rebind", rename_all = "snake_case")]
pub enum RebindOutcome {
    /// The device now points at the surviving voter.
    Rebound { previous: Option<VoterId> },
    /// The device already pointed at the surviving voter.
    Unchanged,
}

/// Moves a device's session pointer to the surviving voter of a merge.
///
/// Exactly one pointer is written per call. A failure here leaves already
/// moved data in place; the caller reports it and may retry.
#[derive(Debug, Default)]
pub struct SessionRebinder;

impl SessionRebinder {
    pub fn new() -> Self {
        Self
    }

    pub fn rebind(
        &self,
        device: &DeviceId,
        to: &VoterId,
        store: &dyn RecordStore,
    ) -> EngineResult<RebindOutcome> {
        if store.voter(to)?.is_none() {
            return Err(EngineError::VoterNotFound(to.to_string()));
        }
        let previous = store.voter_for_device(device)?;
        if previous.as_ref().is_some_and(|current| current.matches(to)) {
            return Ok(RebindOutcome::Unchanged);
        }
        store.bind_device(device, to)?;
        info!(%device, to = %to, "device session rebound");
        Ok(RebindOutcome::Rebound { previous })
    }
}
