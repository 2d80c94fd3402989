use std::sync::Arc;

use tracing::{info, warn};
use unify_engine::{
    CredentialResolver, MergeConfig, MergeOrchestrator, Notification, RecordingNotifier,
    ResolveError, ResolveRequest, Resolution, SessionRebinder,
};
use unify_ledger::{
    InMemoryMergeLedger, InMemoryMergeLog, MergeLedgerReader, MergeLogEntry, MergeStatusRow,
};
use unify_store::{DeviceSessionRepository, InMemoryRecordStore};
use unify_types::{DeviceId, MergePair, VoterId};

use crate::error::SdkResult;
use crate::response::MergeResponse;
use crate::state::ServiceState;

/// The caller-facing merge flow over in-memory backends.
///
/// `sign_in` resolves a credential, merges when needed and rebinds the
/// device. `merge_accounts` runs or resumes a merge for a known pair.
pub struct MergeService {
    store: InMemoryRecordStore,
    ledger: InMemoryMergeLedger,
    log: InMemoryMergeLog,
    orchestrator: MergeOrchestrator,
    resolver: CredentialResolver,
    rebinder: SessionRebinder,
    notifier: Arc<RecordingNotifier>,
}

impl MergeService {
    /// A service with empty backends.
    pub fn new(config: MergeConfig) -> Self {
        Self::with_backends(
            InMemoryRecordStore::new(),
            InMemoryMergeLedger::new(),
            InMemoryMergeLog::new(),
            config,
        )
    }

    /// A service over previously saved state.
    pub fn from_state(state: ServiceState, config: MergeConfig) -> Self {
        Self::with_backends(
            InMemoryRecordStore::from_snapshot(state.store),
            InMemoryMergeLedger::from_rows(state.ledger),
            InMemoryMergeLog::from_entries(state.log),
            config,
        )
    }

    fn with_backends(
        store: InMemoryRecordStore,
        ledger: InMemoryMergeLedger,
        log: InMemoryMergeLog,
        config: MergeConfig,
    ) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        Self {
            store,
            ledger,
            log,
            orchestrator: MergeOrchestrator::with_default_steps(config, notifier.clone()),
            resolver: CredentialResolver::new(notifier.clone()),
            rebinder: SessionRebinder::new(),
            notifier,
        }
    }

    /// Export store, ledger and log for persistence.
    pub fn state(&self) -> SdkResult<ServiceState> {
        Ok(ServiceState {
            store: self.store.snapshot()?,
            ledger: self.ledger.rows()?,
            log: self.log.entries()?,
        })
    }

    pub fn store(&self) -> &InMemoryRecordStore {
        &self.store
    }

    pub fn ledger(&self) -> &InMemoryMergeLedger {
        &self.ledger
    }

    pub fn config(&self) -> &MergeConfig {
        self.orchestrator.config()
    }

    /// Everything dispatched to the outside world so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.sent()
    }

    // ---- Flows ----

    /// Resolve a credential presented by a device and merge if it belongs
    /// to another voter.
    ///
    /// An unknown credential is reported as an unsuccessful response, not
    /// an error, unless the device's voter has an unfinished merge: the
    /// merge that consumed the credential on an earlier call is resumed
    /// instead. The device is rebound only when the merge completes; on a
    /// partial merge it stays with the original voter and the caller retries.
    pub fn sign_in(&self, request: &ResolveRequest) -> SdkResult<MergeResponse> {
        let resolution = match self.resolver.resolve(request, &self.store) {
            Ok(resolution) => resolution,
            Err(ResolveError::CredentialNotFound(what)) => {
                if let Some(pair) = self.unfinished_merge_for(&request.device)? {
                    info!(device = %request.device, %pair, "resuming unfinished merge");
                    let mut response = self.run_merge(&pair, Some(&request.device));
                    response.resolution = Some(Resolution::Merge(pair));
                    return Ok(response);
                }
                info!(device = %request.device, credential = request.credential.kind(), "credential not found");
                return Ok(MergeResponse::failed(format!("CREDENTIAL_NOT_FOUND: {what}")));
            }
            Err(err) => return Err(err.into()),
        };

        let pair = match resolution {
            Resolution::Merge(pair) => pair,
            other => {
                let from = self
                    .store
                    .voter_for_device(&request.device)?
                    .unwrap_or_else(|| other.surviving_voter().clone());
                return Ok(MergeResponse::resolved(other, from));
            }
        };

        let mut response = self.run_merge(&pair, Some(&request.device));
        response.resolution = Some(Resolution::Merge(pair));
        Ok(response)
    }

    /// Run or resume the merge of `from` into `to`. When a device is given
    /// it is rebound to `to` once the merge completes.
    pub fn merge_accounts(
        &self,
        from: &VoterId,
        to: &VoterId,
        device: Option<&DeviceId>,
    ) -> SdkResult<MergeResponse> {
        let pair = MergePair::new(from.clone(), to.clone())?;
        Ok(self.run_merge(&pair, device))
    }

    fn run_merge(&self, pair: &MergePair, device: Option<&DeviceId>) -> MergeResponse {
        let report = self
            .orchestrator
            .merge_accounts(pair, &self.store, &self.ledger, &self.log);
        let mut response = MergeResponse::merged(report);
        let Some(device) = device else {
            return response;
        };
        if !response.success {
            warn!(%pair, %device, status = %response.status, "merge incomplete; device left on original voter");
            return response;
        }

        match self.rebinder.rebind(device, &pair.to, &self.store) {
            Ok(outcome) => response.rebind = Some(outcome),
            Err(err) => {
                warn!(%pair, error = %err, "device session not rebound");
                response.success = false;
                response.status = format!("{} REBIND_FAILED: {err}", response.status);
            }
        }
        response
    }

    /// The incomplete merge whose "from" voter the device is still bound to.
    fn unfinished_merge_for(&self, device: &DeviceId) -> SdkResult<Option<MergePair>> {
        let Some(voter) = self.store.voter_for_device(device)? else {
            return Ok(None);
        };
        for pair in self.ledger.pairs()? {
            if !pair.from.matches(&voter) {
                continue;
            }
            if let Some(row) = self.ledger.status(&pair)? {
                if !row.total_merge_complete {
                    return Ok(Some(pair));
                }
            }
        }
        Ok(None)
    }

    /// The ledger row for a pair, if a merge was ever attempted.
    pub fn status(&self, from: &VoterId, to: &VoterId) -> SdkResult<Option<MergeStatusRow>> {
        let pair = MergePair::new(from.clone(), to.clone())?;
        Ok(self.ledger.status(&pair)?)
    }

    /// Merge log rows, optionally for one pair only.
    pub fn log_entries(&self, pair: Option<&MergePair>) -> SdkResult<Vec<MergeLogEntry>> {
        Ok(match pair {
            Some(pair) => self.log.entries_for(pair)?,
            None => self.log.entries()?,
        })
    }
}
