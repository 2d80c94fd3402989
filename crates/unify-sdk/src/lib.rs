//! High-level SDK for voter account unification.
//!
//! [`MergeService`] bundles the record store, merge ledger, merge log and
//! the engine into one API: present a credential from a device, get back
//! `{success, status, merge_from_voter_we_vote_id, merge_to_voter_we_vote_id}`.

pub mod error;
pub mod response;
pub mod service;
pub mod state;

pub use error::{SdkError, SdkResult};
pub use response::MergeResponse;
pub use service::MergeService;
pub use state::ServiceState;

// Re-export key types
pub use unify_engine::{Credential, MergeConfig, MergeReport, Resolution, ResolveRequest};
pub use unify_ledger::{MergeLogEntry, MergeStatusRow};
pub use unify_types::{DeviceId, MergePair, MergeStep, SecretKey, VoterId};
