//! Voter account merge engine.
//!
//! When a device proves it holds a credential (an email or SMS secret, a
//! social identity, a friend invitation) that already belongs to another
//! voter, the device's voter is merged into that voter. The engine is made of:
//!
//! - [`CredentialResolver`]: maps the credential to the voter that owns it
//!   and decides whether a merge is needed
//! - [`Mover`]s: one idempotent data-migration step per domain
//! - [`MergeOrchestrator`]: runs the movers in fixed order against the merge
//!   status ledger, so an interrupted merge resumes where it stopped
//! - [`SessionRebinder`]: points the device at the surviving voter
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use unify_engine::{MergeConfig, MergeOrchestrator, RecordingNotifier};
//! use unify_ledger::{InMemoryMergeLedger, InMemoryMergeLog};
//! use unify_store::{InMemoryRecordStore, VoterRepository};
//! use unify_types::{MergePair, Voter, VoterId};
//!
//! let store = InMemoryRecordStore::new();
//! store.save_voter(&Voter::new(VoterId::new("wv01voter1"))).unwrap();
//! store.save_voter(&Voter::new(VoterId::new("wv01voter2"))).unwrap();
//!
//! let orchestrator = MergeOrchestrator::with_default_steps(
//!     MergeConfig::default(),
//!     Arc::new(RecordingNotifier::new()),
//! );
//! let pair = MergePair::new(VoterId::new("wv01voter1"), VoterId::new("wv01voter2")).unwrap();
//! let report = orchestrator.merge_accounts(
//!     &pair,
//!     &store,
//!     &InMemoryMergeLedger::new(),
//!     &InMemoryMergeLog::new(),
//! );
//! assert!(report.success);
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod mover;
pub mod movers;
pub mod notify;
pub mod orchestrator;
pub mod rebind;
pub mod resolver;

// Re-exports for convenience.
pub use config::MergeConfig;
pub use error::{EngineError, EngineResult, ResolveError, ResolveResult};
pub use lock::{PairGuard, PairLocks};
pub use mover::{guarded, MoveContext, MoveOutcome, MovePattern, Mover};
pub use movers::default_movers;
pub use notify::{Notification, Notifier, RecordingNotifier};
pub use orchestrator::{MergeOrchestrator, MergeReport, StepOutcomeKind, StepReport};
pub use rebind::{RebindOutcome, SessionRebinder};
pub use resolver::{Credential, CredentialResolver, Resolution, ResolveRequest};
