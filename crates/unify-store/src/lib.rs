//! Record store interface for voter account unification.
//!
//! The merge engine never talks to a database directly. Every data domain is
//! reached through a narrow repository trait, and [`RecordStore`] bundles all
//! of them for callers that need the whole store.
//!
//! # Repositories
//!
//! - [`VoterRepository`] -- voter rows and their cached credential fields
//! - [`OrganizationRepository`] -- organizations and organization identity links
//! - [`ChannelRepository`] -- email addresses and SMS numbers
//! - [`IdentityLinkRepository`] -- Facebook / Twitter / Apple links
//! - [`OwnedItemRepository`] -- every row keyed by `voter_we_vote_id`
//! - [`InvitationRepository`] -- friend invitations and their secrets
//! - [`DeferredMessageRepository`] -- outbound messages held for release
//! - [`DeviceSessionRepository`] -- device token to voter mapping
//!
//! # Backends
//!
//! - [`InMemoryRecordStore`] -- `BTreeMap` tables behind one `RwLock`, with
//!   snapshot import/export and write-fault injection for tests
//!
//! # Design Rules
//!
//! 1. A write either fully applies to one row or fails; there are no
//!    multi-row transactions.
//! 2. Unique columns (cached email, primary channel ids, linked organization,
//!    one identity link per voter and network) are enforced on write.
//! 3. Reads never observe a half-written row.

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{FaultTarget, InMemoryRecordStore};
pub use snapshot::{DeviceSession, StoreSnapshot};
pub use traits::{
    ChannelRepository, DeferredMessageRepository, DeviceSessionRepository, IdentityLinkRepository,
    InvitationRepository, OrganizationRepository, OwnedItemRepository, RecordStore,
    VoterRepository,
};
