//! Foundation types for voter account unification.
//!
//! This crate provides the records that the merge engine reads and rewrites.
//! Every other `unify-*` crate depends on `unify-types`.
//!
//! # Key Types
//!
//! - [`VoterId`]: canonical, globally unique voter identifier (`we_vote_id`)
//! - [`Voter`]: the unit of account merge
//! - [`Organization`]: public-facing profile owned by at most one voter
//! - [`IdentityLink`]: third-party social identity mapped to one voter
//! - [`ContactChannel`]: email address or SMS number, verified or not
//! - [`OwnedItem`]: any row carrying a `voter_we_vote_id` foreign key
//! - [`MergePair`] / [`MergeStep`]: the (from, to) key and the fixed step order

pub mod channel;
pub mod error;
pub mod ids;
pub mod identity;
pub mod invitation;
pub mod item;
pub mod merge;
pub mod message;
pub mod organization;
pub mod secret;
pub mod voter;

pub use channel::{normalize_email, normalize_sms, ChannelKind, ContactChannel};
pub use error::TypeError;
pub use identity::{IdentityLink, OrganizationIdentityLink, SocialNetwork};
pub use ids::{ChannelId, DeviceId, ItemId, OrganizationId, VoterId};
pub use invitation::Invitation;
pub use item::{DuplicateKey, ItemDomain, OwnedItem};
pub use merge::{MergePair, MergeStep};
pub use message::DeferredMessage;
pub use organization::Organization;
pub use secret::{SecretDigest, SecretKey};
pub use voter::{ProfileImages, Voter};
