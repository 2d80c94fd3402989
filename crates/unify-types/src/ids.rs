use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier. Surrounding whitespace is trimmed.
            pub fn new(value: impl Into<String>) -> Self {
                let value = value.into();
                Self(value.trim().to_string())
            }

            /// Parse an identifier, rejecting empty input.
            pub fn parse(value: &str) -> Result<Self, TypeError> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(TypeError::EmptyIdentifier);
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Generate a fresh identifier backed by a UUID v7.
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, Uuid::now_v7().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Case-insensitive comparison, matching how stored ids are looked up.
            pub fn matches(&self, other: &Self) -> bool {
                self.0.eq_ignore_ascii_case(&other.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Canonical voter identifier (`we_vote_id`), unique across all sites.
    VoterId,
    "wv-voter-"
);

string_id!(
    /// Identifier of a public-facing organization profile.
    OrganizationId,
    "wv-org-"
);

string_id!(
    /// Opaque per-device session token.
    DeviceId,
    "dev-"
);

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Row identifier of an [`crate::OwnedItem`].
    ItemId
);

numeric_id!(
    /// Row identifier of a [`crate::ContactChannel`].
    ChannelId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_whitespace() {
        let id = VoterId::new("  wv01voter7 ");
        assert_eq!(id.as_str(), "wv01voter7");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(VoterId::parse("   "), Err(TypeError::EmptyIdentifier));
        assert!(OrganizationId::parse("wv01org3").is_ok());
    }

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = VoterId::generate();
        let b = VoterId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("wv-voter-"));
        assert!(OrganizationId::generate().as_str().starts_with("wv-org-"));
    }

    #[test]
    fn matches_ignores_case() {
        let a = VoterId::new("WV01VOTER1");
        let b = VoterId::new("wv01voter1");
        assert!(a.matches(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn serde_is_transparent() {
        let id = VoterId::new("wv01voter9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"wv01voter9\"");
        let item: ItemId = serde_json::from_str("42").unwrap();
        assert_eq!(item, ItemId(42));
    }
}
