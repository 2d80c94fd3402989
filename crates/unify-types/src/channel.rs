use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, VoterId};
use crate::secret::SecretDigest;

/// The two contact-channel kinds a voter can verify.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }

    /// Normalize a raw value for this kind. Returns `None` if it is unusable.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        match self {
            Self::Email => normalize_email(raw),
            Self::Sms => normalize_sms(raw),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An email address or SMS number claimed by one voter.
///
/// Unverified rows for the same value may exist under several voters at once;
/// at most one row per normalized value may be verified system-wide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChannel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub normalized_value: String,
    pub voter_id: VoterId,
    pub ownership_is_verified: bool,
    pub secret_digest: Option<SecretDigest>,
    pub date_created: DateTime<Utc>,
}

impl ContactChannel {
    pub fn new(
        id: ChannelId,
        kind: ChannelKind,
        normalized_value: impl Into<String>,
        voter_id: VoterId,
    ) -> Self {
        Self {
            id,
            kind,
            normalized_value: normalized_value.into(),
            voter_id,
            ownership_is_verified: false,
            secret_digest: None,
            date_created: Utc::now(),
        }
    }

    pub fn verified(mut self) -> Self {
        self.ownership_is_verified = true;
        self
    }

    pub fn with_secret(mut self, digest: SecretDigest) -> Self {
        self.secret_digest = Some(digest);
        self
    }

    pub fn same_value(&self, other: &ContactChannel) -> bool {
        self.kind == other.kind && self.normalized_value.eq_ignore_ascii_case(&other.normalized_value)
    }
}

/// Lowercase and trim an email address. Requires exactly one `@` with text on both sides.
pub fn normalize_email(raw: &str) -> Option<String> {
    let value = raw.trim().to_lowercase();
    let (local, domain) = value.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(value)
}

/// Reduce a phone number to `+<digits>`. Ten-digit numbers are assumed to be US numbers.
pub fn normalize_sms(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return None;
    }
    if trimmed.starts_with('+') {
        return Some(format!("+{digits}"));
    }
    if digits.len() == 10 {
        return Some(format!("+1{digits}"));
    }
    Some(format!("+{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.ORG "),
            Some("jane.doe@example.org".into())
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("@example.org"), None);
        assert_eq!(normalize_email("a@b@c"), None);
    }

    #[test]
    fn sms_normalization() {
        assert_eq!(normalize_sms("(415) 555-0100"), Some("+14155550100".into()));
        assert_eq!(normalize_sms("+44 20 7946 0958"), Some("+442079460958".into()));
        assert_eq!(normalize_sms("12"), None);
    }

    #[test]
    fn same_value_respects_kind() {
        let voter = VoterId::new("wv01voter1");
        let a = ContactChannel::new(ChannelId(1), ChannelKind::Email, "a@x.org", voter.clone());
        let b = ContactChannel::new(ChannelId(2), ChannelKind::Email, "A@X.org", voter.clone());
        let c = ContactChannel::new(ChannelId(3), ChannelKind::Sms, "a@x.org", voter);
        assert!(a.same_value(&b));
        assert!(!a.same_value(&c));
    }

    proptest::proptest! {
        #[test]
        fn email_normalization_is_idempotent(local in "[A-Za-z0-9.]{1,12}", domain in "[A-Za-z]{1,8}\\.[a-z]{2,3}") {
            let raw = format!(" {local}@{domain} ");
            let once = normalize_email(&raw).unwrap();
            proptest::prop_assert_eq!(normalize_email(&once), Some(once.clone()));
        }

        #[test]
        fn sms_normalization_is_idempotent(digits in "[0-9]{7,14}") {
            if let Some(once) = normalize_sms(&digits) {
                proptest::prop_assert_eq!(normalize_sms(&once), Some(once.clone()));
            }
        }
    }
}
