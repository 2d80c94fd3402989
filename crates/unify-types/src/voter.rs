use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, OrganizationId, VoterId};

/// Notification bits turned on for brand-new voters.
pub const NOTIFICATION_SETTINGS_FLAGS_DEFAULT: u32 = 0b0110_1111;

/// Hosted profile image URLs in the three sizes the product renders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileImages {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub tiny: Option<String>,
}

impl ProfileImages {
    pub fn new(
        large: impl Into<String>,
        medium: impl Into<String>,
        tiny: impl Into<String>,
    ) -> Self {
        Self {
            large: Some(large.into()),
            medium: Some(medium.into()),
            tiny: Some(tiny.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.large.is_none() && self.medium.is_none() && self.tiny.is_none()
    }
}

/// The canonical identity record and the unit of account merge.
///
/// A voter is created on first device contact. During a merge the "from"
/// voter row is kept as a tombstone with its unique-constrained fields
/// (email, sms, social ids, linked organization) cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub we_vote_id: VoterId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// Cached copy of the verified email's normalized value.
    pub email: Option<String>,
    pub primary_email_id: Option<ChannelId>,
    pub email_ownership_is_verified: bool,

    /// Cached copy of the verified sms number's normalized value.
    pub normalized_sms_phone_number: Option<String>,
    pub primary_sms_id: Option<ChannelId>,
    pub sms_ownership_is_verified: bool,

    pub facebook_id: Option<String>,
    pub twitter_id: Option<String>,
    pub twitter_screen_name: Option<String>,

    /// At most one organization is owned by a voter.
    pub linked_organization_id: Option<OrganizationId>,

    pub profile_images: ProfileImages,
    pub notification_settings_flags: u32,
    pub interface_status_flags: u32,

    /// Set once the voter has created data worth keeping.
    pub data_to_preserve: bool,
    pub date_joined: DateTime<Utc>,
}

impl Voter {
    /// A fresh, anonymous voter as created on first device contact.
    pub fn new(we_vote_id: VoterId) -> Self {
        Self {
            we_vote_id,
            first_name: None,
            last_name: None,
            email: None,
            primary_email_id: None,
            email_ownership_is_verified: false,
            normalized_sms_phone_number: None,
            primary_sms_id: None,
            sms_ownership_is_verified: false,
            facebook_id: None,
            twitter_id: None,
            twitter_screen_name: None,
            linked_organization_id: None,
            profile_images: ProfileImages::default(),
            notification_settings_flags: NOTIFICATION_SETTINGS_FLAGS_DEFAULT,
            interface_status_flags: 0,
            data_to_preserve: false,
            date_joined: Utc::now(),
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn signed_in_with_email(&self) -> bool {
        (self.email.is_some() || self.primary_email_id.is_some()) && self.email_ownership_is_verified
    }

    pub fn signed_in_with_sms(&self) -> bool {
        (self.normalized_sms_phone_number.is_some() || self.primary_sms_id.is_some())
            && self.sms_ownership_is_verified
    }

    /// Name shown to friends and in outbound messages, if the voter has one.
    pub fn display_name(&self) -> Option<String> {
        let first = self.first_name.as_deref().map(str::trim).unwrap_or("");
        let last = self.last_name.as_deref().map(str::trim).unwrap_or("");
        let full = format!("{first} {last}");
        let full = full.trim();
        if !full.is_empty() {
            return Some(full.to_string());
        }
        self.twitter_screen_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Drop the cached email pointer and verification flag.
    pub fn clear_email(&mut self) {
        self.email = None;
        self.primary_email_id = None;
        self.email_ownership_is_verified = false;
    }

    /// Drop the cached sms pointer and verification flag.
    pub fn clear_sms(&mut self) {
        self.normalized_sms_phone_number = None;
        self.primary_sms_id = None;
        self.sms_ownership_is_verified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_voter_is_anonymous() {
        let voter = Voter::new(VoterId::new("wv01voter1"));
        assert!(!voter.signed_in_with_email());
        assert!(!voter.signed_in_with_sms());
        assert_eq!(voter.display_name(), None);
        assert_eq!(
            voter.notification_settings_flags,
            NOTIFICATION_SETTINGS_FLAGS_DEFAULT
        );
    }

    #[test]
    fn verified_email_signs_in() {
        let mut voter = Voter::new(VoterId::new("wv01voter1"));
        voter.email = Some("jane@example.org".into());
        assert!(!voter.signed_in_with_email());
        voter.email_ownership_is_verified = true;
        assert!(voter.signed_in_with_email());
        voter.clear_email();
        assert!(!voter.signed_in_with_email());
    }

    #[test]
    fn display_name_falls_back_to_screen_name() {
        let mut voter = Voter::new(VoterId::new("wv01voter1"));
        voter.twitter_screen_name = Some("janedoe".into());
        assert_eq!(voter.display_name().as_deref(), Some("janedoe"));
        let voter = voter.with_name("Jane", "Doe");
        assert_eq!(voter.display_name().as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn profile_images_empty() {
        assert!(ProfileImages::default().is_empty());
        assert!(!ProfileImages::new("l", "m", "t").is_empty());
    }
}
