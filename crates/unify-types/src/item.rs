use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, OrganizationId, VoterId};

/// Which field decides that two items under the same voter are duplicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateKey {
    /// Duplicates are allowed; every row is simply reassigned.
    None,
    /// Same `subject` (election, organization, ballot item) under one voter.
    Subject,
    /// Same other party of a two-voter edge.
    Counterpart,
}

/// Data domains whose rows are owned by a voter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemDomain {
    Position,
    FollowOrganization,
    FollowIssue,
    Friend,
    SuggestedFriend,
    MembershipLink,
    OrganizationTeamMember,
    VoterPlan,
    Donation,
    VoterGuide,
    SharedItem,
    ActivityNotice,
    ActivityPost,
    ActivityComment,
    CampaignSupport,
    AnalyticsEvent,
    CandidateChangeLog,
    VoterChangeLog,
    VoterContactEmail,
}

impl ItemDomain {
    pub const ALL: [ItemDomain; 19] = [
        Self::Position,
        Self::FollowOrganization,
        Self::FollowIssue,
        Self::Friend,
        Self::SuggestedFriend,
        Self::MembershipLink,
        Self::OrganizationTeamMember,
        Self::VoterPlan,
        Self::Donation,
        Self::VoterGuide,
        Self::SharedItem,
        Self::ActivityNotice,
        Self::ActivityPost,
        Self::ActivityComment,
        Self::CampaignSupport,
        Self::AnalyticsEvent,
        Self::CandidateChangeLog,
        Self::VoterChangeLog,
        Self::VoterContactEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::FollowOrganization => "follow_organization",
            Self::FollowIssue => "follow_issue",
            Self::Friend => "friend",
            Self::SuggestedFriend => "suggested_friend",
            Self::MembershipLink => "membership_link",
            Self::OrganizationTeamMember => "organization_team_member",
            Self::VoterPlan => "voter_plan",
            Self::Donation => "donation",
            Self::VoterGuide => "voter_guide",
            Self::SharedItem => "shared_item",
            Self::ActivityNotice => "activity_notice",
            Self::ActivityPost => "activity_post",
            Self::ActivityComment => "activity_comment",
            Self::CampaignSupport => "campaign_support",
            Self::AnalyticsEvent => "analytics_event",
            Self::CandidateChangeLog => "candidate_change_log",
            Self::VoterChangeLog => "voter_change_log",
            Self::VoterContactEmail => "voter_contact_email",
        }
    }

    /// Domains whose rows carry a denormalized copy of the owner's linked organization.
    pub fn carries_organization(&self) -> bool {
        matches!(
            self,
            Self::Position
                | Self::VoterGuide
                | Self::CampaignSupport
                | Self::SharedItem
                | Self::ActivityPost
        )
    }

    pub fn duplicate_key(&self) -> DuplicateKey {
        match self {
            Self::Friend | Self::SuggestedFriend => DuplicateKey::Counterpart,
            Self::VoterPlan | Self::MembershipLink | Self::OrganizationTeamMember => {
                DuplicateKey::Subject
            }
            _ => DuplicateKey::None,
        }
    }
}

impl fmt::Display for ItemDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row created by normal product usage under whichever voter was active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedItem {
    pub id: ItemId,
    pub domain: ItemDomain,
    pub voter_id: VoterId,
    /// Denormalized owner organization, for domains that carry one.
    pub organization_id: Option<OrganizationId>,
    /// The other voter of a two-voter edge (friends, suggested friends).
    pub counterpart_voter_id: Option<VoterId>,
    /// What the item is about: ballot item, followed organization, election, issue.
    pub subject: Option<String>,
    pub date_created: DateTime<Utc>,
}

impl OwnedItem {
    pub fn new(id: ItemId, domain: ItemDomain, voter_id: VoterId) -> Self {
        Self {
            id,
            domain,
            voter_id,
            organization_id: None,
            counterpart_voter_id: None,
            subject: None,
            date_created: Utc::now(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_organization(mut self, organization: OrganizationId) -> Self {
        self.organization_id = Some(organization);
        self
    }

    pub fn with_counterpart(mut self, counterpart: VoterId) -> Self {
        self.counterpart_voter_id = Some(counterpart);
        self
    }

    /// Whether either side of this item points at `voter`.
    pub fn references(&self, voter: &VoterId) -> bool {
        self.voter_id.matches(voter)
            || self
                .counterpart_voter_id
                .as_ref()
                .is_some_and(|other| other.matches(voter))
    }

    /// For an edge touching `voter`, the voter on the other end.
    pub fn other_side(&self, voter: &VoterId) -> Option<&VoterId> {
        if self.voter_id.matches(voter) {
            self.counterpart_voter_id.as_ref()
        } else if self
            .counterpart_voter_id
            .as_ref()
            .is_some_and(|c| c.matches(voter))
        {
            Some(&self.voter_id)
        } else {
            None
        }
    }
}
