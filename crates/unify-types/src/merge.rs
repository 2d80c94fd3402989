use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::VoterId;

/// The (from, to) key of a merge: `from` is folded into the surviving `to`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MergePair {
    pub from: VoterId,
    pub to: VoterId,
}

impl MergePair {
    /// Build a pair, rejecting a voter merged into itself.
    pub fn new(from: VoterId, to: VoterId) -> Result<Self, TypeError> {
        if from.as_str().is_empty() || to.as_str().is_empty() {
            return Err(TypeError::InvalidPair("missing from or to voter id".into()));
        }
        if from.matches(&to) {
            return Err(TypeError::InvalidPair(format!(
                "from and to are the same voter: {from}"
            )));
        }
        Ok(Self { from, to })
    }
}

impl fmt::Display for MergePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// One named step of a merge, in the fixed order the orchestrator runs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStep {
    RepairPositions,
    MovePositions,
    MoveOrganization,
    MoveFriends,
    MoveFollows,
    MoveMembershipLinks,
    MoveOrgTeam,
    MoveFollowIssues,
    MoveEmail,
    MoveSms,
    MoveFacebook,
    MoveTwitter,
    MoveApple,
    MoveCandidateChangeLog,
    MoveVoterChangeLog,
    MoveVoterContacts,
    MoveVoterPlans,
    MoveDonations,
    MoveVoterGuides,
    MoveSharedItems,
    MoveActivityNotices,
    MoveActivityPosts,
    MoveActivityComments,
    MoveCampaignSupport,
    MoveAnalytics,
    MergeVoterRow,
    MoveImages,
    SendDeferredEmails,
    FinalPositionRepair,
    TotalMerge,
}

impl MergeStep {
    /// Every step, in execution order. `TotalMerge` is always last.
    pub const ORDER: [MergeStep; 30] = [
        Self::RepairPositions,
        Self::MovePositions,
        Self::MoveOrganization,
        Self::MoveFriends,
        Self::MoveFollows,
        Self::MoveMembershipLinks,
        Self::MoveOrgTeam,
        Self::MoveFollowIssues,
        Self::MoveEmail,
        Self::MoveSms,
        Self::MoveFacebook,
        Self::MoveTwitter,
        Self::MoveApple,
        Self::MoveCandidateChangeLog,
        Self::MoveVoterChangeLog,
        Self::MoveVoterContacts,
        Self::MoveVoterPlans,
        Self::MoveDonations,
        Self::MoveVoterGuides,
        Self::MoveSharedItems,
        Self::MoveActivityNotices,
        Self::MoveActivityPosts,
        Self::MoveActivityComments,
        Self::MoveCampaignSupport,
        Self::MoveAnalytics,
        Self::MergeVoterRow,
        Self::MoveImages,
        Self::SendDeferredEmails,
        Self::FinalPositionRepair,
        Self::TotalMerge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepairPositions => "repair-positions",
            Self::MovePositions => "move-positions",
            Self::MoveOrganization => "move-organization",
            Self::MoveFriends => "move-friends",
            Self::MoveFollows => "move-follows",
            Self::MoveMembershipLinks => "move-membership-links",
            Self::MoveOrgTeam => "move-org-team",
            Self::MoveFollowIssues => "move-follow-issues",
            Self::MoveEmail => "move-email",
            Self::MoveSms => "move-sms",
            Self::MoveFacebook => "move-facebook",
            Self::MoveTwitter => "move-twitter",
            Self::MoveApple => "move-apple",
            Self::MoveCandidateChangeLog => "move-candidate-change-log",
            Self::MoveVoterChangeLog => "move-voter-change-log",
            Self::MoveVoterContacts => "move-voter-contacts",
            Self::MoveVoterPlans => "move-voter-plans",
            Self::MoveDonations => "move-donations",
            Self::MoveVoterGuides => "move-voter-guides",
            Self::MoveSharedItems => "move-shared-items",
            Self::MoveActivityNotices => "move-activity-notices",
            Self::MoveActivityPosts => "move-activity-posts",
            Self::MoveActivityComments => "move-activity-comments",
            Self::MoveCampaignSupport => "move-campaign-support",
            Self::MoveAnalytics => "move-analytics",
            Self::MergeVoterRow => "merge-voter-row",
            Self::MoveImages => "move-images",
            Self::SendDeferredEmails => "send-deferred-emails",
            Self::FinalPositionRepair => "final-position-repair",
            Self::TotalMerge => "total-merge",
        }
    }

    /// Column stem in the persisted ledger row, e.g. `move_donations`.
    pub fn column_stem(&self) -> String {
        self.as_str().replace('-', "_")
    }

    /// Upper-case token used in rendered status strings, e.g. `MOVE_DONATIONS`.
    pub fn status_token(&self) -> String {
        self.column_stem().to_uppercase()
    }

    /// Zero-based position in [`Self::ORDER`].
    pub fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|step| step == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// Steps that always write a merge-log row, even on success.
    pub fn logged_unconditionally(&self) -> bool {
        matches!(
            self,
            Self::MoveOrganization | Self::MergeVoterRow | Self::TotalMerge
        )
    }
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStep {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-").to_lowercase();
        Self::ORDER
            .iter()
            .copied()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| TypeError::UnknownStep(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_rejects_self_merge() {
        let a = VoterId::new("wv01voter1");
        assert!(MergePair::new(a.clone(), VoterId::new("WV01VOTER1")).is_err());
        let pair = MergePair::new(a, VoterId::new("wv01voter2")).unwrap();
        assert_eq!(pair.to_string(), "wv01voter1 -> wv01voter2");
    }

    #[test]
    fn order_is_complete_and_unique() {
        let mut names: Vec<_> = MergeStep::ORDER.iter().map(MergeStep::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MergeStep::ORDER.len());
        assert_eq!(MergeStep::ORDER.last(), Some(&MergeStep::TotalMerge));
    }

    #[test]
    fn ordering_constraints_hold() {
        assert!(MergeStep::RepairPositions.position() < MergeStep::MovePositions.position());
        for dependent in [
            MergeStep::MoveFriends,
            MergeStep::MoveFollows,
            MergeStep::MoveVoterGuides,
            MergeStep::MoveCampaignSupport,
            MergeStep::MoveImages,
        ] {
            assert!(MergeStep::MoveOrganization.position() < dependent.position());
        }
        assert!(MergeStep::MoveAnalytics.position() < MergeStep::MergeVoterRow.position());
        assert!(MergeStep::MergeVoterRow.position() < MergeStep::SendDeferredEmails.position());
        assert_eq!(
            MergeStep::FinalPositionRepair.position(),
            MergeStep::ORDER.len() - 2
        );
    }

    #[test]
    fn parse_accepts_both_spellings() {
        assert_eq!("move-donations".parse::<MergeStep>(), Ok(MergeStep::MoveDonations));
        assert_eq!("move_donations".parse::<MergeStep>(), Ok(MergeStep::MoveDonations));
        assert!("move-everything".parse::<MergeStep>().is_err());
    }

    #[test]
    fn column_and_status_names() {
        assert_eq!(MergeStep::MoveDonations.column_stem(), "move_donations");
        assert_eq!(MergeStep::MoveDonations.status_token(), "MOVE_DONATIONS");
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&MergeStep::MergeVoterRow).unwrap();
        assert_eq!(json, "\"merge-voter-row\"");
    }
}
