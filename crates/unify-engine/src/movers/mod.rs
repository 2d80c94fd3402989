//! The concrete movers, one per ledger step.

mod channel;
mod deferred;
mod friends;
mod identity;
mod images;
mod items;
mod organization;
mod positions;
mod voter_row;

use std::sync::Arc;

use unify_types::{ItemDomain, MergeStep, SocialNetwork};

pub use channel::ChannelMover;
pub use deferred::DeferredMessageMover;
pub use friends::FriendsMover;
pub use identity::IdentityLinkMover;
pub use images::ImageMover;
pub use items::ItemMover;
pub use organization::OrganizationMover;
pub use positions::PositionRepairMover;
pub use voter_row::VoterRowMover;

pub(crate) use channel::heal_primary;
pub(crate) use organization::reconcile_identity_organization;

use crate::config::MergeConfig;
use crate::mover::Mover;
use crate::notify::Notifier;

/// The full mover sequence in ledger order, `total-merge` excluded.
pub fn default_movers(config: &MergeConfig, notifier: Arc<dyn Notifier>) -> Vec<Box<dyn Mover>> {
    vec![
        Box::new(PositionRepairMover::initial()),
        Box::new(ItemMover::new(MergeStep::MovePositions, ItemDomain::Position)),
        Box::new(OrganizationMover),
        Box::new(FriendsMover),
        Box::new(ItemMover::new(MergeStep::MoveFollows, ItemDomain::FollowOrganization)),
        Box::new(ItemMover::new(MergeStep::MoveMembershipLinks, ItemDomain::MembershipLink)),
        Box::new(ItemMover::new(MergeStep::MoveOrgTeam, ItemDomain::OrganizationTeamMember)),
        Box::new(ItemMover::new(MergeStep::MoveFollowIssues, ItemDomain::FollowIssue)),
        Box::new(ChannelMover::email()),
        Box::new(ChannelMover::sms()),
        Box::new(IdentityLinkMover::new(SocialNetwork::Facebook)),
        Box::new(IdentityLinkMover::new(SocialNetwork::Twitter)),
        Box::new(IdentityLinkMover::new(SocialNetwork::Apple)),
        Box::new(ItemMover::new(MergeStep::MoveCandidateChangeLog, ItemDomain::CandidateChangeLog)),
        Box::new(ItemMover::new(MergeStep::MoveVoterChangeLog, ItemDomain::VoterChangeLog)),
        Box::new(ItemMover::new(MergeStep::MoveVoterContacts, ItemDomain::VoterContactEmail)),
        Box::new(ItemMover::new(MergeStep::MoveVoterPlans, ItemDomain::VoterPlan)),
        Box::new(ItemMover::new(MergeStep::MoveDonations, ItemDomain::Donation)),
        Box::new(ItemMover::new(MergeStep::MoveVoterGuides, ItemDomain::VoterGuide)),
        Box::new(ItemMover::new(MergeStep::MoveSharedItems, ItemDomain::SharedItem)),
        Box::new(ItemMover::new(MergeStep::MoveActivityNotices, ItemDomain::ActivityNotice)),
        Box::new(ItemMover::new(MergeStep::MoveActivityPosts, ItemDomain::ActivityPost)),
        Box::new(ItemMover::new(MergeStep::MoveActivityComments, ItemDomain::ActivityComment)),
        Box::new(ItemMover::new(MergeStep::MoveCampaignSupport, ItemDomain::CampaignSupport)),
        Box::new(ItemMover::new(MergeStep::MoveAnalytics, ItemDomain::AnalyticsEvent)),
        Box::new(VoterRowMover),
        Box::new(ImageMover),
        Box::new(DeferredMessageMover::new(notifier, config)),
        Box::new(PositionRepairMover::final_sweep()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    #[test]
    fn default_movers_follow_ledger_order() {
        let movers = default_movers(&MergeConfig::default(), Arc::new(RecordingNotifier::new()));
        let steps: Vec<MergeStep> = movers.iter().map(|m| m.step()).collect();
        let expected: Vec<MergeStep> = MergeStep::ORDER
            .iter()
            .copied()
            .filter(|s| *s != MergeStep::TotalMerge)
            .collect();
        assert_eq!(steps, expected);
    }

    #[test]
    fn only_the_organization_step_deletes_its_source() {
        let movers = default_movers(&MergeConfig::default(), Arc::new(RecordingNotifier::new()));
        let folding: Vec<MergeStep> = movers
            .iter()
            .filter(|m| m.pattern() == crate::mover::MovePattern::MergeThenDeleteSource)
            .map(|m| m.step())
            .collect();
        assert_eq!(folding, vec![MergeStep::MoveOrganization]);
    }
}
