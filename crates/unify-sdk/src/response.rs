use serde::{Deserialize, Serialize};
use unify_engine::{MergeReport, RebindOutcome, Resolution};
use unify_types::VoterId;

/// What a sign-in or merge call hands back to the calling flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub success: bool,
    pub status: String,
    pub merge_from_voter_we_vote_id: Option<VoterId>,
    pub merge_to_voter_we_vote_id: Option<VoterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<MergeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebind: Option<RebindOutcome>,
}

impl MergeResponse {
    /// A call that stopped before any merge was attempted.
    pub fn failed(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            merge_from_voter_we_vote_id: None,
            merge_to_voter_we_vote_id: None,
            resolution: None,
            report: None,
            rebind: None,
        }
    }

    /// A resolution that needs no merge (same account, skipped, link repaired).
    pub fn resolved(resolution: Resolution, from: VoterId) -> Self {
        Self {
            success: true,
            status: resolution.status_code().to_string(),
            merge_from_voter_we_vote_id: Some(from),
            merge_to_voter_we_vote_id: Some(resolution.surviving_voter().clone()),
            resolution: Some(resolution),
            report: None,
            rebind: None,
        }
    }

    /// The result of running the orchestrator.
    pub fn merged(report: MergeReport) -> Self {
        Self {
            success: report.success,
            status: report.status_string(),
            merge_from_voter_we_vote_id: Some(report.pair.from.clone()),
            merge_to_voter_we_vote_id: Some(report.pair.to.clone()),
            resolution: None,
            report: Some(report),
            rebind: None,
        }
    }
}
