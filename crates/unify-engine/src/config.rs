use serde::{Deserialize, Serialize};

/// Configuration for the merge orchestrator and its movers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Also write merge-log rows for granular steps that succeed.
    /// Failures and the first-class steps are always logged.
    pub log_successful_steps: bool,
    /// Stop the sweep at the first failing step instead of continuing.
    pub stop_on_first_failure: bool,
    /// Whether `send-deferred-emails` dispatches anything at all.
    pub release_deferred_messages: bool,
    /// Hold deferred messages while the sending voter has no display name.
    pub require_display_name_for_release: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            log_successful_steps: false,
            stop_on_first_failure: false,
            release_deferred_messages: true,
            require_display_name_for_release: true,
        }
    }
}

impl MergeConfig {
    /// Log every step, stop at the first failure. Useful when debugging a
    /// single stuck pair.
    pub fn verbose() -> Self {
        Self {
            log_successful_steps: true,
            stop_on_first_failure: true,
            ..Default::default()
        }
    }
}
