use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unify_types::{ItemId, VoterId};

use crate::error::{EngineError, EngineResult};

/// Something the engine asks the outside world to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A held outbound message whose sender can now be named.
    DeferredMessage {
        message_id: ItemId,
        sender_voter_id: VoterId,
        sender_name: Option<String>,
        recipient_address: String,
        template: String,
    },
    /// A friend invitation was used to sign its recipient in.
    InvitationAccepted {
        inviter_voter_id: VoterId,
        accepted_by_voter_id: VoterId,
    },
}

/// Outbound dispatch boundary (email, SMS, push).
///
/// Implementations are expected to enqueue and return quickly.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: Notification) -> EngineResult<()>;
}

/// Notifier that records everything it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every dispatch fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, notification: Notification) -> EngineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::Notify("dispatch disabled".into()));
        }
        debug!(?notification, "notification recorded");
        self.sent
            .lock()
            .map_err(|_| EngineError::Notify("notifier lock poisoned".into()))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_until_failing() {
        let notifier = RecordingNotifier::new();
        let accepted = Notification::InvitationAccepted {
            inviter_voter_id: VoterId::new("a"),
            accepted_by_voter_id: VoterId::new("b"),
        };
        notifier.dispatch(accepted.clone()).unwrap();
        notifier.set_failing(true);
        assert!(notifier.dispatch(accepted.clone()).is_err());
        assert_eq!(notifier.sent(), vec![accepted]);
    }

    #[test]
    fn notification_json_is_tagged() {
        let json = serde_json::to_value(Notification::InvitationAccepted {
            inviter_voter_id: VoterId::new("a"),
            accepted_by_voter_id: VoterId::new("b"),
        })
        .unwrap();
        assert_eq!(json["kind"], "invitation_accepted");
    }
}
