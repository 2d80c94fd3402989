use std::sync::Arc;

use tracing::{info, warn};
use unify_store::{RecordStore, StoreResult};
use unify_types::{DeferredMessage, MergeStep, Voter};

use crate::config::MergeConfig;
use crate::mover::{guarded, require_voter, MoveContext, MoveOutcome, MovePattern, Mover};
use crate::notify::{Notification, Notifier};

/// Reassigns held outbound messages to "to" and releases them once the
/// merged account can be named.
pub struct DeferredMessageMover {
    notifier: Arc<dyn Notifier>,
    release: bool,
    require_display_name: bool,
}

impl DeferredMessageMover {
    pub fn new(notifier: Arc<dyn Notifier>, config: &MergeConfig) -> Self {
        Self {
            notifier,
            release: config.release_deferred_messages,
            require_display_name: config.require_display_name_for_release,
        }
    }

    fn release_pending(
        &self,
        sender: &Voter,
        store: &dyn RecordStore,
        outcome: &mut MoveOutcome,
    ) -> StoreResult<()> {
        let sender_name = sender.display_name();
        if self.require_display_name && sender_name.is_none() {
            let pending = store.pending_messages_from(&sender.we_vote_id)?;
            if !pending.is_empty() {
                outcome.note(format!(
                    "held {} message(s): sender has no display name",
                    pending.len()
                ));
            }
            return Ok(());
        }

        for message in store.pending_messages_from(&sender.we_vote_id)? {
            let notification = Notification::DeferredMessage {
                message_id: message.id,
                sender_voter_id: sender.we_vote_id.clone(),
                sender_name: sender_name.clone(),
                recipient_address: message.recipient_address.clone(),
                template: message.template.clone(),
            };
            if let Err(err) = self.notifier.dispatch(notification) {
                warn!(message = %message.id, error = %err, "deferred message dispatch failed");
                outcome.not_moved += 1;
                outcome.errors.push(format!("message {}: {err}", message.id));
                continue;
            }
            let released = DeferredMessage {
                released: true,
                ..message
            };
            match store.save_message(&released) {
                Ok(()) => outcome.moved += 1,
                Err(err) => outcome.row_failed(format!("message {}", released.id), &err),
            }
        }
        Ok(())
    }
}

impl Mover for DeferredMessageMover {
    fn step(&self) -> MergeStep {
        MergeStep::SendDeferredEmails
    }

    fn pattern(&self) -> MovePattern {
        MovePattern::Reassign
    }

    fn run(&self, context: &MoveContext, store: &dyn RecordStore) -> MoveOutcome {
        guarded(|outcome| {
            for mut message in store.pending_messages_from(&context.pair.from)? {
                message.sender_voter_id = context.pair.to.clone();
                match store.save_message(&message) {
                    Ok(()) => outcome.moved += 1,
                    Err(err) => outcome.row_failed(format!("message {}", message.id), &err),
                }
            }

            if !self.release {
                return Ok(());
            }
            let to = require_voter(store, &context.pair.to)?;
            let before = outcome.moved;
            self.release_pending(&to, store, outcome)?;
            if outcome.moved > before {
                info!(voter = %to.we_vote_id, released = outcome.moved - before, "deferred messages released");
            }
            Ok(())
        })
    }
}
