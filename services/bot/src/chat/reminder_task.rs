//! services/bot/src/chat/reminder_task.rs
//!
//! Arms one independent timer task per reminder and delivers the reminder
//! text through the chat transport once the timer elapses.

use crate::chat::protocol::reminder_text;
use crate::chat::store::UserStore;
use crate::config::PastDuePolicy;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use todo_reminder_core::{ChatId, ChatTransport, Reminder};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A handle to one armed reminder.
///
/// Dropping the handle leaves the timer running; only `cancel` stops it.
#[derive(Debug)]
pub struct ReminderHandle {
    reminder_id: Uuid,
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReminderHandle {
    pub fn reminder_id(&self) -> Uuid {
        self.reminder_id
    }

    /// Stops a pending delivery. Has no effect once the reminder has fired.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the timer task to complete, either by firing or by being cancelled.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Reminder task {} ended abnormally: {}", self.reminder_id, e);
        }
    }
}

#[derive(Clone)]
pub struct ReminderScheduler {
    transport: Arc<dyn ChatTransport>,
    past_due_policy: PastDuePolicy,
}

impl ReminderScheduler {
    pub fn new(transport: Arc<dyn ChatTransport>, past_due_policy: PastDuePolicy) -> Self {
        Self {
            transport,
            past_due_policy,
        }
    }

    /// Schedules delivery of `reminder` to `chat_id` at its `fire_at` time.
    ///
    /// Returns `None` when the reminder is already due and the policy drops it.
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, chat_id: ChatId, reminder: &Reminder) -> Option<ReminderHandle> {
        let delay = reminder.fire_at - Utc::now();
        let sleep_for = if delay > TimeDelta::zero() {
            delay.to_std().ok()?
        } else {
            match self.past_due_policy {
                PastDuePolicy::Drop => {
                    debug!(
                        "Reminder {} for chat {} is past due by {}s; not arming.",
                        reminder.id,
                        chat_id,
                        -delay.num_seconds()
                    );
                    return None;
                }
                PastDuePolicy::FireImmediately => std::time::Duration::ZERO,
            }
        };

        let cancellation_token = CancellationToken::new();
        let task = {
            let transport = self.transport.clone();
            let token = cancellation_token.clone();
            let reminder_id = reminder.id;
            let text = reminder_text(&reminder.content);
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Reminder {} for chat {} was cancelled.", reminder_id, chat_id);
                    }
                    _ = tokio::time::sleep(sleep_for) => {
                        deliver(transport.as_ref(), chat_id, reminder_id, &text).await;
                    }
                }
            })
        };

        debug!(
            "Armed reminder {} for chat {} in {:?}.",
            reminder.id, chat_id, sleep_for
        );
        Some(ReminderHandle {
            reminder_id: reminder.id,
            cancellation_token,
            task,
        })
    }

    /// Arms every given reminder once. Returns the handles of the timers created.
    pub fn rearm_all<I>(&self, reminders: I) -> Vec<ReminderHandle>
    where
        I: IntoIterator<Item = (ChatId, Reminder)>,
    {
        reminders
            .into_iter()
            .filter_map(|(chat_id, reminder)| self.arm(chat_id, &reminder))
            .collect()
    }
}

/// Sends the reminder once. A transport failure is logged and not retried.
async fn deliver(transport: &dyn ChatTransport, chat_id: ChatId, reminder_id: Uuid, text: &str) {
    match transport.send(chat_id, text).await {
        Ok(()) => info!("Delivered reminder {} to chat {}.", reminder_id, chat_id),
        Err(e) => warn!(
            "Failed to deliver reminder {} to chat {}: {}",
            reminder_id, chat_id, e
        ),
    }
}

/// Re-arms every persisted reminder at startup, then optionally prunes the
/// ones that had already matured.
pub async fn restore_reminders(
    store: &UserStore,
    scheduler: &ReminderScheduler,
    prune_past: bool,
) -> Vec<ReminderHandle> {
    let started_at = Utc::now();
    let reminders = store.reminders().await;
    let total = reminders.len();
    let handles = scheduler.rearm_all(reminders);
    info!(
        "Re-armed {} of {} stored reminders.",
        handles.len(),
        total
    );

    if prune_past {
        let pruned = store.prune_reminders_before(started_at).await;
        if pruned > 0 {
            info!("Pruned {} reminders that had already matured.", pruned);
        }
    }
    handles
}
