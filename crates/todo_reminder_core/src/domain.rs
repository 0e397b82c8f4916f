//! crates/todo_reminder_core/src/domain.rs
//!
//! Defines the pure, core data structures for the bot.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Domain Errors
//=========================================================================================

/// Errors raised by the pure domain logic. Both are reported back to the chat user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid time format: '{0}'")]
    InvalidFormat(String),
    #[error("Index {index} is out of range for a list of {len} items")]
    IndexOutOfRange { index: i64, len: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;

//=========================================================================================
// Identities
//=========================================================================================

/// Opaque identity of a conversation. Stable for the lifetime of the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//=========================================================================================
// Reminders and Per-Chat State
//=========================================================================================

/// A one-shot text reminder owned by a single chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: Uuid,
    pub content: String,
    pub fire_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(content: impl Into<String>, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            fire_at,
        }
    }

    /// True once the reminder's time has been reached.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

/// Everything the bot remembers about one chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub todos: Vec<String>,
    pub reminders: Vec<Reminder>,
}

impl UserState {
    pub fn add_todo(&mut self, text: impl Into<String>) {
        self.todos.push(text.into());
    }

    /// Removes the todo at the 1-based `index`, shifting later items down.
    pub fn complete_todo(&mut self, index: i64) -> CoreResult<String> {
        let len = self.todos.len();
        if index < 1 || index as u64 > len as u64 {
            return Err(CoreError::IndexOutOfRange { index, len });
        }
        Ok(self.todos.remove((index - 1) as usize))
    }

    pub fn add_reminder(&mut self, reminder: Reminder) {
        self.reminders.push(reminder);
    }

    /// Drops every reminder that is due at `now`. Returns how many were removed.
    pub fn prune_reminders_before(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.reminders.len();
        self.reminders.retain(|r| !r.is_due(now));
        before - self.reminders.len()
    }
}

/// The whole bot state, keyed by chat. Ordered so snapshots are stable.
pub type GlobalStore = BTreeMap<ChatId, UserState>;
