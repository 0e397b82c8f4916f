//! services/bot/src/chat/store.rs
//!
//! The in-memory store of every chat's todos and reminders. It owns the only
//! authoritative copy of the state and writes a full snapshot through the
//! persistence port after each mutation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use todo_reminder_core::{
    ChatId, CoreError, CoreResult, GlobalStore, PersistenceService, PortError, Reminder,
    UserState,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct UserStore {
    state: Mutex<GlobalStore>,
    persistence: Arc<dyn PersistenceService>,
}

impl UserStore {
    /// Creates an empty store backed by `persistence`.
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self::with_state(persistence, GlobalStore::new())
    }

    fn with_state(persistence: Arc<dyn PersistenceService>, state: GlobalStore) -> Self {
        Self {
            state: Mutex::new(state),
            persistence,
        }
    }

    /// Populates the store from the last snapshot.
    ///
    /// A failed load is logged and the store starts empty.
    pub async fn load(persistence: Arc<dyn PersistenceService>) -> Self {
        match persistence.load().await {
            Ok(state) => {
                info!("Loaded stored data for {} chats.", state.len());
                Self::with_state(persistence, state)
            }
            Err(PortError::NotFound(what)) => {
                info!("No stored data found ({}). Starting with an empty store.", what);
                Self::new(persistence)
            }
            Err(e) => {
                warn!("Failed to load user data: {}. Starting with an empty store.", e);
                Self::new(persistence)
            }
        }
    }

    /// Writes the full snapshot. Failures are logged and otherwise ignored.
    async fn persist(&self, state: &GlobalStore) {
        if let Err(e) = self.persistence.save(state).await {
            error!("Failed to save user data: {}", e);
        }
    }

    pub async fn get_or_create(&self, chat_id: ChatId) -> UserState {
        let mut state = self.state.lock().await;
        if let Some(user) = state.get(&chat_id) {
            return user.clone();
        }
        debug!("Creating state for chat {}", chat_id);
        state.insert(chat_id, UserState::default());
        self.persist(&state).await;
        UserState::default()
    }

    pub async fn add_todo(&self, chat_id: ChatId, text: &str) {
        let mut state = self.state.lock().await;
        state.entry(chat_id).or_default().add_todo(text);
        self.persist(&state).await;
    }

    /// Removes the todo at the 1-based `index` and returns its text.
    pub async fn complete_todo(&self, chat_id: ChatId, index: i64) -> CoreResult<String> {
        let mut state = self.state.lock().await;
        let done = match state.get_mut(&chat_id) {
            Some(user) => user.complete_todo(index)?,
            None => return Err(CoreError::IndexOutOfRange { index, len: 0 }),
        };
        self.persist(&state).await;
        Ok(done)
    }

    pub async fn add_reminder(
        &self,
        chat_id: ChatId,
        content: &str,
        fire_at: DateTime<Utc>,
    ) -> Reminder {
        let reminder = Reminder::new(content, fire_at);
        let mut state = self.state.lock().await;
        state.entry(chat_id).or_default().add_reminder(reminder.clone());
        self.persist(&state).await;
        reminder
    }

    /// The chat's todos in order. Does not create state for unknown chats.
    pub async fn todos(&self, chat_id: ChatId) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .get(&chat_id)
            .map(|user| user.todos.clone())
            .unwrap_or_default()
    }

    /// Every stored reminder, paired with the chat that owns it.
    pub async fn reminders(&self) -> Vec<(ChatId, Reminder)> {
        let state = self.state.lock().await;
        state
            .iter()
            .flat_map(|(chat_id, user)| user.reminders.iter().map(|r| (*chat_id, r.clone())))
            .collect()
    }

    /// Drops reminders that are due at `now` from every chat.
    pub async fn prune_reminders_before(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().await;
        let removed: usize = state
            .values_mut()
            .map(|user| user.prune_reminders_before(now))
            .sum();
        if removed > 0 {
            self.persist(&state).await;
        }
        removed
    }

    pub async fn snapshot(&self) -> GlobalStore {
        self.state.lock().await.clone()
    }
}
