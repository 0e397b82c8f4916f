//! services/bot/src/chat/state.rs
//!
//! Defines the shared application state handed to the dispatcher.

use crate::chat::{reminder_task::ReminderScheduler, store::UserStore};
use std::sync::Arc;
use todo_reminder_core::ports::ChatTransport;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub scheduler: ReminderScheduler,
    pub transport: Arc<dyn ChatTransport>,
}
