pub mod dispatcher;
pub mod protocol;
pub mod reminder_task;
pub mod state;
pub mod store;

// Re-export the pieces the binary needs to wire up the bot.
pub use dispatcher::{handle_message, run_dispatcher};
pub use reminder_task::{restore_reminders, ReminderHandle, ReminderScheduler};
pub use state::AppState;
pub use store::UserStore;
