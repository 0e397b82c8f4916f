//! services/bot/src/chat/dispatcher.rs
//!
//! The main receive loop. Each inbound message is parsed, executed against the
//! store and scheduler, and answered with a single reply.

use crate::chat::{
    protocol::{self, Command},
    state::AppState,
};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use todo_reminder_core::{parse_duration, ChatId, InboundMessage, InboundStream};
use tracing::{debug, error, info, warn};

/// Consumes the inbound feed one message at a time until it ends.
pub async fn run_dispatcher(app_state: Arc<AppState>, mut inbound: InboundStream) {
    info!("Dispatcher started.");
    while let Some(next) = inbound.next().await {
        match next {
            Ok(message) => handle_message(&app_state, &message).await,
            Err(e) => error!("Failed to receive message: {}", e),
        }
    }
    info!("Inbound feed closed. Dispatcher stopped.");
}

/// Executes one inbound message and sends the reply back to its chat.
pub async fn handle_message(app_state: &AppState, message: &InboundMessage) {
    let command = Command::parse(&message.text);
    debug!("Chat {} sent {:?}", message.chat_id, command);

    let reply = execute_command(app_state, message.chat_id, command).await;
    if let Err(e) = app_state.transport.send(message.chat_id, &reply).await {
        warn!("Failed to send reply to chat {}: {}", message.chat_id, e);
    }
}

/// Runs `command` for `chat_id` and returns the reply text.
pub async fn execute_command(app_state: &AppState, chat_id: ChatId, command: Command) -> String {
    match command {
        Command::Remind { time, content } => {
            let delay = match parse_duration(&time) {
                Ok(delay) => delay,
                Err(e) => {
                    debug!("Rejected reminder from chat {}: {}", chat_id, e);
                    return protocol::INVALID_TIME.to_string();
                }
            };
            let Some(fire_at) = Utc::now().checked_add_signed(delay) else {
                return protocol::INVALID_TIME.to_string();
            };

            let reminder = app_state.store.add_reminder(chat_id, &content, fire_at).await;
            // The handle is not kept: armed reminders are never cancelled from chat.
            let _ = app_state.scheduler.arm(chat_id, &reminder);
            info!("Chat {} set reminder {} for {}.", chat_id, reminder.id, fire_at);
            protocol::reminder_set(&time)
        }
        Command::ListTodos => protocol::todo_list(&app_state.store.todos(chat_id).await),
        Command::AddTodo { task } => {
            app_state.store.add_todo(chat_id, &task).await;
            protocol::todo_added(&task)
        }
        Command::CompleteTodo { index } => {
            let Ok(index) = index.trim().parse::<i64>() else {
                return protocol::INVALID_INDEX.to_string();
            };
            match app_state.store.complete_todo(chat_id, index).await {
                Ok(task) => protocol::todo_done(&task),
                Err(e) => {
                    debug!("Chat {}: {}", chat_id, e);
                    protocol::INVALID_INDEX.to_string()
                }
            }
        }
        Command::Help => protocol::HELP.to_string(),
        Command::Usage(usage) => usage.to_string(),
        Command::Unknown => protocol::UNKNOWN_COMMAND.to_string(),
    }
}
