//! services/bot/src/bin/bot.rs

use bot_lib::{
    adapters::{JsonFileAdapter, TelegramAdapter},
    chat::{restore_reminders, run_dispatcher, AppState, ReminderScheduler, UserStore},
    config::Config,
    error::BotError,
};
use std::sync::Arc;
use todo_reminder_core::ports::ChatTransport;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting bot...");

    // --- 2. Connect to the Chat Platform ---
    let transport = Arc::new(TelegramAdapter::new(&config)?);
    let username = transport.get_me().await?;
    info!("Authorized on account {}", username);

    // --- 3. Load Stored State ---
    info!("Loading user data from {}", config.data_path.display());
    let persistence = Arc::new(JsonFileAdapter::new(config.data_path.clone()));
    let store = Arc::new(UserStore::load(persistence).await);

    // --- 4. Re-arm Reminders Before Accepting Messages ---
    let scheduler = ReminderScheduler::new(transport.clone(), config.past_due_policy);
    // Handles are dropped; the timers keep running.
    restore_reminders(&store, &scheduler, config.prune_past_reminders).await;

    let app_state = Arc::new(AppState {
        store,
        scheduler,
        transport: transport.clone(),
    });

    // --- 5. Receive Messages Until Shutdown ---
    let inbound = transport.receive().await?;
    tokio::select! {
        _ = run_dispatcher(app_state, inbound) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received."),
    }

    info!("Bot stopped.");
    Ok(())
}
