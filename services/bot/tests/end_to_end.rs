//! End-to-end flows: inbound chat text through the dispatcher, store and
//! scheduler, with replies and reminders observed on an in-memory transport.

use bot_lib::adapters::{InMemoryPersistence, JsonFileAdapter, MemoryTransport};
use bot_lib::chat::{restore_reminders, run_dispatcher, AppState, ReminderScheduler, UserStore};
use bot_lib::config::PastDuePolicy;
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use todo_reminder_core::{ChatId, ChatTransport, PersistenceService};
use tokio::task::JoinHandle;

const CHAT: ChatId = ChatId(4242);
const WAIT: Duration = Duration::from_secs(3);

struct Harness {
    transport: Arc<MemoryTransport>,
    store: Arc<UserStore>,
    dispatcher: JoinHandle<()>,
}

impl Harness {
    async fn start(persistence: Arc<dyn PersistenceService>, policy: PastDuePolicy) -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let store = Arc::new(UserStore::load(persistence).await);
        let scheduler = ReminderScheduler::new(transport.clone(), policy);
        restore_reminders(&store, &scheduler, false).await;

        let app_state = Arc::new(AppState {
            store: store.clone(),
            scheduler,
            transport: transport.clone(),
        });
        let inbound = transport.receive().await.unwrap();
        let dispatcher = tokio::spawn(run_dispatcher(app_state, inbound));
        Self {
            transport,
            store,
            dispatcher,
        }
    }

    /// Sends `text` from `CHAT` and returns the reply.
    async fn say(&self, text: &str) -> String {
        self.transport.push_inbound(CHAT, text);
        let (chat_id, reply) = self
            .transport
            .next_sent(WAIT)
            .await
            .unwrap_or_else(|| panic!("no reply to {text:?}"));
        assert_eq!(chat_id, CHAT);
        reply
    }

    async fn stop(self) {
        self.transport.close_inbound();
        self.dispatcher.await.unwrap();
    }
}

#[tokio::test]
async fn todo_list_lifecycle() {
    let harness = Harness::start(Arc::new(InMemoryPersistence::new()), PastDuePolicy::Drop).await;

    assert_eq!(harness.say("/set buy milk").await, "Task 'buy milk' added!");
    assert_eq!(harness.store.todos(CHAT).await, vec!["buy milk"]);

    assert_eq!(harness.say("/todo").await, "To-do list:\n1. buy milk");

    assert_eq!(harness.say("/done 1").await, "Done: buy milk");
    assert!(harness.store.todos(CHAT).await.is_empty());

    assert_eq!(harness.say("/done 1").await, "Invalid index.");
    assert_eq!(harness.say("/todo").await, "Your to-do list is empty.");
    assert_eq!(harness.say("what?").await, "Unknown command!");

    harness.stop().await;
}

#[tokio::test]
async fn reminder_is_delivered_after_confirmation() {
    let harness = Harness::start(Arc::new(InMemoryPersistence::new()), PastDuePolicy::Drop).await;

    let started = tokio::time::Instant::now();
    assert_eq!(
        harness.say("/remind 1s ping").await,
        "You set a reminder for 1s from now!"
    );

    let delivered = harness.transport.next_sent(WAIT).await;
    assert_eq!(delivered, Some((CHAT, "Reminder: ping".to_string())));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "fired too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "fired too late: {elapsed:?}");

    assert!(harness
        .transport
        .next_sent(Duration::from_millis(300))
        .await
        .is_none());
    harness.stop().await;
}

#[tokio::test]
async fn invalid_reminders_get_error_replies() {
    let harness = Harness::start(Arc::new(InMemoryPersistence::new()), PastDuePolicy::Drop).await;

    assert_eq!(harness.say("/remind 10x ping").await, "Invalid time format!");
    assert_eq!(harness.say("/remind 5m").await, "Usage: /remind <time> <message>");
    assert!(harness.store.reminders().await.is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn state_and_reminders_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("userdata.json");

    let first = Harness::start(Arc::new(JsonFileAdapter::new(&path)), PastDuePolicy::Drop).await;
    first.say("/set write report").await;
    first.say("/remind 1s after restart").await;
    first.say("/remind 1y much later").await;
    let before_restart = first.store.snapshot().await;
    first.stop().await;

    // The first run's timer is still pending; only the restarted bot's transport is observed.
    let second = Harness::start(Arc::new(JsonFileAdapter::new(&path)), PastDuePolicy::Drop).await;
    assert_eq!(second.store.snapshot().await, before_restart);
    assert_eq!(second.say("/todo").await, "To-do list:\n1. write report");

    let delivered = second.transport.next_sent(WAIT).await;
    assert_eq!(delivered, Some((CHAT, "Reminder: after restart".to_string())));
    second.stop().await;
}

#[tokio::test]
async fn matured_reminders_are_dropped_on_restart_by_default() {
    let mut seeded = todo_reminder_core::GlobalStore::new();
    seeded
        .entry(CHAT)
        .or_default()
        .add_reminder(todo_reminder_core::Reminder::new(
            "missed while down",
            Utc::now() - TimeDelta::minutes(5),
        ));

    let dropped = Harness::start(
        Arc::new(InMemoryPersistence::with_snapshot(seeded.clone())),
        PastDuePolicy::Drop,
    )
    .await;
    assert!(dropped
        .transport
        .next_sent(Duration::from_millis(300))
        .await
        .is_none());
    dropped.stop().await;

    let fired = Harness::start(
        Arc::new(InMemoryPersistence::with_snapshot(seeded)),
        PastDuePolicy::FireImmediately,
    )
    .await;
    assert_eq!(
        fired.transport.next_sent(WAIT).await,
        Some((CHAT, "Reminder: missed while down".to_string()))
    );
    assert!(fired
        .transport
        .next_sent(Duration::from_millis(300))
        .await
        .is_none());
    fired.stop().await;
}
