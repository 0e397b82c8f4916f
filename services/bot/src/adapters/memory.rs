//! services/bot/src/adapters/memory.rs
//!
//! In-memory implementations of the transport and persistence ports, used for
//! local development and by the test suites.

use async_trait::async_trait;
use futures::channel::mpsc as stream_mpsc;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use todo_reminder_core::domain::{ChatId, GlobalStore};
use todo_reminder_core::ports::{
    ChatTransport, InboundMessage, InboundStream, PersistenceService, PortError, PortResult,
};
use tokio::sync::{mpsc, Mutex};

//=========================================================================================
// Persistence
//=========================================================================================

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct InMemoryPersistence {
    snapshot: StdMutex<Option<GlobalStore>>,
    save_count: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(store: GlobalStore) -> Self {
        let persistence = Self::default();
        *persistence.lock_snapshot() = Some(store);
        persistence
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, Option<GlobalStore>> {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The last successfully saved snapshot.
    pub fn saved(&self) -> Option<GlobalStore> {
        self.lock_snapshot().clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn load(&self) -> PortResult<GlobalStore> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PortError::Io("simulated load failure".to_string()));
        }
        self.lock_snapshot()
            .clone()
            .ok_or_else(|| PortError::NotFound("in-memory snapshot".to_string()))
    }

    async fn save(&self, store: &GlobalStore) -> PortResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PortError::Io("simulated save failure".to_string()));
        }
        *self.lock_snapshot() = Some(store.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//=========================================================================================
// Transport
//=========================================================================================

/// A chat transport whose inbound feed is driven by `push_inbound` and whose
/// outbound messages are captured for inspection.
pub struct MemoryTransport {
    outbox_tx: mpsc::UnboundedSender<(ChatId, String)>,
    outbox_rx: Mutex<mpsc::UnboundedReceiver<(ChatId, String)>>,
    inbox_tx: stream_mpsc::UnboundedSender<InboundMessage>,
    inbox_rx: StdMutex<Option<stream_mpsc::UnboundedReceiver<InboundMessage>>>,
    fail_sends: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = stream_mpsc::unbounded();
        Self {
            outbox_tx,
            outbox_rx: Mutex::new(outbox_rx),
            inbox_tx,
            inbox_rx: StdMutex::new(Some(inbox_rx)),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queues an inbound message on the feed returned by `receive`.
    pub fn push_inbound(&self, chat_id: ChatId, text: &str) {
        let message = InboundMessage {
            chat_id,
            text: text.to_string(),
        };
        // The receiver only goes away once the feed is dropped; nothing to deliver to then.
        let _ = self.inbox_tx.unbounded_send(message);
    }

    /// Ends the inbound feed.
    pub fn close_inbound(&self) {
        self.inbox_tx.close_channel();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Waits up to `wait` for the next outbound message.
    pub async fn next_sent(&self, wait: Duration) -> Option<(ChatId, String)> {
        let mut outbox = self.outbox_rx.lock().await;
        tokio::time::timeout(wait, outbox.recv()).await.ok().flatten()
    }

    /// Every outbound message not yet consumed, in send order.
    pub async fn drain_sent(&self) -> Vec<(ChatId, String)> {
        let mut outbox = self.outbox_rx.lock().await;
        let mut sent = Vec::new();
        while let Ok(message) = outbox.try_recv() {
            sent.push(message);
        }
        sent
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn send(&self, chat_id: ChatId, text: &str) -> PortResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("simulated send failure".to_string()));
        }
        self.outbox_tx
            .send((chat_id, text.to_string()))
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn receive(&self) -> PortResult<InboundStream> {
        let inbox = self
            .inbox_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| PortError::Unexpected("inbound feed already taken".to_string()))?;
        Ok(Box::pin(inbox.map(Ok::<_, PortError>)))
    }
}
