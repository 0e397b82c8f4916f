//! crates/todo_reminder_core/src/ports.rs
//!
//! Defines the service contracts (traits) the bot core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the chat platform and of the storage format.

use crate::domain::{ChatId, GlobalStore};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Could not parse stored data: {0}")]
    Parse(String),
    #[error("I/O failure: {0}")]
    Io(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Transport Types
//=========================================================================================

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub text: String,
}

/// A live, effectively infinite feed of inbound messages.
pub type InboundStream = Pin<Box<dyn Stream<Item = PortResult<InboundMessage>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Delivers `text` to the chat. Must be safe to call from many tasks at once.
    async fn send(&self, chat_id: ChatId, text: &str) -> PortResult<()>;

    /// Opens the inbound feed. Called once per process.
    async fn receive(&self) -> PortResult<InboundStream>;
}

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Reads the last snapshot. Fails with `NotFound` when none exists yet.
    async fn load(&self) -> PortResult<GlobalStore>;

    /// Overwrites the snapshot with the full store.
    async fn save(&self, store: &GlobalStore) -> PortResult<()>;
}
