//! services/bot/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API. It implements the
//! `ChatTransport` port from the `core` crate using `sendMessage` for outbound
//! text and `getUpdates` long polling for the inbound feed.

use crate::config::Config;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use todo_reminder_core::domain::ChatId;
use todo_reminder_core::ports::{
    ChatTransport, InboundMessage, InboundStream, PortError, PortResult,
};
use tracing::{debug, warn};

/// How long to wait before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ChatTransport` port using the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramAdapter {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramAdapter {
    /// Creates a new `TelegramAdapter`.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        // The HTTP timeout must outlast a long poll.
        let client = reqwest::Client::builder()
            .timeout(config.poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.telegram_api_url, config.bot_token),
            poll_timeout: config.poll_timeout,
        })
    }

    /// Validates the token by asking Telegram who we are. Returns the bot's username.
    pub async fn get_me(&self) -> PortResult<String> {
        let me: TgUser = self.call("getMe", &serde_json::json!({})).await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn get_updates(&self, offset: i64) -> PortResult<Vec<TgUpdate>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        self.call("getUpdates", &body).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> PortResult<T> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("{method} request failed: {}", e.without_url())))?;

        let envelope: TgResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("{method} returned an unreadable body: {}", e.without_url())))?;
        envelope.into_result(method)
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl<T> TgResponse<T> {
    fn into_result(self, method: &str) -> PortResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ if self.error_code == Some(401) => Err(PortError::Unauthorized),
            _ => Err(PortError::Unexpected(format!(
                "{} failed ({}): {}",
                method,
                self.error_code.unwrap_or_default(),
                self.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }
}

#[derive(Deserialize)]
struct TgUser {
    first_name: String,
    username: Option<String>,
}

#[derive(Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
    chat: TgChat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct TgChat {
    id: i64,
}

/// Keeps the text messages of a batch and returns the offset that acknowledges it.
fn collect_messages(updates: Vec<TgUpdate>, offset: i64) -> (Vec<InboundMessage>, i64) {
    let next_offset = updates
        .iter()
        .map(|u| u.update_id + 1)
        .max()
        .map_or(offset, |next| next.max(offset));
    let messages = updates
        .into_iter()
        .filter_map(|u| u.message)
        .filter_map(|m| {
            m.text.map(|text| InboundMessage {
                chat_id: ChatId(m.chat.id),
                text,
            })
        })
        .collect();
    (messages, next_offset)
}

//=========================================================================================
// `ChatTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatTransport for TelegramAdapter {
    async fn send(&self, chat_id: ChatId, text: &str) -> PortResult<()> {
        let body = serde_json::json!({ "chat_id": chat_id.0, "text": text });
        let _sent: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn receive(&self) -> PortResult<InboundStream> {
        let adapter = self.clone();
        let stream = async_stream::stream! {
            let mut offset = 0_i64;
            loop {
                match adapter.get_updates(offset).await {
                    Ok(updates) => {
                        let (messages, next_offset) = collect_messages(updates, offset);
                        offset = next_offset;
                        for message in messages {
                            debug!("Received message from chat {}", message.chat_id);
                            yield Ok(message);
                        }
                    }
                    Err(PortError::Unauthorized) => {
                        yield Err(PortError::Unauthorized);
                        break;
                    }
                    Err(e) => {
                        warn!("Polling for updates failed: {}. Retrying in {:?}.", e, POLL_RETRY_DELAY);
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
