//! Telegram Bot API adapter.
//!
//! Receives messages through long polling (`getUpdates`), resolves and
//! downloads attached files (`getFile` + the file endpoint) and replies
//! with `sendMessage`.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ChatPlatform, EventSource, RemoteFile};
use crate::domain::{Attachment, InboundEvent, Origin, PhotoSize};

/// Default Bot API host
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client
pub struct TelegramClient {
    /// Bot token
    bot_token: String,
    /// API host (overridable for tests)
    api_base: String,
    /// Long-poll timeout
    poll_timeout: Duration,
    /// Next update offset to request
    offset: AtomicI64,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// File result from getFile
#[derive(Debug, Deserialize)]
struct FileResult {
    file_id: String,
    file_path: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    entities: Vec<MessageEntity>,
    document: Option<FileRef>,
    photo: Option<Vec<PhotoRef>>,
    video: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct MessageEntity {
    #[serde(rename = "type")]
    kind: String,
    offset: i64,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: Option<String>,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoRef {
    file_id: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Configuration for Telegram client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            api_base: default_api_base(),
            poll_timeout: Duration::from_secs(default_poll_timeout_secs()),
            offset: AtomicI64::new(0),
            client: reqwest::Client::new(),
        }
    }

    /// Create from config
    pub fn from_config(config: TelegramConfig) -> Self {
        Self::new(config.bot_token)
            .with_api_base(config.api_base)
            .with_poll_timeout(Duration::from_secs(config.poll_timeout_secs))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Build file download URL
    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    /// Call a Bot API method and unwrap its `result`
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.api_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram method {}", method))?;

        let result: TelegramResponse<T> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        result
            .result
            .with_context(|| format!("Telegram method {} returned no result", method))
    }

    /// Send a text message, returning its message ID
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64> {
        let result: MessageResult = self
            .call(
                "sendMessage",
                &serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                }),
                None,
            )
            .await
            .context("Failed to send Telegram message")?;

        Ok(result.message_id)
    }
}

/// Convert a raw message into a platform-neutral event
fn to_event(message: Message) -> InboundEvent {
    // Only a leading command in message text counts; captions never do
    let is_command = message
        .entities
        .first()
        .map(|e| e.kind == "bot_command" && e.offset == 0)
        .unwrap_or(false);

    let mut event = InboundEvent::new(Origin::new(message.chat.id, message.message_id));
    event.is_command = is_command;
    event.text = message.text.or(message.caption);

    if let Some(doc) = message.document {
        event.attachments.push(Attachment::Document {
            file_id: doc.file_id,
            file_name: doc.file_name,
        });
    }

    // An empty size list means no photo at all
    if let Some(sizes) = message.photo.filter(|s| !s.is_empty()) {
        event.attachments.push(Attachment::Photo {
            sizes: sizes
                .into_iter()
                .map(|p| PhotoSize {
                    file_id: p.file_id,
                    width: p.width,
                    height: p.height,
                })
                .collect(),
        });
    }

    if let Some(video) = message.video {
        event.attachments.push(Attachment::Video {
            file_id: video.file_id,
            file_name: video.file_name,
        });
    }

    event
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn reply(&self, origin: &Origin, text: &str) -> Result<()> {
        self.send_message(origin.chat_id, text).await?;
        Ok(())
    }

    async fn resolve_file(&self, file_id: &str) -> Result<RemoteFile> {
        let file: FileResult = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }), None)
            .await
            .with_context(|| format!("Failed to resolve file {}", file_id))?;

        let file_path = file
            .file_path
            .with_context(|| format!("Telegram returned no file_path for {}", file_id))?;

        Ok(RemoteFile {
            file_id: file.file_id,
            file_path,
            file_size: file.file_size,
        })
    }

    async fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(self.file_url(&file.file_path))
            .send()
            .await
            .context("Failed to download Telegram file")?
            .error_for_status()
            .context("Telegram file endpoint returned an error")?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read Telegram file body")?
        {
            out.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl EventSource for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn poll(&self) -> Result<Vec<InboundEvent>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &serde_json::json!({
                    "offset": offset,
                    "timeout": self.poll_timeout.as_secs(),
                    "allowed_updates": ["message"],
                }),
                // Leave room for the server-side long-poll wait
                Some(self.poll_timeout + Duration::from_secs(10)),
            )
            .await?;

        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            self.offset.fetch_max(update.update_id + 1, Ordering::SeqCst);
            match update.message {
                Some(message) => events.push(to_event(message)),
                None => debug!(update_id = update.update_id, "Update without message, skipping"),
            }
        }

        if !events.is_empty() {
            info!(count = events.len(), "Received Telegram messages");
        }
        Ok(events)
    }
}
