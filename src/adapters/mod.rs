//! Adapter interfaces for external systems.
//!
//! The relay talks to two outside parties: the chat platform (inbound
//! events, file retrieval, replies) and the file-hosting endpoint
//! (uploads). The chat platform sits behind traits so the orchestrator
//! can run against an in-memory double.

pub mod telegram;
pub mod upload;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{InboundEvent, Origin};

// Re-export the concrete adapters
pub use telegram::{TelegramClient, TelegramConfig};
pub use upload::{UploadClient, UploadError};

/// A file the platform has resolved and is ready to hand out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Identifier the file was resolved from
    pub file_id: String,

    /// Platform-side location of the bytes
    pub file_path: String,

    /// Size reported by the platform (if available)
    pub file_size: Option<u64>,
}

/// Capabilities the relay needs from the chat platform
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Send a plain-text reply to the conversation an event came from
    async fn reply(&self, origin: &Origin, text: &str) -> Result<()>;

    /// Resolve a file identifier into a downloadable file
    async fn resolve_file(&self, file_id: &str) -> Result<RemoteFile>;

    /// Stream a resolved file to `dest`, returning the number of bytes written
    async fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64>;
}

/// Source of inbound events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Wait for the next batch of events. An empty batch is normal.
    async fn poll(&self) -> Result<Vec<InboundEvent>>;
}
