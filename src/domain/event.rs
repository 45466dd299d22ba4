//! Inbound chat events and the attachments they carry.
//!
//! These types are platform-neutral: the Telegram adapter converts raw
//! updates into [`InboundEvent`]s and the rest of the pipeline never sees
//! the wire format.

use serde::{Deserialize, Serialize};

/// Where an event came from, and where replies go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Chat (conversation) ID
    pub chat_id: i64,

    /// ID of the message that triggered the event
    pub message_id: i64,
}

impl Origin {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// One resolution of a photo. The platform orders these smallest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl PhotoSize {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id.into()),
            width: 0,
            height: 0,
        }
    }
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    Document {
        file_id: Option<String>,
        file_name: Option<String>,
    },
    Photo {
        sizes: Vec<PhotoSize>,
    },
    Video {
        file_id: Option<String>,
        file_name: Option<String>,
    },
}

/// A single message delivered by the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub origin: Origin,

    /// Message text or media caption
    #[serde(default)]
    pub text: Option<String>,

    /// True when the message starts with a bot command (`/start`, ...)
    #[serde(default)]
    pub is_command: bool,

    /// Documents, photos and videos, in the order the platform lists them
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundEvent {
    /// Create an event with no attachments
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            text: None,
            is_command: false,
            attachments: Vec::new(),
        }
    }

    /// Create a text-only event
    pub fn text(origin: Origin, text: impl Into<String>) -> Self {
        let text = text.into();
        let is_command = text.starts_with('/');
        Self {
            origin,
            text: Some(text),
            is_command,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn document(origin: Origin, file_id: &str, file_name: Option<&str>) -> Self {
        Self::new(origin).with_attachment(Attachment::Document {
            file_id: Some(file_id.to_string()),
            file_name: file_name.map(str::to_string),
        })
    }

    pub fn photo(origin: Origin, file_ids: &[&str]) -> Self {
        Self::new(origin).with_attachment(Attachment::Photo {
            sizes: file_ids.iter().map(|id| PhotoSize::new(*id)).collect(),
        })
    }

    pub fn video(origin: Origin, file_id: &str, file_name: Option<&str>) -> Self {
        Self::new(origin).with_attachment(Attachment::Video {
            file_id: Some(file_id.to_string()),
            file_name: file_name.map(str::to_string),
        })
    }
}
