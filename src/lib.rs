//! filerelay - relay chat attachments to a file-hosting service
//!
//! A Telegram bot that takes documents, photos and videos sent to it,
//! stages them on local disk, uploads them to a file-hosting endpoint and
//! replies with the download link. A liveness endpoint runs alongside the
//! bot for process supervisors.
//!
//! # Architecture
//!
//! Each inbound message is one relay run:
//! - The intake classifier decides whether the message carries a file
//! - The orchestrator acknowledges, retrieves, stages, uploads and replies
//! - The staged file is removed on every exit path
//!
//! # Modules
//!
//! - `adapters`: External system integrations (Telegram, upload sink)
//! - `core`: Relay logic (intake, staging, orchestrator, supervisor, health)
//! - `domain`: Data structures (InboundEvent, Attachment, RelayTask)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! TELEGRAM_BOT_TOKEN=123:abc filerelay serve
//!
//! # Push a single file through the upload sink
//! filerelay upload ./report.pdf
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{ChatPlatform, EventSource, RemoteFile, TelegramClient, UploadClient, UploadError};
pub use config::{ConfigError, Settings, UploadSettings};
pub use crate::core::{Relay, RelayError, RelayOutcome, Supervisor, TempStorage};
pub use domain::{Attachment, Classification, InboundEvent, Origin, RelayTask};
