//! Domain types for the file relay.
//!
//! This module contains the core data structures:
//! - Events: inbound messages and their attachments
//! - Tasks: what the classifier decided to relay

pub mod event;
pub mod task;

// Re-export commonly used types
pub use event::{Attachment, InboundEvent, Origin, PhotoSize};
pub use task::{AttachmentKind, Classification, RelayTask};
