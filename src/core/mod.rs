//! Core relay logic.
//!
//! This module contains:
//! - Intake: deciding which events carry a relayable file
//! - Staging: transient storage with guaranteed cleanup
//! - Orchestrator: the relay run state machine
//! - Health: the liveness endpoint
//! - Supervisor: the long-running event loop

pub mod health;
pub mod intake;
pub mod orchestrator;
pub mod staging;
pub mod supervisor;

// Re-export commonly used types
pub use intake::{classify, sanitize_file_name};
pub use orchestrator::{download_link_message, Relay, RelayError, RelayOutcome, RelayStage};
pub use staging::{StagedFile, StagingError, TempStorage};
pub use supervisor::Supervisor;
