//! Relay orchestrator.
//!
//! Drives one relay run: classify → acknowledge → retrieve → stage →
//! upload → reply → cleanup. Every failure below startup is caught here,
//! logged, and turned into exactly one reply. The staged file is released
//! on every path out of a run.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{ChatPlatform, UploadClient, UploadError};
use crate::domain::{AttachmentKind, Classification, InboundEvent, Origin, RelayTask};

use super::intake::classify;
use super::staging::{StagedFile, StagingError, TempStorage};

pub const MSG_PROCESSING: &str = "Processing your file, please wait...";
pub const MSG_NO_FILE_INFO: &str = "Could not get file information.";
pub const MSG_STORAGE_ERROR: &str = "Server error: Could not create temporary storage.";
pub const MSG_UPLOAD_FAILED: &str = "Sorry, the upload failed.";
pub const MSG_GENERIC_ERROR: &str = "An error occurred while processing your file.";
pub const DOWNLOAD_LINK_LABEL: &str = "Download link:";

/// Stages of a relay run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Classifying,
    Acknowledging,
    Retrieving,
    Staging,
    Uploading,
    Replying,
    Cleanup,
    Done,
}

impl std::fmt::Display for RelayStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelayStage::Classifying => "classifying",
            RelayStage::Acknowledging => "acknowledging",
            RelayStage::Retrieving => "retrieving",
            RelayStage::Staging => "staging",
            RelayStage::Uploading => "uploading",
            RelayStage::Replying => "replying",
            RelayStage::Cleanup => "cleanup",
            RelayStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Failures that end a relay run early
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Staging directory unavailable: {0}")]
    StorageDirUnavailable(#[source] StagingError),

    #[error("No file information for {0} attachment")]
    NoAttachmentInfo(AttachmentKind),

    #[error("Failed to retrieve file: {0:#}")]
    RetrievalFailed(anyhow::Error),

    #[error("Failed to stage file: {0:#}")]
    StagingFailed(anyhow::Error),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] UploadError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl RelayError {
    /// The one reply the user gets for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            RelayError::StorageDirUnavailable(_) => MSG_STORAGE_ERROR,
            RelayError::NoAttachmentInfo(_) => MSG_NO_FILE_INFO,
            RelayError::UploadFailed(_) => MSG_UPLOAD_FAILED,
            RelayError::RetrievalFailed(_)
            | RelayError::StagingFailed(_)
            | RelayError::Unexpected(_) => MSG_GENERIC_ERROR,
        }
    }
}

/// How a relay run ended
#[derive(Debug)]
pub enum RelayOutcome {
    /// Not a file message; nothing was sent
    Skipped,

    /// Uploaded; the link was sent back
    Delivered { url: String },

    /// Ended with an error reply
    Failed(RelayError),
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered { .. })
    }
}

/// Format the success reply
pub fn download_link_message(url: &str) -> String {
    format!("{}\n{}", DOWNLOAD_LINK_LABEL, url)
}

/// Runs relay runs against a chat platform and an upload sink
pub struct Relay {
    platform: Arc<dyn ChatPlatform>,
    uploader: UploadClient,
    storage: TempStorage,
}

impl Relay {
    pub fn new(platform: Arc<dyn ChatPlatform>, uploader: UploadClient, storage: TempStorage) -> Self {
        Self {
            platform,
            uploader,
            storage,
        }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Process one inbound event end to end
    #[instrument(skip(self, event), fields(chat_id = event.origin.chat_id, message_id = event.origin.message_id))]
    pub async fn process(&self, event: &InboundEvent) -> RelayOutcome {
        debug!(stage = %RelayStage::Classifying, "Relay run started");

        let task = match classify(event) {
            Classification::Skip => return RelayOutcome::Skipped,
            Classification::MissingFileInfo(kind) => {
                warn!(%kind, "Attachment without file identifier");
                return self
                    .fail(&event.origin, RelayError::NoAttachmentInfo(kind))
                    .await;
            }
            Classification::Relay(task) => task,
        };

        if let Err(e) = self.storage.ensure_dir().await {
            return self
                .fail(&event.origin, RelayError::StorageDirUnavailable(e))
                .await;
        }

        debug!(stage = %RelayStage::Acknowledging, "Entering stage");
        self.send(&event.origin, MSG_PROCESSING).await;

        let mut staged = None;
        let result = self.transfer(&task, &mut staged).await;

        debug!(stage = %RelayStage::Replying, "Entering stage");
        let outcome = match result {
            Ok(url) => {
                self.send(&event.origin, &download_link_message(&url)).await;
                RelayOutcome::Delivered { url }
            }
            Err(e) => self.fail(&event.origin, e).await,
        };

        debug!(stage = %RelayStage::Cleanup, "Entering stage");
        if let Some(staged) = staged {
            staged.release().await;
        }

        debug!(stage = %RelayStage::Done, "Entering stage");
        outcome
    }

    /// Retrieve, stage and upload. The staged handle is parked in `staged`
    /// as soon as it exists so the caller can release it on any path.
    #[instrument(skip(self, task, staged), fields(file_id = %task.file_id, file_name = %task.display_name, kind = %task.kind))]
    async fn transfer(&self, task: &RelayTask, staged: &mut Option<StagedFile>) -> Result<String, RelayError> {
        debug!(stage = %RelayStage::Retrieving, "Entering stage");
        let remote = self
            .platform
            .resolve_file(&task.file_id)
            .await
            .map_err(RelayError::RetrievalFailed)?;

        debug!(stage = %RelayStage::Staging, "Entering stage");
        let handle = self
            .storage
            .stage(&task.display_name)
            .await
            .map_err(RelayError::StorageDirUnavailable)?;
        let handle = staged.insert(handle);

        info!(path = %handle.path().display(), "Downloading file");
        let bytes = self
            .platform
            .download(&remote, handle.path())
            .await
            .map_err(RelayError::StagingFailed)?;
        info!(bytes, "Downloaded file successfully");

        debug!(stage = %RelayStage::Uploading, "Entering stage");
        info!("Uploading file to external service");
        self.uploader
            .upload(handle.path(), &handle.file_name())
            .await
            .map_err(RelayError::UploadFailed)
    }

    /// Log a failure and send its reply
    async fn fail(&self, origin: &Origin, err: RelayError) -> RelayOutcome {
        match &err {
            RelayError::UploadFailed(e) => warn!(error = %e, "Upload failed"),
            RelayError::NoAttachmentInfo(_) => {}
            other => error!(error = %other, "Error handling file"),
        }
        self.send(origin, err.user_message()).await;
        RelayOutcome::Failed(err)
    }

    /// Send a reply; a failed send is logged and otherwise ignored
    async fn send(&self, origin: &Origin, text: &str) {
        if let Err(e) = self.platform.reply(origin, text).await {
            warn!(chat_id = origin.chat_id, error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            RelayError::NoAttachmentInfo(AttachmentKind::Photo).user_message(),
            "Could not get file information."
        );
        assert_eq!(
            RelayError::UploadFailed(UploadError::Unexpected("x".into())).user_message(),
            "Sorry, the upload failed."
        );
        assert_eq!(
            RelayError::RetrievalFailed(anyhow::anyhow!("boom")).user_message(),
            "An error occurred while processing your file."
        );
        assert_eq!(
            RelayError::Unexpected("panic".into()).user_message(),
            MSG_GENERIC_ERROR
        );
    }

    #[test]
    fn test_download_link_message() {
        assert_eq!(
            download_link_message("https://host/report.pdf"),
            "Download link:\nhttps://host/report.pdf"
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(RelayStage::Uploading.to_string(), "uploading");
    }
}
