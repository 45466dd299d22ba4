//! The result of classifying an inbound event.

use serde::{Deserialize, Serialize};

/// Which attachment kind produced a relay task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Document,
    Photo,
    Video,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachmentKind::Document => write!(f, "document"),
            AttachmentKind::Photo => write!(f, "photo"),
            AttachmentKind::Video => write!(f, "video"),
        }
    }
}

/// A file the relay should fetch, stage and upload.
///
/// Everything after classification works against this type only and never
/// looks at the original event again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTask {
    /// Platform-assigned file identifier
    pub file_id: String,

    /// Name used for the staged file and the upload target
    pub display_name: String,

    pub kind: AttachmentKind,
}

/// Outcome of the intake classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Relay this file
    Relay(RelayTask),

    /// Not a file-bearing message; stay silent
    Skip,

    /// A file was attached but the platform gave no identifier for it
    MissingFileInfo(AttachmentKind),
}
