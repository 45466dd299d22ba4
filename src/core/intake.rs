//! Intake classifier.
//!
//! Decides whether an inbound event carries a relayable file and, if so,
//! which identifier and name to use. Only one attachment is relayed per
//! event; documents win over photos, photos over videos.

use std::path::Path;

use tracing::debug;

use crate::domain::{Attachment, AttachmentKind, Classification, InboundEvent, RelayTask};

/// Name used for documents that arrive without a file name
pub const DEFAULT_DOCUMENT_NAME: &str = "document";

const PHOTO_PREFIX: &str = "photo";
const PHOTO_EXTENSION: &str = "jpg";
const VIDEO_PREFIX: &str = "video";
const VIDEO_EXTENSION: &str = "mp4";

/// Classify an event. Pure function of the event content.
pub fn classify(event: &InboundEvent) -> Classification {
    if event.is_command {
        debug!("Command message, ignoring");
        return Classification::Skip;
    }

    let document = event
        .attachments
        .iter()
        .find(|a| matches!(a, Attachment::Document { .. }));
    let photo = event
        .attachments
        .iter()
        .find(|a| matches!(a, Attachment::Photo { .. }));
    let video = event
        .attachments
        .iter()
        .find(|a| matches!(a, Attachment::Video { .. }));

    match document.or(photo).or(video) {
        Some(attachment) => classify_attachment(attachment),
        None => {
            debug!("Received non-file message, ignoring");
            Classification::Skip
        }
    }
}

fn classify_attachment(attachment: &Attachment) -> Classification {
    match attachment {
        Attachment::Document { file_id, file_name } => {
            let Some(file_id) = non_empty(file_id.as_deref()) else {
                return Classification::MissingFileInfo(AttachmentKind::Document);
            };
            let display_name = file_name
                .as_deref()
                .and_then(sanitize_file_name)
                .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string());
            Classification::Relay(RelayTask {
                file_id: file_id.to_string(),
                display_name,
                kind: AttachmentKind::Document,
            })
        }
        Attachment::Photo { sizes } => {
            // Largest resolution is listed last
            let Some(file_id) = sizes.last().and_then(|s| non_empty(s.file_id.as_deref())) else {
                return Classification::MissingFileInfo(AttachmentKind::Photo);
            };
            Classification::Relay(RelayTask {
                file_id: file_id.to_string(),
                display_name: synthesized_name(PHOTO_PREFIX, file_id, PHOTO_EXTENSION),
                kind: AttachmentKind::Photo,
            })
        }
        Attachment::Video { file_id, file_name } => {
            let Some(file_id) = non_empty(file_id.as_deref()) else {
                return Classification::MissingFileInfo(AttachmentKind::Video);
            };
            let display_name = file_name
                .as_deref()
                .and_then(sanitize_file_name)
                .unwrap_or_else(|| synthesized_name(VIDEO_PREFIX, file_id, VIDEO_EXTENSION));
            Classification::Relay(RelayTask {
                file_id: file_id.to_string(),
                display_name,
                kind: AttachmentKind::Video,
            })
        }
    }
}

/// Build `<prefix>_<id>.<ext>`, sanitized like any user-supplied name.
/// Falls back to `<prefix>.<ext>` when the identifier leaves nothing usable.
fn synthesized_name(prefix: &str, file_id: &str, extension: &str) -> String {
    sanitize_file_name(&format!("{}_{}.{}", prefix, file_id, extension))
        .unwrap_or_else(|| format!("{}.{}", prefix, extension))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reduce a user-supplied file name to a single safe path component.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    // Treat both separators as separators regardless of host OS
    let normalized = name.replace('\\', "/");
    let last = Path::new(&normalized)
        .file_name()?
        .to_string_lossy()
        .trim()
        .to_string();

    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(last)
}
