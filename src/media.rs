//! Media download, hashing, and filtering.
//!
//! Downloads a message's attachment to the date/channel-partitioned images
//! tree, deduplicates it by content hash against the run-wide set, and
//! applies the declared-MIME-type filter for documents. Every failure is
//! logged and degrades to "no asset"; a download problem never aborts a
//! channel scrape.

use std::path::{Path, PathBuf};
use tracing::error;

use crate::dedup::{content_hash, MediaDedup};
use crate::source::{MediaRef, MessageSource, SourceMessage};

/// Downloads `message`'s media for `channel`, partitioned under `date`
/// (the message's own calendar date). Returns the local path when the asset
/// survived dedup and type filtering, `None` otherwise.
pub async fn download_media(
    source: &dyn MessageSource,
    dedup: &MediaDedup,
    images_dir: &Path,
    message: &SourceMessage,
    channel: &str,
    date: &str,
    allowed_image_types: &[String],
) -> Option<PathBuf> {
    match try_download(
        source,
        dedup,
        images_dir,
        message,
        channel,
        date,
        allowed_image_types,
    )
    .await
    {
        Ok(path) => path,
        Err(e) => {
            error!(
                channel,
                message_id = message.id,
                "failed to download media: {e}"
            );
            None
        }
    }
}

async fn try_download(
    source: &dyn MessageSource,
    dedup: &MediaDedup,
    images_dir: &Path,
    message: &SourceMessage,
    channel: &str,
    date: &str,
    allowed_image_types: &[String],
) -> anyhow::Result<Option<PathBuf>> {
    let out_dir = images_dir.join(date).join(channel);
    std::fs::create_dir_all(&out_dir)?;

    let ext = match &message.media {
        MediaRef::None => return Ok(None),
        MediaRef::Photo { .. } => ".jpg".to_string(),
        MediaRef::Document { ext, .. } => ext.clone().unwrap_or_else(|| ".bin".to_string()),
    };
    let file_path = out_dir.join(format!("{}{}", message.id, ext));

    let bytes = source.fetch_media(&message.media).await?;
    std::fs::write(&file_path, &bytes)?;

    // Dedup by content hash: the first writer of identical bytes wins.
    let hash = content_hash(&bytes);
    if !dedup.insert(&hash) {
        std::fs::remove_file(&file_path)?;
        return Ok(None);
    }

    // Photos always pass; documents only when their declared MIME type is
    // in the allowed set.
    let allowed = match &message.media {
        MediaRef::Photo { .. } => true,
        MediaRef::Document { mime_type, .. } => {
            allowed_image_types.iter().any(|t| t == mime_type)
        }
        MediaRef::None => false,
    };

    if allowed {
        Ok(Some(file_path))
    } else {
        std::fs::remove_file(&file_path)?;
        Ok(None)
    }
}
