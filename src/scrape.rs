//! Channel scraping: the incremental ingestion loop.
//!
//! Each channel gets a single oldest→newest pass over its history, resumed
//! from the persisted checkpoint. Messages are keyword-filtered, their media
//! downloaded and deduplicated, and the surviving records accumulated into
//! per-calendar-date groups that are written out as pretty-printed JSON
//! batch files. The checkpoint advances after every handled message so a
//! crash resumes just past the last one that completed.
//!
//! Rate-limit signals from the source put the channel to sleep for the
//! requested duration and then retry the whole pass from the now-updated
//! checkpoint, capped at [`FLOOD_RETRY_CAP`] attempts. Any other failure
//! aborts only that channel; sibling channels are unaffected.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::dedup::MediaDedup;
use crate::media::download_media;
use crate::models::MessageRecord;
use crate::source::{MediaRef, MessageSource, SourceError};

/// Upper bound on sleep-then-retry cycles after rate-limit signals. The
/// channel is abandoned once exceeded.
pub const FLOOD_RETRY_CAP: u32 = 5;

/// Scrape parameters assembled from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub keywords: Vec<String>,
    pub image_types: Vec<String>,
    pub parallel: bool,
    pub clean: bool,
}

/// Per-channel counters reported after a completed pass.
#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub channel: String,
    pub images_downloaded: u64,
    pub skipped: u64,
    pub written: u64,
}

/// Reads the channel list file: one channel URL or name per line, blank
/// lines and `#` comments ignored.
pub fn load_channels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading channels file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Channel name is the last path segment of its URL.
pub fn channel_name(channel_url: &str) -> &str {
    channel_url.rsplit('/').next().unwrap_or(channel_url)
}

/// Scrapes every channel in `channels`, sequentially by default or one task
/// per channel with `--parallel`. All channels share one source client and
/// one dedup set. A failing channel is logged and does not stop the others.
pub async fn run_scrape(
    config: &Config,
    source: Arc<dyn MessageSource>,
    channels: Vec<String>,
    opts: ScrapeOptions,
) -> Result<Vec<ChannelSummary>> {
    let store = CheckpointStore::new(config.checkpoints_dir());
    let dedup = Arc::new(MediaDedup::new());
    let mut summaries = Vec::new();

    if opts.parallel {
        let mut handles = Vec::new();
        for channel_url in channels {
            let source = Arc::clone(&source);
            let dedup = Arc::clone(&dedup);
            let store = store.clone();
            let opts = opts.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                scrape_channel(&config, source.as_ref(), &store, &dedup, &channel_url, &opts).await
            }));
        }
        for handle in handles {
            match handle.await? {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("channel scrape failed: {e:#}"),
            }
        }
    } else {
        for channel_url in channels {
            match scrape_channel(config, source.as_ref(), &store, &dedup, &channel_url, &opts).await
            {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("channel scrape failed: {e:#}"),
            }
        }
    }

    Ok(summaries)
}

/// Scrapes one channel, retrying the whole pass after rate-limit waits.
/// Each retry resumes from the checkpoint advanced by the previous attempt.
pub async fn scrape_channel(
    config: &Config,
    source: &dyn MessageSource,
    store: &CheckpointStore,
    dedup: &MediaDedup,
    channel_url: &str,
    opts: &ScrapeOptions,
) -> Result<ChannelSummary> {
    let channel = channel_name(channel_url).to_string();
    let mut flood_retries = 0u32;

    loop {
        match scrape_channel_pass(config, source, store, dedup, &channel, opts).await {
            Ok(summary) => {
                info!(
                    channel = %summary.channel,
                    images = summary.images_downloaded,
                    skipped = summary.skipped,
                    written = summary.written,
                    "channel scrape complete"
                );
                return Ok(summary);
            }
            Err(e) => match e.downcast_ref::<SourceError>() {
                Some(SourceError::FloodWait { seconds }) => {
                    flood_retries += 1;
                    if flood_retries > FLOOD_RETRY_CAP {
                        bail!(
                            "channel {channel}: gave up after {FLOOD_RETRY_CAP} rate-limit retries"
                        );
                    }
                    warn!(
                        channel,
                        seconds,
                        attempt = flood_retries,
                        "rate limited, sleeping before retry"
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(*seconds)).await;
                }
                _ => return Err(e.context(format!("scraping channel {channel}"))),
            },
        }
    }
}

async fn scrape_channel_pass(
    config: &Config,
    source: &dyn MessageSource,
    store: &CheckpointStore,
    dedup: &MediaDedup,
    channel: &str,
    opts: &ScrapeOptions,
) -> Result<ChannelSummary> {
    let mut by_date: BTreeMap<String, Vec<MessageRecord>> = BTreeMap::new();
    let mut images_downloaded = 0u64;
    let mut skipped = 0u64;

    let last_message_id = store.load(channel);
    let messages = source
        .fetch_history(channel, last_message_id, opts.start_date)
        .await?;

    for message in &messages {
        // Keyword filter: skipped messages download nothing and do not
        // advance the checkpoint.
        if !opts.keywords.is_empty() {
            let text = message.text.as_deref().unwrap_or("").to_lowercase();
            if !opts.keywords.iter().any(|kw| text.contains(&kw.to_lowercase())) {
                skipped += 1;
                continue;
            }
        }

        let mut record = MessageRecord {
            id: message.id,
            date: message.date,
            sender_id: message.sender_id,
            text: message.text.clone(),
            has_image: false,
            has_document: false,
            has_video: false,
            has_audio: false,
            media_type: None,
            local_media_path: None,
        };
        let date_key = record.date_key();

        match &message.media {
            MediaRef::Photo { .. } => {
                let path = download_media(
                    source,
                    dedup,
                    &config.images_dir(),
                    message,
                    channel,
                    &date_key,
                    &opts.image_types,
                )
                .await;
                if let Some(path) = path {
                    record.has_image = true;
                    record.media_type = Some("photo".to_string());
                    record.local_media_path = Some(path.display().to_string());
                    images_downloaded += 1;
                }
            }
            MediaRef::Document { mime_type, .. } => {
                let flag_and_type = if mime_type.starts_with("image/") {
                    Some(("image", "image_document"))
                } else if mime_type.starts_with("video/") {
                    Some(("video", "video_document"))
                } else if mime_type.starts_with("audio/") {
                    Some(("audio", "audio_document"))
                } else {
                    None
                };

                match flag_and_type {
                    Some((flag, media_type)) => {
                        let path = download_media(
                            source,
                            dedup,
                            &config.images_dir(),
                            message,
                            channel,
                            &date_key,
                            &opts.image_types,
                        )
                        .await;
                        if let Some(path) = path {
                            match flag {
                                "image" => record.has_image = true,
                                "video" => record.has_video = true,
                                _ => record.has_audio = true,
                            }
                            record.media_type = Some(media_type.to_string());
                            record.local_media_path = Some(path.display().to_string());
                            images_downloaded += 1;
                        }
                    }
                    None => skipped += 1,
                }
            }
            MediaRef::None => skipped += 1,
        }

        // Date bounds exclude the record from output but the checkpoint
        // still advances, so later runs with wider bounds will not revisit
        // these messages.
        let date = message.date.date_naive();
        let in_bounds = opts.start_date.map_or(true, |start| date >= start)
            && opts.end_date.map_or(true, |end| date <= end);
        if in_bounds {
            by_date.entry(date_key).or_default().push(record);
        }

        store.save(channel, message.id)?;
    }

    // --clean removes the prior batch file for every date about to be
    // rewritten.
    if opts.clean {
        for date_key in by_date.keys() {
            let out_file = config
                .messages_dir()
                .join(date_key)
                .join(format!("{channel}.json"));
            if out_file.exists() {
                std::fs::remove_file(&out_file)
                    .with_context(|| format!("removing old batch file {}", out_file.display()))?;
            }
        }
    }

    let mut written = 0u64;
    for (date_key, records) in &by_date {
        let out_dir = config.messages_dir().join(date_key);
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating batch dir {}", out_dir.display()))?;
        let out_file = out_dir.join(format!("{channel}.json"));
        let body = serde_json::to_string_pretty(records)?;
        std::fs::write(&out_file, body)
            .with_context(|| format!("writing batch file {}", out_file.display()))?;
        written += records.len() as u64;
    }

    Ok(ChannelSummary {
        channel: channel.to_string(),
        images_downloaded,
        skipped,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn channel_name_takes_last_url_segment() {
        assert_eq!(channel_name("https://t.me/pharma_deals"), "pharma_deals");
        assert_eq!(channel_name("pharma_deals"), "pharma_deals");
    }

    #[test]
    fn load_channels_skips_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# pharma channels").unwrap();
        writeln!(file, "https://t.me/pharma_deals").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://t.me/med_supply  ").unwrap();

        let channels = load_channels(file.path()).unwrap();
        assert_eq!(
            channels,
            vec![
                "https://t.me/pharma_deals".to_string(),
                "https://t.me/med_supply".to_string()
            ]
        );
    }
}
