//! Core data models shared by the scraper, loader, query layer, and API.
//!
//! [`MessageRecord`] is the on-disk batch-file schema: one JSON array of
//! these per channel per calendar date. The channel name is not stored in
//! the record; it is carried by the batch file name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped message as persisted in a raw batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    pub has_image: bool,
    pub has_document: bool,
    pub has_video: bool,
    pub has_audio: bool,
    pub media_type: Option<String>,
    pub local_media_path: Option<String>,
}

impl MessageRecord {
    /// Calendar date (UTC) the message belongs to; batch files and media
    /// directories are partitioned by this, never by the download date.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// One object-detection result row from the detections CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRow {
    pub message_id: i64,
    pub image_path: String,
    pub detected_object_class: String,
    pub confidence_score: f64,
}

/// Word-frequency entry for the top-products report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductReport {
    pub product: String,
    pub mentions: i64,
}

/// Per-day message count for one channel.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChannelActivity {
    pub date: String,
    pub message_count: i64,
}

/// One hit from the message substring search.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MessageSearchResult {
    pub message_id: i64,
    pub channel_name: String,
    pub message_date: String,
    pub text: Option<String>,
}

/// One detection joined with the channel that posted the image.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageDetectionResult {
    pub message_id: i64,
    pub channel_name: Option<String>,
    pub image_path: String,
    pub detected_object_class: String,
    pub confidence_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_key_uses_message_date_not_wall_clock() {
        let record = MessageRecord {
            id: 7,
            date: Utc.with_ymd_and_hms(2024, 1, 2, 23, 59, 59).unwrap(),
            sender_id: None,
            text: None,
            has_image: false,
            has_document: false,
            has_video: false,
            has_audio: false,
            media_type: None,
            local_media_path: None,
        };
        assert_eq!(record.date_key(), "2024-01-02");
    }
}
