//! Bulk loading of raw batch files into Postgres.
//!
//! Reads every batch file under the messages tree (or the detections CSV),
//! builds one row set, and inserts it in a single transaction with
//! `ON CONFLICT DO NOTHING`, so reloading the same input never creates
//! duplicate rows. Zero input rows is a no-op, not an error.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::models::{DetectionRow, MessageRecord};

/// One parsed batch file: the channel (from the file stem) and its records.
struct MessageBatch {
    channel: String,
    records: Vec<MessageRecord>,
}

/// Loads every message batch file into `raw_telegram_messages`. Returns the
/// number of rows actually inserted (conflicts are dropped silently).
pub async fn load_messages(config: &Config) -> Result<u64> {
    let batches = read_message_batches(config)?;
    let total_records: usize = batches.iter().map(|b| b.records.len()).sum();
    if total_records == 0 {
        info!("no message batch files found, nothing to load");
        return Ok(0);
    }

    let pool = db::connect(config).await?;
    let inserted = insert_messages(&pool, &batches).await?;
    pool.close().await;

    info!(
        inserted,
        total = total_records,
        "loaded message batches into raw_telegram_messages"
    );
    Ok(inserted)
}

/// Loads the detections CSV into `raw_image_detections`. Returns the number
/// of rows actually inserted.
pub async fn load_detections(config: &Config) -> Result<u64> {
    let rows = read_detection_rows(config)?;
    if rows.is_empty() {
        info!("no detection rows found, nothing to load");
        return Ok(0);
    }

    let pool = db::connect(config).await?;
    let inserted = insert_detections(&pool, &rows).await?;
    pool.close().await;

    info!(
        inserted,
        total = rows.len(),
        "loaded detections into raw_image_detections"
    );
    Ok(inserted)
}

/// Walks `<messages_dir>/<date>/<channel>.json` and parses every batch.
fn read_message_batches(config: &Config) -> Result<Vec<MessageBatch>> {
    let root = config.messages_dir();
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut batches = Vec::new();
    for entry in WalkDir::new(&root).min_depth(2).max_depth(2) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }
        let channel = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading batch file {}", path.display()))?;
        let records: Vec<MessageRecord> = serde_json::from_str(&content)
            .with_context(|| format!("parsing batch file {}", path.display()))?;

        batches.push(MessageBatch { channel, records });
    }

    Ok(batches)
}

fn read_detection_rows(config: &Config) -> Result<Vec<DetectionRow>> {
    let path = &config.detections_csv;
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening detections csv {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: DetectionRow =
            result.with_context(|| format!("parsing detections csv {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

async fn insert_messages(pool: &PgPool, batches: &[MessageBatch]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for batch in batches {
        for record in &batch.records {
            let raw_json = serde_json::to_value(record)?;
            let result = sqlx::query(
                r#"
                INSERT INTO raw_telegram_messages (
                    id, channel, message_date, sender_id, text,
                    has_image, has_document, has_video, has_audio,
                    media_type, local_media_path, raw_json
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(record.id)
            .bind(&batch.channel)
            .bind(record.date.naive_utc())
            .bind(record.sender_id)
            .bind(&record.text)
            .bind(record.has_image)
            .bind(record.has_document)
            .bind(record.has_video)
            .bind(record.has_audio)
            .bind(&record.media_type)
            .bind(&record.local_media_path)
            .bind(raw_json)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

async fn insert_detections(pool: &PgPool, rows: &[DetectionRow]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO raw_image_detections (
                message_id, image_path, detected_object_class, confidence_score
            ) VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(row.message_id)
        .bind(&row.image_path)
        .bind(&row.detected_object_class)
        .bind(row.confidence_score)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(data_dir: &std::path::Path, csv: &std::path::Path) -> Config {
        Config {
            pg_host: "localhost".into(),
            pg_port: 5432,
            pg_database: "telegram_data".into(),
            pg_user: "postgres".into(),
            pg_password: "postgres".into(),
            telegram_api_id: None,
            telegram_api_hash: None,
            telegram_session: "anon".into(),
            telegram_gateway_url: "http://localhost:8081".into(),
            data_dir: data_dir.to_path_buf(),
            detections_csv: csv.to_path_buf(),
            api_bind: "0.0.0.0:8000".into(),
        }
    }

    #[test]
    fn missing_messages_dir_yields_no_batches() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp.path().join("absent"), &PathBuf::from("absent.csv"));
        assert!(read_message_batches(&config).unwrap().is_empty());
    }

    #[test]
    fn batch_channel_comes_from_file_stem() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path(), &PathBuf::from("absent.csv"));

        let records = vec![MessageRecord {
            id: 1,
            date: Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
            sender_id: Some(5),
            text: Some("buy pills now".into()),
            has_image: false,
            has_document: false,
            has_video: false,
            has_audio: false,
            media_type: None,
            local_media_path: None,
        }];
        let dir = config.messages_dir().join("2024-01-02");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("pharma_deals.json"),
            serde_json::to_string_pretty(&records).unwrap(),
        )
        .unwrap();

        let batches = read_message_batches(&config).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].channel, "pharma_deals");
        assert_eq!(batches[0].records.len(), 1);
        assert_eq!(batches[0].records[0].id, 1);
    }

    #[test]
    fn detections_csv_parses_typed_rows() {
        let tmp = TempDir::new().unwrap();
        let csv_path = tmp.path().join("yolo_detections.csv");
        std::fs::write(
            &csv_path,
            "message_id,image_path,detected_object_class,confidence_score\n\
             10,data/raw/telegram_images/2024-01-02/pharma_deals/10.jpg,bottle,0.91\n",
        )
        .unwrap();
        let config = test_config(tmp.path(), &csv_path);

        let rows = read_detection_rows(&config).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message_id, 10);
        assert_eq!(rows[0].detected_object_class, "bottle");
        assert!((rows[0].confidence_score - 0.91).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_csv_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path(), &tmp.path().join("nope.csv"));
        assert!(read_detection_rows(&config).unwrap().is_empty());
    }
}
