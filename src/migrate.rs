use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Creates the raw landing tables. Idempotent; running it repeatedly is
/// safe. The unique indexes are what make the bulk loader's
/// `ON CONFLICT DO NOTHING` inserts drop duplicate rows.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_telegram_messages (
            id BIGINT,
            channel TEXT,
            message_date TIMESTAMP,
            sender_id BIGINT,
            text TEXT,
            has_image BOOLEAN,
            has_document BOOLEAN,
            has_video BOOLEAN,
            has_audio BOOLEAN,
            media_type TEXT,
            local_media_path TEXT,
            raw_json JSONB
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_raw_telegram_messages_channel_id
        ON raw_telegram_messages (channel, id)
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_image_detections (
            message_id BIGINT,
            image_path TEXT,
            detected_object_class TEXT,
            confidence_score FLOAT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_raw_image_detections_row
        ON raw_image_detections (message_id, image_path, detected_object_class, confidence_score)
        "#,
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
