//! Read-only analytics queries over the modeled tables.
//!
//! Each operation is stateless: it opens a fresh pool, runs one query
//! against the dbt-produced `fct_messages` / `fct_image_detections` tables,
//! and closes the pool. Used by both the `report` CLI commands and the HTTP
//! API handlers.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::{ChannelActivity, ImageDetectionResult, MessageSearchResult, ProductReport};

/// Top-N most frequent whitespace-tokenized lowercase words across all
/// message text.
pub async fn top_products(config: &Config, limit: i64) -> Result<Vec<ProductReport>> {
    let pool = db::connect(config).await?;
    let rows = sqlx::query_as::<_, ProductReport>(
        r#"
        SELECT word AS product, count(*) AS mentions
        FROM (
            SELECT unnest(string_to_array(lower(text), ' ')) AS word
            FROM fct_messages
            WHERE text IS NOT NULL
        ) t
        GROUP BY word
        ORDER BY mentions DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&pool)
    .await?;
    pool.close().await;
    Ok(rows)
}

/// Per-day message counts for one channel, ascending by day.
pub async fn channel_activity(config: &Config, channel_name: &str) -> Result<Vec<ChannelActivity>> {
    let pool = db::connect(config).await?;
    let rows = sqlx::query_as::<_, ChannelActivity>(
        r#"
        SELECT date_id::text AS date, count(*) AS message_count
        FROM fct_messages
        WHERE channel_name = $1
        GROUP BY date_id
        ORDER BY date_id
        "#,
    )
    .bind(channel_name)
    .fetch_all(&pool)
    .await?;
    pool.close().await;
    Ok(rows)
}

/// Case-insensitive substring search over message text, newest first.
pub async fn search_messages(
    config: &Config,
    query: &str,
    limit: i64,
) -> Result<Vec<MessageSearchResult>> {
    let pool = db::connect(config).await?;
    let rows = sqlx::query_as::<_, MessageSearchResult>(
        r#"
        SELECT message_id, channel_name, message_date::text AS message_date, text
        FROM fct_messages
        WHERE text ILIKE $1
        ORDER BY message_date DESC
        LIMIT $2
        "#,
    )
    .bind(format!("%{query}%"))
    .bind(limit)
    .fetch_all(&pool)
    .await?;
    pool.close().await;
    Ok(rows)
}

/// All detections for one message, joined with the posting channel's name.
pub async fn image_detections(
    config: &Config,
    message_id: i64,
) -> Result<Vec<ImageDetectionResult>> {
    let pool = db::connect(config).await?;
    let rows = sqlx::query_as::<_, ImageDetectionResult>(
        r#"
        SELECT d.message_id, m.channel_name, d.image_path,
               d.detected_object_class, d.confidence_score
        FROM fct_image_detections d
        LEFT JOIN fct_messages m ON d.message_id = m.message_id
        WHERE d.message_id = $1
        "#,
    )
    .bind(message_id)
    .fetch_all(&pool)
    .await?;
    pool.close().await;
    Ok(rows)
}
