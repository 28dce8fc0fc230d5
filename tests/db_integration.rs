//! Database-backed tests for the loader and the analytics query layer.
//!
//! These need a reachable Postgres. They run only when `PP_TEST_PG=1` is
//! set (connection details come from the usual `PG*` variables) and skip
//! silently otherwise, so the default test run stays hermetic.

use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

use pharma_pulse::config::Config;
use pharma_pulse::models::MessageRecord;
use pharma_pulse::{loader, migrate, queries};

fn pg_enabled() -> bool {
    std::env::var("PP_TEST_PG").as_deref() == Ok("1")
}

fn test_config(data_dir: &std::path::Path, csv: &std::path::Path) -> Config {
    let mut config = Config::from_env().unwrap();
    config.data_dir = data_dir.to_path_buf();
    config.detections_csv = csv.to_path_buf();
    config
}

/// Unique suffix so repeated test runs against the same database never
/// collide on the conflict-ignoring inserts.
fn run_tag() -> String {
    format!("t{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn sample_record(id: i64, text: &str) -> MessageRecord {
    MessageRecord {
        id,
        date: Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
        sender_id: Some(42),
        text: Some(text.to_string()),
        has_image: false,
        has_document: false,
        has_video: false,
        has_audio: false,
        media_type: None,
        local_media_path: None,
    }
}

fn write_batch(config: &Config, date: &str, channel: &str, records: &[MessageRecord]) {
    let dir = config.messages_dir().join(date);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{channel}.json")),
        serde_json::to_string_pretty(records).unwrap(),
    )
    .unwrap();
}

#[tokio::test]
async fn loading_the_same_batch_twice_inserts_once() {
    if !pg_enabled() {
        eprintln!("PP_TEST_PG not set, skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let channel = format!("pharma_{}", run_tag());
    let config = test_config(tmp.path(), &PathBuf::from("absent.csv"));
    migrate::run_migrations(&config).await.unwrap();

    write_batch(
        &config,
        "2024-01-02",
        &channel,
        &[sample_record(1, "buy pills now"), sample_record(2, "cream")],
    );

    let first = loader::load_messages(&config).await.unwrap();
    assert_eq!(first, 2);

    // Same input again: every row conflicts, nothing is inserted.
    let second = loader::load_messages(&config).await.unwrap();
    assert_eq!(second, 0);
}

#[tokio::test]
async fn empty_input_is_a_noop_not_an_error() {
    if !pg_enabled() {
        eprintln!("PP_TEST_PG not set, skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path(), &tmp.path().join("absent.csv"));
    assert_eq!(loader::load_messages(&config).await.unwrap(), 0);
    assert_eq!(loader::load_detections(&config).await.unwrap(), 0);
}

#[tokio::test]
async fn detections_csv_loads_and_deduplicates() {
    if !pg_enabled() {
        eprintln!("PP_TEST_PG not set, skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let tag = run_tag();
    let csv = tmp.path().join("yolo_detections.csv");
    std::fs::write(
        &csv,
        format!(
            "message_id,image_path,detected_object_class,confidence_score\n\
             901,images/{tag}/901.jpg,bottle,0.88\n\
             901,images/{tag}/901.jpg,pill,0.61\n"
        ),
    )
    .unwrap();
    let config = test_config(tmp.path(), &csv);
    migrate::run_migrations(&config).await.unwrap();

    assert_eq!(loader::load_detections(&config).await.unwrap(), 2);
    assert_eq!(loader::load_detections(&config).await.unwrap(), 0);
}

/// Seeds the modeled tables the way the dbt step would and checks the four
/// read operations against known row sets.
#[tokio::test]
async fn analytics_queries_over_seeded_fct_tables() {
    if !pg_enabled() {
        eprintln!("PP_TEST_PG not set, skipping");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path(), &PathBuf::from("absent.csv"));
    let channel = format!("pharma_deals_{}", run_tag());

    let pool = pharma_pulse::db::connect(&config).await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fct_messages (
            message_id BIGINT,
            channel_name TEXT,
            date_id DATE,
            message_date TIMESTAMP,
            text TEXT
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fct_image_detections (
            message_id BIGINT,
            image_path TEXT,
            detected_object_class TEXT,
            confidence_score FLOAT
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    // Three messages on 2024-01-01, two on 2024-01-02. The search needle
    // carries the run tag so hits from earlier runs cannot interfere.
    let needle = format!("cream-{channel}");
    let row1 = format!("skin {needle} in stock");
    let row4 = needle.to_uppercase();
    let rows: [(i64, &str, &str); 5] = [
        (1, "2024-01-01", &row1),
        (2, "2024-01-01", "paracetamol"),
        (3, "2024-01-01", "vitamin c"),
        (4, "2024-01-02", &row4),
        (5, "2024-01-02", "syrup"),
    ];
    for (id, date, text) in rows {
        sqlx::query(
            r#"
            INSERT INTO fct_messages (message_id, channel_name, date_id, message_date, text)
            VALUES ($1, $2, $3::date, $3::timestamp, $4)
            "#,
        )
        .bind(id)
        .bind(&channel)
        .bind(date)
        .bind(text)
        .execute(&pool)
        .await
        .unwrap();
    }
    sqlx::query(
        r#"
        INSERT INTO fct_image_detections (message_id, image_path, detected_object_class, confidence_score)
        VALUES (1, 'images/1.jpg', 'bottle', 0.9)
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let activity = queries::channel_activity(&config, &channel).await.unwrap();
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0].date, "2024-01-01");
    assert_eq!(activity[0].message_count, 3);
    assert_eq!(activity[1].date, "2024-01-02");
    assert_eq!(activity[1].message_count, 2);

    let hits = queries::search_messages(&config, &needle, 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    for hit in &hits {
        assert!(hit
            .text
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .contains(&needle));
    }
    // Newest first.
    assert_eq!(hits[0].message_id, 4);
    assert_eq!(hits[1].message_id, 1);

    let detections = queries::image_detections(&config, 1).await.unwrap();
    assert!(!detections.is_empty());
    assert_eq!(detections[0].detected_object_class, "bottle");

    let words = queries::top_products(&config, 10).await.unwrap();
    assert!(words.len() <= 10);
    assert!(!words.is_empty());
}
