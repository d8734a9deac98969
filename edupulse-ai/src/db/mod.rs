//! Database access for the affect pipeline
//!
//! SQLite via sqlx. The pipeline owns the observation/trend/alert tables;
//! the student/assessment/lesson tables belong to the broader platform and
//! are only read here (the insert helpers exist for seeding and tests).

pub mod alerts;
pub mod observations;
pub mod students;
pub mod trends;

use edupulse_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool.
///
/// Connects with mode=rwc (read, write, create) and runs table migrations.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests.
///
/// Pinned to a single connection: every pooled connection to
/// `sqlite::memory:` would otherwise open its own empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create pipeline tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            cognitive_level REAL NOT NULL DEFAULT 0.5,
            reading_level REAL NOT NULL DEFAULT 0.5,
            assigned_teacher_id TEXT,
            language TEXT NOT NULL DEFAULT 'en',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assessments (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            score REAL NOT NULL,
            taken_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lesson_completions (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            completed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only observation log; rows are never updated or deleted
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sentiment_observations (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            session_id TEXT,
            sentiment_score REAL NOT NULL,
            emotion TEXT NOT NULL,
            confidence REAL NOT NULL,
            intensity REAL NOT NULL,
            stress_level REAL NOT NULL,
            engagement_level REAL NOT NULL,
            frustration_level REAL NOT NULL,
            activity_kind TEXT NOT NULL,
            content_id TEXT,
            is_alert INTEGER NOT NULL DEFAULT 0,
            alert_kind TEXT,
            alert_message TEXT,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_observations_student_time
            ON sentiment_observations(student_id, recorded_at)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS emotion_trends (
            student_id TEXT NOT NULL,
            slot_date TEXT NOT NULL,
            slot_hour INTEGER NOT NULL,
            average_sentiment REAL NOT NULL,
            dominant_emotion TEXT NOT NULL,
            stress_trend REAL NOT NULL,
            engagement_trend REAL NOT NULL,
            total_analyses INTEGER NOT NULL,
            positive_count INTEGER NOT NULL DEFAULT 0,
            negative_count INTEGER NOT NULL DEFAULT 0,
            neutral_count INTEGER NOT NULL DEFAULT 0,
            n_joy INTEGER NOT NULL DEFAULT 0,
            n_sadness INTEGER NOT NULL DEFAULT 0,
            n_frustration INTEGER NOT NULL DEFAULT 0,
            n_anxiety INTEGER NOT NULL DEFAULT 0,
            n_boredom INTEGER NOT NULL DEFAULT 0,
            n_excitement INTEGER NOT NULL DEFAULT 0,
            n_fear INTEGER NOT NULL DEFAULT 0,
            n_neutral INTEGER NOT NULL DEFAULT 0,
            n_uncertainty INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (student_id, slot_date, slot_hour)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sentiment_alerts (
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            recipient_teacher_id TEXT,
            alert_kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            resolved_by TEXT,
            resolution_notes TEXT,
            resolved_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");
    Ok(())
}

/// Parse a TEXT uuid column value
pub(crate) fn parse_uuid(value: &str) -> edupulse_common::Result<uuid::Uuid> {
    value
        .parse()
        .map_err(|e| edupulse_common::Error::Internal(format!("Bad uuid in database: {}", e)))
}
