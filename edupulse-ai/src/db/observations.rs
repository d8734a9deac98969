//! Sentiment observation persistence
//!
//! The observation log is append-only: one INSERT per analysis call with
//! every field bound together, no UPDATE or DELETE path.

use super::parse_uuid;
use edupulse_common::types::{ActivityKind, AlertKind, EmotionLabel, SentimentObservation};
use edupulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Persist one observation
pub async fn insert_observation(
    pool: &SqlitePool,
    observation: &SentimentObservation,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sentiment_observations (
            id, student_id, session_id, sentiment_score, emotion, confidence,
            intensity, stress_level, engagement_level, frustration_level,
            activity_kind, content_id, is_alert, alert_kind, alert_message,
            recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(observation.id.to_string())
    .bind(observation.student_id.to_string())
    .bind(observation.session_id.map(|id| id.to_string()))
    .bind(observation.sentiment_score)
    .bind(observation.emotion.as_str())
    .bind(observation.confidence)
    .bind(observation.intensity)
    .bind(observation.stress_level)
    .bind(observation.engagement_level)
    .bind(observation.frustration_level)
    .bind(observation.activity_kind.as_str())
    .bind(&observation.content_id)
    .bind(observation.is_alert)
    .bind(observation.alert_kind.map(|k| k.as_str()))
    .bind(&observation.alert_message)
    .bind(observation.recorded_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent observations for a student, newest first
pub async fn recent_observations(
    pool: &SqlitePool,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<SentimentObservation>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, session_id, sentiment_score, emotion, confidence,
               intensity, stress_level, engagement_level, frustration_level,
               activity_kind, content_id, is_alert, alert_kind, alert_message,
               recorded_at
        FROM sentiment_observations
        WHERE student_id = ?
        ORDER BY recorded_at DESC
        LIMIT ?
        "#,
    )
    .bind(student_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_observation).collect()
}

fn row_to_observation(row: &sqlx::sqlite::SqliteRow) -> Result<SentimentObservation> {
    let emotion: String = row.try_get("emotion")?;
    let activity: String = row.try_get("activity_kind")?;
    let alert_kind: Option<String> = row.try_get("alert_kind")?;
    let session_id: Option<String> = row.try_get("session_id")?;
    let recorded_at: String = row.try_get("recorded_at")?;
    let id: String = row.try_get("id")?;
    let student_id: String = row.try_get("student_id")?;

    Ok(SentimentObservation {
        id: parse_uuid(&id)?,
        student_id: parse_uuid(&student_id)?,
        session_id: session_id.as_deref().map(parse_uuid).transpose()?,
        sentiment_score: row.try_get("sentiment_score")?,
        emotion: emotion
            .parse::<EmotionLabel>()
            .map_err(Error::Internal)?,
        confidence: row.try_get("confidence")?,
        intensity: row.try_get("intensity")?,
        stress_level: row.try_get("stress_level")?,
        engagement_level: row.try_get("engagement_level")?,
        frustration_level: row.try_get("frustration_level")?,
        activity_kind: activity
            .parse::<ActivityKind>()
            .map_err(Error::Internal)?,
        content_id: row.try_get("content_id")?,
        is_alert: row.try_get("is_alert")?,
        alert_kind: alert_kind
            .as_deref()
            .map(|s| s.parse::<AlertKind>().map_err(Error::Internal))
            .transpose()?,
        alert_message: row.try_get("alert_message")?,
        recorded_at: chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|e| Error::Internal(format!("Bad timestamp in database: {}", e)))?
            .with_timezone(&chrono::Utc),
    })
}
