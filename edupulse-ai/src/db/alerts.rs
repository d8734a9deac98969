//! Sentiment alert persistence
//!
//! Alerts are created by the alert evaluator and mutated only by the
//! resolve operation. Alerts without an assigned recipient are persisted
//! with a NULL recipient and surfaced through `unassigned_alerts` instead
//! of being dropped.

use super::parse_uuid;
use chrono::{DateTime, Utc};
use edupulse_common::types::{AlertKind, AlertSeverity, SentimentAlert};
use edupulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Persist one alert
pub async fn insert_alert(pool: &SqlitePool, alert: &SentimentAlert) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sentiment_alerts (
            id, student_id, recipient_teacher_id, alert_kind, severity,
            message, resolved, resolved_by, resolution_notes, resolved_at,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(alert.id.to_string())
    .bind(alert.student_id.to_string())
    .bind(alert.recipient_teacher_id.map(|id| id.to_string()))
    .bind(alert.kind.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.message)
    .bind(alert.resolved)
    .bind(alert.resolved_by.map(|id| id.to_string()))
    .bind(&alert.resolution_notes)
    .bind(alert.resolved_at.map(|dt| dt.to_rfc3339()))
    .bind(alert.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark an alert resolved; the only mutation alerts support
pub async fn resolve_alert(
    pool: &SqlitePool,
    alert_id: Uuid,
    resolver: Uuid,
    notes: Option<&str>,
) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE sentiment_alerts
        SET resolved = 1, resolved_by = ?, resolution_notes = ?, resolved_at = ?
        WHERE id = ? AND resolved = 0
        "#,
    )
    .bind(resolver.to_string())
    .bind(notes)
    .bind(Utc::now().to_rfc3339())
    .bind(alert_id.to_string())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::InvalidInput(format!(
            "Alert {} not found or already resolved",
            alert_id
        )));
    }
    Ok(())
}

/// Alerts for one student, newest first
pub async fn alerts_for_student(
    pool: &SqlitePool,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<SentimentAlert>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, recipient_teacher_id, alert_kind, severity,
               message, resolved, resolved_by, resolution_notes, resolved_at,
               created_at
        FROM sentiment_alerts
        WHERE student_id = ?
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(student_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_alert).collect()
}

/// Unresolved alerts with no assigned recipient (administrator queue)
pub async fn unassigned_alerts(pool: &SqlitePool) -> Result<Vec<SentimentAlert>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, recipient_teacher_id, alert_kind, severity,
               message, resolved, resolved_by, resolution_notes, resolved_at,
               created_at
        FROM sentiment_alerts
        WHERE recipient_teacher_id IS NULL AND resolved = 0
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_alert).collect()
}

fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<SentimentAlert> {
    let id: String = row.try_get("id")?;
    let student_id: String = row.try_get("student_id")?;
    let recipient: Option<String> = row.try_get("recipient_teacher_id")?;
    let kind: String = row.try_get("alert_kind")?;
    let severity: String = row.try_get("severity")?;
    let resolved_by: Option<String> = row.try_get("resolved_by")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(SentimentAlert {
        id: parse_uuid(&id)?,
        student_id: parse_uuid(&student_id)?,
        recipient_teacher_id: recipient.as_deref().map(parse_uuid).transpose()?,
        kind: kind.parse::<AlertKind>().map_err(Error::Internal)?,
        severity: severity.parse::<AlertSeverity>().map_err(Error::Internal)?,
        message: row.try_get("message")?,
        resolved: row.try_get("resolved")?,
        resolved_by: resolved_by.as_deref().map(parse_uuid).transpose()?,
        resolution_notes: row.try_get("resolution_notes")?,
        resolved_at: resolved_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in database: {}", e)))
}
