//! Threshold alerting over sentiment predictions
//!
//! Rules are checked in listed order and the first trigger wins; multiple
//! simultaneous triggers are not merged. Severity comes from
//! `AlertKind::severity`, never from the rule site.

use crate::db;
use crate::models::sentiment::RawPredictions;
use chrono::Utc;
use edupulse_common::types::{AlertKind, AlertSeverity, SentimentAlert};
use edupulse_common::{EventBus, PulseEvent, Result};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

const STRESS_THRESHOLD: f32 = 0.8;
const ENGAGEMENT_FLOOR: f32 = 0.2;
const FRUSTRATION_THRESHOLD: f32 = 0.7;
const DISTRESS_SENTIMENT: f32 = -0.8;
const DISTRESS_STRESS: f32 = 0.6;

/// A triggered alert before persistence
#[derive(Debug, Clone)]
pub struct TriggeredAlert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Check the alert rules against one set of predictions.
///
/// Rule order is part of the contract: a reading that is both high-stress
/// and emotionally distressed reports high-stress.
pub fn evaluate(predictions: &RawPredictions) -> Option<TriggeredAlert> {
    let (kind, message) = if predictions.stress > STRESS_THRESHOLD {
        (
            AlertKind::HighStress,
            format!("Stress level {:.2} above threshold", predictions.stress),
        )
    } else if predictions.engagement < ENGAGEMENT_FLOOR {
        (
            AlertKind::LowEngagement,
            format!("Engagement level {:.2} below floor", predictions.engagement),
        )
    } else if predictions.frustration > FRUSTRATION_THRESHOLD {
        (
            AlertKind::FrustrationSpike,
            format!("Frustration level {:.2} above threshold", predictions.frustration),
        )
    } else if predictions.sentiment < DISTRESS_SENTIMENT && predictions.stress > DISTRESS_STRESS {
        (
            AlertKind::EmotionalDistress,
            format!(
                "Sentiment {:.2} with stress {:.2} indicates emotional distress",
                predictions.sentiment, predictions.stress
            ),
        )
    } else {
        return None;
    };

    Some(TriggeredAlert {
        kind,
        severity: kind.severity(),
        message,
    })
}

/// Persist a triggered alert addressed to the student's assigned teacher.
///
/// Students without a teacher get a NULL recipient (the unassigned queue)
/// instead of a silent drop. Emits `AlertRaised` either way.
pub async fn persist_alert(
    pool: &SqlitePool,
    events: &EventBus,
    student_id: Uuid,
    triggered: &TriggeredAlert,
) -> Result<SentimentAlert> {
    let recipient = match db::students::get_student(pool, student_id).await {
        Ok(Some(student)) => student.assigned_teacher_id,
        Ok(None) => None,
        Err(e) => {
            warn!("Teacher lookup failed, routing alert to unassigned queue: {}", e);
            None
        }
    };

    let alert = SentimentAlert {
        id: Uuid::new_v4(),
        student_id,
        recipient_teacher_id: recipient,
        kind: triggered.kind,
        severity: triggered.severity,
        message: triggered.message.clone(),
        resolved: false,
        resolved_by: None,
        resolution_notes: None,
        resolved_at: None,
        created_at: Utc::now(),
    };

    db::alerts::insert_alert(pool, &alert).await?;

    let _ = events.emit(PulseEvent::AlertRaised {
        student_id,
        alert_id: Some(alert.id),
        kind: alert.kind,
        severity: alert.severity,
        message: alert.message.clone(),
        timestamp: alert.created_at,
    });

    debug!(
        student_id = %student_id,
        kind = %alert.kind,
        severity = %alert.severity,
        "Alert persisted"
    );
    Ok(alert)
}
