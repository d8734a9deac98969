//! Emotion trend aggregation service
//!
//! Thin service over the trend table: merges observations into their
//! (student, date, hour) slot and serves the read contract. The merge
//! itself is atomic at the database layer (see `db::trends`).

use crate::db;
use chrono::{Duration as ChronoDuration, Utc};
use edupulse_common::types::{EmotionTrend, SentimentObservation};
use edupulse_common::{Error, EventBus, PulseEvent, Result};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Trend aggregation service
#[derive(Clone)]
pub struct TrendAggregator {
    pool: SqlitePool,
    events: EventBus,
}

impl TrendAggregator {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Merge one observation into its trend slot.
    pub async fn record_observation(
        &self,
        observation: &SentimentObservation,
    ) -> Result<EmotionTrend> {
        let trend = db::trends::upsert_observation(&self.pool, observation).await?;

        let _ = self.events.emit(PulseEvent::TrendUpdated {
            student_id: trend.student_id,
            slot_date: trend.slot_date,
            slot_hour: trend.slot_hour,
            total_analyses: trend.total_analyses,
            timestamp: Utc::now(),
        });

        debug!(
            student_id = %trend.student_id,
            slot_hour = trend.slot_hour,
            total = trend.total_analyses,
            "Trend slot merged"
        );
        Ok(trend)
    }

    /// Trends for the last `days_back` days, ascending by (date, hour).
    ///
    /// Fails with `StudentNotFound` for unknown ids rather than returning an
    /// empty sequence that could be mistaken for "no activity".
    pub async fn get_trends(&self, student_id: Uuid, days_back: i64) -> Result<Vec<EmotionTrend>> {
        if db::students::get_student(&self.pool, student_id)
            .await?
            .is_none()
        {
            return Err(Error::StudentNotFound(student_id));
        }

        let from_date = (Utc::now() - ChronoDuration::days(days_back.max(0))).date_naive();
        db::trends::trends_since(&self.pool, student_id, from_date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use edupulse_common::types::{ActivityKind, EmotionLabel, StudentProfile};

    async fn fixture() -> (TrendAggregator, SqlitePool, Uuid) {
        let pool = db::init_memory_pool().await.unwrap();
        let events = EventBus::new(16);
        let student_id = Uuid::new_v4();
        db::students::insert_student(
            &pool,
            &StudentProfile {
                id: student_id,
                name: "Sam Ortiz".to_string(),
                age: 9,
                cognitive_level: 0.5,
                reading_level: 0.5,
                assigned_teacher_id: None,
                language: "en".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        (TrendAggregator::new(pool.clone(), events), pool, student_id)
    }

    fn observation(student_id: Uuid, sentiment: f32) -> SentimentObservation {
        SentimentObservation {
            id: Uuid::new_v4(),
            student_id,
            session_id: None,
            sentiment_score: sentiment,
            emotion: EmotionLabel::Neutral,
            confidence: 0.9,
            intensity: 0.5,
            stress_level: 0.2,
            engagement_level: 0.7,
            frustration_level: 0.1,
            activity_kind: ActivityKind::Lesson,
            content_id: None,
            is_alert: false,
            alert_kind: None,
            alert_message: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_then_read_round_trips() {
        let (aggregator, _pool, student_id) = fixture().await;

        aggregator
            .record_observation(&observation(student_id, 0.4))
            .await
            .unwrap();

        let trends = aggregator.get_trends(student_id, 30).await.unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].total_analyses, 1);
    }

    #[tokio::test]
    async fn unknown_student_read_is_student_not_found() {
        let (aggregator, _pool, _) = fixture().await;
        let unknown = Uuid::new_v4();
        let result = aggregator.get_trends(unknown, 7).await;
        assert!(matches!(result, Err(Error::StudentNotFound(id)) if id == unknown));
    }

    #[tokio::test]
    async fn trend_update_emits_an_event() {
        let (aggregator, _pool, student_id) = fixture().await;
        let mut rx = aggregator.events.subscribe();

        aggregator
            .record_observation(&observation(student_id, 0.1))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            PulseEvent::TrendUpdated { total_analyses, .. } => assert_eq!(total_analyses, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
