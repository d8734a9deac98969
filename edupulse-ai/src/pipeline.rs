//! Sentiment analysis pipeline
//!
//! Sequences one observation end to end: inference → alert-rule check →
//! observation persistence → trend merge → alert persistence, strictly in
//! that order. The observation INSERT is the primary effect and its failure
//! propagates; trend and alert persistence are side paths whose failures
//! are logged and swallowed so the caller still receives the observation.

use crate::models::sentiment::{AnalysisRequest, SentimentModel};
use crate::trends::TrendAggregator;
use crate::{alerts, db};
use chrono::Utc;
use edupulse_common::types::SentimentObservation;
use edupulse_common::{EventBus, PulseEvent, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// End-to-end sentiment analysis service
#[derive(Clone)]
pub struct AnalysisPipeline {
    sentiment: Arc<SentimentModel>,
    trends: TrendAggregator,
    pool: SqlitePool,
    events: EventBus,
}

impl AnalysisPipeline {
    pub fn new(
        sentiment: Arc<SentimentModel>,
        trends: TrendAggregator,
        pool: SqlitePool,
        events: EventBus,
    ) -> Self {
        Self {
            sentiment,
            trends,
            pool,
            events,
        }
    }

    /// Analyze one signal bundle and record the observation.
    ///
    /// Returns the complete observation (alert flags included) even when
    /// the trend or alert side paths fail.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        deadline: Duration,
    ) -> Result<SentimentObservation> {
        let outcome = self.sentiment.analyze(request, deadline).await?;

        // The alert rule check is pure and runs before persistence so the
        // observation row carries its alert flags atomically. Zero-confidence
        // neutral results (no signal modalities) carry no real levels and
        // must not trip threshold rules.
        let triggered = if outcome.predictions.confidence > 0.0 {
            alerts::evaluate(&outcome.predictions)
        } else {
            None
        };

        let mut observation = outcome.observation;
        if let Some(alert) = &triggered {
            observation.is_alert = true;
            observation.alert_kind = Some(alert.kind);
            observation.alert_message = Some(alert.message.clone());
        }

        db::observations::insert_observation(&self.pool, &observation).await?;
        let _ = self.events.emit(PulseEvent::ObservationRecorded {
            student_id: observation.student_id,
            observation_id: observation.id,
            emotion: observation.emotion,
            sentiment_score: observation.sentiment_score,
            timestamp: Utc::now(),
        });

        if let Err(e) = self.trends.record_observation(&observation).await {
            warn!(
                student_id = %observation.student_id,
                "Trend update failed, observation already recorded: {}",
                e
            );
        }

        if let Some(alert) = &triggered {
            if let Err(e) =
                alerts::persist_alert(&self.pool, &self.events, observation.student_id, alert)
                    .await
            {
                warn!(
                    student_id = %observation.student_id,
                    "Alert persistence failed, observation already recorded: {}",
                    e
                );
            }
        }

        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AffectModel;
    use edupulse_common::types::{ActivityKind, StudentProfile};
    use uuid::Uuid;

    async fn fixture() -> (AnalysisPipeline, SqlitePool, Uuid) {
        let pool = db::init_memory_pool().await.unwrap();
        let events = EventBus::new(32);
        let dir = tempfile::tempdir().unwrap();

        let sentiment = Arc::new(SentimentModel::new(dir.path()));
        sentiment.initialize().await.unwrap();

        let trends = TrendAggregator::new(pool.clone(), events.clone());
        let pipeline = AnalysisPipeline::new(sentiment, trends, pool.clone(), events);

        let student_id = Uuid::new_v4();
        db::students::insert_student(
            &pool,
            &StudentProfile {
                id: student_id,
                name: "Kai Petrov".to_string(),
                age: 10,
                cognitive_level: 0.5,
                reading_level: 0.5,
                assigned_teacher_id: Some(Uuid::new_v4()),
                language: "en".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        (pipeline, pool, student_id)
    }

    #[tokio::test]
    async fn analyze_persists_observation_and_updates_trend() {
        let (pipeline, pool, student_id) = fixture().await;

        let request = AnalysisRequest {
            text: Some("I love learning about planets, this is great"),
            activity_kind: ActivityKind::Lesson,
            ..AnalysisRequest::new(student_id)
        };
        let observation = pipeline
            .analyze(&request, Duration::from_secs(5))
            .await
            .unwrap();

        let stored = db::observations::recent_observations(&pool, student_id, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, observation.id);

        let trends = db::trends::recent_trends(&pool, student_id, 5).await.unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].total_analyses, 1);
    }

    #[tokio::test]
    async fn empty_signal_bundle_records_a_neutral_observation() {
        let (pipeline, pool, student_id) = fixture().await;

        let request = AnalysisRequest::new(student_id);
        let observation = pipeline
            .analyze(&request, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(observation.confidence, 0.0);
        assert_eq!(observation.sentiment_score, 0.0);
        assert!(!observation.is_alert);

        let stored = db::observations::recent_observations(&pool, student_id, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1, "neutral observations are still recorded");
    }
}
