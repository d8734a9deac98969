//! Dropout risk prediction
//!
//! Assembles a snapshot of a student's recent history (observations,
//! trends, assessments, lesson completions), runs the binary-risk network
//! and buckets the probability into a tier with a fixed threshold table.
//! Risk factors come from independent rule checks, not from the model
//! probability, so a factor can surface even when the network is
//! optimistic. Assessments are recomputed fresh on every request and never
//! persisted.

use crate::db;
use crate::models::{AffectModel, ReadyGate};
use crate::nn::{Activation, DenseNetwork, NetworkSpec};
use chrono::Utc;
use edupulse_common::types::{
    AssessmentRecord, DropoutRiskAssessment, EmotionTrend, RiskTier, SentimentObservation,
    StudentProfile,
};
use edupulse_common::{Error, EventBus, PulseEvent, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const MODEL_NAME: &str = "dropout-risk";
const WEIGHT_FILE: &str = "risk.json";
const FRESH_SEED: u64 = 0x52_49_53_4b;

/// Fixed risk feature vector width; unused slots stay zero
pub const RISK_FEATURE_DIM: usize = 30;

// History window sizes
const OBSERVATION_WINDOW: i64 = 30;
const TREND_WINDOW: i64 = 7;
const ASSESSMENT_WINDOW: i64 = 10;
const LESSON_WINDOW: i64 = 20;

// Rule thresholds for risk factors
const NEGATIVE_SENTIMENT_MEAN: f32 = -0.5;
const LOW_ENGAGEMENT_LEVEL: f32 = 0.3;
const LOW_ENGAGEMENT_COUNT: usize = 5;
const ASSESSMENT_DECLINE: f32 = 0.2;
const MIN_LESSONS: i64 = 10;

/// Dropout risk predictor service
pub struct DropoutRiskPredictor {
    pool: SqlitePool,
    events: EventBus,
    weight_path: PathBuf,
    network: RwLock<Option<DenseNetwork>>,
    gate: ReadyGate,
}

impl DropoutRiskPredictor {
    pub fn new(model_folder: &std::path::Path, pool: SqlitePool, events: EventBus) -> Self {
        Self {
            pool,
            events,
            weight_path: model_folder.join(WEIGHT_FILE),
            network: RwLock::new(None),
            gate: ReadyGate::new(MODEL_NAME),
        }
    }

    fn spec() -> NetworkSpec {
        NetworkSpec::new(
            RISK_FEATURE_DIM,
            vec![
                (16, Activation::Relu),
                (8, Activation::Relu),
                (1, Activation::Sigmoid),
            ],
        )
    }

    /// Compute a fresh risk assessment for a student.
    ///
    /// Fails with `StudentNotFound` for unknown ids — never a default risk.
    pub async fn predict(&self, student_id: Uuid, deadline: Duration) -> Result<DropoutRiskAssessment> {
        self.gate.wait(deadline).await?;

        let student = db::students::get_student(&self.pool, student_id)
            .await?
            .ok_or(Error::StudentNotFound(student_id))?;

        let observations =
            db::observations::recent_observations(&self.pool, student_id, OBSERVATION_WINDOW)
                .await?;
        let trends = db::trends::recent_trends(&self.pool, student_id, TREND_WINDOW).await?;
        let assessments =
            db::students::recent_assessments(&self.pool, student_id, ASSESSMENT_WINDOW).await?;
        let lessons = db::students::recent_lessons(&self.pool, student_id, LESSON_WINDOW).await?;
        let lesson_count = db::students::lesson_count(&self.pool, student_id).await?;

        let features = build_features(&student, &observations, &trends, &assessments, lesson_count);

        let probability = {
            let guard = self
                .network
                .try_read()
                .map_err(|_| Error::TrainingInProgress(MODEL_NAME))?;
            let network = guard.as_ref().ok_or(Error::ModelNotReady(MODEL_NAME))?;
            network.forward(&features)?[0]
        };

        let tier = RiskTier::from_probability(probability);
        let risk_factors = derive_risk_factors(&observations, &assessments, lesson_count);
        let recommendations = build_recommendations(tier, &risk_factors);
        let confidence = data_confidence(
            observations.len(),
            trends.len(),
            assessments.len(),
            lessons.len(),
        );

        let _ = self.events.emit(PulseEvent::RiskAssessed {
            student_id,
            tier,
            probability,
            timestamp: Utc::now(),
        });

        debug!(
            student_id = %student_id,
            probability,
            tier = %tier,
            factors = risk_factors.len(),
            "Risk assessment computed"
        );

        Ok(DropoutRiskAssessment {
            student_id,
            tier,
            probability,
            risk_factors,
            recommendations,
            confidence,
            assessed_at: Utc::now(),
        })
    }
}

/// Build the fixed-width risk feature vector.
///
/// Occupied slots: age, cognitive level, reading level, mean recent
/// sentiment (rescaled to [0, 1]), mean recent engagement, mean recent
/// assessment score, normalized completed-lesson count, mean stress-trend
/// delta. The remainder stays zero-padded.
fn build_features(
    student: &StudentProfile,
    observations: &[SentimentObservation],
    trends: &[EmotionTrend],
    assessments: &[AssessmentRecord],
    lesson_count: i64,
) -> Vec<f32> {
    let mut features = vec![0.0f32; RISK_FEATURE_DIM];

    features[0] = (student.age as f32 / 18.0).min(1.0);
    features[1] = student.cognitive_level.clamp(0.0, 1.0);
    features[2] = student.reading_level.clamp(0.0, 1.0);

    if !observations.is_empty() {
        let mean_sentiment = observations
            .iter()
            .map(|o| o.sentiment_score)
            .sum::<f32>()
            / observations.len() as f32;
        features[3] = (mean_sentiment + 1.0) / 2.0;

        features[4] = observations
            .iter()
            .map(|o| o.engagement_level)
            .sum::<f32>()
            / observations.len() as f32;
    }

    if !assessments.is_empty() {
        features[5] =
            assessments.iter().map(|a| a.score).sum::<f32>() / assessments.len() as f32;
    }

    features[6] = (lesson_count as f32 / 50.0).min(1.0);

    // Mean delta between consecutive trend slots (rows arrive newest first);
    // positive means stress has been climbing
    if trends.len() >= 2 {
        let deltas: Vec<f32> = trends
            .windows(2)
            .map(|pair| pair[0].stress_trend - pair[1].stress_trend)
            .collect();
        let mean_delta = deltas.iter().sum::<f32>() / deltas.len() as f32;
        features[7] = ((mean_delta.clamp(-1.0, 1.0)) + 1.0) / 2.0;
    }

    features
}

/// Rule-derived risk factors, independent of the model probability
fn derive_risk_factors(
    observations: &[SentimentObservation],
    assessments: &[AssessmentRecord],
    lesson_count: i64,
) -> Vec<String> {
    let mut factors = Vec::new();

    let last_ten: Vec<_> = observations.iter().take(10).collect();
    if !last_ten.is_empty() {
        let mean_sentiment =
            last_ten.iter().map(|o| o.sentiment_score).sum::<f32>() / last_ten.len() as f32;
        if mean_sentiment < NEGATIVE_SENTIMENT_MEAN {
            factors.push("persistent negative sentiment".to_string());
        }

        let low_engagement = last_ten
            .iter()
            .filter(|o| o.engagement_level < LOW_ENGAGEMENT_LEVEL)
            .count();
        if low_engagement > LOW_ENGAGEMENT_COUNT {
            factors.push("low participation".to_string());
        }
    }

    // Assessments arrive newest first; "first" of the window is the oldest
    let last_five: Vec<_> = assessments.iter().take(5).collect();
    if last_five.len() >= 2 {
        let newest = last_five.first().expect("nonempty").score;
        let oldest = last_five.last().expect("nonempty").score;
        if oldest - newest > ASSESSMENT_DECLINE {
            factors.push("academic decline".to_string());
        }
    }

    if lesson_count < MIN_LESSONS {
        factors.push("low lesson participation".to_string());
    }

    factors
}

/// Static per-tier recommendations extended with factor-specific additions
fn build_recommendations(tier: RiskTier, factors: &[String]) -> Vec<String> {
    let base: &[&str] = match tier {
        RiskTier::Low => &["continue the current learning plan"],
        RiskTier::Medium => &[
            "schedule a casual check-in this week",
            "review recent lesson difficulty",
        ],
        RiskTier::High => &[
            "schedule a teacher conference within three days",
            "reduce workload until engagement recovers",
            "enable daily progress monitoring",
        ],
        RiskTier::Critical => &[
            "contact the family today",
            "assign a dedicated mentor",
            "switch to an individualized learning plan",
            "enable daily progress monitoring",
        ],
    };
    let mut recommendations: Vec<String> = base.iter().map(|s| s.to_string()).collect();

    for factor in factors {
        match factor.as_str() {
            "persistent negative sentiment" => recommendations
                .push("add positive-reinforcement activities to each session".to_string()),
            "low participation" => recommendations
                .push("introduce collaborative activities with peers".to_string()),
            "academic decline" => {
                recommendations.push("revisit prerequisites for recent topics".to_string())
            }
            "low lesson participation" => {
                recommendations.push("lower the barrier to starting a lesson".to_string())
            }
            _ => {}
        }
    }

    recommendations
}

/// Confidence grows with history coverage; a thin history caps it low
fn data_confidence(observations: usize, trends: usize, assessments: usize, lessons: usize) -> f32 {
    let coverage = (observations as f32 / OBSERVATION_WINDOW as f32
        + trends as f32 / TREND_WINDOW as f32
        + assessments as f32 / ASSESSMENT_WINDOW as f32
        + lessons as f32 / LESSON_WINDOW as f32)
        / 4.0;
    0.3 + 0.7 * coverage.min(1.0)
}

#[async_trait::async_trait]
impl AffectModel for DropoutRiskPredictor {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    async fn initialize(&self) -> Result<()> {
        let network = DenseNetwork::load_or_fresh(&self.weight_path, &Self::spec(), FRESH_SEED);
        *self.network.write().await = Some(network);
        self.gate.mark_ready();
        info!("Dropout risk predictor ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edupulse_common::types::{ActivityKind, EmotionLabel};

    fn observation(student_id: Uuid, sentiment: f32, engagement: f32, age_secs: i64) -> SentimentObservation {
        SentimentObservation {
            id: Uuid::new_v4(),
            student_id,
            session_id: None,
            sentiment_score: sentiment,
            emotion: EmotionLabel::Neutral,
            confidence: 0.9,
            intensity: 0.5,
            stress_level: 0.3,
            engagement_level: engagement,
            frustration_level: 0.1,
            activity_kind: ActivityKind::Lesson,
            content_id: None,
            is_alert: false,
            alert_kind: None,
            alert_message: None,
            recorded_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    fn assessment(student_id: Uuid, score: f32, age_secs: i64) -> AssessmentRecord {
        AssessmentRecord {
            id: Uuid::new_v4(),
            student_id,
            score,
            taken_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    fn student(id: Uuid) -> StudentProfile {
        StudentProfile {
            id,
            name: "Robin Diaz".to_string(),
            age: 12,
            cognitive_level: 0.6,
            reading_level: 0.5,
            assigned_teacher_id: None,
            language: "en".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn negative_sentiment_window_raises_the_factor() {
        let id = Uuid::new_v4();
        let observations: Vec<_> = (0..10)
            .map(|i| observation(id, -0.7, 0.6, i))
            .collect();
        let factors = derive_risk_factors(&observations, &[], 20);
        assert!(factors.contains(&"persistent negative sentiment".to_string()));
    }

    #[test]
    fn a_single_recent_negative_observation_affects_the_window() {
        // One strongly negative observation among ten neutral ones is not
        // enough for the mean rule, but six low-engagement readings are
        let id = Uuid::new_v4();
        let mut observations = vec![observation(id, -0.9, 0.1, 0)];
        for i in 1..10 {
            observations.push(observation(id, 0.0, 0.1, i));
        }
        // engagement 0.1 on 10 of 10
        let factors = derive_risk_factors(&observations, &[], 20);
        assert!(factors.contains(&"low participation".to_string()));
    }

    #[test]
    fn academic_decline_compares_first_and_last_of_five() {
        let id = Uuid::new_v4();
        // Newest first: latest score 0.4, oldest of the window 0.8
        let assessments = vec![
            assessment(id, 0.4, 0),
            assessment(id, 0.5, 10),
            assessment(id, 0.6, 20),
            assessment(id, 0.7, 30),
            assessment(id, 0.8, 40),
        ];
        let factors = derive_risk_factors(&[], &assessments, 20);
        assert!(factors.contains(&"academic decline".to_string()));

        // Improving scores do not trigger it
        let improving = vec![
            assessment(id, 0.8, 0),
            assessment(id, 0.6, 10),
            assessment(id, 0.4, 20),
        ];
        let factors = derive_risk_factors(&[], &improving, 20);
        assert!(!factors.contains(&"academic decline".to_string()));
    }

    #[test]
    fn few_lessons_raise_the_participation_factor() {
        let factors = derive_risk_factors(&[], &[], 9);
        assert!(factors.contains(&"low lesson participation".to_string()));
        let factors = derive_risk_factors(&[], &[], 10);
        assert!(!factors.contains(&"low lesson participation".to_string()));
    }

    #[test]
    fn recommendations_extend_with_factor_specifics() {
        let recommendations = build_recommendations(
            RiskTier::High,
            &["academic decline".to_string()],
        );
        assert!(recommendations
            .iter()
            .any(|r| r.contains("teacher conference")));
        assert!(recommendations.iter().any(|r| r.contains("prerequisites")));
    }

    #[test]
    fn feature_vector_has_fixed_width_and_zero_padding() {
        let id = Uuid::new_v4();
        let features = build_features(&student(id), &[], &[], &[], 0);
        assert_eq!(features.len(), RISK_FEATURE_DIM);
        // Slots beyond the occupied prefix stay zero
        assert!(features[8..].iter().all(|&v| v == 0.0));
        // Neutral defaults for missing history
        assert_eq!(features[3], 0.0);
        assert_eq!(features[5], 0.0);
    }

    #[tokio::test]
    async fn unknown_student_is_student_not_found_never_a_default() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let events = EventBus::new(8);
        let dir = tempfile::tempdir().unwrap();
        let predictor = DropoutRiskPredictor::new(dir.path(), pool, events);
        predictor.initialize().await.unwrap();

        let unknown = Uuid::new_v4();
        let result = predictor.predict(unknown, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::StudentNotFound(id)) if id == unknown));
    }

    #[tokio::test]
    async fn prediction_returns_consistent_tier_and_probability() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let events = EventBus::new(8);
        let dir = tempfile::tempdir().unwrap();
        let predictor = DropoutRiskPredictor::new(dir.path(), pool.clone(), events);
        predictor.initialize().await.unwrap();

        let s = student(Uuid::new_v4());
        crate::db::students::insert_student(&pool, &s).await.unwrap();
        for i in 0..12 {
            crate::db::observations::insert_observation(
                &pool,
                &observation(s.id, -0.7, 0.1, i),
            )
            .await
            .unwrap();
        }

        let assessment = predictor.predict(s.id, Duration::from_secs(5)).await.unwrap();
        assert!((0.0..=1.0).contains(&assessment.probability));
        assert_eq!(assessment.tier, RiskTier::from_probability(assessment.probability));
        assert!(assessment
            .risk_factors
            .contains(&"persistent negative sentiment".to_string()));
        assert!(assessment
            .risk_factors
            .contains(&"low participation".to_string()));
        assert!(!assessment.recommendations.is_empty());
        assert!((0.0..=1.0).contains(&assessment.confidence));
    }
}
