//! Sentiment / emotion inference
//!
//! Fuses text, audio and behavioral features into one observation per call.
//! The network emits seven raw signals; the emotion label is then assigned
//! by a deterministic rule cascade evaluated top-to-bottom. The cascade
//! ordering is load-bearing: thresholds overlap, and a case matching both
//! the joy and excitement rules must resolve to joy.

use crate::features;
use crate::models::{AffectModel, AudioClip, ReadyGate};
use crate::nn::{Activation, DenseNetwork, NetworkSpec};
use chrono::Utc;
use edupulse_common::types::{ActivityKind, BehaviorMetrics, EmotionLabel, SentimentObservation};
use edupulse_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const MODEL_NAME: &str = "sentiment";
const WEIGHT_FILE: &str = "sentiment.json";
const FRESH_SEED: u64 = 0x53_45_4e_54;

/// Raw network outputs for one analysis call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPredictions {
    /// Affective valence in [-1, 1]
    pub sentiment: f32,
    pub confidence: f32,
    pub intensity: f32,
    pub stress: f32,
    pub engagement: f32,
    pub frustration: f32,
    pub attention: f32,
}

impl RawPredictions {
    /// Zero/neutral predictions used when no signal modality is present
    pub fn neutral() -> Self {
        Self {
            sentiment: 0.0,
            confidence: 0.0,
            intensity: 0.0,
            stress: 0.0,
            engagement: 0.0,
            frustration: 0.0,
            attention: 0.0,
        }
    }

    fn from_outputs(outputs: &[f32]) -> Result<Self> {
        if outputs.len() != 7 {
            return Err(Error::Internal(format!(
                "Sentiment network emitted {} outputs, expected 7",
                outputs.len()
            )));
        }
        Ok(Self {
            // Output unit is sigmoid; valence lives in [-1, 1]
            sentiment: outputs[0] * 2.0 - 1.0,
            confidence: outputs[1],
            intensity: outputs[2],
            stress: outputs[3],
            engagement: outputs[4],
            frustration: outputs[5],
            attention: outputs[6],
        })
    }
}

/// Assign the emotion label for a set of predictions.
///
/// Rules are evaluated in order; the first match wins.
pub fn classify_emotion(p: &RawPredictions) -> EmotionLabel {
    if p.sentiment > 0.6 && p.engagement > 0.7 {
        EmotionLabel::Joy
    } else if p.sentiment < -0.6 {
        EmotionLabel::Sadness
    } else if p.frustration > 0.7 {
        EmotionLabel::Frustration
    } else if p.stress > 0.7 {
        EmotionLabel::Anxiety
    } else if p.engagement < 0.3 {
        EmotionLabel::Boredom
    } else if p.sentiment > 0.3 && p.engagement > 0.5 {
        EmotionLabel::Excitement
    } else if p.sentiment < -0.3 && p.stress > 0.5 {
        EmotionLabel::Fear
    } else if p.sentiment.abs() < 0.2 {
        EmotionLabel::Neutral
    } else {
        EmotionLabel::Uncertainty
    }
}

/// One analysis request; at least one signal modality should be present.
/// With none present the model returns the neutral zero-confidence
/// observation instead of an error.
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub student_id: Uuid,
    pub session_id: Option<Uuid>,
    pub activity_kind: ActivityKind,
    pub content_id: Option<String>,
    pub text: Option<&'a str>,
    pub audio: Option<&'a AudioClip>,
    pub behavior: Option<&'a BehaviorMetrics>,
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            session_id: None,
            activity_kind: ActivityKind::Other,
            content_id: None,
            text: None,
            audio: None,
            behavior: None,
        }
    }

    fn has_signals(&self) -> bool {
        self.text.is_some() || self.audio.is_some() || self.behavior.is_some()
    }
}

/// Analysis result: the observation plus the raw predictions behind it
/// (the alert evaluator consumes the predictions directly)
#[derive(Debug, Clone)]
pub struct SentimentOutcome {
    pub observation: SentimentObservation,
    pub predictions: RawPredictions,
}

/// Sentiment inference service
pub struct SentimentModel {
    weight_path: PathBuf,
    network: RwLock<Option<DenseNetwork>>,
    gate: ReadyGate,
}

impl SentimentModel {
    pub fn new(model_folder: &std::path::Path) -> Self {
        Self {
            weight_path: model_folder.join(WEIGHT_FILE),
            network: RwLock::new(None),
            gate: ReadyGate::new(MODEL_NAME),
        }
    }

    fn spec() -> NetworkSpec {
        NetworkSpec::new(
            features::COMBINED_FEATURE_DIM,
            vec![
                (32, Activation::Relu),
                (16, Activation::Relu),
                (7, Activation::Sigmoid),
            ],
        )
    }

    /// Run inference and assemble the observation.
    ///
    /// Pure with respect to storage: persistence, trend updates and alert
    /// checks are sequenced by the analysis pipeline, not here.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        deadline: Duration,
    ) -> Result<SentimentOutcome> {
        if !request.has_signals() {
            debug!(student_id = %request.student_id, "No signal modalities present, returning neutral observation");
            let predictions = RawPredictions::neutral();
            return Ok(SentimentOutcome {
                observation: self.build_observation(request, &predictions),
                predictions,
            });
        }

        self.gate.wait(deadline).await?;

        let text_features = request.text.map(features::text::extract);
        let audio_features = match request.audio {
            Some(clip) => Some(features::audio::extract(&clip.samples, clip.sample_rate)?),
            None => None,
        };
        let behavior_features = request.behavior.map(features::behavior::extract);

        let input = features::combine(
            text_features.as_ref(),
            audio_features.as_ref(),
            behavior_features.as_ref(),
        );

        let outputs = {
            let guard = self
                .network
                .try_read()
                .map_err(|_| Error::TrainingInProgress(MODEL_NAME))?;
            let network = guard.as_ref().ok_or(Error::ModelNotReady(MODEL_NAME))?;
            network.forward(&input)?
        };

        let predictions = RawPredictions::from_outputs(&outputs)?;
        debug!(
            student_id = %request.student_id,
            sentiment = predictions.sentiment,
            stress = predictions.stress,
            engagement = predictions.engagement,
            "Sentiment inference complete"
        );

        Ok(SentimentOutcome {
            observation: self.build_observation(request, &predictions),
            predictions,
        })
    }

    fn build_observation(
        &self,
        request: &AnalysisRequest<'_>,
        predictions: &RawPredictions,
    ) -> SentimentObservation {
        SentimentObservation {
            id: Uuid::new_v4(),
            student_id: request.student_id,
            session_id: request.session_id,
            sentiment_score: predictions.sentiment,
            emotion: classify_emotion(predictions),
            confidence: predictions.confidence,
            intensity: predictions.intensity,
            stress_level: predictions.stress,
            engagement_level: predictions.engagement,
            frustration_level: predictions.frustration,
            activity_kind: request.activity_kind,
            content_id: request.content_id.clone(),
            is_alert: false,
            alert_kind: None,
            alert_message: None,
            recorded_at: Utc::now(),
        }
    }

    /// Fine-tune the network in place.
    ///
    /// Holds the write half of the network lock for the whole call, so
    /// concurrent inference observes `TrainingInProgress` rather than
    /// reading half-updated weights.
    pub async fn train(
        &self,
        samples: &[Vec<f32>],
        targets: &[Vec<f32>],
        epochs: usize,
        learning_rate: f32,
    ) -> Result<f32> {
        self.gate.wait(DEFAULT_TRAIN_WAIT).await?;
        let mut guard = self.network.write().await;
        let network = guard.as_mut().ok_or(Error::ModelNotReady(MODEL_NAME))?;

        let mut loss = f32::INFINITY;
        for _ in 0..epochs.max(1) {
            loss = network.train_batch(samples, targets, learning_rate)?;
        }
        info!(loss, epochs, "Sentiment training pass complete");
        Ok(loss)
    }
}

const DEFAULT_TRAIN_WAIT: Duration = Duration::from_secs(30);

#[async_trait::async_trait]
impl AffectModel for SentimentModel {
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
        info!("Sentiment model ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions(sentiment: f32, engagement: f32, frustration: f32, stress: f32) -> RawPredictions {
        RawPredictions {
            sentiment,
            confidence: 0.9,
            intensity: 0.5,
            stress,
            engagement,
            frustration,
            attention: 0.5,
        }
    }

    #[test]
    fn joy_wins_over_excitement_when_both_match() {
        // Satisfies rule 1 (joy) and rule 6 (excitement); must resolve to joy
        let p = predictions(0.7, 0.8, 0.1, 0.1);
        assert_eq!(classify_emotion(&p), EmotionLabel::Joy);
    }

    #[test]
    fn cascade_order_is_preserved() {
        assert_eq!(
            classify_emotion(&predictions(-0.7, 0.5, 0.0, 0.0)),
            EmotionLabel::Sadness
        );
        assert_eq!(
            classify_emotion(&predictions(0.0, 0.5, 0.8, 0.0)),
            EmotionLabel::Frustration
        );
        assert_eq!(
            classify_emotion(&predictions(0.0, 0.5, 0.0, 0.8)),
            EmotionLabel::Anxiety
        );
        assert_eq!(
            classify_emotion(&predictions(0.0, 0.2, 0.0, 0.0)),
            EmotionLabel::Boredom
        );
        assert_eq!(
            classify_emotion(&predictions(0.4, 0.6, 0.0, 0.0)),
            EmotionLabel::Excitement
        );
        assert_eq!(
            classify_emotion(&predictions(-0.4, 0.5, 0.0, 0.6)),
            EmotionLabel::Fear
        );
        assert_eq!(
            classify_emotion(&predictions(0.1, 0.5, 0.0, 0.0)),
            EmotionLabel::Neutral
        );
        assert_eq!(
            classify_emotion(&predictions(0.25, 0.4, 0.0, 0.0)),
            EmotionLabel::Uncertainty
        );
    }

    #[tokio::test]
    async fn analyze_before_initialize_is_model_not_ready() {
        let model = SentimentModel::new(std::path::Path::new("/nonexistent"));
        let request = AnalysisRequest {
            text: Some("hello"),
            ..AnalysisRequest::new(Uuid::new_v4())
        };
        let result = model.analyze(&request, Duration::ZERO).await;
        assert!(matches!(result, Err(Error::ModelNotReady("sentiment"))));
    }

    #[tokio::test]
    async fn no_signals_yields_neutral_zero_confidence_even_cold() {
        // The empty-signal path short-circuits before the ready gate
        let model = SentimentModel::new(std::path::Path::new("/nonexistent"));
        let request = AnalysisRequest::new(Uuid::new_v4());
        let outcome = model.analyze(&request, Duration::ZERO).await.unwrap();

        assert_eq!(outcome.observation.sentiment_score, 0.0);
        assert_eq!(outcome.observation.confidence, 0.0);
        assert_eq!(outcome.observation.emotion, EmotionLabel::Neutral);
    }

    #[tokio::test]
    async fn analyze_produces_complete_observation() {
        let dir = tempfile::tempdir().unwrap();
        let model = SentimentModel::new(dir.path());
        model.initialize().await.unwrap();
        assert!(model.is_ready());

        let metrics = BehaviorMetrics {
            interactions_per_minute: 20.0,
            task_completion: 0.8,
            ..Default::default()
        };
        let request = AnalysisRequest {
            text: Some("I love this lesson"),
            behavior: Some(&metrics),
            activity_kind: ActivityKind::Lesson,
            ..AnalysisRequest::new(Uuid::new_v4())
        };

        let outcome = model
            .analyze(&request, Duration::from_secs(5))
            .await
            .unwrap();
        let obs = &outcome.observation;

        assert!((-1.0..=1.0).contains(&obs.sentiment_score));
        for level in [
            obs.confidence,
            obs.intensity,
            obs.stress_level,
            obs.engagement_level,
            obs.frustration_level,
        ] {
            assert!((0.0..=1.0).contains(&level));
        }
        assert_eq!(obs.activity_kind, ActivityKind::Lesson);
        assert!(!obs.is_alert, "alert flag is assigned by the pipeline");
    }

    #[tokio::test]
    async fn inference_during_training_is_training_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let model = SentimentModel::new(dir.path());
        model.initialize().await.unwrap();

        // Simulate a training call holding exclusive access
        let _training_guard = model.network.write().await;

        let request = AnalysisRequest {
            text: Some("hello"),
            ..AnalysisRequest::new(Uuid::new_v4())
        };
        let result = model.analyze(&request, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(Error::TrainingInProgress("sentiment"))
        ));
    }

    #[tokio::test]
    async fn training_updates_the_network_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let model = SentimentModel::new(dir.path());
        model.initialize().await.unwrap();

        let samples = vec![vec![0.1; features::COMBINED_FEATURE_DIM]];
        let targets = vec![vec![0.9, 0.8, 0.5, 0.1, 0.8, 0.1, 0.7]];
        let first = model.train(&samples, &targets, 1, 0.2).await.unwrap();
        let later = model.train(&samples, &targets, 20, 0.2).await.unwrap();
        assert!(later <= first, "loss should not grow: {} -> {}", first, later);
    }

    #[tokio::test]
    async fn inference_is_deterministic_for_fixed_input() {
        let dir = tempfile::tempdir().unwrap();
        let model = SentimentModel::new(dir.path());
        model.initialize().await.unwrap();

        let request = AnalysisRequest {
            text: Some("the same text twice"),
            ..AnalysisRequest::new(Uuid::new_v4())
        };
        let a = model.analyze(&request, Duration::from_secs(5)).await.unwrap();
        let b = model.analyze(&request, Duration::from_secs(5)).await.unwrap();
        assert_eq!(a.predictions, b.predictions);
    }
}
