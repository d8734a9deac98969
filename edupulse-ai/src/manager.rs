//! Model orchestration
//!
//! `ModelManager` owns every model service plus the analysis pipeline and
//! composes them into the multi-model operations the platform calls.
//! Composite operations are best-effort: a section whose input is missing
//! is omitted, a failing optional sub-step is logged and omitted, and only
//! a failing required first step (sentiment in content processing, speech
//! in voice analysis) aborts the whole call.

use crate::config::AiConfig;
use crate::models::auxiliary::{AuxiliaryModels, BehaviorPattern, TextSentiment};
use crate::models::cultural::{AdaptedContent, CulturalAdaptationModel};
use crate::models::needs::{DetectedNeed, NeedsDetectionModel};
use crate::models::sentiment::{AnalysisRequest, SentimentModel};
use crate::models::speech::{SpeechRecognitionModel, TranscriptResult, VoiceCommand};
use crate::models::{AffectModel, AudioClip};
use crate::pipeline::AnalysisPipeline;
use crate::risk::DropoutRiskPredictor;
use crate::trends::TrendAggregator;
use chrono::{DateTime, Utc};
use edupulse_common::types::{
    ActivityKind, BehaviorMetrics, CulturalProfile, DropoutRiskAssessment, EmotionLabel,
    SentimentObservation,
};
use edupulse_common::{Error, EventBus, PulseEvent, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Command recognition requires at least this much transcript confidence
const COMMAND_CONFIDENCE: f32 = 0.5;

/// Inputs for a full student analysis; every field but the id is optional
/// and partial input is allowed.
#[derive(Debug, Clone, Default)]
pub struct StudentAnalysisRequest {
    pub student_id: Uuid,
    pub behavior: Option<BehaviorMetrics>,
    pub content: Option<String>,
    pub cultural_profile: Option<CulturalProfile>,
    pub audio: Option<AudioClip>,
    /// Language for the speech vocabulary; defaults to English
    pub language: Option<String>,
}

/// Full analysis result; sections without input (or whose optional
/// sub-step failed) are absent, not errored.
#[derive(Debug, Clone, Serialize)]
pub struct StudentAnalysisReport {
    pub student_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs: Option<Vec<DetectedNeed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cultural: Option<AdaptedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<TranscriptResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorPattern>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Sentiment slice of a content-processing result (not persisted; content
/// processing analyzes material, not a student's state)
#[derive(Debug, Clone, Serialize)]
pub struct ContentSentiment {
    pub sentiment_score: f32,
    pub emotion: EmotionLabel,
    pub confidence: f32,
}

/// Content-processing result
#[derive(Debug, Clone, Serialize)]
pub struct ContentProcessingResult {
    pub sentiment: ContentSentiment,
    pub text_analysis: TextSentiment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapted: Option<AdaptedContent>,
    pub recommendations: Vec<String>,
}

/// Real-time voice analysis result
#[derive(Debug, Clone, Serialize)]
pub struct VoiceAnalysisResult {
    pub transcript: TranscriptResult,
    /// Present only when recognition confidence clears the command gate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<VoiceCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentObservation>,
}

/// Diagnostic report wrapping a full analysis
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub student_id: Uuid,
    pub summary: String,
    pub analysis: StudentAnalysisReport,
    pub accessibility_features: Vec<String>,
    pub cultural_adaptations: Vec<String>,
    pub next_steps: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Orchestrates the model services into composite operations
pub struct ModelManager {
    pub sentiment: Arc<SentimentModel>,
    pub needs: Arc<NeedsDetectionModel>,
    pub cultural: Arc<CulturalAdaptationModel>,
    pub speech: Arc<SpeechRecognitionModel>,
    pub auxiliary: Arc<AuxiliaryModels>,
    pub risk: Arc<DropoutRiskPredictor>,
    pub trends: TrendAggregator,
    pipeline: AnalysisPipeline,
    events: EventBus,
    deadline: Duration,
}

impl ModelManager {
    pub fn new(config: &AiConfig, pool: SqlitePool, events: EventBus) -> Self {
        let sentiment = Arc::new(SentimentModel::new(&config.model_folder));
        let trends = TrendAggregator::new(pool.clone(), events.clone());
        let pipeline = AnalysisPipeline::new(
            sentiment.clone(),
            trends.clone(),
            pool.clone(),
            events.clone(),
        );

        Self {
            sentiment,
            needs: Arc::new(NeedsDetectionModel::new(&config.model_folder)),
            cultural: Arc::new(CulturalAdaptationModel::new(&config.model_folder)),
            speech: Arc::new(SpeechRecognitionModel::new(&config.model_folder)),
            auxiliary: Arc::new(AuxiliaryModels::new(&config.model_folder)),
            risk: Arc::new(DropoutRiskPredictor::new(
                &config.model_folder,
                pool,
                events.clone(),
            )),
            trends,
            pipeline,
            events,
            deadline: config.inference_deadline,
        }
    }

    /// Initialize every model concurrently, bounded by the configured
    /// deadline. Emits one `ModelReady` event per model.
    pub async fn initialize(&self) -> Result<()> {
        let initialization = async {
            tokio::try_join!(
                self.sentiment.initialize(),
                self.needs.initialize(),
                self.cultural.initialize(),
                self.speech.initialize(),
                self.auxiliary.initialize(),
                self.risk.initialize(),
            )
        };

        tokio::time::timeout(self.deadline, initialization)
            .await
            .map_err(|_| Error::ModelNotReady("initialization timed out"))??;

        let models: [&dyn AffectModel; 6] = [
            self.sentiment.as_ref(),
            self.needs.as_ref(),
            self.cultural.as_ref(),
            self.speech.as_ref(),
            self.auxiliary.as_ref(),
            self.risk.as_ref(),
        ];
        for model in models {
            let _ = self.events.emit(PulseEvent::ModelReady {
                model: model.name().to_string(),
                timestamp: Utc::now(),
            });
        }

        info!("All models initialized");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.sentiment.is_ready()
            && self.needs.is_ready()
            && self.cultural.is_ready()
            && self.speech.is_ready()
            && self.auxiliary.is_ready()
            && self.risk.is_ready()
    }

    /// Analyze one signal bundle and record the observation (primary
    /// single-model operation; see `AnalysisPipeline`)
    pub async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<SentimentObservation> {
        self.pipeline.analyze(request, self.deadline).await
    }

    /// Compute a fresh dropout risk assessment
    pub async fn predict_risk(&self, student_id: Uuid) -> Result<DropoutRiskAssessment> {
        self.risk.predict(student_id, self.deadline).await
    }

    /// Full student analysis: run every sub-analysis whose input is
    /// present, independently; omit the rest.
    pub async fn full_student_analysis(
        &self,
        request: &StudentAnalysisRequest,
    ) -> Result<StudentAnalysisReport> {
        let language = request.language.as_deref().unwrap_or("en");
        let mut recommendations: Vec<String> = Vec::new();

        let needs = match &request.behavior {
            Some(metrics) => match self.needs.detect(metrics, self.deadline).await {
                Ok(detected) => Some(detected),
                Err(e) => {
                    warn!("Needs detection failed, omitting section: {}", e);
                    None
                }
            },
            None => None,
        };

        let behavior = match &request.behavior {
            Some(metrics) => match self.auxiliary.behavior_pattern(metrics, self.deadline).await {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Behavior analysis failed, omitting section: {}", e);
                    None
                }
            },
            None => None,
        };

        let cultural = match (&request.content, &request.cultural_profile) {
            (Some(content), Some(profile)) => {
                match self.cultural.adapt(content, profile, self.deadline).await {
                    Ok(adapted) => Some(adapted),
                    Err(e) => {
                        warn!("Cultural adaptation failed, omitting section: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        let speech = match &request.audio {
            Some(clip) => match self.speech.transcribe(clip, language, self.deadline).await {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Speech recognition failed, omitting section: {}", e);
                    None
                }
            },
            None => None,
        };

        if let Some(needs) = &needs {
            for need in needs {
                extend_dedup(&mut recommendations, &need.recommendations);
            }
        }
        if let Some(pattern) = &behavior {
            extend_dedup(&mut recommendations, &pattern.recommendations);
        }

        Ok(StudentAnalysisReport {
            student_id: request.student_id,
            needs,
            cultural,
            speech,
            behavior,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    /// Content processing: sentiment is the required first step and aborts
    /// the call on failure; adaptation is optional.
    pub async fn process_content(
        &self,
        content: &str,
        topic: &str,
        profile: Option<&CulturalProfile>,
    ) -> Result<ContentProcessingResult> {
        let request = AnalysisRequest {
            text: Some(content),
            activity_kind: ActivityKind::Reading,
            ..AnalysisRequest::new(Uuid::nil())
        };
        let outcome = self.sentiment.analyze(&request, self.deadline).await?;
        let sentiment = ContentSentiment {
            sentiment_score: outcome.observation.sentiment_score,
            emotion: outcome.observation.emotion,
            confidence: outcome.observation.confidence,
        };

        let text_analysis = self.auxiliary.text_sentiment(content);

        let adapted = match profile {
            Some(profile) => match self.cultural.adapt(content, profile, self.deadline).await {
                Ok(adapted) => Some(adapted),
                Err(e) => {
                    warn!("Cultural adaptation failed, omitting section: {}", e);
                    None
                }
            },
            None => None,
        };

        let recommendations = self.auxiliary.content_recommendations(topic, &text_analysis);

        Ok(ContentProcessingResult {
            sentiment,
            text_analysis,
            adapted,
            recommendations,
        })
    }

    /// Real-time voice analysis: recognition, then command matching only
    /// above the confidence gate, then sentiment on the transcript.
    pub async fn realtime_voice(
        &self,
        student_id: Uuid,
        clip: &AudioClip,
        language: &str,
    ) -> Result<VoiceAnalysisResult> {
        let transcript = self.speech.transcribe(clip, language, self.deadline).await?;

        let command = if transcript.confidence > COMMAND_CONFIDENCE {
            transcript.command
        } else {
            None
        };

        let sentiment = if transcript.transcript.is_empty() {
            None
        } else {
            let request = AnalysisRequest {
                text: Some(&transcript.transcript),
                activity_kind: ActivityKind::Voice,
                ..AnalysisRequest::new(student_id)
            };
            match self.pipeline.analyze(&request, self.deadline).await {
                Ok(observation) => Some(observation),
                Err(e) => {
                    warn!("Transcript sentiment failed, omitting section: {}", e);
                    None
                }
            }
        };

        Ok(VoiceAnalysisResult {
            transcript,
            command,
            sentiment,
        })
    }

    /// Diagnostic report: full analysis plus deduplicated feature lists and
    /// the fixed next-steps closing.
    pub async fn diagnostic_report(
        &self,
        request: &StudentAnalysisRequest,
    ) -> Result<DiagnosticReport> {
        let analysis = self.full_student_analysis(request).await?;

        let mut accessibility_features = Vec::new();
        if let Some(needs) = &analysis.needs {
            for need in needs {
                extend_dedup(&mut accessibility_features, &need.recommendations);
            }
        }

        let mut cultural_adaptations = Vec::new();
        if let Some(adapted) = &analysis.cultural {
            extend_dedup(&mut cultural_adaptations, &adapted.notes);
        }

        let sections = [
            analysis.needs.is_some(),
            analysis.cultural.is_some(),
            analysis.speech.is_some(),
            analysis.behavior.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count();

        let summary = format!(
            "Diagnostic for student {}: {} of 4 analysis sections available, {} detected needs, {} accessibility features suggested",
            request.student_id,
            sections,
            analysis.needs.as_ref().map(|n| n.len()).unwrap_or(0),
            accessibility_features.len(),
        );

        let next_steps = vec![
            "review detected needs with the assigned teacher".to_string(),
            "apply the suggested accessibility features to upcoming lessons".to_string(),
            "re-run the diagnostic after two weeks of sessions".to_string(),
        ];

        Ok(DiagnosticReport {
            student_id: request.student_id,
            summary,
            analysis,
            accessibility_features,
            cultural_adaptations,
            next_steps,
            generated_at: Utc::now(),
        })
    }
}

/// Append items not already present, preserving order
fn extend_dedup(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn manager() -> (ModelManager, SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = AiConfig::at_folder(dir.path());
        let pool = db::init_memory_pool().await.unwrap();
        let events = EventBus::new(64);
        let manager = ModelManager::new(&config, pool.clone(), events);
        manager.initialize().await.unwrap();
        (manager, pool, dir)
    }

    #[tokio::test]
    async fn initialize_opens_every_gate() {
        let (manager, _pool, _dir) = manager().await;
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn behavior_only_analysis_has_no_cultural_or_speech_sections() {
        let (manager, _pool, _dir) = manager().await;

        let request = StudentAnalysisRequest {
            student_id: Uuid::new_v4(),
            behavior: Some(BehaviorMetrics {
                interactions_per_minute: 12.0,
                task_completion: 0.5,
                ..Default::default()
            }),
            ..Default::default()
        };

        let report = manager.full_student_analysis(&request).await.unwrap();
        assert!(report.behavior.is_some(), "behavior section present");
        assert!(report.cultural.is_none(), "no cultural input, no section");
        assert!(report.speech.is_none(), "no audio input, no section");
    }

    #[tokio::test]
    async fn content_processing_includes_adaptation_only_with_a_profile() {
        let (manager, _pool, _dir) = manager().await;

        let without = manager
            .process_content("We eat corn at school", "food", None)
            .await
            .unwrap();
        assert!(without.adapted.is_none());
        assert!(!without.recommendations.is_empty());

        let profile = CulturalProfile {
            culture: "andean".to_string(),
            language: "es".to_string(),
            region: None,
            socioeconomic_level: None,
            education_level: edupulse_common::types::EducationLevel::Basic,
            age: None,
            traditions: vec![],
            values: vec![],
            taboos: vec![],
            example_phrases: vec![],
        };
        let with = manager
            .process_content("We eat corn at school", "food", Some(&profile))
            .await
            .unwrap();
        let adapted = with.adapted.unwrap();
        assert!(adapted.adapted.contains("choclo"));
    }

    #[tokio::test]
    async fn voice_analysis_gates_the_command_on_confidence() {
        let (manager, pool, _dir) = manager().await;
        let student_id = Uuid::new_v4();

        let sample_rate = 16_000u32;
        let samples: Vec<f32> = (0..8_000)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 180.0 * i as f32 / sample_rate as f32).sin() * 0.5
            })
            .collect();
        let clip = AudioClip {
            samples,
            sample_rate,
        };

        let result = manager
            .realtime_voice(student_id, &clip, "en")
            .await
            .unwrap();

        if result.transcript.confidence > COMMAND_CONFIDENCE {
            assert!(result.command.is_some());
        } else {
            assert!(result.command.is_none());
        }

        // Sentiment on the transcript was recorded through the pipeline
        if result.sentiment.is_some() {
            let stored = db::observations::recent_observations(&pool, student_id, 5)
                .await
                .unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].activity_kind, ActivityKind::Voice);
        }
    }

    #[tokio::test]
    async fn diagnostic_report_has_summary_and_fixed_next_steps() {
        let (manager, _pool, _dir) = manager().await;

        let request = StudentAnalysisRequest {
            student_id: Uuid::new_v4(),
            behavior: Some(BehaviorMetrics::default()),
            ..Default::default()
        };
        let report = manager.diagnostic_report(&request).await.unwrap();

        assert!(report.summary.contains("Diagnostic for student"));
        assert_eq!(report.next_steps.len(), 3);
        // Feature lists carry no duplicates
        let mut deduped = report.accessibility_features.clone();
        deduped.dedup();
        assert_eq!(deduped, report.accessibility_features);
    }

    #[test]
    fn extend_dedup_preserves_order_and_uniqueness() {
        let mut target = vec!["a".to_string()];
        extend_dedup(
            &mut target,
            &["b".to_string(), "a".to_string(), "b".to_string()],
        );
        assert_eq!(target, vec!["a".to_string(), "b".to_string()]);
    }
}
