//! Special-needs detection from interaction patterns
//!
//! Multi-label detection: the network scores each supported need
//! independently (sigmoid per output), detections above the threshold are
//! returned sorted by descending confidence, each with a severity band and
//! a static recommendation set.

use crate::features;
use crate::models::{AffectModel, ReadyGate};
use crate::nn::{Activation, DenseNetwork, NetworkSpec};
use edupulse_common::types::BehaviorMetrics;
use edupulse_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MODEL_NAME: &str = "needs-detection";
const WEIGHT_FILE: &str = "needs.json";
const FRESH_SEED: u64 = 0x4e_45_45_44;

/// Detection threshold: outputs below this are not reported
const DETECTION_THRESHOLD: f32 = 0.5;

/// Supported need categories, one network output each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    AttentionSupport,
    ReadingSupport,
    ProcessingPace,
    MotorCoordination,
    SensorySensitivity,
}

impl NeedKind {
    pub const ALL: [NeedKind; 5] = [
        NeedKind::AttentionSupport,
        NeedKind::ReadingSupport,
        NeedKind::ProcessingPace,
        NeedKind::MotorCoordination,
        NeedKind::SensorySensitivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NeedKind::AttentionSupport => "attention_support",
            NeedKind::ReadingSupport => "reading_support",
            NeedKind::ProcessingPace => "processing_pace",
            NeedKind::MotorCoordination => "motor_coordination",
            NeedKind::SensorySensitivity => "sensory_sensitivity",
        }
    }

    /// Accessibility features recommended for this need
    fn recommendations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            NeedKind::AttentionSupport => &[
                "short task segments with explicit breaks",
                "reduced on-screen distractions",
                "progress reminders",
            ],
            NeedKind::ReadingSupport => &[
                "dyslexia-friendly font option",
                "text-to-speech for passages",
                "larger line spacing",
            ],
            NeedKind::ProcessingPace => &[
                "extended response timers",
                "step-by-step task breakdown",
            ],
            NeedKind::MotorCoordination => &[
                "larger touch targets",
                "keyboard-first navigation",
            ],
            NeedKind::SensorySensitivity => &[
                "reduced animation mode",
                "muted color palette",
                "optional audio cues",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

/// Severity band derived from detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedSeverity {
    Mild,
    Moderate,
    Significant,
}

impl NeedSeverity {
    fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.8 {
            NeedSeverity::Significant
        } else if confidence >= 0.65 {
            NeedSeverity::Moderate
        } else {
            NeedSeverity::Mild
        }
    }
}

/// One detected need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedNeed {
    pub kind: NeedKind,
    pub confidence: f32,
    pub severity: NeedSeverity,
    pub recommendations: Vec<String>,
}

/// Needs detection service
pub struct NeedsDetectionModel {
    weight_path: PathBuf,
    network: RwLock<Option<DenseNetwork>>,
    gate: ReadyGate,
}

impl NeedsDetectionModel {
    pub fn new(model_folder: &std::path::Path) -> Self {
        Self {
            weight_path: model_folder.join(WEIGHT_FILE),
            network: RwLock::new(None),
            gate: ReadyGate::new(MODEL_NAME),
        }
    }

    fn spec() -> NetworkSpec {
        NetworkSpec::new(
            features::BEHAVIOR_FEATURE_DIM,
            vec![
                (16, Activation::Relu),
                (NeedKind::ALL.len(), Activation::Sigmoid),
            ],
        )
    }

    /// Detect needs from an interaction pattern, sorted by descending
    /// confidence.
    pub async fn detect(
        &self,
        metrics: &BehaviorMetrics,
        deadline: Duration,
    ) -> Result<Vec<DetectedNeed>> {
        self.gate.wait(deadline).await?;

        let input = features::behavior::extract(metrics);
        let outputs = {
            let guard = self
                .network
                .try_read()
                .map_err(|_| Error::TrainingInProgress(MODEL_NAME))?;
            let network = guard.as_ref().ok_or(Error::ModelNotReady(MODEL_NAME))?;
            network.forward(&input)?
        };

        let mut detected: Vec<DetectedNeed> = NeedKind::ALL
            .iter()
            .zip(outputs.iter())
            .filter(|(_, &score)| score >= DETECTION_THRESHOLD)
            .map(|(&kind, &score)| DetectedNeed {
                kind,
                confidence: score,
                severity: NeedSeverity::from_confidence(score),
                recommendations: kind.recommendations(),
            })
            .collect();

        detected.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(count = detected.len(), "Needs detection complete");
        Ok(detected)
    }
}

#[async_trait::async_trait]
impl AffectModel for NeedsDetectionModel {
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
        info!("Needs detection model ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands_follow_confidence() {
        assert_eq!(
            NeedSeverity::from_confidence(0.85),
            NeedSeverity::Significant
        );
        assert_eq!(NeedSeverity::from_confidence(0.7), NeedSeverity::Moderate);
        assert_eq!(NeedSeverity::from_confidence(0.55), NeedSeverity::Mild);
    }

    #[tokio::test]
    async fn detect_before_initialize_is_model_not_ready() {
        let model = NeedsDetectionModel::new(std::path::Path::new("/nonexistent"));
        let result = model
            .detect(&BehaviorMetrics::default(), Duration::ZERO)
            .await;
        assert!(matches!(result, Err(Error::ModelNotReady(_))));
    }

    #[tokio::test]
    async fn detections_are_sorted_by_descending_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let model = NeedsDetectionModel::new(dir.path());
        model.initialize().await.unwrap();

        let metrics = BehaviorMetrics {
            response_time_ms: 9_000.0,
            error_rate: 0.7,
            retry_rate: 0.6,
            focus_changes: 25.0,
            ..Default::default()
        };
        let detected = model
            .detect(&metrics, Duration::from_secs(5))
            .await
            .unwrap();

        for pair in detected.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for need in &detected {
            assert!(need.confidence >= DETECTION_THRESHOLD);
            assert!(!need.recommendations.is_empty());
        }
    }
}
