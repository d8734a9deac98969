//! Auxiliary analysis models
//!
//! Lightweight helpers the orchestrator composes around the main sentiment
//! path: a lexicon-ratio text sentiment (no network, always available), a
//! behavior-pattern classifier, and templated study recommendations.

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

const MODEL_NAME: &str = "auxiliary";
const WEIGHT_FILE: &str = "auxiliary.json";
const FRESH_SEED: u64 = 0x41_55_58_31;

/// Quick text sentiment result (lexicon path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSentiment {
    /// Valence in [-1, 1]
    pub score: f32,
    /// "positive" / "negative" / "neutral"
    pub label: &'static str,
    pub confidence: f32,
}

/// Coarse session behavior classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPatternKind {
    Focused,
    Exploring,
    Struggling,
    Distracted,
    Disengaged,
}

impl BehaviorPatternKind {
    pub const ALL: [BehaviorPatternKind; 5] = [
        BehaviorPatternKind::Focused,
        BehaviorPatternKind::Exploring,
        BehaviorPatternKind::Struggling,
        BehaviorPatternKind::Distracted,
        BehaviorPatternKind::Disengaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorPatternKind::Focused => "focused",
            BehaviorPatternKind::Exploring => "exploring",
            BehaviorPatternKind::Struggling => "struggling",
            BehaviorPatternKind::Distracted => "distracted",
            BehaviorPatternKind::Disengaged => "disengaged",
        }
    }

    fn recommendations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            BehaviorPatternKind::Focused => {
                &["keep the current difficulty curve", "offer an optional challenge task"]
            }
            BehaviorPatternKind::Exploring => {
                &["surface related topics", "allow free navigation between lessons"]
            }
            BehaviorPatternKind::Struggling => &[
                "insert a worked example before the next exercise",
                "lower the difficulty one step",
                "offer a hint after the first wrong answer",
            ],
            BehaviorPatternKind::Distracted => &[
                "shorten task segments",
                "add a visible progress indicator",
            ],
            BehaviorPatternKind::Disengaged => &[
                "switch to a game-based activity",
                "send a check-in prompt",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

/// Behavior-pattern classification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub kind: BehaviorPatternKind,
    pub confidence: f32,
    pub recommendations: Vec<String>,
}

/// Auxiliary model bundle
pub struct AuxiliaryModels {
    weight_path: PathBuf,
    network: RwLock<Option<DenseNetwork>>,
    gate: ReadyGate,
}

impl AuxiliaryModels {
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
                (12, Activation::Relu),
                (BehaviorPatternKind::ALL.len(), Activation::Softmax),
            ],
        )
    }

    /// Lexicon-ratio text sentiment; pure, no readiness gate needed.
    pub fn text_sentiment(&self, text: &str) -> TextSentiment {
        let f = features::text::extract(text);
        let positive = f[0];
        let negative = f[1];
        let total = positive + negative;

        if total == 0.0 {
            return TextSentiment {
                score: 0.0,
                label: "neutral",
                confidence: 0.0,
            };
        }

        // Net lexicon balance, already in [-1, 1]
        let score = f[4];
        let label = if score > 0.2 {
            "positive"
        } else if score < -0.2 {
            "negative"
        } else {
            "neutral"
        };
        TextSentiment {
            score,
            label,
            // Coverage-weighted: more lexicon hits, more confidence
            confidence: (total * 10.0).min(1.0),
        }
    }

    /// Classify the session's behavior pattern.
    pub async fn behavior_pattern(
        &self,
        metrics: &BehaviorMetrics,
        deadline: Duration,
    ) -> Result<BehaviorPattern> {
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

        let (index, &confidence) = outputs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| Error::Internal("Empty pattern distribution".to_string()))?;
        let kind = BehaviorPatternKind::ALL[index];

        debug!(pattern = kind.as_str(), confidence, "Behavior pattern classified");
        Ok(BehaviorPattern {
            kind,
            confidence,
            recommendations: kind.recommendations(),
        })
    }

    /// Templated study recommendations for a content topic
    pub fn content_recommendations(&self, topic: &str, sentiment: &TextSentiment) -> Vec<String> {
        let mut recommendations = vec![
            format!("Review the key vocabulary for \"{}\" before the exercises", topic),
            format!("Pair \"{}\" with one hands-on activity", topic),
        ];
        match sentiment.label {
            "negative" => recommendations.push(
                "Reframe the introduction positively; the current text reads as discouraging"
                    .to_string(),
            ),
            "positive" => recommendations
                .push("Tone is encouraging; keep the same voice in follow-ups".to_string()),
            _ => {}
        }
        recommendations
    }
}

#[async_trait::async_trait]
impl AffectModel for AuxiliaryModels {
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
        info!("Auxiliary models ready");
        Ok(())
    }
}
