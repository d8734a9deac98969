//! Command-oriented speech recognition
//!
//! Maps audio features onto a closed per-language command vocabulary: the
//! network scores the vocabulary (softmax), the top phrase becomes the
//! transcript and the runners-up become alternatives. This is command
//! recognition, not open dictation; the vocabulary is the interface
//! contract with the voice-driven lesson flows.

use crate::features;
use crate::models::{AffectModel, AudioClip, ReadyGate};
use crate::nn::{Activation, DenseNetwork, NetworkSpec};
use edupulse_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MODEL_NAME: &str = "speech-recognition";
const WEIGHT_FILE: &str = "speech.json";
const FRESH_SEED: u64 = 0x53_50_43_48;

/// Alternatives reported alongside the transcript
const ALTERNATIVE_COUNT: usize = 2;

/// Commands the voice flows understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCommand {
    Next,
    Repeat,
    Help,
    Pause,
    Resume,
    Slower,
    ReadAloud,
    Menu,
}

impl VoiceCommand {
    pub const ALL: [VoiceCommand; 8] = [
        VoiceCommand::Next,
        VoiceCommand::Repeat,
        VoiceCommand::Help,
        VoiceCommand::Pause,
        VoiceCommand::Resume,
        VoiceCommand::Slower,
        VoiceCommand::ReadAloud,
        VoiceCommand::Menu,
    ];

    /// Spoken form per language; falls back to English for unknown codes
    pub fn phrase(&self, language: &str) -> &'static str {
        match language {
            "es" => match self {
                VoiceCommand::Next => "siguiente",
                VoiceCommand::Repeat => "repetir",
                VoiceCommand::Help => "ayuda",
                VoiceCommand::Pause => "pausa",
                VoiceCommand::Resume => "continuar",
                VoiceCommand::Slower => "mas despacio",
                VoiceCommand::ReadAloud => "leer en voz alta",
                VoiceCommand::Menu => "menu",
            },
            _ => match self {
                VoiceCommand::Next => "next",
                VoiceCommand::Repeat => "repeat",
                VoiceCommand::Help => "help",
                VoiceCommand::Pause => "pause",
                VoiceCommand::Resume => "resume",
                VoiceCommand::Slower => "slower",
                VoiceCommand::ReadAloud => "read aloud",
                VoiceCommand::Menu => "menu",
            },
        }
    }
}

/// Recognition result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Best-scoring phrase; empty for silent/too-short audio
    pub transcript: String,
    pub alternatives: Vec<String>,
    pub confidence: f32,
    /// The command behind the transcript, when one scored at all
    pub command: Option<VoiceCommand>,
}

impl TranscriptResult {
    fn silent() -> Self {
        Self {
            transcript: String::new(),
            alternatives: Vec::new(),
            confidence: 0.0,
            command: None,
        }
    }
}

/// Speech recognition service
pub struct SpeechRecognitionModel {
    weight_path: PathBuf,
    network: RwLock<Option<DenseNetwork>>,
    gate: ReadyGate,
}

impl SpeechRecognitionModel {
    pub fn new(model_folder: &std::path::Path) -> Self {
        Self {
            weight_path: model_folder.join(WEIGHT_FILE),
            network: RwLock::new(None),
            gate: ReadyGate::new(MODEL_NAME),
        }
    }

    fn spec() -> NetworkSpec {
        NetworkSpec::new(
            features::AUDIO_FEATURE_DIM,
            vec![
                (16, Activation::Relu),
                (VoiceCommand::ALL.len(), Activation::Softmax),
            ],
        )
    }

    /// Transcribe a clip against the command vocabulary for `language`.
    ///
    /// Silent or shorter-than-one-frame audio yields the empty transcript
    /// with confidence 0, not an error.
    pub async fn transcribe(
        &self,
        clip: &AudioClip,
        language: &str,
        deadline: Duration,
    ) -> Result<TranscriptResult> {
        self.gate.wait(deadline).await?;

        let input = features::audio::extract(&clip.samples, clip.sample_rate)?;
        if input.iter().all(|&v| v == 0.0) {
            debug!("Audio below one frame or silent, returning empty transcript");
            return Ok(TranscriptResult::silent());
        }

        let outputs = {
            let guard = self
                .network
                .try_read()
                .map_err(|_| Error::TrainingInProgress(MODEL_NAME))?;
            let network = guard.as_ref().ok_or(Error::ModelNotReady(MODEL_NAME))?;
            network.forward(&input)?
        };

        let mut ranked: Vec<(VoiceCommand, f32)> = VoiceCommand::ALL
            .iter()
            .copied()
            .zip(outputs.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (top_command, top_score) = ranked[0];
        let alternatives = ranked[1..]
            .iter()
            .take(ALTERNATIVE_COUNT)
            .map(|(cmd, _)| cmd.phrase(language).to_string())
            .collect();

        debug!(
            command = ?top_command,
            confidence = top_score,
            "Speech recognition complete"
        );

        Ok(TranscriptResult {
            transcript: top_command.phrase(language).to_string(),
            alternatives,
            confidence: top_score,
            command: Some(top_command),
        })
    }
}

#[async_trait::async_trait]
impl AffectModel for SpeechRecognitionModel {
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
        info!("Speech recognition model ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_clip(freq: f32, duration_secs: f32) -> AudioClip {
        let sample_rate = 16_000;
        let count = (sample_rate as f32 * duration_secs) as usize;
        let samples = (0..count)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.6
            })
            .collect();
        AudioClip {
            samples,
            sample_rate,
        }
    }

    #[tokio::test]
    async fn short_clip_yields_empty_transcript_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = SpeechRecognitionModel::new(dir.path());
        model.initialize().await.unwrap();

        let clip = AudioClip {
            samples: vec![0.1; 64],
            sample_rate: 16_000,
        };
        let result = model
            .transcribe(&clip, "en", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.transcript.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert!(result.command.is_none());
    }

    #[tokio::test]
    async fn voiced_clip_maps_onto_the_command_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let model = SpeechRecognitionModel::new(dir.path());
        model.initialize().await.unwrap();

        let result = model
            .transcribe(&tone_clip(240.0, 0.4), "en", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.command.is_some());
        assert!(!result.transcript.is_empty());
        assert_eq!(result.alternatives.len(), ALTERNATIVE_COUNT);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[tokio::test]
    async fn language_selects_the_phrase_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let model = SpeechRecognitionModel::new(dir.path());
        model.initialize().await.unwrap();

        let clip = tone_clip(240.0, 0.4);
        let en = model
            .transcribe(&clip, "en", Duration::from_secs(5))
            .await
            .unwrap();
        let es = model
            .transcribe(&clip, "es", Duration::from_secs(5))
            .await
            .unwrap();

        // Same audio, same command, language-specific surface form
        assert_eq!(en.command, es.command);
        assert_eq!(
            es.transcript,
            en.command.unwrap().phrase("es"),
            "Spanish transcript should come from the Spanish dictionary"
        );
    }

    #[tokio::test]
    async fn transcribe_before_initialize_is_model_not_ready() {
        let model = SpeechRecognitionModel::new(std::path::Path::new("/nonexistent"));
        let result = model
            .transcribe(&tone_clip(200.0, 0.2), "en", Duration::ZERO)
            .await;
        assert!(matches!(result, Err(Error::ModelNotReady(_))));
    }
}
