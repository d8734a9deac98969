//! Per-signal inference models
//!
//! Each model is an explicit service object constructed per process (or per
//! test) and passed where needed — no module-level singletons. A model owns
//! its network behind a `tokio::sync::RwLock`: training takes the write
//! half for exclusive access, inference takes `try_read` and surfaces
//! `TrainingInProgress` instead of queueing behind a training call.
//!
//! Readiness is a `watch` channel rather than a sleep-and-poll loop:
//! dependents await `ReadyGate::wait` under a bounded deadline and get a
//! typed `ModelNotReady` error on expiry.

pub mod auxiliary;
pub mod cultural;
pub mod needs;
pub mod sentiment;
pub mod speech;

use edupulse_common::{Error, Result};
use std::time::Duration;
use tokio::sync::watch;

pub use auxiliary::AuxiliaryModels;
pub use cultural::CulturalAdaptationModel;
pub use needs::NeedsDetectionModel;
pub use sentiment::SentimentModel;
pub use speech::SpeechRecognitionModel;

/// Default bound on waiting for model initialization
pub const DEFAULT_READY_DEADLINE: Duration = Duration::from_secs(30);

/// Raw mono audio for the audio-consuming models
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// PCM samples, f32 normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Uniform lifecycle surface over the model services
#[async_trait::async_trait]
pub trait AffectModel: Send + Sync {
    /// Model name for logging and event payloads
    fn name(&self) -> &'static str;

    /// True once initialization completed and inference calls are accepted
    fn is_ready(&self) -> bool;

    /// Load weights (or fall back to fresh ones) and open the ready gate
    async fn initialize(&self) -> Result<()>;
}

/// Initialization gate shared by all model services
pub(crate) struct ReadyGate {
    tx: watch::Sender<bool>,
    name: &'static str,
}

impl ReadyGate {
    pub(crate) fn new(name: &'static str) -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx, name }
    }

    pub(crate) fn mark_ready(&self) {
        let _ = self.tx.send(true);
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Await readiness up to `deadline`.
    ///
    /// Callers treat expiry as a soft failure (`ModelNotReady`), not a crash.
    pub(crate) async fn wait(&self, deadline: Duration) -> Result<()> {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return Ok(());
        }
        let waited = tokio::time::timeout(deadline, async {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        match waited {
            Ok(()) if *self.tx.borrow() => Ok(()),
            _ => Err(Error::ModelNotReady(self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_opens_for_waiters() {
        let gate = std::sync::Arc::new(ReadyGate::new("test-model"));
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(Duration::from_secs(5)).await })
        };
        gate.mark_ready();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_deadline_on_cold_gate_is_model_not_ready() {
        let gate = ReadyGate::new("cold-model");
        let result = gate.wait(Duration::ZERO).await;
        assert!(matches!(result, Err(Error::ModelNotReady("cold-model"))));
    }

    #[tokio::test]
    async fn ready_gate_resolves_immediately_once_open() {
        let gate = ReadyGate::new("warm-model");
        gate.mark_ready();
        gate.wait(Duration::ZERO).await.unwrap();
        assert!(gate.is_ready());
    }
}
