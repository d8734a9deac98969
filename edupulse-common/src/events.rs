//! Event types for the EduPulse pipeline
//!
//! Provides shared event definitions and the `EventBus` used to notify
//! downstream consumers (dashboards, notification routers) about pipeline
//! activity without coupling them to the inference call path.

use crate::types::{AlertKind, AlertSeverity, EmotionLabel, RiskTier};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PulseEvent {
    /// A sentiment observation was persisted
    ObservationRecorded {
        student_id: Uuid,
        observation_id: Uuid,
        emotion: EmotionLabel,
        sentiment_score: f32,
        timestamp: DateTime<Utc>,
    },

    /// An observation crossed an alert threshold
    AlertRaised {
        student_id: Uuid,
        /// None when alert persistence failed (the event still fires)
        alert_id: Option<Uuid>,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// An emotion trend slot was created or merged
    TrendUpdated {
        student_id: Uuid,
        slot_date: NaiveDate,
        slot_hour: u8,
        total_analyses: i64,
        timestamp: DateTime<Utc>,
    },

    /// A dropout risk assessment was computed
    RiskAssessed {
        student_id: Uuid,
        tier: RiskTier,
        probability: f32,
        timestamp: DateTime<Utc>,
    },

    /// A model finished initialization and accepts inference calls
    ModelReady {
        model: String,
        timestamp: DateTime<Utc>,
    },
}

impl PulseEvent {
    /// Event type name for logging and subscription filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PulseEvent::ObservationRecorded { .. } => "ObservationRecorded",
            PulseEvent::AlertRaised { .. } => "AlertRaised",
            PulseEvent::TrendUpdated { .. } => "TrendUpdated",
            PulseEvent::RiskAssessed { .. } => "RiskAssessed",
            PulseEvent::ModelReady { .. } => "ModelReady",
        }
    }
}

/// Central event distribution bus for pipeline events
///
/// Backed by `tokio::sync::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PulseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PulseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the subscriber count, or an error when nobody is listening.
    /// Emission failures are not inference failures; callers log and move on.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PulseEvent,
    ) -> Result<usize, broadcast::error::SendError<PulseEvent>> {
        self.tx.send(event)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
