//! Shared domain types for the EduPulse affect pipeline
//!
//! All enums carry stable string forms (`as_str` / `FromStr`) because they are
//! stored in TEXT columns and serialized into API payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Enumerations
// ============================================================================

/// Emotion label assigned by the sentiment model's rule cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Joy,
    Sadness,
    Frustration,
    Anxiety,
    Boredom,
    Excitement,
    Fear,
    Neutral,
    Uncertainty,
}

impl EmotionLabel {
    /// All labels, in the order used for per-emotion trend counters
    pub const ALL: [EmotionLabel; 9] = [
        EmotionLabel::Joy,
        EmotionLabel::Sadness,
        EmotionLabel::Frustration,
        EmotionLabel::Anxiety,
        EmotionLabel::Boredom,
        EmotionLabel::Excitement,
        EmotionLabel::Fear,
        EmotionLabel::Neutral,
        EmotionLabel::Uncertainty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Joy => "joy",
            EmotionLabel::Sadness => "sadness",
            EmotionLabel::Frustration => "frustration",
            EmotionLabel::Anxiety => "anxiety",
            EmotionLabel::Boredom => "boredom",
            EmotionLabel::Excitement => "excitement",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Uncertainty => "uncertainty",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmotionLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("Unknown emotion label: {}", s))
    }
}

/// Alert categories raised by the sentiment pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighStress,
    LowEngagement,
    FrustrationSpike,
    EmotionalDistress,
    AttentionDecline,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HighStress => "high_stress",
            AlertKind::LowEngagement => "low_engagement",
            AlertKind::FrustrationSpike => "frustration_spike",
            AlertKind::EmotionalDistress => "emotional_distress",
            AlertKind::AttentionDecline => "attention_decline",
        }
    }

    /// Severity is a pure function of the alert kind, never settable
    /// independently.
    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertKind::EmotionalDistress => AlertSeverity::Critical,
            AlertKind::HighStress | AlertKind::FrustrationSpike => AlertSeverity::High,
            AlertKind::LowEngagement | AlertKind::AttentionDecline => AlertSeverity::Medium,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_stress" => Ok(AlertKind::HighStress),
            "low_engagement" => Ok(AlertKind::LowEngagement),
            "frustration_spike" => Ok(AlertKind::FrustrationSpike),
            "emotional_distress" => Ok(AlertKind::EmotionalDistress),
            "attention_decline" => Ok(AlertKind::AttentionDecline),
            other => Err(format!("Unknown alert kind: {}", other)),
        }
    }
}

/// Alert severity, derived from `AlertKind::severity`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("Unknown alert severity: {}", other)),
        }
    }
}

/// Dropout risk tier, the discretized output of the risk predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Bucket a binary-classifier probability into a tier.
    ///
    /// Fixed threshold table; boundary values fall into the higher tier
    /// (0.25 -> medium, 0.5 -> high, 0.75 -> critical).
    pub fn from_probability(probability: f32) -> Self {
        if probability < 0.25 {
            RiskTier::Low
        } else if probability < 0.5 {
            RiskTier::Medium
        } else if probability < 0.75 {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity the student was doing when a signal was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Lesson,
    Assessment,
    Reading,
    Game,
    Conversation,
    Voice,
    Other,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Lesson => "lesson",
            ActivityKind::Assessment => "assessment",
            ActivityKind::Reading => "reading",
            ActivityKind::Game => "game",
            ActivityKind::Conversation => "conversation",
            ActivityKind::Voice => "voice",
            ActivityKind::Other => "other",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(ActivityKind::Lesson),
            "assessment" => Ok(ActivityKind::Assessment),
            "reading" => Ok(ActivityKind::Reading),
            "game" => Ok(ActivityKind::Game),
            "conversation" => Ok(ActivityKind::Conversation),
            "voice" => Ok(ActivityKind::Voice),
            _ => Ok(ActivityKind::Other),
        }
    }
}

/// Education level used by cultural adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Basic,
    Intermediate,
    Advanced,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::Basic => "basic",
            EducationLevel::Intermediate => "intermediate",
            EducationLevel::Advanced => "advanced",
        }
    }
}

// ============================================================================
// Observation / trend / alert records
// ============================================================================

/// One sentiment inference event for one student.
///
/// Score and all level fields are produced together as one atomic result;
/// partial observations are never constructed or persisted. Rows are
/// append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_id: Option<Uuid>,
    /// Overall affective valence in [-1, 1]
    pub sentiment_score: f32,
    pub emotion: EmotionLabel,
    /// Model confidence in [0, 1]
    pub confidence: f32,
    /// Emotional intensity in [0, 1]
    pub intensity: f32,
    pub stress_level: f32,
    pub engagement_level: f32,
    pub frustration_level: f32,
    pub activity_kind: ActivityKind,
    pub content_id: Option<String>,
    pub is_alert: bool,
    pub alert_kind: Option<AlertKind>,
    pub alert_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Per-emotion observation counters for one trend slot.
///
/// Tracked so that the slot's dominant emotion can be derived as the
/// most-frequent label rather than the most recent one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionCounts {
    pub joy: i64,
    pub sadness: i64,
    pub frustration: i64,
    pub anxiety: i64,
    pub boredom: i64,
    pub excitement: i64,
    pub fear: i64,
    pub neutral: i64,
    pub uncertainty: i64,
}

impl EmotionCounts {
    pub fn get(&self, label: EmotionLabel) -> i64 {
        match label {
            EmotionLabel::Joy => self.joy,
            EmotionLabel::Sadness => self.sadness,
            EmotionLabel::Frustration => self.frustration,
            EmotionLabel::Anxiety => self.anxiety,
            EmotionLabel::Boredom => self.boredom,
            EmotionLabel::Excitement => self.excitement,
            EmotionLabel::Fear => self.fear,
            EmotionLabel::Neutral => self.neutral,
            EmotionLabel::Uncertainty => self.uncertainty,
        }
    }

    pub fn increment(&mut self, label: EmotionLabel) {
        match label {
            EmotionLabel::Joy => self.joy += 1,
            EmotionLabel::Sadness => self.sadness += 1,
            EmotionLabel::Frustration => self.frustration += 1,
            EmotionLabel::Anxiety => self.anxiety += 1,
            EmotionLabel::Boredom => self.boredom += 1,
            EmotionLabel::Excitement => self.excitement += 1,
            EmotionLabel::Fear => self.fear += 1,
            EmotionLabel::Neutral => self.neutral += 1,
            EmotionLabel::Uncertainty => self.uncertainty += 1,
        }
    }

    /// Most-frequent label in the slot. `latest` breaks ties: if it is among
    /// the labels tied for the maximum count it wins, otherwise the first
    /// tied label in declaration order is returned.
    pub fn dominant(&self, latest: EmotionLabel) -> EmotionLabel {
        let max = EmotionLabel::ALL
            .iter()
            .map(|&label| self.get(label))
            .max()
            .unwrap_or(0);
        if self.get(latest) == max {
            return latest;
        }
        EmotionLabel::ALL
            .iter()
            .copied()
            .find(|&label| self.get(label) == max)
            .unwrap_or(latest)
    }
}

/// Rolling aggregate keyed by (student, calendar date, hour-of-day slot)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionTrend {
    pub student_id: Uuid,
    pub slot_date: NaiveDate,
    /// Hour of day, 0-23
    pub slot_hour: u8,
    /// Running average sentiment over the slot
    pub average_sentiment: f32,
    pub dominant_emotion: EmotionLabel,
    /// Running average stress level over the slot
    pub stress_trend: f32,
    /// Running average engagement level over the slot
    pub engagement_trend: f32,
    pub total_analyses: i64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
    pub emotion_counts: EmotionCounts,
}

/// Notification raised when an observation crosses an alert threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAlert {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Assigned teacher/guardian; None routes the alert to the unassigned
    /// queue rather than dropping it.
    pub recipient_teacher_id: Option<Uuid>,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Risk assessment (derived, never persisted)
// ============================================================================

/// Dropout risk assessment, recomputed fresh on every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropoutRiskAssessment {
    pub student_id: Uuid,
    pub tier: RiskTier,
    pub probability: f32,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f32,
    pub assessed_at: DateTime<Utc>,
}

// ============================================================================
// Caller-supplied inputs
// ============================================================================

/// Cultural/linguistic context for content adaptation.
///
/// Supplied by the caller per request; the pipeline reads it and never
/// mutates or stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CulturalProfile {
    pub culture: String,
    pub language: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub socioeconomic_level: Option<String>,
    pub education_level: EducationLevel,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub traditions: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub taboos: Vec<String>,
    #[serde(default)]
    pub example_phrases: Vec<String>,
}

/// Raw UI interaction metrics captured by the client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorMetrics {
    /// Mean response time in milliseconds
    pub response_time_ms: f32,
    /// Variance of response times
    pub response_time_variance: f32,
    /// Variance of click intervals
    pub click_variance: f32,
    /// Variance of scroll deltas
    pub scroll_variance: f32,
    pub interactions_per_minute: f32,
    pub idle_time_ms: f32,
    /// Fraction of answers that were wrong, [0, 1]
    pub error_rate: f32,
    /// Fraction of tasks retried, [0, 1]
    pub retry_rate: f32,
    pub session_duration_ms: f32,
    /// Fraction of started tasks completed, [0, 1]
    pub task_completion: f32,
    /// Window/tab focus changes during the session
    pub focus_changes: f32,
}

// ============================================================================
// Student history records (read-side contract)
// ============================================================================

/// Student profile as stored by the broader platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    /// Cognitive level estimate in [0, 1]
    pub cognitive_level: f32,
    /// Reading level estimate in [0, 1]
    pub reading_level: f32,
    pub assigned_teacher_id: Option<Uuid>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// One graded assessment result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Normalized score in [0, 1]
    pub score: f32,
    pub taken_at: DateTime<Utc>,
}

/// One completed lesson
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonCompletion {
    pub id: Uuid,
    pub student_id: Uuid,
    pub lesson_id: String,
    pub completed_at: DateTime<Utc>,
}
