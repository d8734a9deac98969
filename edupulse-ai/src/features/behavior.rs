//! Behavioral interaction features
//!
//! Normalizes raw UI interaction metrics into [0, 1]-bounded features and
//! appends explicit cross-terms. The cross-terms are part of the contract:
//! the first model layer has no nonlinearity over raw inputs, so interaction
//! effects (e.g. erratic clicking *and* erratic scrolling together) must be
//! present as inputs.

use super::{unit, BEHAVIOR_FEATURE_DIM};
use edupulse_common::types::BehaviorMetrics;

// Normalization ceilings; values beyond these clamp to 1.0
const RESPONSE_TIME_CEILING_MS: f32 = 10_000.0;
const VARIANCE_CEILING: f32 = 25_000_000.0;
const INTERACTIONS_CEILING_PER_MIN: f32 = 60.0;
const IDLE_CEILING_MS: f32 = 60_000.0;
const SESSION_CEILING_MS: f32 = 3_600_000.0;
const FOCUS_CHANGES_CEILING: f32 = 30.0;

/// Extract the fixed-width behavioral feature vector.
///
/// Layout:
/// - `[0..11)` normalized raw metrics
/// - `[11..14)` cross-terms (variance product, pace x frequency, tempo product)
/// - `[14]` overall activity summary
pub fn extract(metrics: &BehaviorMetrics) -> [f32; BEHAVIOR_FEATURE_DIM] {
    let mut features = [0.0f32; BEHAVIOR_FEATURE_DIM];

    let response_time = unit(metrics.response_time_ms / RESPONSE_TIME_CEILING_MS);
    let response_variance = unit(metrics.response_time_variance / VARIANCE_CEILING);
    let click_variance = unit(metrics.click_variance / VARIANCE_CEILING);
    let scroll_variance = unit(metrics.scroll_variance / VARIANCE_CEILING);
    let frequency = unit(metrics.interactions_per_minute / INTERACTIONS_CEILING_PER_MIN);
    let idle = unit(metrics.idle_time_ms / IDLE_CEILING_MS);

    features[0] = response_time;
    features[1] = response_variance;
    features[2] = click_variance;
    features[3] = scroll_variance;
    features[4] = frequency;
    features[5] = idle;
    features[6] = unit(metrics.error_rate);
    features[7] = unit(metrics.retry_rate);
    features[8] = unit(metrics.session_duration_ms / SESSION_CEILING_MS);
    features[9] = unit(metrics.task_completion);
    features[10] = unit(metrics.focus_changes / FOCUS_CHANGES_CEILING);

    // Cross-terms
    features[11] = click_variance * scroll_variance;
    features[12] = response_time * frequency;
    features[13] = response_variance * click_variance;

    // Overall activity: engaged sessions interact often, finish tasks and
    // spend little time idle
    features[14] = (frequency + features[9] + (1.0 - idle)) / 3.0;

    features
}
