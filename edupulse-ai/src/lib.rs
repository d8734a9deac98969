//! edupulse-ai library interface
//!
//! Student affect inference: feature extraction over text/audio/behavior
//! signals, per-signal models, emotion trend aggregation, dropout risk
//! prediction, threshold alerting and the orchestration layer that
//! composes them.

pub mod alerts;
pub mod config;
pub mod db;
pub mod features;
pub mod manager;
pub mod models;
pub mod nn;
pub mod pipeline;
pub mod risk;
pub mod trends;

pub use config::AiConfig;
pub use manager::ModelManager;
pub use models::sentiment::AnalysisRequest;
pub use models::AudioClip;
pub use pipeline::AnalysisPipeline;
pub use risk::DropoutRiskPredictor;
pub use trends::TrendAggregator;
