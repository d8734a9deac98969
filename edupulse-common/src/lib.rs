//! # EduPulse Common Library
//!
//! Shared code for the EduPulse affect-inference services including:
//! - Error taxonomy (`Error` enum)
//! - Domain types (observations, trends, alerts, risk assessments)
//! - Event types and the `EventBus`
//! - Configuration loading and data folder resolution

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventBus, PulseEvent};
