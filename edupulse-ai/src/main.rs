//! edupulse-ai - Affect Inference Service CLI
//!
//! Operator entry point over the inference pipeline: database setup,
//! development seed data, single-shot analysis, risk assessment, trend
//! queries and diagnostic reports. Results print as JSON on stdout.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use edupulse_ai::manager::StudentAnalysisRequest;
use edupulse_ai::models::AudioClip;
use edupulse_ai::{AiConfig, AnalysisRequest, ModelManager};
use edupulse_common::types::{
    ActivityKind, AssessmentRecord, BehaviorMetrics, LessonCompletion, StudentProfile,
};
use edupulse_common::EventBus;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "edupulse-ai")]
#[command(about = "Student affect inference pipeline", long_about = None)]
struct Cli {
    /// Data folder override (database and model weights)
    #[arg(long, env = "EDUPULSE_DATA_DIR")]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    InitDb,
    /// Load development seed data and print the created ids
    Seed,
    /// Analyze one signal bundle for a student
    Analyze {
        #[arg(long)]
        student: Uuid,
        /// Free text from the student (chat message, answer, reflection)
        #[arg(long)]
        text: Option<String>,
        /// JSON file with behavior metrics
        #[arg(long)]
        behavior_json: Option<PathBuf>,
        /// JSON file with {"sample_rate": .., "samples": [..]}
        #[arg(long)]
        audio_json: Option<PathBuf>,
        #[arg(long, default_value = "lesson")]
        activity: String,
    },
    /// Compute a dropout risk assessment
    Risk {
        #[arg(long)]
        student: Uuid,
    },
    /// Print emotion trends for the last N days
    Trends {
        #[arg(long)]
        student: Uuid,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Generate a diagnostic report from a signal bundle
    Report {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        behavior_json: Option<PathBuf>,
        #[arg(long)]
        audio_json: Option<PathBuf>,
        #[arg(long, default_value = "en")]
        language: String,
    },
}

/// On-disk audio bundle format for the CLI
#[derive(Deserialize)]
struct AudioFile {
    sample_rate: u32,
    samples: Vec<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = AiConfig::resolve(cli.data_dir.as_deref());

    info!("Data folder: {}", config.data_folder.display());
    let pool = edupulse_ai::db::init_database_pool(&config.db_path()).await?;
    let events = EventBus::new(config.event_capacity);

    match cli.command {
        Commands::InitDb => {
            // Pool init already ran the migrations
            println!("Schema ready at {}.", config.db_path().display());
        }
        Commands::Seed => {
            let teacher_id = Uuid::new_v4();
            let student = StudentProfile {
                id: Uuid::new_v4(),
                name: "Demo Student".to_string(),
                age: 11,
                cognitive_level: 0.6,
                reading_level: 0.55,
                assigned_teacher_id: Some(teacher_id),
                language: "en".to_string(),
                created_at: Utc::now(),
            };
            edupulse_ai::db::students::insert_student(&pool, &student).await?;

            for i in 0..6 {
                edupulse_ai::db::students::insert_assessment(
                    &pool,
                    &AssessmentRecord {
                        id: Uuid::new_v4(),
                        student_id: student.id,
                        score: 0.55 + 0.05 * i as f32,
                        taken_at: Utc::now() - chrono::Duration::days(6 - i),
                    },
                )
                .await?;
            }
            for i in 0..8 {
                edupulse_ai::db::students::insert_lesson(
                    &pool,
                    &LessonCompletion {
                        id: Uuid::new_v4(),
                        student_id: student.id,
                        lesson_id: format!("demo-lesson-{}", i),
                        completed_at: Utc::now() - chrono::Duration::days(8 - i),
                    },
                )
                .await?;
            }
            println!("Seeded student {} (teacher {}).", student.id, teacher_id);
        }
        Commands::Analyze {
            student,
            text,
            behavior_json,
            audio_json,
            activity,
        } => {
            let manager = init_manager(&config, &pool, &events).await?;
            let behavior = read_behavior(behavior_json.as_deref())?;
            let audio = read_audio(audio_json.as_deref())?;

            let request = AnalysisRequest {
                student_id: student,
                session_id: None,
                activity_kind: activity.parse::<ActivityKind>().unwrap_or(ActivityKind::Other),
                content_id: None,
                text: text.as_deref(),
                audio: audio.as_ref(),
                behavior: behavior.as_ref(),
            };
            let observation = manager.analyze(&request).await?;
            println!("{}", serde_json::to_string_pretty(&observation)?);
        }
        Commands::Risk { student } => {
            let manager = init_manager(&config, &pool, &events).await?;
            let assessment = manager.predict_risk(student).await?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Commands::Trends { student, days } => {
            let trends = edupulse_ai::TrendAggregator::new(pool.clone(), events.clone());
            let rows = trends.get_trends(student, days).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Report {
            student,
            behavior_json,
            audio_json,
            language,
        } => {
            let manager = init_manager(&config, &pool, &events).await?;
            let request = StudentAnalysisRequest {
                student_id: student,
                behavior: read_behavior(behavior_json.as_deref())?,
                content: None,
                cultural_profile: None,
                audio: read_audio(audio_json.as_deref())?,
                language: Some(language),
            };
            let report = manager.diagnostic_report(&request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn init_manager(
    config: &AiConfig,
    pool: &sqlx::SqlitePool,
    events: &EventBus,
) -> Result<ModelManager> {
    let manager = ModelManager::new(config, pool.clone(), events.clone());
    manager
        .initialize()
        .await
        .context("model initialization failed")?;
    Ok(manager)
}

fn read_behavior(path: Option<&std::path::Path>) -> Result<Option<BehaviorMetrics>> {
    path.map(|path| {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read behavior metrics from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse behavior metrics from {}", path.display()))
    })
    .transpose()
}

fn read_audio(path: Option<&std::path::Path>) -> Result<Option<AudioClip>> {
    path.map(|path| {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read audio from {}", path.display()))?;
        let file: AudioFile = serde_json::from_str(&content)
            .with_context(|| format!("parse audio from {}", path.display()))?;
        Ok(AudioClip {
            samples: file.samples,
            sample_rate: file.sample_rate,
        })
    })
    .transpose()
}
