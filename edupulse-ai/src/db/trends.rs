//! Emotion trend persistence
//!
//! One row per (student, date, hour) slot. The merge is a single upsert
//! statement whose SET expressions read the pre-update row, so the
//! incremental weighted average and all counter increments happen inside
//! the database — concurrent observations for the same slot cannot lose
//! updates. The dominant-emotion recompute reads the post-merge counters
//! inside the same transaction.

use super::parse_uuid;
use chrono::{NaiveDate, Timelike};
use edupulse_common::types::{EmotionCounts, EmotionLabel, EmotionTrend, SentimentObservation};
use edupulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Sentiment thresholds for the positive/negative/neutral counters
const POSITIVE_THRESHOLD: f32 = 0.2;
const NEGATIVE_THRESHOLD: f32 = -0.2;

/// Merge one observation into its trend slot and return the updated row.
pub async fn upsert_observation(
    pool: &SqlitePool,
    observation: &SentimentObservation,
) -> Result<EmotionTrend> {
    let slot_date = observation.recorded_at.date_naive();
    let slot_hour = observation.recorded_at.hour() as i64;
    let student_id = observation.student_id.to_string();

    let positive = i64::from(observation.sentiment_score > POSITIVE_THRESHOLD);
    let negative = i64::from(observation.sentiment_score < NEGATIVE_THRESHOLD);
    let neutral = i64::from(positive == 0 && negative == 0);

    let mut emotion_increments = [0i64; 9];
    if let Some(index) = EmotionLabel::ALL
        .iter()
        .position(|&l| l == observation.emotion)
    {
        emotion_increments[index] = 1;
    }

    let mut tx = pool.begin().await?;

    // SET expressions reference the pre-update row, so the weighted merge
    // uses the old count and only then advances it.
    let mut query = sqlx::query(
        r#"
        INSERT INTO emotion_trends (
            student_id, slot_date, slot_hour,
            average_sentiment, dominant_emotion, stress_trend, engagement_trend,
            total_analyses, positive_count, negative_count, neutral_count,
            n_joy, n_sadness, n_frustration, n_anxiety, n_boredom,
            n_excitement, n_fear, n_neutral, n_uncertainty
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(student_id, slot_date, slot_hour) DO UPDATE SET
            average_sentiment =
                (average_sentiment * total_analyses + excluded.average_sentiment)
                / (total_analyses + 1),
            stress_trend =
                (stress_trend * total_analyses + excluded.stress_trend)
                / (total_analyses + 1),
            engagement_trend =
                (engagement_trend * total_analyses + excluded.engagement_trend)
                / (total_analyses + 1),
            total_analyses = total_analyses + 1,
            positive_count = positive_count + excluded.positive_count,
            negative_count = negative_count + excluded.negative_count,
            neutral_count = neutral_count + excluded.neutral_count,
            n_joy = n_joy + excluded.n_joy,
            n_sadness = n_sadness + excluded.n_sadness,
            n_frustration = n_frustration + excluded.n_frustration,
            n_anxiety = n_anxiety + excluded.n_anxiety,
            n_boredom = n_boredom + excluded.n_boredom,
            n_excitement = n_excitement + excluded.n_excitement,
            n_fear = n_fear + excluded.n_fear,
            n_neutral = n_neutral + excluded.n_neutral,
            n_uncertainty = n_uncertainty + excluded.n_uncertainty
        "#,
    )
    .bind(&student_id)
    .bind(slot_date.to_string())
    .bind(slot_hour)
    .bind(observation.sentiment_score)
    .bind(observation.emotion.as_str())
    .bind(observation.stress_level)
    .bind(observation.engagement_level)
    .bind(positive)
    .bind(negative)
    .bind(neutral);
    for increment in emotion_increments {
        query = query.bind(increment);
    }
    query.execute(&mut *tx).await?;

    // Recompute dominant emotion from the merged counters
    let row = sqlx::query(
        r#"
        SELECT student_id, slot_date, slot_hour, average_sentiment,
               dominant_emotion, stress_trend, engagement_trend, total_analyses,
               positive_count, negative_count, neutral_count,
               n_joy, n_sadness, n_frustration, n_anxiety, n_boredom,
               n_excitement, n_fear, n_neutral, n_uncertainty
        FROM emotion_trends
        WHERE student_id = ? AND slot_date = ? AND slot_hour = ?
        "#,
    )
    .bind(&student_id)
    .bind(slot_date.to_string())
    .bind(slot_hour)
    .fetch_one(&mut *tx)
    .await?;

    let mut trend = row_to_trend(&row)?;
    let dominant = trend.emotion_counts.dominant(observation.emotion);
    if dominant != trend.dominant_emotion {
        sqlx::query(
            r#"
            UPDATE emotion_trends SET dominant_emotion = ?
            WHERE student_id = ? AND slot_date = ? AND slot_hour = ?
            "#,
        )
        .bind(dominant.as_str())
        .bind(&student_id)
        .bind(slot_date.to_string())
        .bind(slot_hour)
        .execute(&mut *tx)
        .await?;
        trend.dominant_emotion = dominant;
    }

    tx.commit().await?;
    Ok(trend)
}

/// Trend rows for a student since `from_date`, ascending by (date, hour)
pub async fn trends_since(
    pool: &SqlitePool,
    student_id: Uuid,
    from_date: NaiveDate,
) -> Result<Vec<EmotionTrend>> {
    let rows = sqlx::query(
        r#"
        SELECT student_id, slot_date, slot_hour, average_sentiment,
               dominant_emotion, stress_trend, engagement_trend, total_analyses,
               positive_count, negative_count, neutral_count,
               n_joy, n_sadness, n_frustration, n_anxiety, n_boredom,
               n_excitement, n_fear, n_neutral, n_uncertainty
        FROM emotion_trends
        WHERE student_id = ? AND slot_date >= ?
        ORDER BY slot_date ASC, slot_hour ASC
        "#,
    )
    .bind(student_id.to_string())
    .bind(from_date.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_trend).collect()
}

/// Most recent trend rows, newest first (risk prediction input)
pub async fn recent_trends(
    pool: &SqlitePool,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<EmotionTrend>> {
    let rows = sqlx::query(
        r#"
        SELECT student_id, slot_date, slot_hour, average_sentiment,
               dominant_emotion, stress_trend, engagement_trend, total_analyses,
               positive_count, negative_count, neutral_count,
               n_joy, n_sadness, n_frustration, n_anxiety, n_boredom,
               n_excitement, n_fear, n_neutral, n_uncertainty
        FROM emotion_trends
        WHERE student_id = ?
        ORDER BY slot_date DESC, slot_hour DESC
        LIMIT ?
        "#,
    )
    .bind(student_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_trend).collect()
}

fn row_to_trend(row: &sqlx::sqlite::SqliteRow) -> Result<EmotionTrend> {
    let student_id: String = row.try_get("student_id")?;
    let slot_date: String = row.try_get("slot_date")?;
    let dominant: String = row.try_get("dominant_emotion")?;
    let slot_hour: i64 = row.try_get("slot_hour")?;

    Ok(EmotionTrend {
        student_id: parse_uuid(&student_id)?,
        slot_date: slot_date
            .parse()
            .map_err(|e| Error::Internal(format!("Bad slot date in database: {}", e)))?,
        slot_hour: slot_hour as u8,
        average_sentiment: row.try_get("average_sentiment")?,
        dominant_emotion: dominant
            .parse::<EmotionLabel>()
            .map_err(Error::Internal)?,
        stress_trend: row.try_get("stress_trend")?,
        engagement_trend: row.try_get("engagement_trend")?,
        total_analyses: row.try_get("total_analyses")?,
        positive_count: row.try_get("positive_count")?,
        negative_count: row.try_get("negative_count")?,
        neutral_count: row.try_get("neutral_count")?,
        emotion_counts: EmotionCounts {
            joy: row.try_get("n_joy")?,
            sadness: row.try_get("n_sadness")?,
            frustration: row.try_get("n_frustration")?,
            anxiety: row.try_get("n_anxiety")?,
            boredom: row.try_get("n_boredom")?,
            excitement: row.try_get("n_excitement")?,
            fear: row.try_get("n_fear")?,
            neutral: row.try_get("n_neutral")?,
            uncertainty: row.try_get("n_uncertainty")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::{TimeZone, Utc};
    use edupulse_common::types::ActivityKind;

    fn observation_at(
        student_id: Uuid,
        sentiment: f32,
        emotion: EmotionLabel,
        hour: u32,
    ) -> SentimentObservation {
        SentimentObservation {
            id: Uuid::new_v4(),
            student_id,
            session_id: None,
            sentiment_score: sentiment,
            emotion,
            confidence: 0.9,
            intensity: 0.5,
            stress_level: 0.3,
            engagement_level: 0.6,
            frustration_level: 0.1,
            activity_kind: ActivityKind::Lesson,
            content_id: None,
            is_alert: false,
            alert_kind: None,
            alert_message: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 8, 6, hour, 15, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn first_observation_creates_the_slot() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        let trend = upsert_observation(
            &pool,
            &observation_at(student_id, 0.5, EmotionLabel::Joy, 10),
        )
        .await
        .unwrap();

        assert_eq!(trend.total_analyses, 1);
        assert_eq!(trend.average_sentiment, 0.5);
        assert_eq!(trend.dominant_emotion, EmotionLabel::Joy);
        assert_eq!(trend.positive_count, 1);
        assert_eq!(trend.slot_hour, 10);
    }

    #[tokio::test]
    async fn running_average_matches_the_closed_form_mean() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        for sentiment in [0.2f32, 0.4, 0.6] {
            upsert_observation(
                &pool,
                &observation_at(student_id, sentiment, EmotionLabel::Neutral, 9),
            )
            .await
            .unwrap();
        }

        let trends = recent_trends(&pool, student_id, 1).await.unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].total_analyses, 3);
        assert!(
            (trends[0].average_sentiment - 0.4).abs() < 1e-6,
            "incremental merge should equal the simple mean: {}",
            trends[0].average_sentiment
        );
    }

    #[tokio::test]
    async fn counters_partition_the_observations_exactly() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        let sentiments = [0.5f32, 0.3, -0.5, 0.0, 0.1, -0.9, 0.21];
        for sentiment in sentiments {
            upsert_observation(
                &pool,
                &observation_at(student_id, sentiment, EmotionLabel::Neutral, 14),
            )
            .await
            .unwrap();
        }

        let trend = &recent_trends(&pool, student_id, 1).await.unwrap()[0];
        assert_eq!(trend.total_analyses, sentiments.len() as i64);
        assert_eq!(
            trend.positive_count + trend.negative_count + trend.neutral_count,
            sentiments.len() as i64
        );
        assert_eq!(trend.positive_count, 3); // 0.5, 0.3, 0.21
        assert_eq!(trend.negative_count, 2); // -0.5, -0.9
        assert_eq!(trend.neutral_count, 2); // 0.0, 0.1
    }

    #[tokio::test]
    async fn dominant_emotion_is_most_frequent_not_most_recent() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        upsert_observation(&pool, &observation_at(student_id, 0.7, EmotionLabel::Joy, 11))
            .await
            .unwrap();
        upsert_observation(&pool, &observation_at(student_id, 0.7, EmotionLabel::Joy, 11))
            .await
            .unwrap();
        let trend = upsert_observation(
            &pool,
            &observation_at(student_id, -0.1, EmotionLabel::Boredom, 11),
        )
        .await
        .unwrap();

        assert_eq!(trend.dominant_emotion, EmotionLabel::Joy);
        assert_eq!(trend.emotion_counts.joy, 2);
        assert_eq!(trend.emotion_counts.boredom, 1);
    }

    #[tokio::test]
    async fn different_hours_get_different_slots() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        upsert_observation(&pool, &observation_at(student_id, 0.1, EmotionLabel::Neutral, 8))
            .await
            .unwrap();
        upsert_observation(&pool, &observation_at(student_id, 0.1, EmotionLabel::Neutral, 9))
            .await
            .unwrap();

        let trends = trends_since(
            &pool,
            student_id,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(trends.len(), 2);
        // Ascending order by (date, hour)
        assert!(trends[0].slot_hour < trends[1].slot_hour);
        assert!(trends.iter().all(|t| t.total_analyses == 1));
    }

    #[tokio::test]
    async fn concurrent_upserts_do_not_lose_updates() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = pool.clone();
            let obs = observation_at(student_id, 0.3, EmotionLabel::Excitement, 16);
            handles.push(tokio::spawn(async move {
                upsert_observation(&pool, &obs).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let trend = &recent_trends(&pool, student_id, 1).await.unwrap()[0];
        assert_eq!(trend.total_analyses, 10);
        assert_eq!(trend.positive_count, 10);
        assert_eq!(trend.emotion_counts.excitement, 10);
    }
}
