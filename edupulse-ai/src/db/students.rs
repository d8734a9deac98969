//! Student, assessment and lesson history access
//!
//! These tables are owned by the broader platform; the pipeline reads them
//! as risk-prediction inputs. The insert helpers exist for the seed command
//! and tests.

use super::parse_uuid;
use chrono::{DateTime, Utc};
use edupulse_common::types::{AssessmentRecord, LessonCompletion, StudentProfile};
use edupulse_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Load a student profile; `Ok(None)` when the id is unknown
pub async fn get_student(pool: &SqlitePool, student_id: Uuid) -> Result<Option<StudentProfile>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, age, cognitive_level, reading_level,
               assigned_teacher_id, language, created_at
        FROM students
        WHERE id = ?
        "#,
    )
    .bind(student_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let id: String = row.try_get("id")?;
        let teacher: Option<String> = row.try_get("assigned_teacher_id")?;
        let created_at: String = row.try_get("created_at")?;
        let age: i64 = row.try_get("age")?;

        Ok(StudentProfile {
            id: parse_uuid(&id)?,
            name: row.try_get("name")?,
            age: age as u8,
            cognitive_level: row.try_get("cognitive_level")?,
            reading_level: row.try_get("reading_level")?,
            assigned_teacher_id: teacher.as_deref().map(parse_uuid).transpose()?,
            language: row.try_get("language")?,
            created_at: parse_timestamp(&created_at)?,
        })
    })
    .transpose()
}

/// Insert a student (seed/test fixture)
pub async fn insert_student(pool: &SqlitePool, student: &StudentProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO students (
            id, name, age, cognitive_level, reading_level,
            assigned_teacher_id, language, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student.id.to_string())
    .bind(&student.name)
    .bind(student.age as i64)
    .bind(student.cognitive_level)
    .bind(student.reading_level)
    .bind(student.assigned_teacher_id.map(|id| id.to_string()))
    .bind(&student.language)
    .bind(student.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent assessments, newest first
pub async fn recent_assessments(
    pool: &SqlitePool,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<AssessmentRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, score, taken_at
        FROM assessments
        WHERE student_id = ?
        ORDER BY taken_at DESC
        LIMIT ?
        "#,
    )
    .bind(student_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            let student: String = row.try_get("student_id")?;
            let taken_at: String = row.try_get("taken_at")?;
            Ok(AssessmentRecord {
                id: parse_uuid(&id)?,
                student_id: parse_uuid(&student)?,
                score: row.try_get("score")?,
                taken_at: parse_timestamp(&taken_at)?,
            })
        })
        .collect()
}

/// Insert an assessment (seed/test fixture)
pub async fn insert_assessment(pool: &SqlitePool, assessment: &AssessmentRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO assessments (id, student_id, score, taken_at) VALUES (?, ?, ?, ?)",
    )
    .bind(assessment.id.to_string())
    .bind(assessment.student_id.to_string())
    .bind(assessment.score)
    .bind(assessment.taken_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent lesson completions, newest first
pub async fn recent_lessons(
    pool: &SqlitePool,
    student_id: Uuid,
    limit: i64,
) -> Result<Vec<LessonCompletion>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, lesson_id, completed_at
        FROM lesson_completions
        WHERE student_id = ?
        ORDER BY completed_at DESC
        LIMIT ?
        "#,
    )
    .bind(student_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            let student: String = row.try_get("student_id")?;
            let completed_at: String = row.try_get("completed_at")?;
            Ok(LessonCompletion {
                id: parse_uuid(&id)?,
                student_id: parse_uuid(&student)?,
                lesson_id: row.try_get("lesson_id")?,
                completed_at: parse_timestamp(&completed_at)?,
            })
        })
        .collect()
}

/// Total completed lessons for a student
pub async fn lesson_count(pool: &SqlitePool, student_id: Uuid) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM lesson_completions WHERE student_id = ?")
        .bind(student_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("n")?)
}

/// Insert a lesson completion (seed/test fixture)
pub async fn insert_lesson(pool: &SqlitePool, lesson: &LessonCompletion) -> Result<()> {
    sqlx::query(
        "INSERT INTO lesson_completions (id, student_id, lesson_id, completed_at) VALUES (?, ?, ?, ?)",
    )
    .bind(lesson.id.to_string())
    .bind(lesson.student_id.to_string())
    .bind(&lesson.lesson_id)
    .bind(lesson.completed_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in database: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn student(teacher: Option<Uuid>) -> StudentProfile {
        StudentProfile {
            id: Uuid::new_v4(),
            name: "Avery Lee".to_string(),
            age: 11,
            cognitive_level: 0.6,
            reading_level: 0.55,
            assigned_teacher_id: teacher,
            language: "en".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn student_round_trips_including_teacher() {
        let pool = init_memory_pool().await.unwrap();
        let teacher = Uuid::new_v4();
        let original = student(Some(teacher));

        insert_student(&pool, &original).await.unwrap();
        let loaded = get_student(&pool, original.id).await.unwrap().unwrap();

        assert_eq!(loaded.name, "Avery Lee");
        assert_eq!(loaded.age, 11);
        assert_eq!(loaded.assigned_teacher_id, Some(teacher));
    }

    #[tokio::test]
    async fn unknown_student_is_none() {
        let pool = init_memory_pool().await.unwrap();
        assert!(get_student(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assessments_come_back_newest_first() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        for (i, score) in [0.9f32, 0.7, 0.5].iter().enumerate() {
            insert_assessment(
                &pool,
                &AssessmentRecord {
                    id: Uuid::new_v4(),
                    student_id,
                    score: *score,
                    taken_at: Utc::now() + chrono::Duration::seconds(i as i64),
                },
            )
            .await
            .unwrap();
        }

        let loaded = recent_assessments(&pool, student_id, 2).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].score, 0.5, "latest assessment first");
    }

    #[tokio::test]
    async fn lesson_count_counts_all_rows() {
        let pool = init_memory_pool().await.unwrap();
        let student_id = Uuid::new_v4();

        for i in 0..4 {
            insert_lesson(
                &pool,
                &LessonCompletion {
                    id: Uuid::new_v4(),
                    student_id,
                    lesson_id: format!("lesson-{}", i),
                    completed_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(lesson_count(&pool, student_id).await.unwrap(), 4);
        assert_eq!(recent_lessons(&pool, student_id, 2).await.unwrap().len(), 2);
    }
}
