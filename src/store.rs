use std::collections::HashMap;

use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::error::Error;
use crate::progress::{ContentType, ProgressRecord, ProgressUpdate};
use crate::pronunciation::{
    Difficulty, PronunciationExercise, PronunciationResult, compare_pronunciation,
};
use crate::quiz::{Quiz, QuizAttempt, QuizQuestion, grade};
use crate::utils::now_utc;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS student (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'student'
);

CREATE TABLE IF NOT EXISTS pronunciation_exercise (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    target_phrase TEXT NOT NULL,
    target_phonetic TEXT NOT NULL DEFAULT '',
    hints TEXT NOT NULL DEFAULT '[]',
    difficulty TEXT NOT NULL,
    is_published INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    time_limit INTEGER,
    passing_score INTEGER NOT NULL,
    questions TEXT NOT NULL DEFAULT '[]',
    is_published INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_attempt (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL,
    quiz_title TEXT NOT NULL,
    student_id INTEGER NOT NULL,
    student_name TEXT NOT NULL,
    answers TEXT NOT NULL,
    score INTEGER NOT NULL,
    max_score INTEGER NOT NULL,
    percentage INTEGER NOT NULL,
    passed INTEGER NOT NULL,
    time_spent INTEGER NOT NULL,
    completed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress (
    student_id INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    content_id TEXT NOT NULL,
    content_title TEXT NOT NULL,
    status TEXT NOT NULL,
    completion_percentage INTEGER NOT NULL,
    quiz_best_score INTEGER,
    pronunciation_best_score INTEGER,
    last_accessed_at TEXT NOT NULL,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (student_id, content_type, content_id)
);
"#;

pub async fn init_schema(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(db).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// progress ledger

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    student_id: i64,
    content_type: String,
    content_id: String,
    content_title: String,
    status: String,
    completion_percentage: i64,
    quiz_best_score: Option<i64>,
    pronunciation_best_score: Option<i64>,
    last_accessed_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ProgressRow> for ProgressRecord {
    type Error = Error;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(ProgressRecord {
            student_id: row.student_id,
            content_type: row.content_type.parse()?,
            content_id: row.content_id,
            content_title: row.content_title,
            status: row.status.parse()?,
            completion_percentage: row.completion_percentage.clamp(0, 100) as u8,
            quiz_best_score: row.quiz_best_score.map(|s| s.clamp(0, 100) as u8),
            pronunciation_best_score: row.pronunciation_best_score.map(|s| s.clamp(0, 100) as u8),
            last_accessed_at: row.last_accessed_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PROGRESS_COLUMNS: &str = "student_id, content_type, content_id, content_title, status, \
     completion_percentage, quiz_best_score, pronunciation_best_score, \
     last_accessed_at, completed_at, created_at, updated_at";

pub async fn get_content_progress(
    db: &SqlitePool,
    student_id: i64,
    content_type: ContentType,
    content_id: &str,
) -> anyhow::Result<Option<ProgressRecord>> {
    let row = sqlx::query_as::<_, ProgressRow>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM progress \
         WHERE student_id = ? AND content_type = ? AND content_id = ?"
    ))
    .bind(student_id)
    .bind(content_type.as_str())
    .bind(content_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(ProgressRecord::try_from).transpose()?)
}

/// All progress for a student, most recently updated first, optionally
/// filtered by content type. Dashboards derive their counts from this set;
/// there is no server-side aggregation.
pub async fn get_student_progress(
    db: &SqlitePool,
    student_id: i64,
    content_type: Option<ContentType>,
) -> anyhow::Result<Vec<ProgressRecord>> {
    let rows = match content_type {
        Some(content_type) => {
            sqlx::query_as::<_, ProgressRow>(&format!(
                "SELECT {PROGRESS_COLUMNS} FROM progress \
                 WHERE student_id = ? AND content_type = ? ORDER BY updated_at DESC"
            ))
            .bind(student_id)
            .bind(content_type.as_str())
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, ProgressRow>(&format!(
                "SELECT {PROGRESS_COLUMNS} FROM progress \
                 WHERE student_id = ? ORDER BY updated_at DESC"
            ))
            .bind(student_id)
            .fetch_all(db)
            .await?
        }
    };
    rows.into_iter()
        .map(|row| Ok(ProgressRecord::try_from(row)?))
        .collect()
}

/// Read-modify-write of one ledger entry under its composite key. The merge
/// itself is [`ProgressUpdate::apply`]; replaying an event leaves the record
/// unchanged apart from the access timestamps.
pub async fn upsert_progress(
    db: &SqlitePool,
    update: &ProgressUpdate,
) -> anyhow::Result<ProgressRecord> {
    let existing =
        get_content_progress(db, update.student_id, update.content_type, &update.content_id)
            .await?;
    let record = update.apply(existing.as_ref(), now_utc());
    sqlx::query(
        "INSERT INTO progress (student_id, content_type, content_id, content_title, status, \
             completion_percentage, quiz_best_score, pronunciation_best_score, \
             last_accessed_at, completed_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (student_id, content_type, content_id) DO UPDATE SET \
             content_title = excluded.content_title, \
             status = excluded.status, \
             completion_percentage = excluded.completion_percentage, \
             quiz_best_score = excluded.quiz_best_score, \
             pronunciation_best_score = excluded.pronunciation_best_score, \
             last_accessed_at = excluded.last_accessed_at, \
             completed_at = excluded.completed_at, \
             updated_at = excluded.updated_at",
    )
    .bind(record.student_id)
    .bind(record.content_type.as_str())
    .bind(&record.content_id)
    .bind(&record.content_title)
    .bind(record.status.as_str())
    .bind(record.completion_percentage as i64)
    .bind(record.quiz_best_score.map(|s| s as i64))
    .bind(record.pronunciation_best_score.map(|s| s as i64))
    .bind(record.last_accessed_at)
    .bind(record.completed_at)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(db)
    .await?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// pronunciation exercises

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPronunciationExercise {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_phrase: String,
    #[serde(default)]
    pub target_phonetic: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ExerciseRow {
    id: i64,
    title: String,
    description: String,
    target_phrase: String,
    target_phonetic: String,
    hints: String,
    difficulty: String,
    is_published: bool,
    author_id: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ExerciseRow> for PronunciationExercise {
    type Error = anyhow::Error;

    fn try_from(row: ExerciseRow) -> Result<Self, Self::Error> {
        Ok(PronunciationExercise {
            id: row.id,
            title: row.title,
            description: row.description,
            target_phrase: row.target_phrase,
            target_phonetic: row.target_phonetic,
            hints: serde_json::from_str(&row.hints)?,
            difficulty: row.difficulty.parse()?,
            is_published: row.is_published,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn create_pronunciation_exercise(
    db: &SqlitePool,
    author_id: i64,
    new: NewPronunciationExercise,
) -> anyhow::Result<i64> {
    let now = now_utc();
    let hints = serde_json::to_string(&new.hints)?;
    let result = sqlx::query(
        "INSERT INTO pronunciation_exercise (title, description, target_phrase, \
             target_phonetic, hints, difficulty, is_published, author_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.target_phrase)
    .bind(&new.target_phonetic)
    .bind(&hints)
    .bind(new.difficulty.as_str())
    .bind(new.is_published)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    let id = result.last_insert_rowid();
    info!("created pronunciation exercise {}: {}", id, new.title);
    Ok(id)
}

pub async fn get_pronunciation_exercise(
    db: &SqlitePool,
    id: i64,
) -> anyhow::Result<PronunciationExercise> {
    let row = sqlx::query_as::<_, ExerciseRow>(
        "SELECT id, title, description, target_phrase, target_phonetic, hints, difficulty, \
             is_published, author_id, created_at, updated_at \
         FROM pronunciation_exercise WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::NotFound("pronunciation exercise"))?;
    row.try_into()
}

pub async fn list_pronunciation_exercises(
    db: &SqlitePool,
    published_only: bool,
) -> anyhow::Result<Vec<PronunciationExercise>> {
    let rows = sqlx::query_as::<_, ExerciseRow>(
        "SELECT id, title, description, target_phrase, target_phonetic, hints, difficulty, \
             is_published, author_id, created_at, updated_at \
         FROM pronunciation_exercise \
         WHERE is_published = 1 OR ? = 0 \
         ORDER BY created_at DESC",
    )
    .bind(published_only)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Progress records pointing at the exercise are left alone; content deletion
/// does not cascade into the ledger.
pub async fn delete_pronunciation_exercise(db: &SqlitePool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM pronunciation_exercise WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// quizzes and attempts

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewQuiz {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub time_limit: Option<u32>,
    pub passing_score: u8,
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    description: String,
    time_limit: Option<i64>,
    passing_score: i64,
    questions: String,
    is_published: bool,
    author_id: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = anyhow::Error;

    fn try_from(row: QuizRow) -> Result<Self, Self::Error> {
        Ok(Quiz {
            id: row.id,
            title: row.title,
            description: row.description,
            time_limit: row.time_limit.map(|m| m as u32),
            passing_score: row.passing_score.clamp(0, 100) as u8,
            questions: serde_json::from_str(&row.questions)?,
            is_published: row.is_published,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn create_quiz(db: &SqlitePool, author_id: i64, new: NewQuiz) -> anyhow::Result<i64> {
    let now = now_utc();
    let questions = serde_json::to_string(&new.questions)?;
    let result = sqlx::query(
        "INSERT INTO quiz (title, description, time_limit, passing_score, questions, \
             is_published, author_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.time_limit.map(|m| m as i64))
    .bind(new.passing_score as i64)
    .bind(&questions)
    .bind(new.is_published)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    let id = result.last_insert_rowid();
    info!("created quiz {}: {}", id, new.title);
    Ok(id)
}

pub async fn get_quiz(db: &SqlitePool, id: i64) -> anyhow::Result<Quiz> {
    let row = sqlx::query_as::<_, QuizRow>(
        "SELECT id, title, description, time_limit, passing_score, questions, \
             is_published, author_id, created_at, updated_at \
         FROM quiz WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::NotFound("quiz"))?;
    row.try_into()
}

pub async fn list_quizzes(db: &SqlitePool, published_only: bool) -> anyhow::Result<Vec<Quiz>> {
    let rows = sqlx::query_as::<_, QuizRow>(
        "SELECT id, title, description, time_limit, passing_score, questions, \
             is_published, author_id, created_at, updated_at \
         FROM quiz \
         WHERE is_published = 1 OR ? = 0 \
         ORDER BY created_at DESC",
    )
    .bind(published_only)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Attempts and progress referring to the quiz are kept; no cascade.
pub async fn delete_quiz(db: &SqlitePool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM quiz WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    quiz_id: i64,
    quiz_title: String,
    student_id: i64,
    student_name: String,
    answers: String,
    score: i64,
    max_score: i64,
    percentage: i64,
    passed: bool,
    time_spent: i64,
    completed_at: OffsetDateTime,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = anyhow::Error;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(QuizAttempt {
            id: row.id,
            quiz_id: row.quiz_id,
            quiz_title: row.quiz_title,
            student_id: row.student_id,
            student_name: row.student_name,
            answers: serde_json::from_str(&row.answers)?,
            score: row.score as u32,
            max_score: row.max_score as u32,
            percentage: row.percentage.clamp(0, 100) as u8,
            passed: row.passed,
            time_spent: row.time_spent as u32,
            completed_at: row.completed_at,
        })
    }
}

const ATTEMPT_COLUMNS: &str = "id, quiz_id, quiz_title, student_id, student_name, answers, \
     score, max_score, percentage, passed, time_spent, completed_at";

pub async fn get_quiz_attempts(db: &SqlitePool, quiz_id: i64) -> anyhow::Result<Vec<QuizAttempt>> {
    let rows = sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempt \
         WHERE quiz_id = ? ORDER BY completed_at DESC"
    ))
    .bind(quiz_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

pub async fn get_student_attempts(
    db: &SqlitePool,
    student_id: i64,
) -> anyhow::Result<Vec<QuizAttempt>> {
    let rows = sqlx::query_as::<_, AttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempt \
         WHERE student_id = ? ORDER BY completed_at DESC"
    ))
    .bind(student_id)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Grade a submission, persist the attempt, and mark the quiz done in the
/// ledger. Every call creates a fresh attempt; completing the quiz counts
/// even when the attempt failed.
pub async fn submit_quiz(
    db: &SqlitePool,
    student_id: i64,
    student_name: &str,
    quiz_id: i64,
    answers: &HashMap<String, String>,
    time_spent: u32,
) -> anyhow::Result<QuizAttempt> {
    let quiz = get_quiz(db, quiz_id).await?;
    let result = grade(&quiz.questions, quiz.passing_score, answers);
    let completed_at = now_utc();
    let answers_json = serde_json::to_string(&result.answer_results)?;

    let inserted = sqlx::query(
        "INSERT INTO quiz_attempt (quiz_id, quiz_title, student_id, student_name, answers, \
             score, max_score, percentage, passed, time_spent, completed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(quiz_id)
    .bind(&quiz.title)
    .bind(student_id)
    .bind(student_name)
    .bind(&answers_json)
    .bind(result.score as i64)
    .bind(result.max_score as i64)
    .bind(result.percentage as i64)
    .bind(result.passed)
    .bind(time_spent as i64)
    .bind(completed_at)
    .execute(db)
    .await?;

    upsert_progress(
        db,
        &ProgressUpdate::quiz_submitted(
            student_id,
            quiz_id.to_string(),
            quiz.title.clone(),
            result.percentage,
        ),
    )
    .await?;

    info!(
        "student {} submitted quiz {}: {}% (passed: {})",
        student_id, quiz_id, result.percentage, result.passed
    );
    Ok(QuizAttempt {
        id: inserted.last_insert_rowid(),
        quiz_id,
        quiz_title: quiz.title,
        student_id,
        student_name: student_name.to_string(),
        answers: result.answer_results,
        score: result.score,
        max_score: result.max_score,
        percentage: result.percentage,
        passed: result.passed,
        time_spent,
        completed_at,
    })
}

/// Score a finalized transcript against the exercise's target phrase and,
/// when the attempt beats the student's persisted best, fold it into the
/// ledger. The computed result is returned either way; a failed write leaves
/// it valid and retryable.
pub async fn record_pronunciation_attempt(
    db: &SqlitePool,
    student_id: i64,
    exercise_id: i64,
    transcript: &str,
) -> anyhow::Result<PronunciationResult> {
    let exercise = get_pronunciation_exercise(db, exercise_id).await?;
    let result = compare_pronunciation(&exercise.target_phrase, transcript);

    let content_id = exercise_id.to_string();
    let best = get_content_progress(db, student_id, ContentType::Pronunciation, &content_id)
        .await?
        .and_then(|p| p.pronunciation_best_score)
        .unwrap_or(0);
    if result.score > best {
        upsert_progress(
            db,
            &ProgressUpdate::pronunciation_attempt(
                student_id,
                content_id,
                exercise.title,
                result.score,
            ),
        )
        .await?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStatus;
    use crate::quiz::QuestionType;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    fn question(id: &str, correct: &str, points: u32, order: u32) -> QuizQuestion {
        QuizQuestion {
            id: id.to_string(),
            question_text: format!("Question {id}"),
            question_type: QuestionType::FillInBlank,
            options: vec![],
            correct_answer: correct.to_string(),
            explanation: None,
            points,
            order,
        }
    }

    async fn progress_row_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM progress")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_replay_keeps_a_single_record() {
        let db = memory_pool().await;
        let update = ProgressUpdate::opened(1, ContentType::Lesson, "l1", "Present Simple");
        upsert_progress(&db, &update).await.unwrap();
        upsert_progress(&db, &update).await.unwrap();

        assert_eq!(progress_row_count(&db).await, 1);
        let record = get_content_progress(&db, 1, ContentType::Lesson, "l1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ProgressStatus::InProgress);
        assert_eq!(record.completion_percentage, 50);
    }

    #[tokio::test]
    async fn listing_orders_by_most_recent_update_and_filters_by_type() {
        let db = memory_pool().await;
        upsert_progress(
            &db,
            &ProgressUpdate::opened(1, ContentType::Lesson, "l1", "Present Simple"),
        )
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        upsert_progress(
            &db,
            &ProgressUpdate::opened(1, ContentType::Story, "s1", "The Fox"),
        )
        .await
        .unwrap();
        // progress of a different student never shows up
        upsert_progress(
            &db,
            &ProgressUpdate::opened(2, ContentType::Lesson, "l1", "Present Simple"),
        )
        .await
        .unwrap();

        let all = get_student_progress(&db, 1, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content_id, "s1");
        assert_eq!(all[1].content_id, "l1");

        // touching the lesson again moves it to the front
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        upsert_progress(
            &db,
            &ProgressUpdate::completed(1, ContentType::Lesson, "l1", "Present Simple"),
        )
        .await
        .unwrap();
        let all = get_student_progress(&db, 1, None).await.unwrap();
        assert_eq!(all[0].content_id, "l1");
        assert_eq!(all[0].status, ProgressStatus::Completed);

        let lessons = get_student_progress(&db, 1, Some(ContentType::Lesson))
            .await
            .unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].content_type, ContentType::Lesson);
    }

    #[tokio::test]
    async fn submit_quiz_persists_attempt_and_completes_progress() {
        let db = memory_pool().await;
        let quiz_id = create_quiz(
            &db,
            10,
            NewQuiz {
                title: "Tenses".to_string(),
                description: String::new(),
                time_limit: None,
                passing_score: 70,
                questions: vec![question("q1", "went", 1, 1), question("q2", "True", 1, 2)],
                is_published: true,
            },
        )
        .await
        .unwrap();

        let answers = HashMap::from([("q1".to_string(), "went".to_string())]);
        let attempt = submit_quiz(&db, 1, "Ana", quiz_id, &answers, 42).await.unwrap();
        assert_eq!(attempt.score, 1);
        assert_eq!(attempt.max_score, 2);
        assert_eq!(attempt.percentage, 50);
        assert!(!attempt.passed);
        assert_eq!(attempt.answers.len(), 2);

        let record = get_content_progress(&db, 1, ContentType::Quiz, &quiz_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.completion_percentage, 100);
        assert_eq!(record.quiz_best_score, Some(50));

        // a second, better attempt is a new row and raises the best score
        let answers = HashMap::from([
            ("q1".to_string(), "went".to_string()),
            ("q2".to_string(), "true".to_string()),
        ]);
        let attempt = submit_quiz(&db, 1, "Ana", quiz_id, &answers, 30).await.unwrap();
        assert!(attempt.passed);

        let attempts = get_quiz_attempts(&db, quiz_id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        let record = get_content_progress(&db, 1, ContentType::Quiz, &quiz_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.quiz_best_score, Some(100));

        let own = get_student_attempts(&db, 1).await.unwrap();
        assert_eq!(own.len(), 2);
    }

    #[tokio::test]
    async fn submitting_a_missing_quiz_fails() {
        let db = memory_pool().await;
        let err = submit_quiz(&db, 1, "Ana", 999, &HashMap::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn pronunciation_attempts_track_best_score_without_regressing() {
        let db = memory_pool().await;
        let exercise_id = create_pronunciation_exercise(
            &db,
            10,
            NewPronunciationExercise {
                title: "Greetings".to_string(),
                description: String::new(),
                target_phrase: "How are you doing today".to_string(),
                target_phonetic: String::new(),
                hints: vec!["mind the word order".to_string()],
                difficulty: Difficulty::Beginner,
                is_published: true,
            },
        )
        .await
        .unwrap();

        let result = record_pronunciation_attempt(&db, 1, exercise_id, "how are doing today")
            .await
            .unwrap();
        assert_eq!(result.score, 40);
        let record =
            get_content_progress(&db, 1, ContentType::Pronunciation, &exercise_id.to_string())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(record.status, ProgressStatus::InProgress);
        assert_eq!(record.completion_percentage, 40);
        assert_eq!(record.pronunciation_best_score, Some(40));

        let result = record_pronunciation_attempt(&db, 1, exercise_id, "how are you doing today")
            .await
            .unwrap();
        assert_eq!(result.score, 100);
        let record =
            get_content_progress(&db, 1, ContentType::Pronunciation, &exercise_id.to_string())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.pronunciation_best_score, Some(100));
        let completed_at = record.completed_at.unwrap();

        // a worse attempt still returns its own score but leaves the ledger alone
        let result = record_pronunciation_attempt(&db, 1, exercise_id, "something else entirely")
            .await
            .unwrap();
        assert_eq!(result.score, 0);
        let record =
            get_content_progress(&db, 1, ContentType::Pronunciation, &exercise_id.to_string())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.pronunciation_best_score, Some(100));
        assert_eq!(record.completed_at, Some(completed_at));
    }

    #[tokio::test]
    async fn deleting_content_leaves_progress_in_place() {
        let db = memory_pool().await;
        let exercise_id = create_pronunciation_exercise(
            &db,
            10,
            NewPronunciationExercise {
                title: "Greetings".to_string(),
                description: String::new(),
                target_phrase: "good morning".to_string(),
                target_phonetic: String::new(),
                hints: vec![],
                difficulty: Difficulty::Beginner,
                is_published: true,
            },
        )
        .await
        .unwrap();
        record_pronunciation_attempt(&db, 1, exercise_id, "good morning")
            .await
            .unwrap();

        delete_pronunciation_exercise(&db, exercise_id).await.unwrap();
        assert!(get_pronunciation_exercise(&db, exercise_id).await.is_err());
        assert_eq!(progress_row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn published_filter_hides_drafts() {
        let db = memory_pool().await;
        for (title, published) in [("draft", false), ("live", true)] {
            create_pronunciation_exercise(
                &db,
                10,
                NewPronunciationExercise {
                    title: title.to_string(),
                    description: String::new(),
                    target_phrase: "hello".to_string(),
                    target_phonetic: String::new(),
                    hints: vec![],
                    difficulty: Difficulty::Beginner,
                    is_published: published,
                },
            )
            .await
            .unwrap();
        }
        let published = list_pronunciation_exercises(&db, true).await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "live");
        assert_eq!(list_pronunciation_exercises(&db, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn vocabulary_session_uses_the_synthetic_id() {
        let db = memory_pool().await;
        upsert_progress(&db, &ProgressUpdate::vocabulary_session(1))
            .await
            .unwrap();
        let record = get_content_progress(
            &db,
            1,
            ContentType::Vocabulary,
            crate::progress::VOCAB_SESSION_ID,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.completion_percentage, 100);
    }
}
