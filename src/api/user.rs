use std::collections::HashMap;

use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::progress::{ContentType, ProgressUpdate};
use crate::store;

use super::{STUDENT_ID_KEY, STUDENT_NAME_KEY, error_response};

#[utoipa::path(
    context_path = "/api/user",
    path = "/exercises",
    method(get),
    responses(
        (status = 200, description = "Published pronunciation exercises", body = Vec<crate::pronunciation::PronunciationExercise>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_exercises(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    let Ok(Some(_)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::list_pronunciation_exercises(&database, true).await {
        Ok(exercises) => Json(exercises).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/exercise/{id}",
    method(get),
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise", body = crate::pronunciation::PronunciationExercise),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_exercise(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Ok(Some(_)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::get_pronunciation_exercise(&database, id).await {
        Ok(exercise) => Json(exercise).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct TranscriptRequest {
    /// Finalized transcript from the speech capture adapter.
    pub transcript: String,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/exercise/{id}/attempt",
    method(post),
    params(("id" = i64, Path, description = "Exercise id")),
    request_body = TranscriptRequest,
    responses(
        (status = 200, description = "Scored attempt", body = crate::pronunciation::PronunciationResult),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    )
)]
pub async fn submit_pronunciation(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<TranscriptRequest>,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::record_pronunciation_attempt(&database, student_id, id, &req.transcript).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/quizzes",
    method(get),
    responses(
        (status = 200, description = "Published quizzes", body = Vec<crate::quiz::Quiz>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_quizzes(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    let Ok(Some(_)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::list_quizzes(&database, true).await {
        Ok(quizzes) => Json(quizzes).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/quiz/{id}",
    method(get),
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Quiz", body = crate::quiz::Quiz),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_quiz(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let Ok(Some(_)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::get_quiz(&database, id).await {
        Ok(quiz) => Json(quiz).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    /// Selected answer per question id; unanswered questions grade as empty.
    #[serde(default)]
    pub answers: HashMap<String, String>,
    /// Seconds spent on the attempt.
    #[serde(default)]
    pub time_spent: u32,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/quiz/{id}/submit",
    method(post),
    params(("id" = i64, Path, description = "Quiz id")),
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "Graded attempt", body = crate::quiz::QuizAttempt),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    )
)]
pub async fn submit_quiz(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<SubmitQuizRequest>,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    let student_name = session
        .get::<String>(STUDENT_NAME_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    match store::submit_quiz(
        &database,
        student_id,
        &student_name,
        id,
        &req.answers,
        req.time_spent,
    )
    .await
    {
        Ok(attempt) => Json(attempt).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ContentEventRequest {
    pub content_type: ContentType,
    pub content_id: String,
    pub content_title: String,
}

fn viewable(content_type: ContentType) -> bool {
    matches!(content_type, ContentType::Lesson | ContentType::Story)
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/content/opened",
    method(post),
    request_body = ContentEventRequest,
    responses(
        (status = 200, description = "Progress updated", body = crate::progress::ProgressRecord),
        (status = 400, description = "Not a viewable content type"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn content_opened(
    State(database): State<SqlitePool>,
    session: Session,
    Json(req): Json<ContentEventRequest>,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    if !viewable(req.content_type) {
        return (StatusCode::BAD_REQUEST, "not a viewable content type").into_response();
    }
    let update = ProgressUpdate::opened(
        student_id,
        req.content_type,
        req.content_id,
        req.content_title,
    );
    match store::upsert_progress(&database, &update).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/content/completed",
    method(post),
    request_body = ContentEventRequest,
    responses(
        (status = 200, description = "Progress updated", body = crate::progress::ProgressRecord),
        (status = 400, description = "Not a viewable content type"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn content_completed(
    State(database): State<SqlitePool>,
    session: Session,
    Json(req): Json<ContentEventRequest>,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    if !viewable(req.content_type) {
        return (StatusCode::BAD_REQUEST, "not a viewable content type").into_response();
    }
    let update = ProgressUpdate::completed(
        student_id,
        req.content_type,
        req.content_id,
        req.content_title,
    );
    match store::upsert_progress(&database, &update).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/vocabulary/session_completed",
    method(post),
    responses(
        (status = 200, description = "Progress updated", body = crate::progress::ProgressRecord),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn vocabulary_session_completed(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    let update = ProgressUpdate::vocabulary_session(student_id);
    match store::upsert_progress(&database, &update).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ProgressQuery {
    pub content_type: Option<ContentType>,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/progress",
    method(get),
    params(("content_type" = Option<String>, Query, description = "Filter by content type")),
    responses(
        (status = 200, description = "Own progress, most recently updated first", body = Vec<crate::progress::ProgressRecord>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_progress(
    State(database): State<SqlitePool>,
    session: Session,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::get_student_progress(&database, student_id, query.content_type).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/attempts",
    method(get),
    responses(
        (status = 200, description = "Own quiz attempts, newest first", body = Vec<crate::quiz::QuizAttempt>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn my_attempts(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match store::get_student_attempts(&database, student_id).await {
        Ok(attempts) => Json(attempts).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router() -> Router<SqlitePool> {
    Router::new()
        .route("/exercises", get(list_exercises))
        .route("/exercise/{id}", get(get_exercise))
        .route("/exercise/{id}/attempt", post(submit_pronunciation))
        .route("/quizzes", get(list_quizzes))
        .route("/quiz/{id}", get(get_quiz))
        .route("/quiz/{id}/submit", post(submit_quiz))
        .route("/content/opened", post(content_opened))
        .route("/content/completed", post(content_completed))
        .route(
            "/vocabulary/session_completed",
            post(vocabulary_session_completed),
        )
        .route("/progress", get(my_progress))
        .route("/attempts", get(my_attempts))
}
