use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::store::{self, NewPronunciationExercise, NewQuiz};
use crate::student::{self, Role};

use super::user::ProgressQuery;
use super::{ROLE_KEY, STUDENT_ID_KEY, error_response};

/// Teacher-role gate; Ok carries the account id of the teacher.
async fn require_teacher(session: &Session) -> Result<i64, Response> {
    let Ok(Some(id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return Err((StatusCode::UNAUTHORIZED, ()).into_response());
    };
    match session.get::<Role>(ROLE_KEY).await {
        Ok(Some(Role::Teacher)) => Ok(id),
        _ => Err((StatusCode::FORBIDDEN, "teacher role required").into_response()),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/exercise",
    method(post),
    request_body = NewPronunciationExercise,
    responses(
        (status = 200, description = "Exercise created", body = i64),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn create_exercise(
    State(database): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewPronunciationExercise>,
) -> impl IntoResponse {
    let author_id = match require_teacher(&session).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match store::create_pronunciation_exercise(&database, author_id, req).await {
        Ok(id) => Json(id).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/exercises",
    method(get),
    responses(
        (status = 200, description = "All exercises including drafts", body = Vec<crate::pronunciation::PronunciationExercise>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn list_exercises(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::list_pronunciation_exercises(&database, false).await {
        Ok(exercises) => Json(exercises).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/remove_exercise/{id}",
    method(post),
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn remove_exercise(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::delete_pronunciation_exercise(&database, id).await {
        Ok(_) => "Exercise removed".into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/quiz",
    method(post),
    request_body = NewQuiz,
    responses(
        (status = 200, description = "Quiz created", body = i64),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn create_quiz(
    State(database): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewQuiz>,
) -> impl IntoResponse {
    let author_id = match require_teacher(&session).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match store::create_quiz(&database, author_id, req).await {
        Ok(id) => Json(id).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/quizzes",
    method(get),
    responses(
        (status = 200, description = "All quizzes including drafts", body = Vec<crate::quiz::Quiz>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn list_quizzes(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::list_quizzes(&database, false).await {
        Ok(quizzes) => Json(quizzes).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/remove_quiz/{id}",
    method(post),
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Quiz removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn remove_quiz(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::delete_quiz(&database, id).await {
        Ok(_) => "Quiz removed".into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/quiz/{id}/attempts",
    method(get),
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Attempts on the quiz, newest first", body = Vec<crate::quiz::QuizAttempt>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn quiz_attempts(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::get_quiz_attempts(&database, id).await {
        Ok(attempts) => Json(attempts).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/student/{id}/progress",
    method(get),
    params(
        ("id" = i64, Path, description = "Student id"),
        ("content_type" = Option<String>, Query, description = "Filter by content type")
    ),
    responses(
        (status = 200, description = "Student progress, most recently updated first", body = Vec<crate::progress::ProgressRecord>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn student_progress(
    State(database): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match store::get_student_progress(&database, id, query.content_type).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api/manager",
    path = "/list_students",
    method(get),
    responses(
        (status = 200, description = "List of accounts", body = Vec<crate::student::StudentInfo>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teacher role required")
    )
)]
pub async fn list_students(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    if let Err(resp) = require_teacher(&session).await {
        return resp;
    }
    match student::get_student_list(&database).await {
        Ok(students) => Json(students).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router() -> Router<SqlitePool> {
    Router::new()
        .route("/exercise", post(create_exercise))
        .route("/exercises", get(list_exercises))
        .route("/remove_exercise/{id}", post(remove_exercise))
        .route("/quiz", post(create_quiz))
        .route("/quizzes", get(list_quizzes))
        .route("/remove_quiz/{id}", post(remove_quiz))
        .route("/quiz/{id}/attempts", get(quiz_attempts))
        .route("/student/{id}/progress", get(student_progress))
        .route("/list_students", get(list_students))
}
