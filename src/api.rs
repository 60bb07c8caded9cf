pub mod manager;
pub mod public;
pub mod user;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlx::SqlitePool;
use utoipa::OpenApi;

use crate::error::Error;

pub const STUDENT_ID_KEY: &str = "student_id";
pub const STUDENT_NAME_KEY: &str = "student_name";
pub const ROLE_KEY: &str = "role";

pub fn api_router(database: SqlitePool) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .nest("/public", public::router())
                .nest("/user", user::router())
                .nest("/manager", manager::router()),
        )
        .with_state(database)
}

pub(crate) fn error_response(e: anyhow::Error) -> Response {
    match e.downcast_ref::<Error>() {
        Some(Error::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Some(Error::AlreadySubmitted) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(OpenApi)]
#[openapi(paths(
    public::register,
    public::login,
    public::logout,
    public::user_info,
    user::list_exercises,
    user::get_exercise,
    user::submit_pronunciation,
    user::list_quizzes,
    user::get_quiz,
    user::submit_quiz,
    user::content_opened,
    user::content_completed,
    user::vocabulary_session_completed,
    user::my_progress,
    user::my_attempts,
    manager::create_exercise,
    manager::list_exercises,
    manager::remove_exercise,
    manager::create_quiz,
    manager::list_quizzes,
    manager::remove_quiz,
    manager::quiz_attempts,
    manager::student_progress,
    manager::list_students,
))]
pub struct ApiDoc;

pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("openapi document serializes")
}
