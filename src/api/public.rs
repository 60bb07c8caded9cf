use axum::{
    Router,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use utoipa::ToSchema;

use crate::student::{self, Role};

use super::{ROLE_KEY, STUDENT_ID_KEY, STUDENT_NAME_KEY, error_response};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/register",
    method(post),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created"),
        (status = 400, description = "Email already registered")
    )
)]
pub async fn register(
    State(database): State<SqlitePool>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let role = req.role.unwrap_or(Role::Student);
    match student::create_student(&database, req.name, req.email, req.password, role).await {
        Ok(_) => "Account created".into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = crate::student::StudentInfo),
        (status = 400, description = "Invalid credentials")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(database): State<SqlitePool>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    match student::login(&database, req.email, req.password).await {
        Ok(info) => {
            if session.insert(STUDENT_ID_KEY, info.id).await.is_err()
                || session.insert(STUDENT_NAME_KEY, &info.name).await.is_err()
                || session.insert(ROLE_KEY, info.role).await.is_err()
            {
                return (StatusCode::INTERNAL_SERVER_ERROR, "session write failed").into_response();
            }
            Json(info).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/logout",
    method(post),
    responses((status = 200, description = "Logout successful"))
)]
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.delete().await;
    "Logout successful".into_response()
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/user_info",
    method(get),
    responses(
        (status = 200, description = "Current account", body = crate::student::StudentInfo),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn user_info(
    State(database): State<SqlitePool>,
    session: Session,
) -> impl IntoResponse {
    let Ok(Some(student_id)) = session.get::<i64>(STUDENT_ID_KEY).await else {
        return (StatusCode::UNAUTHORIZED, ()).into_response();
    };
    match student::get_student_info(&database, student_id).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

pub fn router() -> Router<SqlitePool> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user_info", get(user_info))
}
