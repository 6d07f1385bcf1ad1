use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::account::{AccountView, Role};
use crate::models::session::Session;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AccountView>, AppError> {
    let account = state.directory.register(
        &payload.username,
        &payload.password,
        payload.role,
        &payload.display_name,
    )?;

    state.metrics.registrations_total.inc();
    Ok(Json(AccountView::from(account)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let account = state
        .directory
        .authenticate(&payload.username, &payload.password, payload.role)
        .inspect_err(|_| {
            state
                .metrics
                .login_attempts_total
                .with_label_values(&["failure"])
                .inc();
        })?;

    let session = state.sessions.login(&account)?;
    state
        .metrics
        .login_attempts_total
        .with_label_values(&["success"])
        .inc();

    Ok(Json(session))
}

async fn logout(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.sessions.logout()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(State(state): State<Arc<AppState>>) -> Result<Json<Session>, AppError> {
    state
        .sessions
        .current()?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no active session".to_string()))
}
