pub mod auth;
pub mod orders;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::models::session::Principal;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(orders::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves the current session into the principal for mutating calls.
pub fn current_principal(state: &AppState) -> Result<Principal, AppError> {
    let session = state
        .sessions
        .current()?
        .ok_or_else(|| AppError::Forbidden("login required".to_string()))?;
    Ok(Principal::from(&session))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    session_active: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok",
        orders: state.ledger.find_all()?.len(),
        session_active: state.sessions.current()?.is_some(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
