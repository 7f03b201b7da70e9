use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use resale_core::{NewUser, User};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::issue_token, state::AppState};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
}

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = state
        .accounts
        .register(NewUser {
            name: req.name,
            email: req.email,
            phone: req.phone,
            password: req.password,
            is_admin: false,
        })
        .await?;
    let token = issue_token(&state.auth, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// POST /v1/auth/login
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<AuthResponse>, AppError> {
    let user = state.accounts.authenticate(&req.email, &req.password).await?;
    let token = issue_token(&state.auth, &user)?;
    tracing::debug!("User {} logged in", user.id);

    Ok(Json(AuthResponse { token, user }))
}
