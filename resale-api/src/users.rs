use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use resale_core::{NewUser, ProfileUpdate, User};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Routes for the signed-in user's own account.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me", get(get_profile).put(update_profile))
        .route("/v1/me/password", put(change_password))
}

/// Account administration, mounted under `/v1/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", delete(delete_user))
}

async fn get_profile(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.accounts.update_profile(user.id, update).await?))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .accounts
        .change_password(user.id, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.accounts.list_users().await?))
}

/// POST /v1/admin/users
async fn create_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.accounts.create_user(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// DELETE /v1/admin/users/{id}
async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.accounts.delete_user(admin.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
