use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use resale_catalog::{Combo, ComboDraft};
use resale_core::User;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct ComboResponse {
    #[serde(flatten)]
    pub combo: Combo,
    /// What the apps would cost bought one by one.
    pub list_price_cents: i64,
}

impl From<Combo> for ComboResponse {
    fn from(combo: Combo) -> Self {
        Self {
            list_price_cents: combo.list_price_cents(),
            combo,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/combos", get(list_combos).post(create_combo))
        .route("/v1/combos/{id}", get(get_combo).delete(delete_combo))
}

async fn list_combos(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ComboResponse>>, AppError> {
    let combos = state.catalog.list_combos(user.id).await?;
    Ok(Json(combos.into_iter().map(ComboResponse::from).collect()))
}

async fn create_combo(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(draft): Json<ComboDraft>,
) -> Result<(StatusCode, Json<ComboResponse>), AppError> {
    let combo = state.catalog.create_combo(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(combo.into())))
}

async fn get_combo(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<ComboResponse>, AppError> {
    Ok(Json(state.catalog.get_combo(user.id, id).await?.into()))
}

async fn delete_combo(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_combo(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
