use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use resale_catalog::{format_code, App, AppDraft, Code, CodeImportReport};
use resale_core::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CodeListQuery {
    pub used: Option<bool>,
}

/// Either a list of codes, a newline separated text block, or both.
#[derive(Debug, Deserialize)]
pub struct ImportCodesRequest {
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ImportCodesRequest {
    fn into_entries(self) -> Vec<String> {
        let mut entries = self.codes;
        if let Some(text) = self.text {
            entries.extend(text.lines().map(str::to_owned));
        }
        entries
    }
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub id: Uuid,
    pub app_id: Uuid,
    pub code: String,
    /// Dash-grouped rendering of `code`.
    pub display: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Code> for CodeResponse {
    fn from(c: Code) -> Self {
        Self {
            display: format_code(&c.code),
            id: c.id,
            app_id: c.app_id,
            code: c.code,
            used: c.used,
            created_at: c.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/apps", get(list_apps).post(create_app))
        .route("/v1/apps/{id}", get(get_app).put(update_app).delete(delete_app))
        .route("/v1/apps/{id}/codes", get(list_codes).post(import_codes))
        .route("/v1/codes/{id}", delete(delete_code))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_apps(State(state): State<AppState>, Extension(user): Extension<User>) -> Result<Json<Vec<App>>, AppError> {
    Ok(Json(state.catalog.list_apps(user.id).await?))
}

async fn create_app(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(draft): Json<AppDraft>,
) -> Result<(StatusCode, Json<App>), AppError> {
    let app = state.catalog.create_app(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

async fn get_app(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<App>, AppError> {
    Ok(Json(state.catalog.get_app(user.id, id).await?))
}

async fn update_app(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(draft): Json<AppDraft>,
) -> Result<Json<App>, AppError> {
    Ok(Json(state.catalog.update_app(user.id, id, draft).await?))
}

async fn delete_app(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_app(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/apps/{id}/codes?used=
async fn list_codes(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(app_id): Path<Uuid>,
    Query(query): Query<CodeListQuery>,
) -> Result<Json<Vec<CodeResponse>>, AppError> {
    let codes = state.catalog.list_codes(user.id, app_id, query.used).await?;
    Ok(Json(codes.into_iter().map(CodeResponse::from).collect()))
}

/// POST /v1/apps/{id}/codes
/// Bulk import; the report lists what was accepted and what was rejected.
async fn import_codes(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(app_id): Path<Uuid>,
    Json(req): Json<ImportCodesRequest>,
) -> Result<Json<CodeImportReport>, AppError> {
    let entries = req.into_entries();
    if entries.iter().all(|e| e.trim().is_empty()) {
        return Err(AppError::ValidationError("no codes submitted".into()));
    }
    Ok(Json(state.catalog.import_codes(user.id, app_id, &entries).await?))
}

async fn delete_code(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_code(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_request_merges_text() {
        let req: ImportCodesRequest = serde_json::from_value(serde_json::json!({
            "codes": ["1111222233334444"],
            "text": "5555666677778888\r\n\n9999000011112222"
        }))
        .unwrap();
        let entries = req.into_entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1], "5555666677778888");
    }
}
