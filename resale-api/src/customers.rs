use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use resale_core::customer::format_phone;
use resale_core::{Customer, CustomerDraft, User};
use resale_shared::Masked;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    /// `(11) 98765-4321` style when the number has 11 digits.
    pub phone_display: Masked<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone_display: Masked(format_phone(&c.phone)),
            email: Masked(c.email),
            phone: Masked(c.phone),
            created_at: c.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/customers", get(list_customers).post(create_customer))
        .route(
            "/v1/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_customers(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let customers = state.catalog.list_customers(user.id).await?;
    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

async fn create_customer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(draft): Json<CustomerDraft>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    let customer = state.catalog.create_customer(user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

async fn get_customer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerResponse>, AppError> {
    Ok(Json(state.catalog.get_customer(user.id, id).await?.into()))
}

async fn update_customer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(draft): Json<CustomerDraft>,
) -> Result<Json<CustomerResponse>, AppError> {
    Ok(Json(state.catalog.update_customer(user.id, id, draft).await?.into()))
}

async fn delete_customer(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_customer(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
