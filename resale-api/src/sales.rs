use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use resale_core::{Dashboard, NewSale, SaleFilter, SaleUpdate, User};
use resale_order::Sale;
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sales", get(list_sales).post(create_sale))
        .route("/v1/sales/events", get(sale_events))
        .route("/v1/sales/{id}", get(get_sale).put(update_sale).delete(delete_sale))
        .route("/v1/sales/{id}/confirm", post(confirm_sale))
        .route("/v1/sales/{id}/cancel", post(cancel_sale))
        .route("/v1/dashboard", get(dashboard))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/sales?status=&customer_id=
async fn list_sales(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<Vec<Sale>>, AppError> {
    Ok(Json(state.sales.list_sales(user.id, &filter).await?))
}

async fn create_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(new_sale): Json<NewSale>,
) -> Result<(StatusCode, Json<Sale>), AppError> {
    let sale = state.sales.create_sale(user.id, new_sale).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn get_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.sales.get_sale(user.id, id).await?))
}

async fn update_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(update): Json<SaleUpdate>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.sales.update_sale(user.id, id, update).await?))
}

async fn delete_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sales.delete_sale(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/sales/{id}/confirm
/// Allocates codes to every line item. 409 with shortage details when an
/// app runs out.
async fn confirm_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.sales.confirm_sale(user.id, id).await?))
}

/// POST /v1/sales/{id}/cancel
async fn cancel_sale(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.sales.cancel_sale(user.id, id).await?))
}

/// GET /v1/sales/events
/// Server-sent stream of the caller's own sale events.
async fn sale_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner_id = user.id;

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(move |result| async move {
        match result {
            Ok(event) if event.owner_id() == owner_id => match Event::default().event(event.kind()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::error!("Failed to encode sale event: {}", e);
                    None
                }
            },
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("SSE client for {} lagged, {} event(s) dropped", owner_id, skipped);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /v1/dashboard
async fn dashboard(State(state): State<AppState>, Extension(user): Extension<User>) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(state.sales.dashboard(user.id).await?))
}
