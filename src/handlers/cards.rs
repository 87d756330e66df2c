use crate::{
    errors::ServiceError,
    handlers::common::{no_content_response, success_response},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionResult {
    pub machine_id: i32,
    pub cards_created: u32,
}

/// Mounted under /machines; every card belongs to exactly one machine's pool.
pub fn cards_router() -> Router<AppState> {
    Router::new()
        .route("/:machine_id/cards", get(list_pool))
        .route("/:machine_id/cards/provision", post(provision))
        .route("/:machine_id/cards/:card_number/release", post(release))
        .route("/:machine_id/cards/:card_number/lost", post(mark_lost))
        .route("/:machine_id/cards/:card_number/reset", post(reset))
}

/// Full card pool state for a machine
#[utoipa::path(
    get,
    path = "/api/v1/machines/{machine_id}/cards",
    responses((status = 200, description = "Pool state, ordered by card number")),
    tag = "cards"
)]
pub async fn list_pool(
    State(state): State<AppState>,
    Path(machine_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let pool = state.services.cards.pool_state(machine_id).await?;
    Ok(success_response(pool))
}

/// Provision the machine's card rows 1..=20 (idempotent)
#[utoipa::path(
    post,
    path = "/api/v1/machines/{machine_id}/cards/provision",
    responses((status = 200, description = "Missing card rows created")),
    tag = "cards"
)]
pub async fn provision(
    State(state): State<AppState>,
    Path(machine_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let cards_created = state.services.cards.provision_machine(machine_id).await?;
    Ok(Json(ProvisionResult {
        machine_id,
        cards_created,
    }))
}

/// Manually release a card slot
#[utoipa::path(
    post,
    path = "/api/v1/machines/{machine_id}/cards/{card_number}/release",
    responses(
        (status = 204, description = "Card released"),
        (status = 409, description = "Card is lost; reset it first", body = crate::errors::ErrorResponse)
    ),
    tag = "cards"
)]
pub async fn release(
    State(state): State<AppState>,
    Path((machine_id, card_number)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cards.release(machine_id, card_number).await?;
    Ok(no_content_response())
}

/// Take a physically lost card out of circulation
#[utoipa::path(
    post,
    path = "/api/v1/machines/{machine_id}/cards/{card_number}/lost",
    responses((status = 204, description = "Card marked lost")),
    tag = "cards"
)]
pub async fn mark_lost(
    State(state): State<AppState>,
    Path((machine_id, card_number)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .cards
        .mark_lost(machine_id, card_number)
        .await?;
    Ok(no_content_response())
}

/// Return a lost or stuck card to the free pool
#[utoipa::path(
    post,
    path = "/api/v1/machines/{machine_id}/cards/{card_number}/reset",
    responses((status = 204, description = "Card reset to free")),
    tag = "cards"
)]
pub async fn reset(
    State(state): State<AppState>,
    Path((machine_id, card_number)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cards.reset(machine_id, card_number).await?;
    Ok(no_content_response())
}
