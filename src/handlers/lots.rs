use crate::{
    entities::lot::LotStatus,
    errors::ServiceError,
    handlers::common::success_response,
    services::lot_status::SyncOutcome,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct LotStatusResponse {
    pub lot_id: i32,
    pub status: LotStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub lot_id: i32,
    pub repaired: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub repaired_lot_ids: Vec<i32>,
}

pub fn lots_router() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sweep_lots))
        .route("/:id/status", get(get_lot_status))
        .route("/:id/sync", post(sync_lot))
        .route("/:id/batches", get(list_lot_batches))
        .route("/:id/setups", get(list_lot_setups))
}

/// Current lot status
#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/status",
    responses(
        (status = 200, description = "Lot status", body = LotStatusResponse),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lots"
)]
pub async fn get_lot_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = state.services.lot_status.get_status(id).await?;
    Ok(success_response(LotStatusResponse { lot_id: id, status }))
}

/// Repair one lot's status against its setups (idempotent)
#[utoipa::path(
    post,
    path = "/api/v1/lots/{id}/sync",
    responses(
        (status = 200, description = "Repair outcome", body = SyncResponse),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lots"
)]
pub async fn sync_lot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.lot_status.sync_lot(id).await?;
    Ok(success_response(SyncResponse {
        lot_id: id,
        repaired: outcome == SyncOutcome::Promoted,
    }))
}

/// Sweep all pre-production lots and repair the ones that lag
#[utoipa::path(
    post,
    path = "/api/v1/lots/sync",
    responses((status = 200, description = "Ids of repaired lots", body = SweepResponse)),
    tag = "lots"
)]
pub async fn sweep_lots(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let repaired_lot_ids = state.services.lot_status.sweep().await?;
    Ok(success_response(SweepResponse { repaired_lot_ids }))
}

/// Non-archived batches of a lot
#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/batches",
    responses((status = 200, description = "Batches of the lot")),
    tag = "lots"
)]
pub async fn list_lot_batches(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let batches = state.services.batches.batches_for_lot(id).await?;
    Ok(success_response(batches))
}

/// Setups registered for a lot, newest first
#[utoipa::path(
    get,
    path = "/api/v1/lots/{id}/setups",
    responses((status = 200, description = "Setups of the lot")),
    tag = "lots"
)]
pub async fn list_lot_setups(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let setups = state.services.setups.setups_for_lot(id).await?;
    Ok(success_response(setups))
}
