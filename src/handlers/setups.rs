use crate::{
    entities::setup_job::SetupStatus,
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input},
    services::setups::{CreateSetupCommand, UpdateSetupStatusCommand},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSetupRequest {
    pub lot_id: i32,
    pub machine_id: i32,
    pub employee_id: Option<i32>,
    #[validate(range(min = 1))]
    pub planned_quantity: i32,
    pub cycle_time: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub new_status: SetupStatus,
    pub qa_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdditionalQuantityRequest {
    pub additional_quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualAdjustmentRequest {
    pub delta: i32,
    pub employee_id: i32,
}

pub fn setups_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_setup))
        .route("/:id", get(get_setup))
        .route("/:id/status", post(update_status))
        .route("/:id/additional-quantity", put(set_additional_quantity))
        .route("/:id/adjustments", get(get_adjustments))
        .route("/:id/adjustments/manual", post(record_manual_adjustment))
        .route(
            "/:id/adjustments/recompute-warehouse",
            post(recompute_warehouse),
        )
}

/// Register a setup for a lot on a machine
#[utoipa::path(
    post,
    path = "/api/v1/setups",
    request_body = CreateSetupRequest,
    responses(
        (status = 201, description = "Setup registered at created"),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Lot is terminal", body = crate::errors::ErrorResponse)
    ),
    tag = "setups"
)]
pub async fn create_setup(
    State(state): State<AppState>,
    Json(payload): Json<CreateSetupRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let created = state
        .services
        .setups
        .create_setup(CreateSetupCommand {
            lot_id: payload.lot_id,
            machine_id: payload.machine_id,
            employee_id: payload.employee_id,
            planned_quantity: payload.planned_quantity,
            cycle_time: payload.cycle_time,
        })
        .await?;
    Ok(created_response(created))
}

/// Get a setup by id
#[utoipa::path(
    get,
    path = "/api/v1/setups/{id}",
    responses(
        (status = 200, description = "Setup found"),
        (status = 404, description = "Setup not found", body = crate::errors::ErrorResponse)
    ),
    tag = "setups"
)]
pub async fn get_setup(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.services.setups.get_setup(id).await?;
    Ok(success_response(found))
}

/// Drive a setup through the workflow transition table
#[utoipa::path(
    post,
    path = "/api/v1/setups/{id}/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed"),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "setups"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: id,
            new_status: payload.new_status,
            qa_id: payload.qa_id,
        })
        .await?;
    Ok(success_response(updated))
}

/// Replace the setup's additional quantity
#[utoipa::path(
    put,
    path = "/api/v1/setups/{id}/additional-quantity",
    request_body = AdditionalQuantityRequest,
    responses(
        (status = 200, description = "Quantity replaced"),
        (status = 409, description = "Setup is terminal", body = crate::errors::ErrorResponse)
    ),
    tag = "setups"
)]
pub async fn set_additional_quantity(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<AdditionalQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .setups
        .set_additional_quantity(id, payload.additional_quantity)
        .await?;
    Ok(success_response(updated))
}

/// Four-component adjustment breakdown for the setup
#[utoipa::path(
    get,
    path = "/api/v1/setups/{id}/adjustments",
    responses((status = 200, description = "Adjustment breakdown")),
    tag = "adjustments"
)]
pub async fn get_adjustments(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let breakdown = state.services.adjustments.breakdown(id).await?;
    Ok(success_response(breakdown))
}

/// Record a manual adjustment delta, attributed to an employee
#[utoipa::path(
    post,
    path = "/api/v1/setups/{id}/adjustments/manual",
    request_body = ManualAdjustmentRequest,
    responses((status = 200, description = "Adjustment recorded")),
    tag = "adjustments"
)]
pub async fn record_manual_adjustment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ManualAdjustmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .adjustments
        .record_manual(id, payload.delta, payload.employee_id)
        .await?;
    Ok(success_response(updated))
}

/// Recompute the warehouse discrepancy component from current batch state
#[utoipa::path(
    post,
    path = "/api/v1/setups/{id}/adjustments/recompute-warehouse",
    responses((status = 200, description = "Component recomputed")),
    tag = "adjustments"
)]
pub async fn recompute_warehouse(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .adjustments
        .recompute_warehouse_discrepancy(id)
        .await?;
    Ok(success_response(updated))
}
