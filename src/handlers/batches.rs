use crate::{
    entities::batch::BatchLocation,
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input},
    services::batches::{
        CreateBatchCommand, InspectBatchCommand, InspectionOutcome, MergeBatchesCommand,
        RecountBatchCommand, SplitBatchCommand, SplitChild,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBatchRequest {
    pub setup_job_id: i32,
    #[validate(range(min = 1))]
    pub initial_quantity: i32,
    pub operator_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSortingBatchRequest {
    pub lot_id: i32,
    pub operator_id: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecountRequest {
    #[validate(range(min = 0))]
    pub recounted_quantity: i32,
    pub warehouse_employee_id: i32,
    pub operator_reported_quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartInspectionRequest {
    pub qc_inspector_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InspectRequest {
    pub qc_inspector_id: i32,
    pub outcome: InspectionOutcome,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitChildRequest {
    pub quantity: i32,
    pub target_location: BatchLocation,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitRequest {
    pub children: Vec<SplitChildRequest>,
    pub operator_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeRequest {
    pub batch_ids: Vec<i32>,
    pub target_location: BatchLocation,
    pub employee_id: Option<i32>,
}

pub fn batches_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_batch))
        .route("/sorting", post(create_sorting_batch))
        .route("/merge", post(merge_batches))
        .route("/warehouse/pending", get(list_warehouse_pending))
        .route("/:id", get(get_batch))
        .route("/:id/children", get(list_children))
        .route("/:id/recount", post(recount_batch))
        .route("/:id/inspection/start", post(start_inspection))
        .route("/:id/inspect", post(inspect_batch))
        .route("/:id/split", post(split_batch))
        .route("/:id/archive", post(archive_batch))
}

/// Create a production batch under an active setup
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created with an assigned card"),
        (status = 404, description = "Setup not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Setup inactive or card pool exhausted", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let created = state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: payload.setup_job_id,
            initial_quantity: payload.initial_quantity,
            operator_id: payload.operator_id,
        })
        .await?;
    Ok(created_response(created))
}

/// Create a sorting scratch batch for a lot
#[utoipa::path(
    post,
    path = "/api/v1/batches/sorting",
    request_body = CreateSortingBatchRequest,
    responses(
        (status = 201, description = "Sorting batch created"),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn create_sorting_batch(
    State(state): State<AppState>,
    Json(payload): Json<CreateSortingBatchRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state
        .services
        .batches
        .create_sorting_batch(payload.lot_id, payload.operator_id)
        .await?;
    Ok(created_response(created))
}

/// Get a batch by id
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    responses(
        (status = 200, description = "Batch found"),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.services.batches.get_batch(id).await?;
    Ok(success_response(found))
}

/// Direct children of a batch in the lineage forest
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}/children",
    responses((status = 200, description = "Child batches")),
    tag = "batches"
)]
pub async fn list_children(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let children = state.services.batches.children(id).await?;
    Ok(success_response(children))
}

/// Batches awaiting warehouse acceptance, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/batches/warehouse/pending",
    responses((status = 200, description = "Pending batches")),
    tag = "batches"
)]
pub async fn list_warehouse_pending(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let pending = state.services.batches.warehouse_pending().await?;
    Ok(success_response(pending))
}

/// Warehouse recount and acceptance
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/recount",
    request_body = RecountRequest,
    responses(
        (status = 200, description = "Batch recounted and moved to warehouse_counted"),
        (status = 409, description = "Batch archived or not in a recountable location", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn recount_batch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<RecountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let updated = state
        .services
        .batches
        .recount(RecountBatchCommand {
            batch_id: id,
            recounted_quantity: payload.recounted_quantity,
            warehouse_employee_id: payload.warehouse_employee_id,
            operator_reported_quantity: payload.operator_reported_quantity,
        })
        .await?;
    Ok(success_response(updated))
}

/// Move a counted batch onto the QC bench
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/inspection/start",
    request_body = StartInspectionRequest,
    responses(
        (status = 200, description = "Batch under inspection"),
        (status = 409, description = "Batch not in warehouse_counted", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn start_inspection(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<StartInspectionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .batches
        .start_inspection(id, payload.qc_inspector_id)
        .await?;
    Ok(success_response(updated))
}

/// Record the QC verdict for a batch
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/inspect",
    request_body = InspectRequest,
    responses(
        (status = 200, description = "Verdict recorded"),
        (status = 409, description = "Batch not under inspection", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn inspect_batch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<InspectRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .batches
        .inspect(InspectBatchCommand {
            batch_id: id,
            qc_inspector_id: payload.qc_inspector_id,
            outcome: payload.outcome,
            comment: payload.comment,
        })
        .await?;
    Ok(success_response(updated))
}

/// Split a batch into children whose quantities sum to the parent's
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/split",
    request_body = SplitRequest,
    responses(
        (status = 201, description = "Children created, parent archived"),
        (status = 422, description = "Children do not sum to the parent quantity", body = crate::errors::ErrorResponse),
        (status = 409, description = "Batch archived or concurrently modified", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn split_batch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<SplitRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let children = state
        .services
        .batches
        .split(SplitBatchCommand {
            batch_id: id,
            children: payload
                .children
                .into_iter()
                .map(|c| SplitChild {
                    quantity: c.quantity,
                    target_location: c.target_location,
                })
                .collect(),
            operator_id: payload.operator_id,
        })
        .await?;
    Ok(created_response(children))
}

/// Merge batches of one lot into a fresh batch
#[utoipa::path(
    post,
    path = "/api/v1/batches/merge",
    request_body = MergeRequest,
    responses(
        (status = 201, description = "Merged batch created, sources archived"),
        (status = 400, description = "Batches span lots or fewer than two given", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn merge_batches(
    State(state): State<AppState>,
    Json(payload): Json<MergeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let merged = state
        .services
        .batches
        .merge(MergeBatchesCommand {
            batch_ids: payload.batch_ids,
            target_location: payload.target_location,
            employee_id: payload.employee_id,
        })
        .await?;
    Ok(created_response(merged))
}

/// Archive a batch, preserving its location and freeing its card
#[utoipa::path(
    post,
    path = "/api/v1/batches/{id}/archive",
    responses(
        (status = 200, description = "Batch archived"),
        (status = 409, description = "Batch already archived", body = crate::errors::ErrorResponse)
    ),
    tag = "batches"
)]
pub async fn archive_batch(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let archived = state.services.batches.archive(id).await?;
    Ok(success_response(archived))
}
