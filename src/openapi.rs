use crate::AppState;
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopfloor API",
        version = "1.0.0",
        description = r#"
Batch lineage and quantity reconciliation for the shop floor.

- **Batches**: lifecycle from machine output through warehouse recount and QC
  verdicts, with conservation-checked splits and merges
- **Cards**: fixed pool of 20 physical tracking cards per machine
- **Setups**: machine run workflow with a QC-gated transition table
- **Lots**: status repair against live setups
- **Adjustments**: per-setup quantity adjustment components and their total
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "batches", description = "Batch lineage and reconciliation"),
        (name = "cards", description = "Per-machine card pool"),
        (name = "lots", description = "Lot status synchronization"),
        (name = "setups", description = "Setup run workflow"),
        (name = "adjustments", description = "Setup quantity adjustments")
    ),
    paths(
        crate::handlers::batches::create_batch,
        crate::handlers::batches::create_sorting_batch,
        crate::handlers::batches::get_batch,
        crate::handlers::batches::list_children,
        crate::handlers::batches::list_warehouse_pending,
        crate::handlers::batches::recount_batch,
        crate::handlers::batches::start_inspection,
        crate::handlers::batches::inspect_batch,
        crate::handlers::batches::split_batch,
        crate::handlers::batches::merge_batches,
        crate::handlers::batches::archive_batch,
        crate::handlers::cards::list_pool,
        crate::handlers::cards::provision,
        crate::handlers::cards::release,
        crate::handlers::cards::mark_lost,
        crate::handlers::cards::reset,
        crate::handlers::lots::get_lot_status,
        crate::handlers::lots::sync_lot,
        crate::handlers::lots::sweep_lots,
        crate::handlers::lots::list_lot_batches,
        crate::handlers::lots::list_lot_setups,
        crate::handlers::setups::create_setup,
        crate::handlers::setups::get_setup,
        crate::handlers::setups::update_status,
        crate::handlers::setups::set_additional_quantity,
        crate::handlers::setups::get_adjustments,
        crate::handlers::setups::record_manual_adjustment,
        crate::handlers::setups::recompute_warehouse,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::batch::BatchLocation,
        crate::entities::lot::LotStatus,
        crate::entities::setup_job::SetupStatus,
        crate::services::batches::InspectionOutcome,
        crate::handlers::batches::CreateBatchRequest,
        crate::handlers::batches::CreateSortingBatchRequest,
        crate::handlers::batches::RecountRequest,
        crate::handlers::batches::StartInspectionRequest,
        crate::handlers::batches::InspectRequest,
        crate::handlers::batches::SplitChildRequest,
        crate::handlers::batches::SplitRequest,
        crate::handlers::batches::MergeRequest,
        crate::handlers::cards::ProvisionResult,
        crate::handlers::lots::LotStatusResponse,
        crate::handlers::lots::SyncResponse,
        crate::handlers::lots::SweepResponse,
        crate::handlers::setups::CreateSetupRequest,
        crate::handlers::setups::UpdateStatusRequest,
        crate::handlers::setups::AdditionalQuantityRequest,
        crate::handlers::setups::ManualAdjustmentRequest,
    ))
)]
pub struct ApiDoc;

/// Serves the generated document; a UI can be pointed at it externally.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
