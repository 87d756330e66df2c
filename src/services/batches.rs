use crate::{
    db::DbPool,
    entities::{
        batch::{self, BatchLocation, Entity as Batch},
        lot::Entity as Lot,
        setup_job::Entity as SetupJob,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::adjustments::{flatten_txn_err, AdjustmentService},
    services::cards::CardService,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchCommand {
    pub setup_job_id: i32,
    pub initial_quantity: i32,
    pub operator_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecountBatchCommand {
    pub batch_id: i32,
    pub recounted_quantity: i32,
    pub warehouse_employee_id: i32,
    /// When absent, falls back to the batch's stored operator-reported
    /// quantity, then to its last known current quantity.
    pub operator_reported_quantity: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InspectionOutcome {
    Good,
    Defect,
    Rework,
}

impl InspectionOutcome {
    pub fn location(self) -> BatchLocation {
        match self {
            InspectionOutcome::Good => BatchLocation::Good,
            InspectionOutcome::Defect => BatchLocation::Defect,
            InspectionOutcome::Rework => BatchLocation::ReworkRepair,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectBatchCommand {
    pub batch_id: i32,
    pub qc_inspector_id: i32,
    pub outcome: InspectionOutcome,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SplitChild {
    pub quantity: i32,
    pub target_location: BatchLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitBatchCommand {
    pub batch_id: i32,
    pub children: Vec<SplitChild>,
    /// Recorded on the children; defaults to the parent's operator.
    pub operator_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeBatchesCommand {
    pub batch_ids: Vec<i32>,
    pub target_location: BatchLocation,
    pub employee_id: Option<i32>,
}

/// Result of creating a production batch: the row plus the card slot that
/// now travels with the physical container.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBatch {
    pub batch: batch::Model,
    pub card_number: i32,
}

/// Owns the batch lifecycle: creation (card-gated), warehouse recounting,
/// QC inspection, splits, merges and archival. Every operation is a single
/// transaction; validation failures are never partially applied.
#[derive(Clone)]
pub struct BatchService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    discrepancy_alert_threshold: Decimal,
}

impl BatchService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        discrepancy_alert_threshold: f64,
    ) -> Self {
        let threshold =
            Decimal::try_from(discrepancy_alert_threshold).unwrap_or_else(|_| dec!(5.0));
        Self {
            db_pool,
            event_sender,
            discrepancy_alert_threshold: threshold,
        }
    }

    /// Create a production batch under an active setup. Acquires a card for
    /// the setup's machine inside the same transaction, so an exhausted pool
    /// rolls the whole creation back.
    pub async fn create_batch(
        &self,
        cmd: CreateBatchCommand,
    ) -> Result<CreatedBatch, ServiceError> {
        if cmd.initial_quantity < 1 {
            return Err(ServiceError::ValidationError(
                "initial_quantity must be at least 1".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let (created, machine_id, card_number) = db
            .transaction::<_, (batch::Model, i32, i32), ServiceError>(move |txn| {
                Box::pin(async move {
                    let setup = SetupJob::find_by_id(cmd.setup_job_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "setup job {} not found",
                                cmd.setup_job_id
                            ))
                        })?;

                    if !setup.status.is_active() {
                        return Err(ServiceError::InvalidState(format!(
                            "setup job {} is {:?}; batches can only be created under an active setup",
                            setup.id, setup.status
                        )));
                    }

                    let now = Utc::now();
                    let created = batch::ActiveModel {
                        id: NotSet,
                        setup_job_id: Set(Some(setup.id)),
                        lot_id: Set(setup.lot_id),
                        parent_batch_id: Set(None),
                        initial_quantity: Set(cmd.initial_quantity),
                        current_quantity: Set(cmd.initial_quantity),
                        current_location: Set(BatchLocation::Production),
                        original_location: Set(None),
                        operator_id: Set(Some(cmd.operator_id)),
                        operator_reported_quantity: Set(None),
                        recounted_quantity: Set(None),
                        discrepancy_absolute: Set(None),
                        discrepancy_percentage: Set(None),
                        admin_acknowledged_discrepancy: Set(false),
                        warehouse_employee_id: Set(None),
                        warehouse_received_at: Set(None),
                        qc_inspector_id: Set(None),
                        qc_start_time: Set(None),
                        qc_end_time: Set(None),
                        qc_comment: Set(None),
                        batch_time: Set(now),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    let card_number =
                        CardService::acquire_on(txn, setup.machine_id, created.id).await?;

                    Ok((created, setup.machine_id, card_number))
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        info!(
            batch_id = created.id,
            setup_job_id = ?created.setup_job_id,
            card_number,
            "batch created"
        );
        self.event_sender
            .publish(Event::BatchCreated {
                batch_id: created.id,
                setup_job_id: created.setup_job_id.unwrap_or_default(),
                card_number,
            })
            .await;
        self.event_sender
            .publish(Event::CardAcquired {
                machine_id,
                card_number,
                batch_id: created.id,
            })
            .await;

        Ok(CreatedBatch {
            batch: created,
            card_number,
        })
    }

    /// Warehouse scratch container for material awaiting triage: quantity 0,
    /// no setup, no card.
    pub async fn create_sorting_batch(
        &self,
        lot_id: i32,
        operator_id: i32,
    ) -> Result<batch::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        Lot::find_by_id(lot_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("lot {lot_id} not found")))?;

        let now = Utc::now();
        let created = batch::ActiveModel {
            id: NotSet,
            setup_job_id: Set(None),
            lot_id: Set(lot_id),
            parent_batch_id: Set(None),
            initial_quantity: Set(0),
            current_quantity: Set(0),
            current_location: Set(BatchLocation::Sorting),
            original_location: Set(None),
            operator_id: Set(Some(operator_id)),
            operator_reported_quantity: Set(None),
            recounted_quantity: Set(None),
            discrepancy_absolute: Set(None),
            discrepancy_percentage: Set(None),
            admin_acknowledged_discrepancy: Set(false),
            warehouse_employee_id: Set(None),
            warehouse_received_at: Set(None),
            qc_inspector_id: Set(None),
            qc_start_time: Set(None),
            qc_end_time: Set(None),
            qc_comment: Set(None),
            batch_time: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        self.event_sender
            .publish(Event::SortingBatchCreated {
                batch_id: created.id,
                lot_id,
            })
            .await;
        Ok(created)
    }

    /// Warehouse recount. Records the recounted quantity and the discrepancy
    /// against the operator-reported figure, then moves the batch to
    /// `warehouse_counted`. A discrepancy is never an error: above-threshold
    /// differences are flagged for admin acknowledgement and alerted, but the
    /// transition always goes through. `current_quantity` is left untouched —
    /// it only ever decreases via split.
    pub async fn recount(&self, cmd: RecountBatchCommand) -> Result<batch::Model, ServiceError> {
        if cmd.recounted_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "recounted_quantity must be non-negative".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let updated = db
            .transaction::<_, batch::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = load_batch(txn, cmd.batch_id).await?;
                    if found.current_location.is_archived() {
                        return Err(ServiceError::ImmutableBatch(found.id));
                    }
                    if !found.current_location.accepts_recount() {
                        return Err(ServiceError::InvalidState(format!(
                            "batch {} cannot be recounted from {:?}",
                            found.id, found.current_location
                        )));
                    }

                    let reported = cmd
                        .operator_reported_quantity
                        .or(found.operator_reported_quantity)
                        .unwrap_or(found.current_quantity);
                    let (absolute, percentage) =
                        discrepancy(Some(reported), cmd.recounted_quantity);

                    guard_location(txn, &found, BatchLocation::WarehouseCounted).await?;

                    let mut active: batch::ActiveModel = found.clone().into();
                    active.operator_reported_quantity = Set(Some(reported));
                    active.recounted_quantity = Set(Some(cmd.recounted_quantity));
                    active.discrepancy_absolute = Set(absolute);
                    active.discrepancy_percentage = Set(percentage);
                    active.admin_acknowledged_discrepancy = Set(false);
                    // Location already flipped by the guard; keep the model in step.
                    active.current_location = Set(BatchLocation::WarehouseCounted);
                    active.warehouse_employee_id = Set(Some(cmd.warehouse_employee_id));
                    active.warehouse_received_at = Set(Some(Utc::now()));
                    active.updated_at = Set(Utc::now());
                    let updated = active.update(txn).await?;

                    if let Some(setup_job_id) = updated.setup_job_id {
                        AdjustmentService::recompute_warehouse_discrepancy_on(txn, setup_job_id)
                            .await?;
                    }

                    Ok(updated)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        self.event_sender
            .publish(Event::BatchRecounted {
                batch_id: updated.id,
                discrepancy_absolute: updated.discrepancy_absolute,
            })
            .await;

        if let Some(percentage) = updated.discrepancy_percentage {
            if percentage > self.discrepancy_alert_threshold {
                self.event_sender
                    .publish(Event::BatchDiscrepancyAlert {
                        batch_id: updated.id,
                        operator_reported_quantity: updated
                            .operator_reported_quantity
                            .unwrap_or_default(),
                        recounted_quantity: updated.recounted_quantity.unwrap_or_default(),
                        discrepancy_absolute: updated.discrepancy_absolute.unwrap_or_default(),
                        discrepancy_percentage: percentage.to_string(),
                    })
                    .await;
            }
        }

        Ok(updated)
    }

    /// Move a counted batch onto the QC bench.
    pub async fn start_inspection(
        &self,
        batch_id: i32,
        qc_inspector_id: i32,
    ) -> Result<batch::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let updated = db
            .transaction::<_, batch::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = load_batch(txn, batch_id).await?;
                    if found.current_location.is_archived() {
                        return Err(ServiceError::ImmutableBatch(found.id));
                    }
                    if found.current_location != BatchLocation::WarehouseCounted {
                        return Err(ServiceError::InvalidState(format!(
                            "batch {} cannot enter inspection from {:?}",
                            found.id, found.current_location
                        )));
                    }

                    guard_location(txn, &found, BatchLocation::Inspection).await?;

                    let mut active: batch::ActiveModel = found.into();
                    active.qc_inspector_id = Set(Some(qc_inspector_id));
                    active.qc_start_time = Set(Some(Utc::now()));
                    active.updated_at = Set(Utc::now());
                    // Location already flipped by the guard; keep the model in step.
                    active.current_location = Set(BatchLocation::Inspection);
                    let updated = active.update(txn).await?;

                    if let Some(setup_job_id) = updated.setup_job_id {
                        // The batch just left warehouse_counted.
                        AdjustmentService::recompute_warehouse_discrepancy_on(txn, setup_job_id)
                            .await?;
                    }
                    Ok(updated)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        Ok(updated)
    }

    /// Record the QC verdict for a batch on the bench. The whole batch takes
    /// the outcome location; a partial verdict is expressed as a split from
    /// `inspection` instead.
    pub async fn inspect(&self, cmd: InspectBatchCommand) -> Result<batch::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let updated = db
            .transaction::<_, batch::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = load_batch(txn, cmd.batch_id).await?;
                    if found.current_location.is_archived() {
                        return Err(ServiceError::ImmutableBatch(found.id));
                    }
                    if found.current_location != BatchLocation::Inspection {
                        return Err(ServiceError::InvalidState(format!(
                            "batch {} is not under inspection (currently {:?})",
                            found.id, found.current_location
                        )));
                    }

                    let outcome_location = cmd.outcome.location();
                    guard_location(txn, &found, outcome_location).await?;

                    let mut active: batch::ActiveModel = found.clone().into();
                    active.current_location = Set(outcome_location);
                    active.qc_inspector_id = Set(Some(cmd.qc_inspector_id));
                    active.qc_end_time = Set(Some(Utc::now()));
                    active.qc_comment = Set(cmd.comment.clone());
                    active.updated_at = Set(Utc::now());
                    let updated = active.update(txn).await?;

                    if let Some(setup_job_id) = updated.setup_job_id {
                        match cmd.outcome {
                            InspectionOutcome::Defect => {
                                AdjustmentService::record_defect_on(
                                    txn,
                                    setup_job_id,
                                    updated.current_quantity,
                                )
                                .await?;
                            }
                            InspectionOutcome::Rework => {
                                // Rework extends the run automatically until
                                // the parts come back repaired.
                                AdjustmentService::record_auto_on(
                                    txn,
                                    setup_job_id,
                                    updated.current_quantity,
                                )
                                .await?;
                            }
                            InspectionOutcome::Good => {}
                        }
                    }
                    Ok(updated)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        info!(
            batch_id = updated.id,
            location = ?updated.current_location,
            "batch inspected"
        );
        self.event_sender
            .publish(Event::BatchInspected {
                batch_id: updated.id,
                outcome: updated.current_location,
            })
            .await;
        Ok(updated)
    }

    /// Split a batch into children. Conservation is enforced: the children's
    /// quantities must sum exactly to the parent's current quantity, or the
    /// whole operation fails with `QuantityMismatch` and nothing changes.
    /// On success the parent is archived (its prior location preserved), its
    /// card is released, and each child starts life at its target location
    /// inheriting the parent's setup, lot and lineage pointer.
    pub async fn split(&self, cmd: SplitBatchCommand) -> Result<Vec<batch::Model>, ServiceError> {
        if cmd.children.is_empty() {
            return Err(ServiceError::ValidationError(
                "split requires at least one child".to_string(),
            ));
        }
        if cmd.children.iter().any(|c| c.quantity < 1) {
            return Err(ServiceError::ValidationError(
                "every split child quantity must be at least 1".to_string(),
            ));
        }
        if cmd
            .children
            .iter()
            .any(|c| c.target_location == BatchLocation::Archived)
        {
            return Err(ServiceError::ValidationError(
                "split children cannot target the archived location".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let (children, parent_id, released) = db
            .transaction::<_, (Vec<batch::Model>, i32, Option<(i32, i32)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let parent = load_batch(txn, cmd.batch_id).await?;
                        if parent.current_location.is_archived() {
                            return Err(ServiceError::ImmutableBatch(parent.id));
                        }

                        let children_sum: i32 = cmd.children.iter().map(|c| c.quantity).sum();
                        if children_sum != parent.current_quantity {
                            return Err(ServiceError::QuantityMismatch {
                                parent_quantity: parent.current_quantity,
                                children_sum,
                            });
                        }

                        // Archive the parent under an optimistic guard on the
                        // location we just read; split's conservation check is
                        // a read-then-write on current_quantity.
                        guard_archive(txn, &parent).await?;

                        let now = Utc::now();
                        let mut created = Vec::with_capacity(cmd.children.len());
                        for child in &cmd.children {
                            let inserted = batch::ActiveModel {
                                id: NotSet,
                                setup_job_id: Set(parent.setup_job_id),
                                lot_id: Set(parent.lot_id),
                                parent_batch_id: Set(Some(parent.id)),
                                initial_quantity: Set(child.quantity),
                                current_quantity: Set(child.quantity),
                                current_location: Set(child.target_location),
                                original_location: Set(None),
                                operator_id: Set(cmd.operator_id.or(parent.operator_id)),
                                operator_reported_quantity: Set(None),
                                recounted_quantity: Set(None),
                                discrepancy_absolute: Set(None),
                                discrepancy_percentage: Set(None),
                                admin_acknowledged_discrepancy: Set(false),
                                warehouse_employee_id: Set(None),
                                warehouse_received_at: Set(None),
                                qc_inspector_id: Set(None),
                                qc_start_time: Set(None),
                                qc_end_time: Set(None),
                                qc_comment: Set(None),
                                batch_time: Set(now),
                                created_at: Set(now),
                                updated_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                            created.push(inserted);
                        }

                        if let Some(setup_job_id) = parent.setup_job_id {
                            let defect_total: i32 = cmd
                                .children
                                .iter()
                                .filter(|c| c.target_location == BatchLocation::Defect)
                                .map(|c| c.quantity)
                                .sum();
                            if defect_total > 0 {
                                AdjustmentService::record_defect_on(txn, setup_job_id, defect_total)
                                    .await?;
                            }
                            let rework_total: i32 = cmd
                                .children
                                .iter()
                                .filter(|c| {
                                    matches!(
                                        c.target_location,
                                        BatchLocation::ReworkRepair
                                            | BatchLocation::PendingRework
                                    )
                                })
                                .map(|c| c.quantity)
                                .sum();
                            if rework_total > 0 {
                                AdjustmentService::record_auto_on(txn, setup_job_id, rework_total)
                                    .await?;
                            }
                            AdjustmentService::recompute_warehouse_discrepancy_on(
                                txn,
                                setup_job_id,
                            )
                            .await?;
                        }

                        let released = CardService::release_batch_card_on(txn, parent.id).await?;

                        Ok((created, parent.id, released))
                    })
                },
            )
            .await
            .map_err(flatten_txn_err)?;

        info!(
            parent_batch_id = parent_id,
            children = children.len(),
            "batch split"
        );
        self.event_sender
            .publish(Event::BatchSplit {
                parent_batch_id: parent_id,
                child_batch_ids: children.iter().map(|c| c.id).collect(),
            })
            .await;
        if let Some((machine_id, card_number)) = released {
            self.event_sender
                .publish(Event::CardReleased {
                    machine_id,
                    card_number,
                })
                .await;
        }

        Ok(children)
    }

    /// Merge several non-archived batches of one lot into a fresh root batch
    /// carrying the summed quantity; the sources are archived and their cards
    /// released. The merged batch keeps the sources' setup only when they all
    /// agree on it.
    pub async fn merge(&self, cmd: MergeBatchesCommand) -> Result<batch::Model, ServiceError> {
        if cmd.batch_ids.len() < 2 {
            return Err(ServiceError::ValidationError(
                "merge requires at least two batches".to_string(),
            ));
        }
        if cmd.target_location == BatchLocation::Archived {
            return Err(ServiceError::ValidationError(
                "merge cannot target the archived location".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let (merged, source_ids, released) = db
            .transaction::<_, (batch::Model, Vec<i32>, Vec<(i32, i32)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let sources = Batch::find()
                            .filter(batch::Column::Id.is_in(cmd.batch_ids.clone()))
                            .all(txn)
                            .await?;
                        if sources.len() != cmd.batch_ids.len() {
                            return Err(ServiceError::NotFound(
                                "some batches to merge were not found".to_string(),
                            ));
                        }
                        if let Some(archived) =
                            sources.iter().find(|b| b.current_location.is_archived())
                        {
                            return Err(ServiceError::ImmutableBatch(archived.id));
                        }
                        let lot_id = sources[0].lot_id;
                        if sources.iter().any(|b| b.lot_id != lot_id) {
                            return Err(ServiceError::InvalidOperation(
                                "batches from different lots cannot be merged".to_string(),
                            ));
                        }

                        let total: i32 = sources.iter().map(|b| b.current_quantity).sum();
                        let setup_job_id = sources[0].setup_job_id.filter(|first| {
                            sources.iter().all(|b| b.setup_job_id == Some(*first))
                        });

                        let mut released = Vec::new();
                        for source in &sources {
                            guard_archive(txn, source).await?;
                            if let Some(slot) =
                                CardService::release_batch_card_on(txn, source.id).await?
                            {
                                released.push(slot);
                            }
                        }

                        let now = Utc::now();
                        let merged = batch::ActiveModel {
                            id: NotSet,
                            setup_job_id: Set(setup_job_id),
                            lot_id: Set(lot_id),
                            parent_batch_id: Set(None),
                            initial_quantity: Set(total),
                            current_quantity: Set(total),
                            current_location: Set(cmd.target_location),
                            original_location: Set(None),
                            operator_id: Set(cmd.employee_id),
                            operator_reported_quantity: Set(None),
                            recounted_quantity: Set(None),
                            discrepancy_absolute: Set(None),
                            discrepancy_percentage: Set(None),
                            admin_acknowledged_discrepancy: Set(false),
                            warehouse_employee_id: Set(None),
                            warehouse_received_at: Set(None),
                            qc_inspector_id: Set(None),
                            qc_start_time: Set(None),
                            qc_end_time: Set(None),
                            qc_comment: Set(None),
                            batch_time: Set(now),
                            created_at: Set(now),
                            updated_at: Set(now),
                        }
                        .insert(txn)
                        .await?;

                        let mut setup_ids: Vec<i32> =
                            sources.iter().filter_map(|b| b.setup_job_id).collect();
                        if let Some(id) = merged.setup_job_id {
                            setup_ids.push(id);
                        }
                        setup_ids.sort_unstable();
                        setup_ids.dedup();
                        for setup_job_id in setup_ids {
                            AdjustmentService::recompute_warehouse_discrepancy_on(
                                txn,
                                setup_job_id,
                            )
                            .await?;
                        }

                        Ok((merged, sources.iter().map(|b| b.id).collect(), released))
                    })
                },
            )
            .await
            .map_err(flatten_txn_err)?;

        info!(
            new_batch_id = merged.id,
            sources = ?source_ids,
            "batches merged"
        );
        self.event_sender
            .publish(Event::BatchesMerged {
                new_batch_id: merged.id,
                source_batch_ids: source_ids,
            })
            .await;
        for (machine_id, card_number) in released {
            self.event_sender
                .publish(Event::CardReleased {
                    machine_id,
                    card_number,
                })
                .await;
        }

        Ok(merged)
    }

    /// Direct terminal transition for a fully consumed batch. Preserves the
    /// location it held for downstream statistics and releases its card.
    pub async fn archive(&self, batch_id: i32) -> Result<batch::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let (archived, released, prior) = db
            .transaction::<_, (batch::Model, Option<(i32, i32)>, BatchLocation), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let found = load_batch(txn, batch_id).await?;
                        if found.current_location.is_archived() {
                            return Err(ServiceError::ImmutableBatch(found.id));
                        }
                        let prior = found.current_location;

                        guard_archive(txn, &found).await?;
                        let released =
                            CardService::release_batch_card_on(txn, found.id).await?;

                        if prior == BatchLocation::WarehouseCounted {
                            if let Some(setup_job_id) = found.setup_job_id {
                                AdjustmentService::recompute_warehouse_discrepancy_on(
                                    txn,
                                    setup_job_id,
                                )
                                .await?;
                            }
                        }

                        let archived = load_batch(txn, batch_id).await?;
                        Ok((archived, released, prior))
                    })
                },
            )
            .await
            .map_err(flatten_txn_err)?;

        self.event_sender
            .publish(Event::BatchArchived {
                batch_id: archived.id,
                original_location: prior,
            })
            .await;
        if let Some((machine_id, card_number)) = released {
            self.event_sender
                .publish(Event::CardReleased {
                    machine_id,
                    card_number,
                })
                .await;
        }
        Ok(archived)
    }

    pub async fn get_batch(&self, batch_id: i32) -> Result<batch::Model, ServiceError> {
        load_batch(self.db_pool.as_ref(), batch_id).await
    }

    /// All non-archived batches of a lot.
    pub async fn batches_for_lot(&self, lot_id: i32) -> Result<Vec<batch::Model>, ServiceError> {
        Ok(Batch::find()
            .filter(batch::Column::LotId.eq(lot_id))
            .filter(batch::Column::CurrentLocation.ne(BatchLocation::Archived))
            .order_by_asc(batch::Column::BatchTime)
            .all(self.db_pool.as_ref())
            .await?)
    }

    /// Batches waiting for warehouse acceptance, oldest first.
    pub async fn warehouse_pending(&self) -> Result<Vec<batch::Model>, ServiceError> {
        Ok(Batch::find()
            .filter(batch::Column::CurrentLocation.is_in([
                BatchLocation::Production,
                BatchLocation::Sorting,
            ]))
            .order_by_asc(batch::Column::BatchTime)
            .all(self.db_pool.as_ref())
            .await?)
    }

    /// Direct children of a batch in the lineage forest.
    pub async fn children(&self, batch_id: i32) -> Result<Vec<batch::Model>, ServiceError> {
        Ok(Batch::find()
            .filter(batch::Column::ParentBatchId.eq(batch_id))
            .order_by_asc(batch::Column::Id)
            .all(self.db_pool.as_ref())
            .await?)
    }
}

async fn load_batch<C: ConnectionTrait>(
    conn: &C,
    batch_id: i32,
) -> Result<batch::Model, ServiceError> {
    Batch::find_by_id(batch_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("batch {batch_id} not found")))
}

/// Flip a batch's location under an optimistic guard on the location we read.
/// A lost race means another writer got between our read and our write.
async fn guard_location<C: ConnectionTrait>(
    conn: &C,
    read: &batch::Model,
    new_location: BatchLocation,
) -> Result<(), ServiceError> {
    let result = Batch::update_many()
        .col_expr(
            batch::Column::CurrentLocation,
            Expr::value(new_location),
        )
        .filter(batch::Column::Id.eq(read.id))
        .filter(batch::Column::CurrentLocation.eq(read.current_location))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(ServiceError::ConcurrentModification(format!(
            "batch {} changed location while the operation was in flight",
            read.id
        )));
    }
    Ok(())
}

/// Archive under the same optimistic guard, preserving the prior location.
async fn guard_archive<C: ConnectionTrait>(
    conn: &C,
    read: &batch::Model,
) -> Result<(), ServiceError> {
    let result = Batch::update_many()
        .col_expr(
            batch::Column::CurrentLocation,
            Expr::value(BatchLocation::Archived),
        )
        .col_expr(
            batch::Column::OriginalLocation,
            Expr::value(Some(read.current_location)),
        )
        .col_expr(batch::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(batch::Column::Id.eq(read.id))
        .filter(batch::Column::CurrentLocation.eq(read.current_location))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(ServiceError::ConcurrentModification(format!(
            "batch {} changed location while the operation was in flight",
            read.id
        )));
    }
    Ok(())
}

/// Discrepancy arithmetic: absolute is `recounted - reported` (negative when
/// the warehouse finds fewer parts than the operator reported), percentage is
/// `|absolute| / reported * 100` rounded to two decimals, undefined when the
/// reported figure is zero or absent.
pub fn discrepancy(reported: Option<i32>, recounted: i32) -> (Option<i32>, Option<Decimal>) {
    let Some(reported) = reported else {
        return (None, None);
    };
    let absolute = recounted - reported;
    if reported == 0 {
        return (Some(absolute), None);
    }
    let percentage = (Decimal::from(absolute.abs()) / Decimal::from(reported) * dec!(100))
        .round_dp(2);
    (Some(absolute), Some(percentage))
}

#[cfg(test)]
mod tests {
    use super::{discrepancy, guard_archive, guard_location};
    use crate::{
        entities::{
            batch::{self, BatchLocation},
            lot::{self, LotStatus},
            part,
        },
        errors::ServiceError,
        migrator::Migrator,
    };
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, NotSet, Set};
    use sea_orm_migration::MigratorTrait;

    async fn seed_batch_at_production(db: &DatabaseConnection) -> batch::Model {
        let now = Utc::now();
        let part = part::ActiveModel {
            id: NotSet,
            drawing_number: Set("DWG-GUARD".to_string()),
            description: Set(None),
            is_active: Set(true),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        let lot = lot::ActiveModel {
            id: NotSet,
            lot_number: Set("LOT-GUARD".to_string()),
            part_id: Set(part.id),
            initial_planned_quantity: Set(Some(500)),
            additional_quantity: Set(0),
            status: Set(LotStatus::InProduction),
            assigned_machine_id: Set(None),
            machine_queue_position: Set(None),
            reserved_material_id: Set(None),
            due_date: Set(None),
            order_manager_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        batch::ActiveModel {
            id: NotSet,
            setup_job_id: Set(None),
            lot_id: Set(lot.id),
            parent_batch_id: Set(None),
            initial_quantity: Set(250),
            current_quantity: Set(250),
            current_location: Set(BatchLocation::Production),
            original_location: Set(None),
            operator_id: Set(Some(1)),
            operator_reported_quantity: Set(None),
            recounted_quantity: Set(None),
            discrepancy_absolute: Set(None),
            discrepancy_percentage: Set(None),
            admin_acknowledged_discrepancy: Set(false),
            warehouse_employee_id: Set(None),
            warehouse_received_at: Set(None),
            qc_inspector_id: Set(None),
            qc_start_time: Set(None),
            qc_end_time: Set(None),
            qc_comment: Set(None),
            batch_time: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn stale_snapshot_loses_the_guarded_location_flip() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let snapshot = seed_batch_at_production(&db).await;

        // Another writer archives the batch after our read.
        guard_archive(&db, &snapshot).await.unwrap();

        let err = guard_location(&db, &snapshot, BatchLocation::WarehouseCounted)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrentModification(_)));

        // The archived row was not resurrected.
        let reloaded = super::load_batch(&db, snapshot.id).await.unwrap();
        assert_eq!(reloaded.current_location, BatchLocation::Archived);
        assert_eq!(reloaded.original_location, Some(BatchLocation::Production));
    }

    #[test]
    fn reported_250_recounted_245() {
        let (absolute, percentage) = discrepancy(Some(250), 245);
        assert_eq!(absolute, Some(-5));
        assert_eq!(percentage, Some(dec!(2.00)));
    }

    #[test]
    fn zero_or_missing_reported_has_no_percentage() {
        assert_eq!(discrepancy(Some(0), 17), (Some(17), None));
        assert_eq!(discrepancy(None, 17), (None, None));
    }

    #[test]
    fn exact_recount_is_zero_discrepancy() {
        let (absolute, percentage) = discrepancy(Some(100), 100);
        assert_eq!(absolute, Some(0));
        assert_eq!(percentage, Some(dec!(0.00)));
    }

    proptest! {
        #[test]
        fn percentage_is_nonnegative_and_two_dp(reported in 1..100_000i32, recounted in 0..100_000i32) {
            let (absolute, percentage) = discrepancy(Some(reported), recounted);
            let absolute = absolute.unwrap();
            prop_assert_eq!(absolute, recounted - reported);
            let percentage = percentage.unwrap();
            prop_assert!(percentage >= Decimal::ZERO);
            prop_assert!(percentage.scale() <= 2);
            // Round-trips the definition.
            let expected = (Decimal::from(absolute.abs()) / Decimal::from(reported)
                * dec!(100)).round_dp(2);
            prop_assert_eq!(percentage, expected);
        }
    }
}
