use crate::{
    db::DbPool,
    entities::{
        lot::Entity as Lot,
        setup_job::{self, Entity as SetupJob, SetupStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::adjustments::flatten_txn_err,
    services::lot_status::LotStatusService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSetupCommand {
    pub lot_id: i32,
    pub machine_id: i32,
    pub employee_id: Option<i32>,
    pub planned_quantity: i32,
    pub cycle_time: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSetupStatusCommand {
    pub setup_job_id: i32,
    pub new_status: SetupStatus,
    /// QC inspector granting `allowed`; required for that transition.
    pub qa_id: Option<i32>,
}

/// Setup run lifecycle. Status changes follow the workflow transition table
/// and fan out to lot status repair, so a lot can never show `assigned` while
/// its machine is running.
#[derive(Clone)]
pub struct SetupService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl SetupService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Register a setup for a lot on a machine, starting at `created`.
    pub async fn create_setup(
        &self,
        cmd: CreateSetupCommand,
    ) -> Result<setup_job::Model, ServiceError> {
        if cmd.planned_quantity < 1 {
            return Err(ServiceError::ValidationError(
                "planned_quantity must be at least 1".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let lot = Lot::find_by_id(cmd.lot_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("lot {} not found", cmd.lot_id)))?;
        if lot.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "lot {} is {:?}; no new setups can be registered",
                lot.id, lot.status
            )));
        }

        let created = setup_job::ActiveModel {
            id: NotSet,
            lot_id: Set(lot.id),
            part_id: Set(lot.part_id),
            machine_id: Set(cmd.machine_id),
            employee_id: Set(cmd.employee_id),
            planned_quantity: Set(cmd.planned_quantity),
            additional_quantity: Set(lot.additional_quantity),
            cycle_time: Set(cmd.cycle_time),
            status: Set(SetupStatus::Created),
            start_time: Set(None),
            end_time: Set(None),
            qa_id: Set(None),
            qa_date: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(
            setup_job_id = created.id,
            lot_id = created.lot_id,
            machine_id = created.machine_id,
            "setup registered"
        );

        // A freshly created setup is already active; pull the lot forward.
        if let Some(found) = Lot::find_by_id(created.lot_id).one(db).await? {
            LotStatusService::sync_on(db, &found).await?;
        }

        Ok(created)
    }

    /// Drive a setup through the workflow. Rejects transitions the table
    /// does not allow. Timestamps are stamped on the edges that define them:
    /// first start, QC approval, and reaching a terminal status.
    pub async fn update_status(
        &self,
        cmd: UpdateSetupStatusCommand,
    ) -> Result<setup_job::Model, ServiceError> {
        if cmd.new_status == SetupStatus::Allowed && cmd.qa_id.is_none() {
            return Err(ServiceError::ValidationError(
                "transition to allowed requires qa_id".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        let (updated, old_status) = db
            .transaction::<_, (setup_job::Model, SetupStatus), ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = SetupJob::find_by_id(cmd.setup_job_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "setup job {} not found",
                                cmd.setup_job_id
                            ))
                        })?;

                    let old_status = found.status;
                    if !old_status.can_transition_to(cmd.new_status) {
                        return Err(ServiceError::InvalidState(format!(
                            "setup job {} cannot go from {:?} to {:?}",
                            found.id, old_status, cmd.new_status
                        )));
                    }

                    let now = Utc::now();
                    let mut active: setup_job::ActiveModel = found.clone().into();
                    active.status = Set(cmd.new_status);
                    if cmd.new_status == SetupStatus::Started && found.start_time.is_none() {
                        active.start_time = Set(Some(now));
                    }
                    if cmd.new_status.is_terminal() {
                        active.end_time = Set(Some(now));
                    }
                    if cmd.new_status == SetupStatus::Allowed {
                        active.qa_id = Set(cmd.qa_id);
                        active.qa_date = Set(Some(now));
                    }
                    let updated = active.update(txn).await?;

                    if let Some(lot) = Lot::find_by_id(updated.lot_id).one(txn).await? {
                        LotStatusService::sync_on(txn, &lot).await?;
                    }

                    Ok((updated, old_status))
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        info!(
            setup_job_id = updated.id,
            old_status = ?old_status,
            new_status = ?updated.status,
            "setup status changed"
        );
        self.event_sender
            .publish(Event::SetupStatusChanged {
                setup_job_id: updated.id,
                lot_id: updated.lot_id,
                old_status,
                new_status: updated.status,
            })
            .await;

        Ok(updated)
    }

    /// Replace the setup's additional quantity. Negative values are allowed:
    /// they express a reduction against the plan.
    pub async fn set_additional_quantity(
        &self,
        setup_job_id: i32,
        additional_quantity: i32,
    ) -> Result<setup_job::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = SetupJob::find_by_id(setup_job_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("setup job {setup_job_id} not found"))
            })?;

        if found.status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "setup job {} is {:?}; quantities are frozen",
                found.id, found.status
            )));
        }

        let mut active: setup_job::ActiveModel = found.into();
        active.additional_quantity = Set(additional_quantity);
        Ok(active.update(db).await?)
    }

    pub async fn get_setup(&self, setup_job_id: i32) -> Result<setup_job::Model, ServiceError> {
        SetupJob::find_by_id(setup_job_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("setup job {setup_job_id} not found")))
    }

    /// Setups for a lot, newest first.
    pub async fn setups_for_lot(
        &self,
        lot_id: i32,
    ) -> Result<Vec<setup_job::Model>, ServiceError> {
        Ok(SetupJob::find()
            .filter(setup_job::Column::LotId.eq(lot_id))
            .order_by_desc(setup_job::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?)
    }
}
