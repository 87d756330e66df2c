use crate::{
    db::DbPool,
    entities::{
        batch::{self, BatchLocation, Entity as Batch},
        setup_quantity_adjustment::{self, Entity as SetupQuantityAdjustment, Model},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentBreakdown {
    pub setup_job_id: i32,
    pub auto_adjustment: i32,
    pub manual_adjustment: i32,
    pub defect_adjustment: i32,
    pub warehouse_discrepancy_adjustment: i32,
    pub total_adjustment: i32,
}

/// Maintains `total_adjustment` as a pure function of the four components.
/// The warehouse component is always recomputed from scratch rather than
/// nudged by deltas, so retries and replays converge on the same value.
#[derive(Clone)]
pub struct AdjustmentService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl AdjustmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Human override of the manual component. Every write is attributed to
    /// an employee for audit.
    pub async fn record_manual(
        &self,
        setup_job_id: i32,
        delta: i32,
        employee_id: i32,
    ) -> Result<Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let updated = db
            .transaction::<_, Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let row = Self::get_or_create_on(txn, setup_job_id).await?;
                    let mut active: setup_quantity_adjustment::ActiveModel = row.clone().into();
                    active.manual_adjustment = Set(row.manual_adjustment + delta);
                    active.manual_adjusted_by = Set(Some(employee_id));
                    Self::finish_write(txn, active, &row, delta_applied(&row, delta)).await
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        info!(
            setup_job_id,
            delta,
            employee_id,
            total_adjustment = updated.total_adjustment,
            "manual quantity adjustment recorded"
        );
        self.publish_recomputed(&updated).await;
        Ok(updated)
    }

    /// Ledger-side write to the auto component, fed by rework outcomes.
    pub async fn record_auto_on<C: ConnectionTrait>(
        conn: &C,
        setup_job_id: i32,
        delta: i32,
    ) -> Result<Model, ServiceError> {
        let row = Self::get_or_create_on(conn, setup_job_id).await?;
        let mut active: setup_quantity_adjustment::ActiveModel = row.clone().into();
        active.auto_adjustment = Set(row.auto_adjustment + delta);
        let new_total = Model::total_of(
            row.auto_adjustment + delta,
            row.manual_adjustment,
            row.defect_adjustment,
            row.warehouse_discrepancy_adjustment,
        );
        Self::finish_write(conn, active, &row, new_total).await
    }

    /// Ledger-side write when defect quantity is recorded for the setup.
    pub async fn record_defect_on<C: ConnectionTrait>(
        conn: &C,
        setup_job_id: i32,
        quantity: i32,
    ) -> Result<Model, ServiceError> {
        let row = Self::get_or_create_on(conn, setup_job_id).await?;
        let mut active: setup_quantity_adjustment::ActiveModel = row.clone().into();
        active.defect_adjustment = Set(row.defect_adjustment + quantity);
        let new_total = Model::total_of(
            row.auto_adjustment,
            row.manual_adjustment,
            row.defect_adjustment + quantity,
            row.warehouse_discrepancy_adjustment,
        );
        Self::finish_write(conn, active, &row, new_total).await
    }

    /// Recompute the warehouse discrepancy component from scratch:
    /// the sum of (current_quantity - recounted_quantity) over the setup's
    /// batches currently sitting in `warehouse_counted`.
    pub async fn recompute_warehouse_discrepancy_on<C: ConnectionTrait>(
        conn: &C,
        setup_job_id: i32,
    ) -> Result<Model, ServiceError> {
        let counted = Batch::find()
            .filter(batch::Column::SetupJobId.eq(setup_job_id))
            .filter(batch::Column::CurrentLocation.eq(BatchLocation::WarehouseCounted))
            .all(conn)
            .await?;

        let discrepancy: i32 = counted
            .iter()
            .map(|b| b.current_quantity - b.recounted_quantity.unwrap_or(b.current_quantity))
            .sum();

        let row = Self::get_or_create_on(conn, setup_job_id).await?;
        let mut active: setup_quantity_adjustment::ActiveModel = row.clone().into();
        active.warehouse_discrepancy_adjustment = Set(discrepancy);
        let new_total = Model::total_of(
            row.auto_adjustment,
            row.manual_adjustment,
            row.defect_adjustment,
            discrepancy,
        );
        Self::finish_write(conn, active, &row, new_total).await
    }

    /// Pool-level wrapper around the recomputation, with event emission.
    pub async fn recompute_warehouse_discrepancy(
        &self,
        setup_job_id: i32,
    ) -> Result<Model, ServiceError> {
        let updated =
            Self::recompute_warehouse_discrepancy_on(self.db_pool.as_ref(), setup_job_id).await?;
        self.publish_recomputed(&updated).await;
        Ok(updated)
    }

    /// Current four-component breakdown. A setup with no adjustment row yet
    /// reads as all zeros.
    pub async fn breakdown(&self, setup_job_id: i32) -> Result<AdjustmentBreakdown, ServiceError> {
        let row = SetupQuantityAdjustment::find()
            .filter(setup_quantity_adjustment::Column::SetupJobId.eq(setup_job_id))
            .one(self.db_pool.as_ref())
            .await?;

        Ok(match row {
            Some(m) => AdjustmentBreakdown {
                setup_job_id,
                auto_adjustment: m.auto_adjustment,
                manual_adjustment: m.manual_adjustment,
                defect_adjustment: m.defect_adjustment,
                warehouse_discrepancy_adjustment: m.warehouse_discrepancy_adjustment,
                total_adjustment: m.total_adjustment,
            },
            None => AdjustmentBreakdown {
                setup_job_id,
                auto_adjustment: 0,
                manual_adjustment: 0,
                defect_adjustment: 0,
                warehouse_discrepancy_adjustment: 0,
                total_adjustment: 0,
            },
        })
    }

    /// The adjustment row is created lazily on first write.
    async fn get_or_create_on<C: ConnectionTrait>(
        conn: &C,
        setup_job_id: i32,
    ) -> Result<Model, ServiceError> {
        if let Some(existing) = SetupQuantityAdjustment::find()
            .filter(setup_quantity_adjustment::Column::SetupJobId.eq(setup_job_id))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        Ok(setup_quantity_adjustment::ActiveModel {
            id: NotSet,
            setup_job_id: Set(setup_job_id),
            auto_adjustment: Set(0),
            manual_adjustment: Set(0),
            defect_adjustment: Set(0),
            warehouse_discrepancy_adjustment: Set(0),
            total_adjustment: Set(0),
            manual_adjusted_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?)
    }

    async fn finish_write<C: ConnectionTrait>(
        conn: &C,
        mut active: setup_quantity_adjustment::ActiveModel,
        _row: &Model,
        new_total: i32,
    ) -> Result<Model, ServiceError> {
        active.total_adjustment = Set(new_total);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    async fn publish_recomputed(&self, model: &Model) {
        self.event_sender
            .publish(Event::AdjustmentRecomputed {
                setup_job_id: model.setup_job_id,
                total_adjustment: model.total_adjustment,
            })
            .await;
    }
}

fn delta_applied(row: &Model, delta: i32) -> i32 {
    Model::total_of(
        row.auto_adjustment,
        row.manual_adjustment + delta,
        row.defect_adjustment,
        row.warehouse_discrepancy_adjustment,
    )
}

pub(crate) fn flatten_txn_err(
    err: sea_orm::TransactionError<ServiceError>,
) -> ServiceError {
    match err {
        sea_orm::TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        sea_orm::TransactionError::Transaction(service_err) => service_err,
    }
}

#[cfg(test)]
mod tests {
    use crate::entities::setup_quantity_adjustment::Model;

    #[test]
    fn total_is_sum_of_components() {
        assert_eq!(Model::total_of(0, 0, 0, 0), 0);
        assert_eq!(Model::total_of(3, -2, 5, 1), 7);
        assert_eq!(Model::total_of(-10, 0, 10, 0), 0);
    }
}
