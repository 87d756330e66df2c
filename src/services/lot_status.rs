use crate::{
    db::DbPool,
    entities::{
        lot::{self, Entity as Lot, LotStatus},
        setup_job::{self, Entity as SetupJob, SetupStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::info;

/// Outcome of a single lot repair check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The lot already reflected its setups.
    Unchanged,
    /// The lot was promoted to `in_production`.
    Promoted,
}

/// Repairs lots whose status lags behind their setups. A lot with a live
/// setup must read `in_production`; the repair only ever promotes, it never
/// walks a lot backwards, so running it twice is a no-op.
#[derive(Clone)]
pub struct LotStatusService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl LotStatusService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Check one lot and promote it if a live setup exists.
    pub async fn sync_lot(&self, lot_id: i32) -> Result<SyncOutcome, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = Lot::find_by_id(lot_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("lot {lot_id} not found")))?;

        let outcome = Self::sync_on(db, &found).await?;
        if let SyncOutcome::Promoted = outcome {
            self.event_sender
                .publish(Event::LotStatusRepaired {
                    lot_id,
                    old_status: found.status,
                    new_status: LotStatus::InProduction,
                })
                .await;
        }
        Ok(outcome)
    }

    /// Sweep every non-terminal lot. Returns the ids that were repaired.
    /// Suitable for a periodic housekeeping task or an admin endpoint.
    pub async fn sweep(&self) -> Result<Vec<i32>, ServiceError> {
        let db = self.db_pool.as_ref();
        let candidates = Lot::find()
            .filter(lot::Column::Status.is_in([LotStatus::New, LotStatus::Assigned]))
            .all(db)
            .await?;

        let mut repaired = Vec::new();
        for found in candidates {
            if let SyncOutcome::Promoted = Self::sync_on(db, &found).await? {
                self.event_sender
                    .publish(Event::LotStatusRepaired {
                        lot_id: found.id,
                        old_status: found.status,
                        new_status: LotStatus::InProduction,
                    })
                    .await;
                repaired.push(found.id);
            }
        }

        if !repaired.is_empty() {
            info!(count = repaired.len(), "lot status sweep repaired lots");
        }
        Ok(repaired)
    }

    pub async fn get_status(&self, lot_id: i32) -> Result<LotStatus, ServiceError> {
        let found = Lot::find_by_id(lot_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("lot {lot_id} not found")))?;
        Ok(found.status)
    }

    /// The repair itself, usable inside another service's transaction.
    /// Promotion only applies to pre-production statuses; anything at or past
    /// `in_production` is left where it is.
    pub async fn sync_on<C: ConnectionTrait>(
        conn: &C,
        found: &lot::Model,
    ) -> Result<SyncOutcome, ServiceError> {
        if !matches!(found.status, LotStatus::New | LotStatus::Assigned) {
            return Ok(SyncOutcome::Unchanged);
        }

        let live_setups = SetupJob::find()
            .filter(setup_job::Column::LotId.eq(found.id))
            .filter(setup_job::Column::Status.is_in(SetupStatus::active_statuses()))
            .count(conn)
            .await?;
        if live_setups == 0 {
            return Ok(SyncOutcome::Unchanged);
        }

        let mut active: lot::ActiveModel = found.clone().into();
        active.status = Set(LotStatus::InProduction);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        info!(
            lot_id = found.id,
            old_status = ?found.status,
            "lot promoted to in_production"
        );
        Ok(SyncOutcome::Promoted)
    }
}
