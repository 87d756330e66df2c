use crate::{
    db::DbPool,
    entities::card::{self, CardStatus, Entity as Card},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set,
};
use std::sync::Arc;
use tracing::info;

/// Fixed pool size: card numbers 1..=20 are printed on physical tokens.
pub const CARDS_PER_MACHINE: i32 = 20;

#[derive(Clone)]
pub struct CardService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl CardService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Create the machine's card rows 1..=20. Idempotent: existing numbers
    /// are left alone, so re-provisioning never duplicates or resets a slot.
    /// The insert resolves against the unique (machine, number) index, so two
    /// racing provisions converge instead of one failing on the constraint.
    pub async fn provision_machine(&self, machine_id: i32) -> Result<u32, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut created: u32 = 0;
        for number in 1..=CARDS_PER_MACHINE {
            let inserted = Card::insert(card::ActiveModel {
                id: NotSet,
                card_number: Set(number),
                machine_id: Set(machine_id),
                status: Set(CardStatus::Free),
                batch_id: Set(None),
                last_event: Set(Some(Utc::now())),
            })
            .on_conflict(
                OnConflict::columns([card::Column::MachineId, card::Column::CardNumber])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
            created += inserted as u32;
        }

        info!(machine_id, created, "card pool provisioned");
        Ok(created)
    }

    /// Acquire a free card for the machine, assigning it to `batch_id`.
    ///
    /// Picks the lowest free card number for operator ergonomics. The claim
    /// is a conditional update filtered on `status = 'free'` with a
    /// rows-affected check, so two concurrent acquires can never hand out the
    /// same slot; a lost race just moves on to the next candidate.
    ///
    /// Runs on any connection so batch creation can call it inside its own
    /// transaction.
    pub async fn acquire_on<C: ConnectionTrait>(
        conn: &C,
        machine_id: i32,
        batch_id: i32,
    ) -> Result<i32, ServiceError> {
        loop {
            let candidates = Card::find()
                .filter(card::Column::MachineId.eq(machine_id))
                .filter(card::Column::Status.eq(CardStatus::Free))
                .order_by_asc(card::Column::CardNumber)
                .all(conn)
                .await?;

            if candidates.is_empty() {
                return Err(ServiceError::NoCardAvailable { machine_id });
            }

            for candidate in candidates {
                let claimed = Card::update_many()
                    .col_expr(card::Column::Status, Expr::value(CardStatus::InUse))
                    .col_expr(card::Column::BatchId, Expr::value(Some(batch_id)))
                    .col_expr(card::Column::LastEvent, Expr::value(Some(Utc::now())))
                    .filter(card::Column::Id.eq(candidate.id))
                    .filter(card::Column::Status.eq(CardStatus::Free))
                    .exec(conn)
                    .await?;

                if claimed.rows_affected == 1 {
                    return Ok(candidate.card_number);
                }
            }
            // Every candidate was claimed under us; re-read the pool.
        }
    }

    /// Free whichever card is assigned to the batch, if any. Called when a
    /// batch reaches `archived`. Returns the released slot for event emission.
    pub async fn release_batch_card_on<C: ConnectionTrait>(
        conn: &C,
        batch_id: i32,
    ) -> Result<Option<(i32, i32)>, ServiceError> {
        let Some(assigned) = Card::find()
            .filter(card::Column::BatchId.eq(batch_id))
            .filter(card::Column::Status.eq(CardStatus::InUse))
            .one(conn)
            .await?
        else {
            return Ok(None);
        };

        let mut active: card::ActiveModel = assigned.clone().into();
        active.status = Set(CardStatus::Free);
        active.batch_id = Set(None);
        active.last_event = Set(Some(Utc::now()));
        active.update(conn).await?;

        Ok(Some((assigned.machine_id, assigned.card_number)))
    }

    /// Manual release of a numbered slot.
    pub async fn release(&self, machine_id: i32, card_number: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = self.find_card(machine_id, card_number).await?;

        if found.status == CardStatus::Lost {
            return Err(ServiceError::InvalidState(format!(
                "card {card_number} on machine {machine_id} is lost; reset it first"
            )));
        }

        let mut active: card::ActiveModel = found.into();
        active.status = Set(CardStatus::Free);
        active.batch_id = Set(None);
        active.last_event = Set(Some(Utc::now()));
        active.update(db).await?;

        self.event_sender
            .publish(Event::CardReleased {
                machine_id,
                card_number,
            })
            .await;
        Ok(())
    }

    /// Administrative: take a physically lost card out of circulation. The
    /// slot stays excluded from the free pool until `reset`.
    pub async fn mark_lost(&self, machine_id: i32, card_number: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = self.find_card(machine_id, card_number).await?;

        let mut active: card::ActiveModel = found.into();
        active.status = Set(CardStatus::Lost);
        active.batch_id = Set(None);
        active.last_event = Set(Some(Utc::now()));
        active.update(db).await?;

        self.event_sender
            .publish(Event::CardMarkedLost {
                machine_id,
                card_number,
            })
            .await;
        Ok(())
    }

    /// Administrative: return a lost (or stuck) card to the free pool.
    pub async fn reset(&self, machine_id: i32, card_number: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = self.find_card(machine_id, card_number).await?;

        let mut active: card::ActiveModel = found.into();
        active.status = Set(CardStatus::Free);
        active.batch_id = Set(None);
        active.last_event = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(machine_id, card_number, "card reset to free");
        Ok(())
    }

    /// Full pool state for a machine, ordered by card number.
    pub async fn pool_state(&self, machine_id: i32) -> Result<Vec<card::Model>, ServiceError> {
        Ok(Card::find()
            .filter(card::Column::MachineId.eq(machine_id))
            .order_by_asc(card::Column::CardNumber)
            .all(self.db_pool.as_ref())
            .await?)
    }

    async fn find_card(
        &self,
        machine_id: i32,
        card_number: i32,
    ) -> Result<card::Model, ServiceError> {
        Card::find()
            .filter(card::Column::MachineId.eq(machine_id))
            .filter(card::Column::CardNumber.eq(card_number))
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "card {card_number} on machine {machine_id} not found"
                ))
            })
    }
}
