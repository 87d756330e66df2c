use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "pending_qc")]
    PendingQc,
    #[sea_orm(string_value = "allowed")]
    Allowed,
    #[sea_orm(string_value = "started")]
    Started,
    #[sea_orm(string_value = "stopped")]
    Stopped,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SetupStatus {
    /// Statuses under which the setup is considered a live machine run: they
    /// gate batch creation and force the owning lot into `in_production`.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SetupStatus::Created
                | SetupStatus::Queued
                | SetupStatus::PendingQc
                | SetupStatus::Allowed
                | SetupStatus::Started
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SetupStatus::Completed | SetupStatus::Cancelled)
    }

    /// Legal transition table, carried over from the shop-floor workflow:
    /// QC approval moves `pending_qc` to `allowed`, a queued setup can only be
    /// promoted back to `created`, and stop/start may alternate until the run
    /// is completed or cancelled.
    pub fn can_transition_to(self, next: SetupStatus) -> bool {
        use SetupStatus::*;
        match self {
            Created => matches!(next, PendingQc | Started | Queued | Completed | Cancelled),
            Queued => matches!(next, Created | Cancelled),
            PendingQc => matches!(next, Allowed | Cancelled),
            Allowed => matches!(next, Started | Completed | Cancelled),
            Started => matches!(next, Stopped | Completed | Cancelled),
            Stopped => matches!(next, Started | Completed | Cancelled),
            Completed | Cancelled => false,
        }
    }

    /// All statuses counted as active, for query filters.
    pub fn active_statuses() -> [SetupStatus; 5] {
        [
            SetupStatus::Created,
            SetupStatus::Queued,
            SetupStatus::PendingQc,
            SetupStatus::Allowed,
            SetupStatus::Started,
        ]
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "setup_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lot_id: i32,
    pub part_id: i32,
    pub machine_id: i32,
    pub employee_id: Option<i32>,
    pub planned_quantity: i32,
    /// The only source of truth for extra quantity once the setup exists.
    pub additional_quantity: i32,
    pub cycle_time: Option<i32>,
    pub status: SetupStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub qa_id: Option<i32>,
    pub qa_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lot::Entity",
        from = "Column::LotId",
        to = "super::lot::Column::Id"
    )]
    Lot,
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id"
    )]
    Machine,
}

impl Related<super::lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
