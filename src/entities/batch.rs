use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Physical location of a batch on the shop floor, doubling as its lifecycle
/// state. `archived` is the only terminal state: once there, the batch is
/// frozen and every mutating operation fails with `ImmutableBatch`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum BatchLocation {
    #[sea_orm(string_value = "production")]
    Production,
    /// Warehouse scratch container for material awaiting manual triage.
    #[sea_orm(string_value = "sorting")]
    Sorting,
    #[sea_orm(string_value = "pending_rework")]
    PendingRework,
    #[sea_orm(string_value = "warehouse_counted")]
    WarehouseCounted,
    #[sea_orm(string_value = "inspection")]
    Inspection,
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "defect")]
    Defect,
    #[sea_orm(string_value = "rework_repair")]
    ReworkRepair,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl BatchLocation {
    pub fn is_archived(self) -> bool {
        matches!(self, BatchLocation::Archived)
    }

    /// Locations a recount may be performed from.
    pub fn accepts_recount(self) -> bool {
        matches!(
            self,
            BatchLocation::Production | BatchLocation::Sorting | BatchLocation::WarehouseCounted
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// NULL only for warehouse sorting containers, which are not machine output.
    pub setup_job_id: Option<i32>,
    pub lot_id: i32,
    /// Parent pointer of the lineage forest. Children are always newly
    /// created at split time and never re-parented, so the forest is acyclic
    /// by construction.
    pub parent_batch_id: Option<i32>,
    pub initial_quantity: i32,
    /// Decreases only via split; frozen once the batch is archived.
    pub current_quantity: i32,
    pub current_location: BatchLocation,
    /// Location held immediately before archival, kept for statistics that
    /// need to distinguish why a batch reached `archived`.
    pub original_location: Option<BatchLocation>,
    pub operator_id: Option<i32>,
    pub operator_reported_quantity: Option<i32>,
    pub recounted_quantity: Option<i32>,
    pub discrepancy_absolute: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub discrepancy_percentage: Option<Decimal>,
    pub admin_acknowledged_discrepancy: bool,
    pub warehouse_employee_id: Option<i32>,
    pub warehouse_received_at: Option<DateTime<Utc>>,
    pub qc_inspector_id: Option<i32>,
    pub qc_start_time: Option<DateTime<Utc>>,
    pub qc_end_time: Option<DateTime<Utc>>,
    pub qc_comment: Option<String>,
    pub batch_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
        belongs_to = "super::setup_job::Entity",
        from = "Column::SetupJobId",
        to = "super::setup_job::Column::Id"
    )]
    SetupJob,
}

impl Related<super::lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl Related<super::setup_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SetupJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
