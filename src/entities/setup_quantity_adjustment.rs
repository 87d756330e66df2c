use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-to-one with a setup job, created lazily on the first adjustment.
/// `total_adjustment` is a recompute-on-write cache over the four components;
/// `total_of` is the single named function that derives it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "setup_quantity_adjustments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub setup_job_id: i32,
    pub auto_adjustment: i32,
    /// The only component writable by direct human override; every write is
    /// attributed via `manual_adjusted_by`.
    pub manual_adjustment: i32,
    pub defect_adjustment: i32,
    /// Derived: sum of (current_quantity - recounted_quantity) over the
    /// setup's batches currently in `warehouse_counted`.
    pub warehouse_discrepancy_adjustment: i32,
    pub total_adjustment: i32,
    pub manual_adjusted_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn total_of(auto: i32, manual: i32, defect: i32, warehouse_discrepancy: i32) -> i32 {
        auto + manual + defect + warehouse_discrepancy
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::setup_job::Entity",
        from = "Column::SetupJobId",
        to = "super::setup_job::Column::Id"
    )]
    SetupJob,
}

impl Related<super::setup_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SetupJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
