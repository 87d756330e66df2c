use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Canonical lot status set. Historical data also carried `pending` and
/// `active`; those are legacy spellings of `new` and `in_production` and are
/// normalized away at the edge rather than modeled here.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "in_production")]
    InProduction,
    #[sea_orm(string_value = "pending_qc")]
    PendingQc,
    #[sea_orm(string_value = "post_production")]
    PostProduction,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl LotStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LotStatus::Completed | LotStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub lot_number: String,
    pub part_id: i32,
    pub initial_planned_quantity: Option<i32>,
    /// Extra quantity requested at lot level. Once a setup exists for the lot
    /// the setup's own additional_quantity is the source of truth.
    pub additional_quantity: i32,
    pub status: LotStatus,
    pub assigned_machine_id: Option<i32>,
    pub machine_queue_position: Option<i32>,
    pub reserved_material_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub order_manager_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::part::Entity",
        from = "Column::PartId",
        to = "super::part::Column::Id"
    )]
    Part,
}

impl Related<super::part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Part.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
