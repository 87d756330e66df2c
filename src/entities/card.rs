use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    #[sea_orm(string_value = "free")]
    Free,
    #[sea_orm(string_value = "in_use")]
    InUse,
    /// Physically lost on the shop floor; excluded from the free pool until
    /// manually reset.
    #[sea_orm(string_value = "lost")]
    Lost,
}

/// A numbered physical token gating batch creation on a machine. Exactly 20
/// cards exist per provisioned machine, created once and never deleted; the
/// card number is printed on the token, so reuse must hand back the same
/// numbered slot rather than a fresh counter value.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub card_number: i32,
    pub machine_id: i32,
    pub status: CardStatus,
    pub batch_id: Option<i32>,
    pub last_event: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id"
    )]
    Machine,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
