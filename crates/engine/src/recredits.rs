//! Amounts added to a deposit after its creation.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

crate::db_enum! {
    RecreditType {
        Recredit16 => "recredit_16",
        Recredit17 => "recredit_17",
        ManualModification => "manual_modification",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recredits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub deposit_id: Uuid,
    pub recredit_type: String,
    pub amount: i64,
    pub date_created: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::deposits::Entity",
        from = "Column::DepositId",
        to = "super::deposits::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Deposit,
}

impl Related<super::deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deposit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
