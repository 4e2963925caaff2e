//! Cashflows: one bank transfer (or debit) per bank account and batch.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::ResultEngine;

crate::db_enum! {
    CashflowStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cashflows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub batch_id: Uuid,
    pub bank_account_id: Uuid,
    pub status: String,
    /// Sum of the linked pricings, negative when paid to the offerer.
    pub amount: i64,
    pub creation_date: DateTimeUtc,
}

impl Model {
    pub fn status(&self) -> ResultEngine<CashflowStatus> {
        CashflowStatus::try_from(self.status.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cashflow_batches::Entity",
        from = "Column::BatchId",
        to = "super::cashflow_batches::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Batch,
    #[sea_orm(has_many = "super::cashflow_pricings::Entity")]
    CashflowPricings,
}

impl Related<super::cashflow_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl Related<super::cashflow_pricings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashflowPricings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
