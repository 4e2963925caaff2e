//! Invoices, one per bank account and cashflow batch.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `F{yy}{seq:07}`.
    #[sea_orm(unique)]
    pub reference: String,
    pub bank_account_id: Uuid,
    pub amount: i64,
    pub date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_cashflows::Entity")]
    InvoiceCashflows,
}

impl Related<super::invoice_cashflows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceCashflows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
