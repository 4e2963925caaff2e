//! Audit trail of pricing status changes.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

crate::db_enum! {
    PricingLogReason {
        MarkAsUnused => "mark as unused",
        ChangeAmount => "change amount",
        ChangeDate => "change date",
        GenerateCashflow => "generate cashflow",
        GenerateInvoice => "generate invoice",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pricing_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pricing_id: Uuid,
    pub timestamp: DateTimeUtc,
    pub status_before: String,
    pub status_after: String,
    pub reason: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pricings::Entity",
        from = "Column::PricingId",
        to = "super::pricings::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Pricing,
}

impl Related<super::pricings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pricing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
