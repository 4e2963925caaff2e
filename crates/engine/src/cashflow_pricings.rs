use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cashflow_pricings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cashflow_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub pricing_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cashflows::Entity",
        from = "Column::CashflowId",
        to = "super::cashflows::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Cashflow,
    #[sea_orm(
        belongs_to = "super::pricings::Entity",
        from = "Column::PricingId",
        to = "super::pricings::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Pricing,
}

impl Related<super::cashflows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cashflow.def()
    }
}

impl Related<super::pricings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pricing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
