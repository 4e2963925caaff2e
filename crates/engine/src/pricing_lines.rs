use sea_orm::entity::prelude::*;
use uuid::Uuid;

crate::db_enum! {
    PricingLineCategory {
        OffererRevenue => "offerer revenue",
        OffererContribution => "offerer contribution",
        CommercialGesture => "commercial gesture",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pricing_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pricing_id: Uuid,
    pub amount: i64,
    pub category: String,
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
