use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cashflow_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `VIR{n}`, `n` incremented per batch.
    #[sea_orm(unique)]
    pub label: String,
    pub cutoff: DateTimeUtc,
    pub creation_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cashflows::Entity")]
    Cashflows,
}

impl Related<super::cashflows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cashflows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
