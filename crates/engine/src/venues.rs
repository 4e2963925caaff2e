//! Venues: the places (physical or virtual) where offers are proposed.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "venues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub offerer_id: Uuid,
    pub name: String,
    /// A virtual venue only holds digital offers and cannot be a pricing point.
    pub is_virtual: bool,
    pub booking_email: Option<String>,
    pub department_code: Option<String>,
    pub is_validated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offerers::Entity",
        from = "Column::OffererId",
        to = "super::offerers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offerer,
    #[sea_orm(has_many = "super::offers::Entity")]
    Offers,
}

impl Related<super::offerers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offerer.def()
    }
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
