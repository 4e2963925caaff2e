//! Attachment of pro users to the offerers they work for.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_offerers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub offerer_id: Uuid,
    pub date_created: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::offerers::Entity",
        from = "Column::OffererId",
        to = "super::offerers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offerer,
}

impl Related<super::offerers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offerer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
