//! Activation codes handed out with digital thing bookings.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "activation_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_id: Uuid,
    pub code: String,
    pub expiration_date: Option<DateTimeUtc>,
    /// Set once the code is attached to a booking.
    pub booking_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stocks::Entity",
        from = "Column::StockId",
        to = "super::stocks::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Stock,
}

impl Related<super::stocks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
