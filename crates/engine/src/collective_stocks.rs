use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collective_stocks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub collective_offer_id: Uuid,
    /// Total price for the whole group, in cents.
    pub price: i64,
    pub number_of_tickets: i64,
    pub beginning_datetime: DateTimeUtc,
    pub booking_limit_datetime: DateTimeUtc,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn price(&self) -> MoneyCents {
        MoneyCents::new(self.price)
    }

    pub fn has_booking_limit_passed(&self, now: DateTime<Utc>) -> bool {
        self.booking_limit_datetime <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collective_offers::Entity",
        from = "Column::CollectiveOfferId",
        to = "super::collective_offers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offer,
    #[sea_orm(has_many = "super::collective_bookings::Entity")]
    Bookings,
}

impl Related<super::collective_offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl Related<super::collective_bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
