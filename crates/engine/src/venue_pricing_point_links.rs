//! Links between a venue and the venue whose SIRET prices its bookings.
//!
//! The timespan is `[timespan_start, timespan_end)`; an open end means the
//! link is still active.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "venue_pricing_point_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub venue_id: Uuid,
    pub pricing_point_id: Uuid,
    pub timespan_start: DateTimeUtc,
    pub timespan_end: Option<DateTimeUtc>,
}

impl Model {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.timespan_start <= at && self.timespan_end.is_none_or(|end| at < end)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::venues::Entity",
        from = "Column::VenueId",
        to = "super::venues::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Venue,
    #[sea_orm(
        belongs_to = "super::venues::Entity",
        from = "Column::PricingPointId",
        to = "super::venues::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    PricingPoint,
}

impl ActiveModelBehavior for ActiveModel {}
