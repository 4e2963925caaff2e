//! Stocks of individual offers.
//!
//! An event stock has a `beginning_datetime`, a thing stock has none.
//! `quantity = None` means an unlimited stock; `dn_booked_quantity` is the
//! denormalized sum of the quantities of non-cancelled bookings.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{MoneyCents, offerers, offers, subcategories::Subcategory, venues};

/// Highest price accepted on an individual stock.
pub const MAX_STOCK_PRICE: MoneyCents = MoneyCents::from_euros(300);

/// Window around an event during which bookings cannot be cancelled by the
/// beneficiary, and after which an event stock can no longer be deleted.
pub const EVENT_DELAY_HOURS: i64 = 48;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stocks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub offer_id: Uuid,
    pub price: i64,
    pub quantity: Option<i64>,
    pub dn_booked_quantity: i64,
    pub beginning_datetime: Option<DateTimeUtc>,
    pub booking_limit_datetime: Option<DateTimeUtc>,
    pub is_soft_deleted: bool,
    pub date_created: DateTimeUtc,
    pub date_modified: DateTimeUtc,
}

impl Model {
    pub fn price(&self) -> MoneyCents {
        MoneyCents::new(self.price)
    }

    /// `None` when the stock is unlimited.
    pub fn remaining_quantity(&self) -> Option<i64> {
        self.quantity.map(|quantity| quantity - self.dn_booked_quantity)
    }

    pub fn is_event_expired(&self, now: DateTime<Utc>) -> bool {
        self.beginning_datetime.is_some_and(|beginning| beginning <= now)
    }

    pub fn has_booking_limit_passed(&self, now: DateTime<Utc>) -> bool {
        self.booking_limit_datetime.is_some_and(|limit| limit <= now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_event_expired(now) || self.has_booking_limit_passed(now)
    }

    pub fn is_sold_out(&self, now: DateTime<Utc>) -> bool {
        self.is_soft_deleted
            || self.is_event_expired(now)
            || self.remaining_quantity().is_some_and(|remaining| remaining <= 0)
    }

    /// Event stocks stay deletable until 48h after their beginning.
    pub fn is_event_deletable(&self, now: DateTime<Utc>) -> bool {
        self.beginning_datetime
            .is_none_or(|beginning| now <= beginning + Duration::hours(EVENT_DELAY_HOURS))
    }
}

/// A stock together with everything needed to evaluate its bookability.
#[derive(Clone, Debug)]
pub struct StockContext {
    pub stock: Model,
    pub offer: offers::Model,
    pub venue: venues::Model,
    pub offerer: offerers::Model,
    pub subcategory: &'static Subcategory,
}

impl StockContext {
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        !self.stock.is_expired(now)
            && self.offer.is_released(&self.venue, &self.offerer)
            && !self.stock.is_sold_out(now)
    }

    pub fn is_forbidden_to_underage(&self) -> bool {
        if self.stock.price == 0 {
            !self.subcategory.is_bookable_by_underage_when_free
        } else {
            !self.subcategory.is_bookable_by_underage_when_not_free
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offers::Entity",
        from = "Column::OfferId",
        to = "super::offers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offer,
    #[sea_orm(has_many = "super::bookings::Entity")]
    Bookings,
    #[sea_orm(has_many = "super::activation_codes::Entity")]
    ActivationCodes,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl Related<super::activation_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivationCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn stock(quantity: Option<i64>, booked: i64, beginning: Option<DateTime<Utc>>) -> Model {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Model {
            id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            price: 1000,
            quantity,
            dn_booked_quantity: booked,
            beginning_datetime: beginning,
            booking_limit_datetime: beginning,
            is_soft_deleted: false,
            date_created: now,
            date_modified: now,
        }
    }

    #[test]
    fn unlimited_stock_is_never_sold_out_by_quantity() {
        let now = Utc::now();
        let stock = stock(None, 1_000, None);
        assert_eq!(stock.remaining_quantity(), None);
        assert!(!stock.is_sold_out(now));
    }

    #[test]
    fn sold_out_when_no_quantity_left() {
        let now = Utc::now();
        assert!(stock(Some(2), 2, None).is_sold_out(now));
        assert!(!stock(Some(3), 2, None).is_sold_out(now));
    }

    #[test]
    fn past_event_is_expired_and_sold_out() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let past = stock(Some(10), 0, Some(now - Duration::hours(1)));
        assert!(past.is_event_expired(now));
        assert!(past.has_booking_limit_passed(now));
        assert!(past.is_sold_out(now));
    }

    #[test]
    fn event_deletable_until_48h_after_beginning() {
        let beginning = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let event = stock(Some(10), 0, Some(beginning));
        assert!(event.is_event_deletable(beginning + Duration::hours(48)));
        assert!(!event.is_event_deletable(beginning + Duration::hours(49)));
        assert!(stock(None, 0, None).is_event_deletable(beginning));
    }
}
