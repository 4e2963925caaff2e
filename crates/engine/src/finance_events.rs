//! Finance events: everything that may change what an offerer is owed.
//!
//! Events are priced in `pricing_ordering_date` order, per pricing point.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::ResultEngine;

crate::db_enum! {
    FinanceEventMotive {
        BookingUsed => "booking-used",
        BookingUsedAfterCancellation => "booking-used-after-cancellation",
        BookingUnused => "booking-unused",
        BookingCancelledAfterUse => "booking-cancelled-after-use",
        IncidentReversalOfOriginalEvent => "incident-reversal-of-original-event",
        IncidentNewPrice => "incident-new-price",
        IncidentCommercialGesture => "incident-commercial-gesture",
    }
}

impl FinanceEventMotive {
    /// Motives that lead to a pricing once the event is `ready`.
    pub fn is_priceable(self) -> bool {
        !matches!(self, Self::BookingUnused | Self::BookingCancelledAfterUse)
    }

    /// Motives cancelled by [`Engine::cancel_latest_event`](crate::Engine::cancel_latest_event).
    pub fn is_booking_used(self) -> bool {
        matches!(self, Self::BookingUsed | Self::BookingUsedAfterCancellation)
    }

    pub fn is_incident(self) -> bool {
        matches!(
            self,
            Self::IncidentReversalOfOriginalEvent
                | Self::IncidentNewPrice
                | Self::IncidentCommercialGesture
        )
    }
}

crate::db_enum! {
    FinanceEventStatus {
        Pending => "pending",
        Ready => "ready",
        Priced => "priced",
        Cancelled => "cancelled",
        NotToBePriced => "not to be priced",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "finance_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub motive: String,
    pub status: String,
    pub creation_date: DateTimeUtc,
    pub value_date: DateTimeUtc,
    pub pricing_ordering_date: Option<DateTimeUtc>,
    pub venue_id: Uuid,
    pub pricing_point_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub collective_booking_id: Option<Uuid>,
    pub booking_finance_incident_id: Option<Uuid>,
}

impl Model {
    pub fn motive(&self) -> ResultEngine<FinanceEventMotive> {
        FinanceEventMotive::try_from(self.motive.as_str())
    }

    pub fn status(&self) -> ResultEngine<FinanceEventStatus> {
        FinanceEventStatus::try_from(self.status.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pricings::Entity")]
    Pricings,
}

impl Related<super::pricings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pricings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
