use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, FinanceEventMotive, FinanceEventStatus, MoneyCents, PricingStatus, ResultEngine,
    booking_finance_incidents, bookings, collective_bookings, collective_offers,
    collective_stocks, custom_reimbursement_rules, finance_events, offers,
    pricing_lines::{self, PricingLineCategory},
    pricing_logs::{self, PricingLogReason},
    pricings,
    reimbursement::{AppliedRule, ReimbursedBooking, StandardRule, select_rule},
    stocks,
    util::revenue_period,
};

use super::{Engine, offerers::find_pricing_point_link, require, with_tx};

/// Outcome of a pricing run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PricingSummary {
    pub priced: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Events whose ordering date is younger than this are left for the next run.
const PRICING_SAFETY_DELAY_MINUTES: i64 = 1;

/// The booking an event is about.
pub(super) enum EventBooking<'a> {
    Individual(&'a bookings::Model),
    Collective(&'a collective_bookings::Model),
}

impl EventBooking<'_> {
    fn venue_id(&self) -> Uuid {
        match self {
            Self::Individual(booking) => booking.venue_id,
            Self::Collective(booking) => booking.venue_id,
        }
    }

    fn ids(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Individual(booking) => (Some(booking.id), None),
            Self::Collective(booking) => (None, Some(booking.id)),
        }
    }

    fn date_used(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Individual(booking) => booking.date_used,
            Self::Collective(booking) => booking.date_used,
        }
    }

    fn cancellation_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Individual(booking) => booking.cancellation_date,
            Self::Collective(booking) => booking.cancellation_date,
        }
    }

    async fn beginning(&self, db_tx: &DatabaseTransaction) -> ResultEngine<Option<DateTime<Utc>>> {
        match self {
            Self::Individual(booking) => Ok(stocks::Entity::find_by_id(booking.stock_id)
                .one(db_tx)
                .await?
                .and_then(|stock| stock.beginning_datetime)),
            Self::Collective(booking) => {
                Ok(collective_stocks::Entity::find_by_id(booking.collective_stock_id)
                    .one(db_tx)
                    .await?
                    .map(|stock| stock.beginning_datetime))
            }
        }
    }
}

/// Events are priced after the pricing point link starts, after the event
/// happened and after the booking was used.
fn pricing_ordering_date(
    link_start: DateTime<Utc>,
    beginning: Option<DateTime<Utc>>,
    date_used: DateTime<Utc>,
) -> DateTime<Utc> {
    link_start
        .max(beginning.unwrap_or(date_used))
        .max(date_used)
}

/// Records a finance event about a booking.
pub(super) async fn add_booking_event(
    db_tx: &DatabaseTransaction,
    motive: FinanceEventMotive,
    booking: EventBooking<'_>,
    now: DateTime<Utc>,
) -> ResultEngine<finance_events::Model> {
    let venue_id = booking.venue_id();
    let (booking_id, collective_booking_id) = booking.ids();

    let (status, value_date, pricing_point_id, ordering) = if motive.is_booking_used() {
        let date_used = booking.date_used().unwrap_or(now);
        match find_pricing_point_link(db_tx, venue_id, date_used).await? {
            Some(link) => {
                let beginning = booking.beginning(db_tx).await?;
                (
                    FinanceEventStatus::Ready,
                    date_used,
                    Some(link.pricing_point_id),
                    Some(pricing_ordering_date(link.timespan_start, beginning, date_used)),
                )
            }
            None => (FinanceEventStatus::Pending, date_used, None, None),
        }
    } else if motive == FinanceEventMotive::BookingCancelledAfterUse {
        (
            FinanceEventStatus::NotToBePriced,
            booking.cancellation_date().unwrap_or(now),
            None,
            None,
        )
    } else {
        (FinanceEventStatus::NotToBePriced, now, None, None)
    };

    let event = finance_events::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        motive: ActiveValue::Set(motive.as_str().to_string()),
        status: ActiveValue::Set(status.as_str().to_string()),
        creation_date: ActiveValue::Set(now),
        value_date: ActiveValue::Set(value_date),
        pricing_ordering_date: ActiveValue::Set(ordering),
        venue_id: ActiveValue::Set(venue_id),
        pricing_point_id: ActiveValue::Set(pricing_point_id),
        booking_id: ActiveValue::Set(booking_id),
        collective_booking_id: ActiveValue::Set(collective_booking_id),
        booking_finance_incident_id: ActiveValue::Set(None),
    }
    .insert(db_tx)
    .await?;
    tracing::info!(
        event_id = %event.id,
        motive = %motive,
        status = %status,
        "Created finance event"
    );
    Ok(event)
}

/// Ordering date of a booking event for the given event beginning, or `None`
/// when the venue has no pricing point at the value date.
pub(super) async fn event_ordering_date(
    db_tx: &DatabaseTransaction,
    event: &finance_events::Model,
    beginning: Option<DateTime<Utc>>,
) -> ResultEngine<Option<DateTime<Utc>>> {
    Ok(find_pricing_point_link(db_tx, event.venue_id, event.value_date)
        .await?
        .map(|link| pricing_ordering_date(link.timespan_start, beginning, event.value_date)))
}

/// Records a finance event about a validated incident.
pub(super) async fn add_incident_event(
    db_tx: &DatabaseTransaction,
    motive: FinanceEventMotive,
    booking_incident: &booking_finance_incidents::Model,
    venue_id: Uuid,
    validation_date: DateTime<Utc>,
) -> ResultEngine<finance_events::Model> {
    let (status, pricing_point_id, ordering) =
        match find_pricing_point_link(db_tx, venue_id, validation_date).await? {
            Some(link) => (
                FinanceEventStatus::Ready,
                Some(link.pricing_point_id),
                Some(validation_date),
            ),
            None => (FinanceEventStatus::Pending, None, None),
        };
    let event = finance_events::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        motive: ActiveValue::Set(motive.as_str().to_string()),
        status: ActiveValue::Set(status.as_str().to_string()),
        creation_date: ActiveValue::Set(validation_date),
        value_date: ActiveValue::Set(validation_date),
        pricing_ordering_date: ActiveValue::Set(ordering),
        venue_id: ActiveValue::Set(venue_id),
        pricing_point_id: ActiveValue::Set(pricing_point_id),
        booking_id: ActiveValue::Set(None),
        collective_booking_id: ActiveValue::Set(None),
        booking_finance_incident_id: ActiveValue::Set(Some(booking_incident.id)),
    }
    .insert(db_tx)
    .await?;
    tracing::info!(event_id = %event.id, motive = %motive, "Created incident finance event");
    Ok(event)
}

/// Gives a pricing point to the pending events of a venue once the venue is
/// linked to one.
pub(super) async fn make_pending_events_ready(
    db_tx: &DatabaseTransaction,
    venue_id: Uuid,
    pricing_point_id: Uuid,
    link_start: DateTime<Utc>,
) -> ResultEngine<usize> {
    let pending = finance_events::Entity::find()
        .filter(finance_events::Column::VenueId.eq(venue_id))
        .filter(finance_events::Column::Status.eq(FinanceEventStatus::Pending.as_str()))
        .filter(finance_events::Column::ValueDate.gte(link_start))
        .all(db_tx)
        .await?;
    let count = pending.len();
    for event in pending {
        let beginning = match (event.booking_id, event.collective_booking_id) {
            (Some(id), _) => match bookings::Entity::find_by_id(id).one(db_tx).await? {
                Some(booking) => EventBooking::Individual(&booking).beginning(db_tx).await?,
                None => None,
            },
            (None, Some(id)) => match collective_bookings::Entity::find_by_id(id).one(db_tx).await? {
                Some(booking) => EventBooking::Collective(&booking).beginning(db_tx).await?,
                None => None,
            },
            (None, None) => None,
        };
        finance_events::ActiveModel {
            id: ActiveValue::Set(event.id),
            status: ActiveValue::Set(FinanceEventStatus::Ready.as_str().to_string()),
            pricing_point_id: ActiveValue::Set(Some(pricing_point_id)),
            pricing_ordering_date: ActiveValue::Set(Some(pricing_ordering_date(
                link_start,
                beginning,
                event.value_date,
            ))),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
    }
    Ok(count)
}

/// Cancels the latest "used" event of a booking, and its pricing.
///
/// Returns `None` when the booking has no such event.
pub(super) async fn cancel_latest_event(
    db_tx: &DatabaseTransaction,
    booking: EventBooking<'_>,
    now: DateTime<Utc>,
) -> ResultEngine<Option<finance_events::Model>> {
    let (booking_id, collective_booking_id) = booking.ids();
    let mut query = finance_events::Entity::find()
        .filter(finance_events::Column::Motive.is_in([
            FinanceEventMotive::BookingUsed.as_str(),
            FinanceEventMotive::BookingUsedAfterCancellation.as_str(),
        ]))
        .filter(finance_events::Column::Status.is_in([
            FinanceEventStatus::Pending.as_str(),
            FinanceEventStatus::Ready.as_str(),
            FinanceEventStatus::Priced.as_str(),
        ]));
    query = match (booking_id, collective_booking_id) {
        (Some(id), _) => query.filter(finance_events::Column::BookingId.eq(id)),
        (None, Some(id)) => query.filter(finance_events::Column::CollectiveBookingId.eq(id)),
        (None, None) => return Ok(None),
    };
    let Some(event) = query
        .order_by_desc(finance_events::Column::CreationDate)
        .one(db_tx)
        .await?
    else {
        if booking.date_used().is_some() {
            tracing::error!(
                booking_id = ?booking_id,
                collective_booking_id = ?collective_booking_id,
                "Could not find an event to cancel for a used booking"
            );
        }
        return Ok(None);
    };

    cancel_event_pricing(db_tx, &event, PricingLogReason::MarkAsUnused, now).await?;
    let event = finance_events::ActiveModel {
        id: ActiveValue::Set(event.id),
        status: ActiveValue::Set(FinanceEventStatus::Cancelled.as_str().to_string()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    tracing::info!(event_id = %event.id, "Cancelled finance event");
    Ok(Some(event))
}

/// Cancels the pricing of an event and sets it back to `ready`.
pub(super) async fn force_event_repricing(
    db_tx: &DatabaseTransaction,
    event: &finance_events::Model,
    reason: PricingLogReason,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    cancel_event_pricing(db_tx, event, reason, now).await?;
    finance_events::ActiveModel {
        id: ActiveValue::Set(event.id),
        status: ActiveValue::Set(FinanceEventStatus::Ready.as_str().to_string()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    Ok(())
}

pub(super) async fn log_pricing_status(
    db_tx: &DatabaseTransaction,
    pricing: &pricings::Model,
    status_after: PricingStatus,
    reason: PricingLogReason,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    pricing_logs::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        pricing_id: ActiveValue::Set(pricing.id),
        timestamp: ActiveValue::Set(now),
        status_before: ActiveValue::Set(pricing.status.clone()),
        status_after: ActiveValue::Set(status_after.as_str().to_string()),
        reason: ActiveValue::Set(reason.as_str().to_string()),
    }
    .insert(db_tx)
    .await?;
    Ok(())
}

async fn cancel_event_pricing(
    db_tx: &DatabaseTransaction,
    event: &finance_events::Model,
    reason: PricingLogReason,
    now: DateTime<Utc>,
) -> ResultEngine<Option<pricings::Model>> {
    if event.pricing_point_id.is_none() {
        return Ok(None);
    }
    let Some(pricing) = live_pricing_of_event(db_tx, event.id).await? else {
        return Ok(None);
    };
    if !pricing.status()?.is_cancellable() {
        return Err(EngineError::NonCancellablePricing(format!(
            "pricing {} is {}",
            pricing.id, pricing.status
        )));
    }

    delete_dependent_pricings(db_tx, event).await?;

    log_pricing_status(db_tx, &pricing, PricingStatus::Cancelled, reason, now).await?;
    let pricing = pricings::ActiveModel {
        id: ActiveValue::Set(pricing.id),
        status: ActiveValue::Set(PricingStatus::Cancelled.as_str().to_string()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    tracing::info!(event_id = %event.id, pricing_id = %pricing.id, "Cancelled pricing");
    Ok(Some(pricing))
}

/// Non-cancelled pricing of an event.
async fn live_pricing_of_event(
    db_tx: &DatabaseTransaction,
    event_id: Uuid,
) -> ResultEngine<Option<pricings::Model>> {
    pricings::Entity::find()
        .filter(pricings::Column::EventId.eq(event_id))
        .filter(pricings::Column::Status.ne(PricingStatus::Cancelled.as_str()))
        .one(db_tx)
        .await
        .map_err(Into::into)
}

/// Deletes the pricings of the same pricing point and revenue year that were
/// ordered after `event`, since their revenue depends on it. Their events go
/// back to `ready`.
async fn delete_dependent_pricings(
    db_tx: &DatabaseTransaction,
    event: &finance_events::Model,
) -> ResultEngine<()> {
    let (Some(pricing_point_id), Some(ordering)) =
        (event.pricing_point_id, event.pricing_ordering_date)
    else {
        return Ok(());
    };
    let (period_start, period_end) = revenue_period(event.value_date);

    let candidates = pricings::Entity::find()
        .filter(pricings::Column::PricingPointId.eq(pricing_point_id))
        .filter(pricings::Column::Status.ne(PricingStatus::Cancelled.as_str()))
        .filter(pricings::Column::ValueDate.between(period_start, period_end))
        .find_also_related(finance_events::Entity)
        .all(db_tx)
        .await?;

    let dependents: Vec<(pricings::Model, finance_events::Model)> = candidates
        .into_iter()
        .filter_map(|(pricing, other)| other.map(|other| (pricing, other)))
        .filter(|(_, other)| {
            other.id != event.id
                && other
                    .pricing_ordering_date
                    .is_some_and(|date| (date, other.id) > (ordering, event.id))
        })
        .collect();
    if dependents.is_empty() {
        return Ok(());
    }

    for (pricing, _) in &dependents {
        if !pricing.status()?.is_deletable() {
            tracing::error!(
                event_id = %event.id,
                pricing_id = %pricing.id,
                "Found non-deletable pricing for a pricing point that has an older event to price or cancel"
            );
            return Err(EngineError::NonCancellablePricing(format!(
                "pricing {} depends on event {} and is {}",
                pricing.id, event.id, pricing.status
            )));
        }
    }

    let pricing_ids: Vec<Uuid> = dependents.iter().map(|(pricing, _)| pricing.id).collect();
    let event_ids: Vec<Uuid> = dependents.iter().map(|(_, event)| event.id).collect();
    pricing_lines::Entity::delete_many()
        .filter(pricing_lines::Column::PricingId.is_in(pricing_ids.clone()))
        .exec(db_tx)
        .await?;
    pricing_logs::Entity::delete_many()
        .filter(pricing_logs::Column::PricingId.is_in(pricing_ids.clone()))
        .exec(db_tx)
        .await?;
    pricings::Entity::delete_many()
        .filter(pricings::Column::Id.is_in(pricing_ids.clone()))
        .exec(db_tx)
        .await?;
    finance_events::Entity::update_many()
        .col_expr(
            finance_events::Column::Status,
            Expr::value(FinanceEventStatus::Ready.as_str()),
        )
        .filter(finance_events::Column::Id.is_in(event_ids))
        .exec(db_tx)
        .await?;
    tracing::info!(
        event_id = %event.id,
        deleted = pricing_ids.len(),
        "Deleted pricings that depended on given event"
    );
    Ok(())
}

/// What is priced for an event.
struct PricedBooking {
    reimbursed: ReimbursedBooking,
    booking_id: Option<Uuid>,
    collective_booking_id: Option<Uuid>,
    venue_id: Uuid,
}

async fn priced_individual_booking(
    db_tx: &DatabaseTransaction,
    booking: &bookings::Model,
    fallback_date: DateTime<Utc>,
) -> ResultEngine<PricedBooking> {
    let stock = require::<stocks::Entity>(db_tx, booking.stock_id, "stock").await?;
    let offer = require::<offers::Entity>(db_tx, stock.offer_id, "offer").await?;
    Ok(PricedBooking {
        reimbursed: ReimbursedBooking {
            offer_id: Some(offer.id),
            venue_id: booking.venue_id,
            offerer_id: booking.offerer_id,
            subcategory: Some(offer.subcategory()?),
            is_digital: offer.is_digital(),
            is_collective: false,
            quantity: booking.quantity,
            total_amount: booking.total_amount(),
            date_used: booking.date_used.unwrap_or(fallback_date),
        },
        booking_id: Some(booking.id),
        collective_booking_id: None,
        venue_id: booking.venue_id,
    })
}

async fn priced_collective_booking(
    db_tx: &DatabaseTransaction,
    booking: &collective_bookings::Model,
    fallback_date: DateTime<Utc>,
) -> ResultEngine<PricedBooking> {
    let stock = require::<collective_stocks::Entity>(
        db_tx,
        booking.collective_stock_id,
        "collective stock",
    )
    .await?;
    require::<collective_offers::Entity>(db_tx, stock.collective_offer_id, "collective offer")
        .await?;
    Ok(PricedBooking {
        reimbursed: ReimbursedBooking {
            offer_id: None,
            venue_id: booking.venue_id,
            offerer_id: booking.offerer_id,
            subcategory: None,
            is_digital: false,
            is_collective: true,
            quantity: 1,
            total_amount: stock.price(),
            date_used: booking.date_used.unwrap_or(fallback_date),
        },
        booking_id: None,
        collective_booking_id: Some(booking.id),
        venue_id: booking.venue_id,
    })
}

async fn priced_booking_of_event(
    db_tx: &DatabaseTransaction,
    event: &finance_events::Model,
    booking_incident: Option<&booking_finance_incidents::Model>,
) -> ResultEngine<PricedBooking> {
    let (booking_id, collective_booking_id) = match booking_incident {
        Some(incident) => (incident.booking_id, incident.collective_booking_id),
        None => (event.booking_id, event.collective_booking_id),
    };
    match (booking_id, collective_booking_id) {
        (Some(id), _) => {
            let booking = require::<bookings::Entity>(db_tx, id, "booking").await?;
            priced_individual_booking(db_tx, &booking, event.value_date).await
        }
        (None, Some(id)) => {
            let booking =
                require::<collective_bookings::Entity>(db_tx, id, "collective booking").await?;
            priced_collective_booking(db_tx, &booking, event.value_date).await
        }
        (None, None) => Err(EngineError::InvalidState(format!(
            "finance event {} has no booking",
            event.id
        ))),
    }
}

/// Year-to-date revenue of the pricing point, without `exclude_booking_id`.
/// Collective bookings are not part of the revenue.
async fn current_revenue(
    db_tx: &DatabaseTransaction,
    pricing_point_id: Uuid,
    value_date: DateTime<Utc>,
    exclude_booking_id: Option<Uuid>,
) -> ResultEngine<MoneyCents> {
    let (start, end) = revenue_period(value_date);
    let priced = pricings::Entity::find()
        .filter(pricings::Column::PricingPointId.eq(pricing_point_id))
        .filter(pricings::Column::ValueDate.between(start, end))
        .filter(pricings::Column::Status.ne(PricingStatus::Cancelled.as_str()))
        .filter(pricings::Column::BookingId.is_not_null())
        .all(db_tx)
        .await?;
    let booking_ids: Vec<Uuid> = priced
        .iter()
        .filter_map(|pricing| pricing.booking_id)
        .filter(|id| Some(*id) != exclude_booking_id)
        .collect();
    if booking_ids.is_empty() {
        return Ok(MoneyCents::ZERO);
    }
    let bookings = bookings::Entity::find()
        .filter(bookings::Column::Id.is_in(booking_ids.clone()))
        .all(db_tx)
        .await?;
    // A booking may have several live pricings (used, unused, used again).
    Ok(booking_ids
        .iter()
        .filter_map(|id| bookings.iter().find(|booking| booking.id == *id))
        .map(bookings::Model::total_amount)
        .sum())
}

/// Latest non-cancelled pricing of a booking, reversed or repriced by incidents.
async fn original_pricing(
    db_tx: &DatabaseTransaction,
    priced: &PricedBooking,
) -> ResultEngine<pricings::Model> {
    let mut query =
        pricings::Entity::find().filter(pricings::Column::Status.ne(PricingStatus::Cancelled.as_str()));
    query = match (priced.booking_id, priced.collective_booking_id) {
        (Some(id), _) => query.filter(pricings::Column::BookingId.eq(id)),
        (None, Some(id)) => query.filter(pricings::Column::CollectiveBookingId.eq(id)),
        (None, None) => {
            return Err(EngineError::InvalidState(
                "incident without booking".to_string(),
            ));
        }
    };
    query
        .order_by_desc(pricings::Column::CreationDate)
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::InvalidState("the booking has never been priced".to_string()))
}

async fn rule_of_pricing(
    db_tx: &DatabaseTransaction,
    pricing: &pricings::Model,
) -> ResultEngine<AppliedRule> {
    if let Some(rule_id) = pricing.custom_rule_id {
        let rule = require::<custom_reimbursement_rules::Entity>(db_tx, rule_id, "custom rule")
            .await?;
        return Ok(AppliedRule::Custom(rule));
    }
    if pricing.standard_rule == AppliedRule::CommercialGesture.standard_description() {
        return Ok(AppliedRule::CommercialGesture);
    }
    StandardRule::from_description(&pricing.standard_rule)
        .map(AppliedRule::Standard)
        .ok_or_else(|| {
            EngineError::InvalidRule(format!("unknown standard rule {:?}", pricing.standard_rule))
        })
}

fn revenue_and_contribution(amount: MoneyCents, revenue: MoneyCents) -> Vec<(PricingLineCategory, MoneyCents)> {
    let offerer_revenue = -revenue;
    vec![
        (PricingLineCategory::OffererRevenue, offerer_revenue),
        (PricingLineCategory::OffererContribution, amount - offerer_revenue),
    ]
}

/// Prices one event. Returns `None` when the event is no longer `ready`.
pub(super) async fn price_event(
    db_tx: &DatabaseTransaction,
    event_id: Uuid,
    now: DateTime<Utc>,
) -> ResultEngine<Option<pricings::Model>> {
    let event = require::<finance_events::Entity>(db_tx, event_id, "finance event").await?;
    if event.status()? != FinanceEventStatus::Ready {
        return Ok(None);
    }
    if let Some(existing) = live_pricing_of_event(db_tx, event.id).await? {
        return Ok(Some(existing));
    }
    let pricing_point_id = event.pricing_point_id.ok_or_else(|| {
        EngineError::InvalidState(format!("event {} has no pricing point", event.id))
    })?;

    delete_dependent_pricings(db_tx, &event).await?;

    let motive = event.motive()?;
    let booking_incident = match event.booking_finance_incident_id {
        Some(id) => Some(
            require::<booking_finance_incidents::Entity>(db_tx, id, "booking finance incident")
                .await?,
        ),
        None => None,
    };
    let priced = priced_booking_of_event(db_tx, &event, booking_incident.as_ref()).await?;

    let mut revenue = current_revenue(
        db_tx,
        pricing_point_id,
        event.value_date,
        priced.booking_id,
    )
    .await?;
    if !priced.reimbursed.is_collective {
        match motive {
            FinanceEventMotive::BookingUsed | FinanceEventMotive::BookingUsedAfterCancellation => {
                revenue += priced.reimbursed.total_amount;
            }
            FinanceEventMotive::IncidentNewPrice | FinanceEventMotive::IncidentCommercialGesture => {
                if let Some(incident) = &booking_incident {
                    revenue += incident.new_total_amount();
                }
            }
            _ => {}
        }
    }

    let (rule, amount, lines, booking_id, collective_booking_id) = match motive {
        FinanceEventMotive::BookingUsed | FinanceEventMotive::BookingUsedAfterCancellation => {
            let custom_rules = custom_reimbursement_rules::Entity::find().all(db_tx).await?;
            let rule = select_rule(&custom_rules, &priced.reimbursed, revenue.cents())?;
            let amount = -rule.apply(&priced.reimbursed, None);
            let lines = revenue_and_contribution(amount, priced.reimbursed.total_amount);
            (
                rule,
                amount,
                lines,
                priced.booking_id,
                priced.collective_booking_id,
            )
        }
        FinanceEventMotive::IncidentReversalOfOriginalEvent => {
            let original = original_pricing(db_tx, &priced).await?;
            let rule = rule_of_pricing(db_tx, &original).await?;
            let original_lines = pricing_lines::Entity::find()
                .filter(pricing_lines::Column::PricingId.eq(original.id))
                .all(db_tx)
                .await?;
            let mut lines = Vec::with_capacity(original_lines.len());
            for line in original_lines {
                lines.push((
                    PricingLineCategory::try_from(line.category.as_str())?,
                    -MoneyCents::new(line.amount),
                ));
            }
            (rule, -original.amount(), lines, None, None)
        }
        FinanceEventMotive::IncidentNewPrice => {
            let incident = booking_incident.as_ref().ok_or_else(|| {
                EngineError::InvalidState("new price event without incident".to_string())
            })?;
            let original = original_pricing(db_tx, &priced).await?;
            let rule = rule_of_pricing(db_tx, &original).await?;
            let new_total = incident.new_total_amount();
            let amount = -rule.apply(&priced.reimbursed, Some(new_total));
            let lines = revenue_and_contribution(amount, new_total);
            (rule, amount, lines, None, None)
        }
        FinanceEventMotive::IncidentCommercialGesture => {
            let incident = booking_incident.as_ref().ok_or_else(|| {
                EngineError::InvalidState("commercial gesture event without incident".to_string())
            })?;
            let gesture = priced.reimbursed.total_amount - incident.new_total_amount();
            let amount = -gesture;
            let lines = vec![
                (PricingLineCategory::CommercialGesture, amount),
                (PricingLineCategory::OffererContribution, MoneyCents::ZERO),
            ];
            (AppliedRule::CommercialGesture, amount, lines, None, None)
        }
        FinanceEventMotive::BookingUnused | FinanceEventMotive::BookingCancelledAfterUse => {
            return Err(EngineError::InvalidState(format!(
                "unexpected finance event motive: {motive}"
            )));
        }
    };

    let pricing = pricings::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        status: ActiveValue::Set(PricingStatus::Validated.as_str().to_string()),
        creation_date: ActiveValue::Set(now),
        value_date: ActiveValue::Set(event.value_date),
        amount: ActiveValue::Set(amount.cents()),
        standard_rule: ActiveValue::Set(rule.standard_description().to_string()),
        custom_rule_id: ActiveValue::Set(rule.custom_rule_id()),
        revenue: ActiveValue::Set(revenue.cents()),
        pricing_point_id: ActiveValue::Set(pricing_point_id),
        venue_id: ActiveValue::Set(priced.venue_id),
        booking_id: ActiveValue::Set(booking_id),
        collective_booking_id: ActiveValue::Set(collective_booking_id),
        event_id: ActiveValue::Set(event.id),
    }
    .insert(db_tx)
    .await?;
    for (category, line_amount) in lines {
        pricing_lines::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            pricing_id: ActiveValue::Set(pricing.id),
            amount: ActiveValue::Set(line_amount.cents()),
            category: ActiveValue::Set(category.as_str().to_string()),
        }
        .insert(db_tx)
        .await?;
    }
    finance_events::ActiveModel {
        id: ActiveValue::Set(event.id),
        status: ActiveValue::Set(FinanceEventStatus::Priced.as_str().to_string()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;

    tracing::info!(
        event_id = %event.id,
        pricing_id = %pricing.id,
        amount = %amount,
        "Priced event"
    );
    Ok(Some(pricing))
}

impl Engine {
    /// Prices every `ready` event ordered in `[min_date, now - 1 min]`, one
    /// transaction per event. An error stops the pricing of the remaining
    /// events of the same pricing point.
    pub async fn price_events(
        &self,
        min_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ResultEngine<PricingSummary> {
        let max_date = now - Duration::minutes(PRICING_SAFETY_DELAY_MINUTES);
        let mut query = finance_events::Entity::find()
            .filter(finance_events::Column::Status.eq(FinanceEventStatus::Ready.as_str()))
            .filter(finance_events::Column::PricingPointId.is_not_null())
            .filter(finance_events::Column::PricingOrderingDate.lte(max_date));
        if let Some(min_date) = min_date {
            query = query.filter(finance_events::Column::PricingOrderingDate.gte(min_date));
        }
        let mut events = query.all(&self.database).await?;
        events.sort_by_key(|event| (event.pricing_ordering_date, event.id));

        let mut summary = PricingSummary::default();
        let mut errored_pricing_points: HashSet<Uuid> = HashSet::new();
        for event in events {
            let Some(pricing_point_id) = event.pricing_point_id else {
                continue;
            };
            if errored_pricing_points.contains(&pricing_point_id) {
                tracing::info!(
                    event_id = %event.id,
                    pricing_point_id = %pricing_point_id,
                    "An older event of this pricing point could not be priced, skipping"
                );
                summary.skipped += 1;
                continue;
            }

            let result: ResultEngine<Option<pricings::Model>> =
                with_tx!(self, |db_tx| price_event(&db_tx, event.id, now).await);
            match result {
                Ok(Some(_)) => summary.priced += 1,
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    tracing::error!(
                        event_id = %event.id,
                        pricing_point_id = %pricing_point_id,
                        error = %err,
                        "Could not price event"
                    );
                    errored_pricing_points.insert(pricing_point_id);
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            priced = summary.priced,
            failed = summary.failed,
            skipped = summary.skipped,
            "Priced events"
        );
        Ok(summary)
    }

    /// Prices a single event right away.
    pub async fn price_event(
        &self,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<pricings::Model>> {
        with_tx!(self, |db_tx| price_event(&db_tx, event_id, now).await)
    }

    /// Cancels the latest "used" finance event of an individual booking.
    pub async fn cancel_latest_event(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<finance_events::Model>> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            cancel_latest_event(&db_tx, EventBooking::Individual(&booking), now).await
        })
    }

    /// Cancels the pricing of an event so that it is priced again.
    pub async fn force_event_repricing(
        &self,
        event_id: Uuid,
        reason: PricingLogReason,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let event = require::<finance_events::Entity>(&db_tx, event_id, "finance event").await?;
            force_event_repricing(&db_tx, &event, reason, now).await
        })
    }

    /// Finance events of an individual booking, oldest first.
    pub async fn booking_finance_events(
        &self,
        booking_id: Uuid,
    ) -> ResultEngine<Vec<finance_events::Model>> {
        finance_events::Entity::find()
            .filter(finance_events::Column::BookingId.eq(booking_id))
            .order_by_asc(finance_events::Column::CreationDate)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }

    /// Pricings of an individual booking with their lines, oldest first.
    pub async fn booking_pricings(
        &self,
        booking_id: Uuid,
    ) -> ResultEngine<Vec<(pricings::Model, Vec<pricing_lines::Model>)>> {
        pricings::Entity::find()
            .filter(pricings::Column::BookingId.eq(booking_id))
            .order_by_asc(pricings::Column::CreationDate)
            .find_with_related(pricing_lines::Entity)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }
}
