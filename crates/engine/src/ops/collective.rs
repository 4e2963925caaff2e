use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    CancellationReason, CollectiveBookingStatus, CollectiveOfferStatus, EngineError,
    FinanceEventMotive, MoneyCents, OfferValidation, PricingStatus, ResultEngine, UserRole,
    ValidationType, bookings::compute_cancellation_limit_date, collective_bookings,
    collective_offers, collective_stocks, offerers, pricings,
    util::{normalize_label, normalize_required_text},
    venues,
};

use super::{
    Engine,
    access::require_role,
    cashflows::cashflows_being_generated,
    finance::{EventBooking, add_booking_event, cancel_latest_event},
    require, with_tx,
};

#[derive(Clone, Debug)]
pub struct NewCollectiveOffer {
    pub venue_id: Uuid,
    pub name: String,
    pub formats: Vec<String>,
    pub institution: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewCollectiveStock {
    /// Price for the whole group.
    pub price: MoneyCents,
    pub number_of_tickets: i64,
    pub beginning_datetime: DateTime<Utc>,
    pub booking_limit_datetime: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Backoffice search over collective offers. Empty lists and `None` do not
/// filter.
#[derive(Clone, Debug)]
pub struct CollectiveOfferSearch {
    pub ids: Vec<Uuid>,
    pub name: Option<String>,
    pub venue_id: Option<Uuid>,
    pub offerer_id: Option<Uuid>,
    pub validation: Option<OfferValidation>,
    pub statuses: Vec<CollectiveOfferStatus>,
    pub price_min: Option<MoneyCents>,
    pub price_max: Option<MoneyCents>,
    pub event_from: Option<DateTime<Utc>>,
    pub event_to: Option<DateTime<Utc>>,
    pub department_codes: Vec<String>,
    pub formats: Vec<String>,
    pub only_validated_offerers: bool,
    pub sort: SortOrder,
    pub limit: usize,
}

impl Default for CollectiveOfferSearch {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            name: None,
            venue_id: None,
            offerer_id: None,
            validation: None,
            statuses: Vec::new(),
            price_min: None,
            price_max: None,
            event_from: None,
            event_to: None,
            department_codes: Vec::new(),
            formats: Vec::new(),
            only_validated_offerers: false,
            sort: SortOrder::default(),
            limit: 100,
        }
    }
}

/// A collective offer as listed by the search.
#[derive(Clone, Debug)]
pub struct CollectiveOfferRow {
    pub offer: collective_offers::Model,
    pub stock: Option<collective_stocks::Model>,
    pub status: CollectiveOfferStatus,
}

/// Status of a collective offer, from its validation down to its bookings.
pub fn derive_collective_status(
    offer: &collective_offers::Model,
    stock: Option<&collective_stocks::Model>,
    has_active_booking: bool,
    now: DateTime<Utc>,
) -> ResultEngine<CollectiveOfferStatus> {
    let status = match offer.validation()? {
        OfferValidation::Draft => CollectiveOfferStatus::Draft,
        OfferValidation::Pending => CollectiveOfferStatus::Pending,
        OfferValidation::Rejected => CollectiveOfferStatus::Rejected,
        OfferValidation::Approved if !offer.is_active => CollectiveOfferStatus::Inactive,
        OfferValidation::Approved
            if stock.is_some_and(|stock| stock.has_booking_limit_passed(now)) =>
        {
            CollectiveOfferStatus::Expired
        }
        OfferValidation::Approved if has_active_booking => CollectiveOfferStatus::SoldOut,
        OfferValidation::Approved => CollectiveOfferStatus::Active,
    };
    Ok(status)
}

async fn live_booking_of_stock(
    db_tx: &DatabaseTransaction,
    stock_id: Uuid,
) -> ResultEngine<Option<collective_bookings::Model>> {
    collective_bookings::Entity::find()
        .filter(collective_bookings::Column::CollectiveStockId.eq(stock_id))
        .filter(
            collective_bookings::Column::Status.ne(CollectiveBookingStatus::Cancelled.as_str()),
        )
        .one(db_tx)
        .await
        .map_err(Into::into)
}

async fn stock_of_offer(
    db_tx: &DatabaseTransaction,
    offer_id: Uuid,
) -> ResultEngine<Option<collective_stocks::Model>> {
    collective_stocks::Entity::find()
        .filter(collective_stocks::Column::CollectiveOfferId.eq(offer_id))
        .one(db_tx)
        .await
        .map_err(Into::into)
}

async fn moderate(
    db_tx: &DatabaseTransaction,
    offer_ids: &[Uuid],
    validation: OfferValidation,
    author_id: Uuid,
    now: DateTime<Utc>,
) -> ResultEngine<Vec<collective_offers::Model>> {
    require_role(db_tx, author_id, &[UserRole::Admin]).await?;
    let mut offers = Vec::with_capacity(offer_ids.len());
    for id in offer_ids {
        let offer = require::<collective_offers::Entity>(db_tx, *id, "collective offer").await?;
        if offer.validation()? != OfferValidation::Pending {
            return Err(EngineError::InvalidState(format!(
                "collective offer {id} is {}, only pending offers can be moderated",
                offer.validation
            )));
        }
        offers.push(offer);
    }
    let mut updated = Vec::with_capacity(offers.len());
    for offer in offers {
        let offer = collective_offers::ActiveModel {
            id: ActiveValue::Set(offer.id),
            validation: ActiveValue::Set(validation.as_str().to_string()),
            is_active: ActiveValue::Set(validation == OfferValidation::Approved),
            last_validation_date: ActiveValue::Set(Some(now)),
            last_validation_type: ActiveValue::Set(Some(
                ValidationType::Manual.as_str().to_string(),
            )),
            last_validation_author_id: ActiveValue::Set(Some(author_id)),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
        updated.push(offer);
    }
    tracing::info!(count = updated.len(), validation = %validation, "Moderated collective offers");
    Ok(updated)
}

impl Engine {
    /// Creates a collective offer, waiting for moderation.
    pub async fn create_collective_offer(
        &self,
        new_offer: NewCollectiveOffer,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_offers::Model> {
        let name = normalize_required_text(&new_offer.name, "collective offer name")?;
        let formats = serde_json::to_string(&new_offer.formats)
            .map_err(|err| EngineError::InvalidState(format!("invalid formats: {err}")))?;
        with_tx!(self, |db_tx| {
            require::<venues::Entity>(&db_tx, new_offer.venue_id, "venue").await?;
            let offer = collective_offers::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                venue_id: ActiveValue::Set(new_offer.venue_id),
                name: ActiveValue::Set(name),
                formats: ActiveValue::Set(formats),
                is_active: ActiveValue::Set(false),
                validation: ActiveValue::Set(OfferValidation::Pending.as_str().to_string()),
                last_validation_date: ActiveValue::Set(None),
                last_validation_type: ActiveValue::Set(None),
                last_validation_author_id: ActiveValue::Set(None),
                institution: ActiveValue::Set(new_offer.institution),
                date_created: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;
            Ok(offer)
        })
    }

    pub async fn create_collective_stock(
        &self,
        offer_id: Uuid,
        new_stock: NewCollectiveStock,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_stocks::Model> {
        if new_stock.price.is_negative() {
            return Err(EngineError::InvalidAmount(format!(
                "price must be positive, got {}",
                new_stock.price
            )));
        }
        if new_stock.number_of_tickets <= 0 {
            return Err(EngineError::InvalidAmount(
                "the number of tickets must be positive".to_string(),
            ));
        }
        let booking_limit = new_stock
            .booking_limit_datetime
            .unwrap_or(new_stock.beginning_datetime);
        if booking_limit > new_stock.beginning_datetime {
            return Err(EngineError::InvalidState(
                "the booking limit must be before the beginning of the event".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            require::<collective_offers::Entity>(&db_tx, offer_id, "collective offer").await?;
            if stock_of_offer(&db_tx, offer_id).await?.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "stock of collective offer {offer_id}"
                )));
            }
            let stock = collective_stocks::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                collective_offer_id: ActiveValue::Set(offer_id),
                price: ActiveValue::Set(new_stock.price.cents()),
                number_of_tickets: ActiveValue::Set(new_stock.number_of_tickets),
                beginning_datetime: ActiveValue::Set(new_stock.beginning_datetime),
                booking_limit_datetime: ActiveValue::Set(booking_limit),
                date_created: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;
            Ok(stock)
        })
    }

    pub async fn book_collective_offer(
        &self,
        stock_id: Uuid,
        institution: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_bookings::Model> {
        let institution = normalize_required_text(institution, "institution")?;
        with_tx!(self, |db_tx| {
            let stock =
                require::<collective_stocks::Entity>(&db_tx, stock_id, "collective stock").await?;
            let offer = require::<collective_offers::Entity>(
                &db_tx,
                stock.collective_offer_id,
                "collective offer",
            )
            .await?;
            let venue = require::<venues::Entity>(&db_tx, offer.venue_id, "venue").await?;
            let offerer = require::<offerers::Entity>(&db_tx, venue.offerer_id, "offerer").await?;

            let released = offer.is_active
                && offer.validation()? == OfferValidation::Approved
                && venue.is_validated
                && offerer.is_active
                && offerer.is_validated;
            if !released {
                return Err(EngineError::BookingRefused(
                    "the collective offer is not bookable".to_string(),
                ));
            }
            if stock.has_booking_limit_passed(now) {
                return Err(EngineError::BookingRefused(
                    "the booking limit date has passed".to_string(),
                ));
            }
            if live_booking_of_stock(&db_tx, stock_id).await?.is_some() {
                return Err(EngineError::BookingRefused(
                    "the collective offer is already booked".to_string(),
                ));
            }

            let booking = collective_bookings::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                collective_stock_id: ActiveValue::Set(stock_id),
                venue_id: ActiveValue::Set(venue.id),
                offerer_id: ActiveValue::Set(offerer.id),
                institution: ActiveValue::Set(institution),
                status: ActiveValue::Set(CollectiveBookingStatus::Pending.as_str().to_string()),
                cancellation_reason: ActiveValue::Set(None),
                date_created: ActiveValue::Set(now),
                confirmation_date: ActiveValue::Set(None),
                date_used: ActiveValue::Set(None),
                cancellation_date: ActiveValue::Set(None),
                cancellation_limit_date: ActiveValue::Set(compute_cancellation_limit_date(
                    Some(stock.beginning_datetime),
                    now,
                )),
                reimbursement_date: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(booking_id = %booking.id, stock_id = %stock_id, "Collective offer booked");
            Ok(booking)
        })
    }

    pub async fn confirm_collective_booking(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking =
                require::<collective_bookings::Entity>(&db_tx, booking_id, "collective booking")
                    .await?;
            if booking.status()? != CollectiveBookingStatus::Pending {
                return Err(EngineError::InvalidState(format!(
                    "collective booking {booking_id} is {}",
                    booking.status
                )));
            }
            let booking = collective_bookings::ActiveModel {
                id: ActiveValue::Set(booking_id),
                status: ActiveValue::Set(CollectiveBookingStatus::Confirmed.as_str().to_string()),
                confirmation_date: ActiveValue::Set(Some(now)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(booking)
        })
    }

    pub async fn cancel_collective_booking(
        &self,
        booking_id: Uuid,
        reason: CancellationReason,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking =
                require::<collective_bookings::Entity>(&db_tx, booking_id, "collective booking")
                    .await?;
            let cancelled_event = match booking.status()? {
                CollectiveBookingStatus::Cancelled => {
                    return Err(EngineError::AlreadyCancelled(booking_id.to_string()));
                }
                CollectiveBookingStatus::Reimbursed => {
                    return Err(EngineError::AlreadyReimbursed(booking_id.to_string()));
                }
                CollectiveBookingStatus::Used => {
                    cancel_latest_event(&db_tx, EventBooking::Collective(&booking), now).await?
                }
                CollectiveBookingStatus::Pending | CollectiveBookingStatus::Confirmed => None,
            };
            let booking = collective_bookings::ActiveModel {
                id: ActiveValue::Set(booking_id),
                status: ActiveValue::Set(CollectiveBookingStatus::Cancelled.as_str().to_string()),
                cancellation_reason: ActiveValue::Set(Some(reason.as_str().to_string())),
                cancellation_date: ActiveValue::Set(Some(now)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            if cancelled_event.is_some() {
                add_booking_event(
                    &db_tx,
                    FinanceEventMotive::BookingCancelledAfterUse,
                    EventBooking::Collective(&booking),
                    now,
                )
                .await?;
            }
            tracing::info!(booking_id = %booking_id, reason = %reason, "Collective booking cancelled");
            Ok(booking)
        })
    }

    pub async fn validate_collective_offers(
        &self,
        offer_ids: &[Uuid],
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<collective_offers::Model>> {
        with_tx!(self, |db_tx| {
            moderate(&db_tx, offer_ids, OfferValidation::Approved, author_id, now).await
        })
    }

    pub async fn reject_collective_offers(
        &self,
        offer_ids: &[Uuid],
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<collective_offers::Model>> {
        with_tx!(self, |db_tx| {
            moderate(&db_tx, offer_ids, OfferValidation::Rejected, author_id, now).await
        })
    }

    /// Lowers the price of a collective offer, repricing its booking.
    pub async fn edit_collective_offer_price(
        &self,
        offer_id: Uuid,
        price: MoneyCents,
        number_of_tickets: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<collective_stocks::Model> {
        if price.is_negative() || number_of_tickets <= 0 {
            return Err(EngineError::InvalidAmount(
                "price and number of tickets must be positive".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            require::<collective_offers::Entity>(&db_tx, offer_id, "collective offer").await?;
            let stock = stock_of_offer(&db_tx, offer_id).await?.ok_or_else(|| {
                EngineError::InvalidState(format!("collective offer {offer_id} has no stock"))
            })?;
            if cashflows_being_generated(&db_tx, now).await? {
                return Err(EngineError::InvalidState(
                    "cashflows are being generated".to_string(),
                ));
            }

            let booking_ids: Vec<Uuid> = collective_bookings::Entity::find()
                .filter(collective_bookings::Column::CollectiveStockId.eq(stock.id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|booking| booking.id)
                .collect();
            let paid = pricings::Entity::find()
                .filter(pricings::Column::CollectiveBookingId.is_in(booking_ids))
                .filter(pricings::Column::Status.is_in([
                    PricingStatus::Processed.as_str(),
                    PricingStatus::Invoiced.as_str(),
                ]))
                .one(&db_tx)
                .await?;
            if paid.is_some() {
                return Err(EngineError::InvalidState(
                    "the collective offer has already been reimbursed".to_string(),
                ));
            }

            let live = live_booking_of_stock(&db_tx, stock.id).await?;
            if let Some(booking) = &live
                && matches!(
                    booking.status()?,
                    CollectiveBookingStatus::Confirmed | CollectiveBookingStatus::Used
                )
                && (price > stock.price() || number_of_tickets > stock.number_of_tickets)
            {
                return Err(EngineError::InvalidAmount(
                    "the price and the number of tickets of a booked offer cannot increase"
                        .to_string(),
                ));
            }

            let updated = collective_stocks::ActiveModel {
                id: ActiveValue::Set(stock.id),
                price: ActiveValue::Set(price.cents()),
                number_of_tickets: ActiveValue::Set(number_of_tickets),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            if let Some(booking) = &live
                && booking.status()? == CollectiveBookingStatus::Used
                && cancel_latest_event(&db_tx, EventBooking::Collective(booking), now)
                    .await?
                    .is_some()
            {
                add_booking_event(
                    &db_tx,
                    FinanceEventMotive::BookingUsed,
                    EventBooking::Collective(booking),
                    now,
                )
                .await?;
            }
            tracing::info!(offer_id = %offer_id, price = %price, "Edited collective offer price");
            Ok(updated)
        })
    }

    pub async fn collective_offer_status(
        &self,
        offer_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<CollectiveOfferStatus> {
        with_tx!(self, |db_tx| {
            let offer =
                require::<collective_offers::Entity>(&db_tx, offer_id, "collective offer").await?;
            let stock = stock_of_offer(&db_tx, offer_id).await?;
            let has_active_booking = match &stock {
                Some(stock) => live_booking_of_stock(&db_tx, stock.id).await?.is_some(),
                None => false,
            };
            derive_collective_status(&offer, stock.as_ref(), has_active_booking, now)
        })
    }

    /// Searches collective offers. Returns at most `limit` rows and whether
    /// more rows matched.
    pub async fn search_collective_offers(
        &self,
        search: &CollectiveOfferSearch,
        now: DateTime<Utc>,
    ) -> ResultEngine<(Vec<CollectiveOfferRow>, bool)> {
        with_tx!(self, |db_tx| {
            let mut query = collective_offers::Entity::find();
            if !search.ids.is_empty() {
                query = query.filter(collective_offers::Column::Id.is_in(search.ids.clone()));
            }
            if let Some(venue_id) = search.venue_id {
                query = query.filter(collective_offers::Column::VenueId.eq(venue_id));
            }
            if let Some(validation) = search.validation {
                query = query.filter(collective_offers::Column::Validation.eq(validation.as_str()));
            }
            query = match search.sort {
                SortOrder::Ascending => query.order_by_asc(collective_offers::Column::DateCreated),
                SortOrder::Descending => {
                    query.order_by_desc(collective_offers::Column::DateCreated)
                }
            };
            let offers = query.all(&db_tx).await?;

            let venues: HashMap<Uuid, venues::Model> = venues::Entity::find()
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|venue| (venue.id, venue))
                .collect();
            let offerers: HashMap<Uuid, offerers::Model> = offerers::Entity::find()
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|offerer| (offerer.id, offerer))
                .collect();
            let offer_ids: Vec<Uuid> = offers.iter().map(|offer| offer.id).collect();
            let stocks: HashMap<Uuid, collective_stocks::Model> = collective_stocks::Entity::find()
                .filter(collective_stocks::Column::CollectiveOfferId.is_in(offer_ids))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|stock| (stock.collective_offer_id, stock))
                .collect();
            let stock_ids: Vec<Uuid> = stocks.values().map(|stock| stock.id).collect();
            let booked_stocks: Vec<Uuid> = collective_bookings::Entity::find()
                .filter(collective_bookings::Column::CollectiveStockId.is_in(stock_ids))
                .filter(
                    collective_bookings::Column::Status
                        .ne(CollectiveBookingStatus::Cancelled.as_str()),
                )
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|booking| booking.collective_stock_id)
                .collect();

            let name = search.name.as_deref().map(normalize_label);
            let mut rows = Vec::new();
            let mut has_more = false;
            for offer in offers {
                let Some(venue) = venues.get(&offer.venue_id) else {
                    continue;
                };
                let Some(offerer) = offerers.get(&venue.offerer_id) else {
                    continue;
                };
                let stock = stocks.get(&offer.id);

                if search.offerer_id.is_some_and(|id| id != offerer.id) {
                    continue;
                }
                if search.only_validated_offerers && !offerer.is_validated {
                    continue;
                }
                if let Some(name) = &name
                    && !normalize_label(&offer.name).contains(name.as_str())
                {
                    continue;
                }
                if !search.department_codes.is_empty()
                    && !venue
                        .department_code
                        .as_ref()
                        .is_some_and(|code| search.department_codes.contains(code))
                {
                    continue;
                }
                if !search.formats.is_empty() {
                    let formats = offer.formats()?;
                    if !formats.iter().any(|format| search.formats.contains(format)) {
                        continue;
                    }
                }
                let price_or_date_filtered = search.price_min.is_some()
                    || search.price_max.is_some()
                    || search.event_from.is_some()
                    || search.event_to.is_some();
                if price_or_date_filtered {
                    let Some(stock) = stock else { continue };
                    if search.price_min.is_some_and(|min| stock.price() < min)
                        || search.price_max.is_some_and(|max| stock.price() > max)
                        || search
                            .event_from
                            .is_some_and(|from| stock.beginning_datetime < from)
                        || search.event_to.is_some_and(|to| stock.beginning_datetime > to)
                    {
                        continue;
                    }
                }

                let has_active_booking =
                    stock.is_some_and(|stock| booked_stocks.contains(&stock.id));
                let status = derive_collective_status(&offer, stock, has_active_booking, now)?;
                if !search.statuses.is_empty() && !search.statuses.contains(&status) {
                    continue;
                }

                if rows.len() == search.limit {
                    has_more = true;
                    break;
                }
                rows.push(CollectiveOfferRow {
                    stock: stock.cloned(),
                    offer,
                    status,
                });
            }
            Ok((rows, has_more))
        })
    }
}
