use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    BookingStatus, CancellationReason, EngineError, FinanceEventMotive, FinanceEventStatus,
    MoneyCents, OfferValidation, ResultEngine, activation_codes, bookings, finance_events,
    offers,
    pricing_logs::PricingLogReason,
    stocks::{self, EVENT_DELAY_HOURS, MAX_STOCK_PRICE},
    subcategories::Subcategory,
    util::{normalize_optional_text, normalize_required_text},
    venues,
};

use super::{
    Engine,
    access::stock_context,
    bookings::{cancel_bookings_of_stock, unmark_booking_used},
    finance::{event_ordering_date, force_event_repricing},
    require, with_tx,
};

#[derive(Clone, Debug)]
pub struct NewOffer {
    pub venue_id: Uuid,
    pub name: String,
    pub subcategory_id: String,
    pub is_duo: bool,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NewStock {
    pub price: MoneyCents,
    /// `None` is an unlimited stock.
    pub quantity: Option<i64>,
    pub beginning_datetime: Option<DateTime<Utc>>,
    pub booking_limit_datetime: Option<DateTime<Utc>>,
}

/// Changes to a stock. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct StockEdit {
    pub price: Option<MoneyCents>,
    pub quantity: Option<Option<i64>>,
    pub beginning_datetime: Option<DateTime<Utc>>,
    pub booking_limit_datetime: Option<Option<DateTime<Utc>>>,
}

fn check_price(price: MoneyCents) -> ResultEngine<()> {
    if price.is_negative() || price > MAX_STOCK_PRICE {
        return Err(EngineError::InvalidAmount(format!(
            "price must be between 0 and {MAX_STOCK_PRICE}, got {price}"
        )));
    }
    Ok(())
}

fn check_quantity(quantity: Option<i64>, booked: i64) -> ResultEngine<()> {
    match quantity {
        Some(quantity) if quantity < 0 => Err(EngineError::InvalidAmount(format!(
            "quantity must be positive, got {quantity}"
        ))),
        Some(quantity) if quantity < booked => Err(EngineError::InvalidAmount(format!(
            "quantity {quantity} is lower than the {booked} booked places"
        ))),
        _ => Ok(()),
    }
}

/// Returns the booking limit to store.
fn check_dates(
    subcategory: &Subcategory,
    beginning: Option<DateTime<Utc>>,
    booking_limit: Option<DateTime<Utc>>,
) -> ResultEngine<Option<DateTime<Utc>>> {
    match (subcategory.is_event, beginning) {
        (true, None) => Err(EngineError::InvalidState(
            "an event stock needs a beginning date".to_string(),
        )),
        (false, Some(_)) => Err(EngineError::InvalidState(
            "a thing stock cannot have a beginning date".to_string(),
        )),
        (true, Some(beginning)) => match booking_limit {
            Some(limit) if limit > beginning => Err(EngineError::InvalidState(
                "the booking limit must be before the beginning of the event".to_string(),
            )),
            Some(limit) => Ok(Some(limit)),
            None => Ok(Some(beginning)),
        },
        (false, None) => Ok(booking_limit),
    }
}

impl Engine {
    pub async fn create_offer(
        &self,
        new_offer: NewOffer,
        now: DateTime<Utc>,
    ) -> ResultEngine<offers::Model> {
        let name = normalize_required_text(&new_offer.name, "offer name")?;
        let subcategory = Subcategory::get(&new_offer.subcategory_id)?;
        let url = normalize_optional_text(new_offer.url.as_deref());
        if new_offer.is_duo && !subcategory.can_be_duo {
            return Err(EngineError::InvalidState(format!(
                "subcategory {} cannot be duo",
                subcategory.id
            )));
        }

        with_tx!(self, |db_tx| {
            let venue = require::<venues::Entity>(&db_tx, new_offer.venue_id, "venue").await?;
            match (url.is_some(), venue.is_virtual) {
                (true, false) => {
                    return Err(EngineError::Forbidden(
                        "a digital offer must be on a virtual venue".to_string(),
                    ));
                }
                (false, true) => {
                    return Err(EngineError::Forbidden(
                        "a physical offer cannot be on a virtual venue".to_string(),
                    ));
                }
                _ => {}
            }

            let offer = offers::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                venue_id: ActiveValue::Set(venue.id),
                name: ActiveValue::Set(name),
                subcategory_id: ActiveValue::Set(subcategory.id.to_string()),
                is_duo: ActiveValue::Set(new_offer.is_duo),
                url: ActiveValue::Set(url),
                is_active: ActiveValue::Set(true),
                validation: ActiveValue::Set(OfferValidation::Draft.as_str().to_string()),
                last_validation_date: ActiveValue::Set(None),
                last_validation_type: ActiveValue::Set(None),
                last_validation_author_id: ActiveValue::Set(None),
                date_created: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(offer_id = %offer.id, subcategory = subcategory.id, "Created offer");
            Ok(offer)
        })
    }

    /// Sends a draft offer to moderation.
    pub async fn publish_offer(&self, offer_id: Uuid) -> ResultEngine<offers::Model> {
        with_tx!(self, |db_tx| {
            let offer = require::<offers::Entity>(&db_tx, offer_id, "offer").await?;
            if offer.validation()? != OfferValidation::Draft {
                return Err(EngineError::InvalidState(format!(
                    "offer {offer_id} is {} and cannot be published",
                    offer.validation
                )));
            }
            let offer = offers::ActiveModel {
                id: ActiveValue::Set(offer_id),
                validation: ActiveValue::Set(OfferValidation::Pending.as_str().to_string()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(offer)
        })
    }

    pub async fn create_stock(
        &self,
        offer_id: Uuid,
        new_stock: NewStock,
        now: DateTime<Utc>,
    ) -> ResultEngine<stocks::Model> {
        check_price(new_stock.price)?;
        check_quantity(new_stock.quantity, 0)?;
        with_tx!(self, |db_tx| {
            let offer = require::<offers::Entity>(&db_tx, offer_id, "offer").await?;
            if offer.validation()? == OfferValidation::Rejected {
                return Err(EngineError::InvalidState(format!(
                    "offer {offer_id} has been rejected"
                )));
            }
            let booking_limit = check_dates(
                offer.subcategory()?,
                new_stock.beginning_datetime,
                new_stock.booking_limit_datetime,
            )?;
            let stock = stocks::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                offer_id: ActiveValue::Set(offer_id),
                price: ActiveValue::Set(new_stock.price.cents()),
                quantity: ActiveValue::Set(new_stock.quantity),
                dn_booked_quantity: ActiveValue::Set(0),
                beginning_datetime: ActiveValue::Set(new_stock.beginning_datetime),
                booking_limit_datetime: ActiveValue::Set(booking_limit),
                is_soft_deleted: ActiveValue::Set(false),
                date_created: ActiveValue::Set(now),
                date_modified: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;
            Ok(stock)
        })
    }

    pub async fn edit_stock(
        &self,
        stock_id: Uuid,
        edit: StockEdit,
        now: DateTime<Utc>,
    ) -> ResultEngine<stocks::Model> {
        with_tx!(self, |db_tx| {
            let context = stock_context(&db_tx, stock_id).await?;
            let stock = context.stock;
            if stock.is_soft_deleted {
                return Err(EngineError::InvalidState(format!(
                    "stock {stock_id} has been deleted"
                )));
            }

            let price = edit.price.unwrap_or_else(|| stock.price());
            check_price(price)?;
            let quantity = edit.quantity.unwrap_or(stock.quantity);
            check_quantity(quantity, stock.dn_booked_quantity)?;
            let beginning = edit.beginning_datetime.or(stock.beginning_datetime);
            let booking_limit = check_dates(
                context.subcategory,
                beginning,
                edit.booking_limit_datetime
                    .unwrap_or(stock.booking_limit_datetime),
            )?;

            let updated = stocks::ActiveModel {
                id: ActiveValue::Set(stock_id),
                price: ActiveValue::Set(price.cents()),
                quantity: ActiveValue::Set(quantity),
                beginning_datetime: ActiveValue::Set(beginning),
                booking_limit_datetime: ActiveValue::Set(booking_limit),
                date_modified: ActiveValue::Set(now),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            if let Some(new_beginning) = edit.beginning_datetime
                && stock.beginning_datetime != Some(new_beginning)
            {
                on_event_date_change(&db_tx, stock_id, new_beginning, now).await?;
            }
            tracing::info!(stock_id = %stock_id, "Edited stock");
            Ok(updated)
        })
    }

    /// Soft-deletes a stock and cancels its bookings.
    pub async fn delete_stock(
        &self,
        stock_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<bookings::Model>> {
        with_tx!(self, |db_tx| {
            let stock = require::<stocks::Entity>(&db_tx, stock_id, "stock").await?;
            if !stock.is_event_deletable(now) {
                return Err(EngineError::Forbidden(
                    "an event stock cannot be deleted more than 48h after its beginning"
                        .to_string(),
                ));
            }
            stocks::ActiveModel {
                id: ActiveValue::Set(stock_id),
                is_soft_deleted: ActiveValue::Set(true),
                date_modified: ActiveValue::Set(now),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            let is_event = stock.beginning_datetime.is_some();
            let cancelled =
                cancel_bookings_of_stock(&db_tx, stock_id, CancellationReason::Offerer, is_event, now)
                    .await?;
            tracing::info!(
                stock_id = %stock_id,
                cancelled_bookings = cancelled.len(),
                "Deleted stock"
            );
            Ok(cancelled)
        })
    }

    /// Attaches activation codes to a digital thing stock. The stock quantity
    /// becomes the number of codes.
    pub async fn add_activation_codes(
        &self,
        stock_id: Uuid,
        codes: &[String],
        expiration_date: Option<DateTime<Utc>>,
    ) -> ResultEngine<Vec<activation_codes::Model>> {
        with_tx!(self, |db_tx| {
            let context = stock_context(&db_tx, stock_id).await?;
            if context.subcategory.is_event || !context.offer.is_digital() {
                return Err(EngineError::Forbidden(
                    "activation codes are only for digital things".to_string(),
                ));
            }
            let mut inserted = Vec::with_capacity(codes.len());
            for code in codes {
                let code = normalize_required_text(code, "activation code")?;
                let model = activation_codes::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    stock_id: ActiveValue::Set(stock_id),
                    code: ActiveValue::Set(code),
                    expiration_date: ActiveValue::Set(expiration_date),
                    booking_id: ActiveValue::Set(None),
                }
                .insert(&db_tx)
                .await?;
                inserted.push(model);
            }
            let total = activation_codes::Entity::find()
                .filter(activation_codes::Column::StockId.eq(stock_id))
                .count(&db_tx)
                .await?;
            stocks::ActiveModel {
                id: ActiveValue::Set(stock_id),
                quantity: ActiveValue::Set(Some(i64::try_from(total).unwrap_or(i64::MAX))),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(inserted)
        })
    }

    pub async fn offer(&self, offer_id: Uuid) -> ResultEngine<offers::Model> {
        with_tx!(self, |db_tx| require::<offers::Entity>(&db_tx, offer_id, "offer").await)
    }

    pub async fn stock(&self, stock_id: Uuid) -> ResultEngine<stocks::Model> {
        with_tx!(self, |db_tx| require::<stocks::Entity>(&db_tx, stock_id, "stock").await)
    }
}

/// Follows an event that moved: cancellation limits, used bookings and the
/// pricing order of its finance events.
async fn on_event_date_change(
    db_tx: &DatabaseTransaction,
    stock_id: Uuid,
    new_beginning: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    let delay = Duration::hours(EVENT_DELAY_HOURS);
    let limit = new_beginning.min(now + delay);
    let live = bookings::Entity::find()
        .filter(bookings::Column::StockId.eq(stock_id))
        .filter(bookings::Column::Status.is_in([
            BookingStatus::Confirmed.as_str(),
            BookingStatus::Used.as_str(),
        ]))
        .all(db_tx)
        .await?;
    for booking in &live {
        bookings::ActiveModel {
            id: ActiveValue::Set(booking.id),
            cancellation_limit_date: ActiveValue::Set(Some(limit)),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
    }

    if new_beginning > now + delay {
        for booking in live
            .iter()
            .filter(|booking| booking.status == BookingStatus::Used.as_str())
        {
            unmark_booking_used(db_tx, booking, now).await?;
        }
    }

    let booking_ids: Vec<Uuid> = live.iter().map(|booking| booking.id).collect();
    let events = finance_events::Entity::find()
        .filter(finance_events::Column::BookingId.is_in(booking_ids))
        .filter(finance_events::Column::Motive.is_in([
            FinanceEventMotive::BookingUsed.as_str(),
            FinanceEventMotive::BookingUsedAfterCancellation.as_str(),
        ]))
        .filter(finance_events::Column::Status.is_in([
            FinanceEventStatus::Ready.as_str(),
            FinanceEventStatus::Priced.as_str(),
        ]))
        .all(db_tx)
        .await?;

    let mut earliest: Option<finance_events::Model> = None;
    for event in events {
        let Some(new_ordering) =
            event_ordering_date(db_tx, &event, Some(new_beginning)).await?
        else {
            continue;
        };
        let event = finance_events::ActiveModel {
            id: ActiveValue::Set(event.id),
            pricing_ordering_date: ActiveValue::Set(Some(new_ordering)),
            ..Default::default()
        }
        .update(db_tx)
        .await?;
        let is_priced = event.status == FinanceEventStatus::Priced.as_str();
        let first = is_priced
            && earliest.as_ref().is_none_or(|current| {
                (event.pricing_ordering_date, event.id) < (current.pricing_ordering_date, current.id)
            });
        if first {
            earliest = Some(event);
        }
    }
    if let Some(event) = earliest {
        force_event_repricing(db_tx, &event, PricingLogReason::ChangeDate, now).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn event_stock_dates() {
        let concert = Subcategory::get("CONCERT").unwrap();
        let beginning = Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap();
        assert_eq!(
            check_dates(concert, Some(beginning), None).unwrap(),
            Some(beginning)
        );
        assert!(check_dates(concert, None, None).is_err());
        assert!(
            check_dates(concert, Some(beginning), Some(beginning + Duration::hours(1))).is_err()
        );
    }

    #[test]
    fn thing_stock_has_no_beginning() {
        let book = Subcategory::get("LIVRE_PAPIER").unwrap();
        let date = Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap();
        assert!(check_dates(book, Some(date), None).is_err());
        assert_eq!(check_dates(book, None, Some(date)).unwrap(), Some(date));
    }

    #[test]
    fn price_and_quantity_bounds() {
        assert!(check_price(MoneyCents::ZERO).is_ok());
        assert!(check_price(MAX_STOCK_PRICE).is_ok());
        assert!(check_price(MAX_STOCK_PRICE + MoneyCents::new(1)).is_err());
        assert!(check_price(MoneyCents::new(-1)).is_err());
        assert!(check_quantity(None, 10).is_ok());
        assert!(check_quantity(Some(3), 3).is_ok());
        assert!(check_quantity(Some(2), 3).is_err());
        assert!(check_quantity(Some(-1), 0).is_err());
    }
}
