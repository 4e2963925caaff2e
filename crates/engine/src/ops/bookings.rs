use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    BookingStatus, CancellationReason, CollectiveBookingStatus, EngineError, FinanceEventMotive,
    ResultEngine, UserBooking, UserRole, ValidationAuthorType, activation_codes,
    bookings::{self, classify_user_bookings, compute_cancellation_limit_date, generate_token},
    collective_bookings, collective_stocks, deposits, offers, stocks,
    stocks::EVENT_DELAY_HOURS,
    users,
    wallet::ExpenseDomain,
};

use super::{
    Engine,
    access::stock_context,
    deposits::{active_deposit, deposit_credit},
    finance::{EventBooking, add_booking_event, cancel_latest_event},
    require, with_tx,
};

const TOKEN_ATTEMPTS: usize = 5;

async fn add_to_booked_quantity(
    db_tx: &DatabaseTransaction,
    stock_id: Uuid,
    delta: i64,
) -> ResultEngine<()> {
    stocks::Entity::update_many()
        .col_expr(
            stocks::Column::DnBookedQuantity,
            Expr::col(stocks::Column::DnBookedQuantity).add(delta),
        )
        .filter(stocks::Column::Id.eq(stock_id))
        .exec(db_tx)
        .await?;
    Ok(())
}

async fn unique_token(db_tx: &DatabaseTransaction) -> ResultEngine<String> {
    for _ in 0..TOKEN_ATTEMPTS {
        let token = generate_token();
        let taken = bookings::Entity::find()
            .filter(bookings::Column::Token.eq(token.as_str()))
            .one(db_tx)
            .await?
            .is_some();
        if !taken {
            return Ok(token);
        }
    }
    Err(EngineError::InvalidState(
        "could not generate a unique booking token".to_string(),
    ))
}

/// Checks a booking can go from `confirmed` to `used`.
fn check_is_usable(booking: &bookings::Model, now: DateTime<Utc>) -> ResultEngine<()> {
    match booking.status()? {
        BookingStatus::Used => return Err(EngineError::AlreadyUsed(booking.id.to_string())),
        BookingStatus::Cancelled => {
            return Err(EngineError::AlreadyCancelled(booking.id.to_string()));
        }
        BookingStatus::Reimbursed => {
            return Err(EngineError::AlreadyReimbursed(booking.id.to_string()));
        }
        BookingStatus::Confirmed => {}
    }
    if booking
        .cancellation_limit_date
        .is_some_and(|limit| limit > now)
    {
        return Err(EngineError::BookingRefused(
            "the booking is not confirmed yet".to_string(),
        ));
    }
    Ok(())
}

/// Sets a booking `used` and records the matching finance event.
pub(super) async fn mark_booking_used(
    db_tx: &DatabaseTransaction,
    booking: &bookings::Model,
    author: ValidationAuthorType,
    motive: FinanceEventMotive,
    now: DateTime<Utc>,
) -> ResultEngine<bookings::Model> {
    let booking = bookings::ActiveModel {
        id: ActiveValue::Set(booking.id),
        status: ActiveValue::Set(BookingStatus::Used.as_str().to_string()),
        date_used: ActiveValue::Set(Some(now)),
        validation_author_type: ActiveValue::Set(Some(author.as_str().to_string())),
        cancellation_date: ActiveValue::Set(None),
        cancellation_reason: ActiveValue::Set(None),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    add_booking_event(db_tx, motive, EventBooking::Individual(&booking), now).await?;
    tracing::info!(booking_id = %booking.id, author = %author, "Booking was marked as used");
    Ok(booking)
}

/// Sets a used booking back to `confirmed`, cancelling its finance event.
pub(super) async fn unmark_booking_used(
    db_tx: &DatabaseTransaction,
    booking: &bookings::Model,
    now: DateTime<Utc>,
) -> ResultEngine<bookings::Model> {
    cancel_latest_event(db_tx, EventBooking::Individual(booking), now).await?;
    add_booking_event(
        db_tx,
        FinanceEventMotive::BookingUnused,
        EventBooking::Individual(booking),
        now,
    )
    .await?;
    let booking = bookings::ActiveModel {
        id: ActiveValue::Set(booking.id),
        status: ActiveValue::Set(BookingStatus::Confirmed.as_str().to_string()),
        date_used: ActiveValue::Set(None),
        validation_author_type: ActiveValue::Set(None),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    tracing::info!(booking_id = %booking.id, "Booking was marked as unused");
    Ok(booking)
}

/// Cancels one booking. `cancel_even_if_used` lets used bookings through.
pub(super) async fn cancel_booking(
    db_tx: &DatabaseTransaction,
    booking: &bookings::Model,
    reason: CancellationReason,
    cancel_even_if_used: bool,
    now: DateTime<Utc>,
) -> ResultEngine<bookings::Model> {
    match booking.status()? {
        BookingStatus::Cancelled => {
            return Err(EngineError::AlreadyCancelled(booking.id.to_string()));
        }
        BookingStatus::Reimbursed => {
            return Err(EngineError::AlreadyReimbursed(booking.id.to_string()));
        }
        BookingStatus::Used if !cancel_even_if_used => {
            return Err(EngineError::AlreadyUsed(booking.id.to_string()));
        }
        BookingStatus::Used | BookingStatus::Confirmed => {}
    }

    let cancelled_event =
        cancel_latest_event(db_tx, EventBooking::Individual(booking), now).await?;

    add_to_booked_quantity(db_tx, booking.stock_id, -booking.quantity).await?;
    let code = activation_codes::Entity::find()
        .filter(activation_codes::Column::BookingId.eq(booking.id))
        .one(db_tx)
        .await?;
    if code.is_some() {
        // The code was handed out: it cannot be sold again.
        stocks::Entity::update_many()
            .col_expr(
                stocks::Column::Quantity,
                Expr::col(stocks::Column::Quantity).sub(1),
            )
            .filter(stocks::Column::Id.eq(booking.stock_id))
            .filter(stocks::Column::Quantity.gt(0))
            .exec(db_tx)
            .await?;
    }

    let cancelled = bookings::ActiveModel {
        id: ActiveValue::Set(booking.id),
        status: ActiveValue::Set(BookingStatus::Cancelled.as_str().to_string()),
        cancellation_date: ActiveValue::Set(Some(now)),
        cancellation_reason: ActiveValue::Set(Some(reason.as_str().to_string())),
        ..Default::default()
    }
    .update(db_tx)
    .await?;

    if cancelled_event.is_some() {
        add_booking_event(
            db_tx,
            FinanceEventMotive::BookingCancelledAfterUse,
            EventBooking::Individual(&cancelled),
            now,
        )
        .await?;
    }
    tracing::info!(booking_id = %booking.id, reason = %reason, "Booking has been cancelled");
    Ok(cancelled)
}

/// Cancels the bookings of a stock, skipping those that cannot be cancelled.
pub(super) async fn cancel_bookings_of_stock(
    db_tx: &DatabaseTransaction,
    stock_id: Uuid,
    reason: CancellationReason,
    cancel_used: bool,
    now: DateTime<Utc>,
) -> ResultEngine<Vec<bookings::Model>> {
    let bookings = bookings::Entity::find()
        .filter(bookings::Column::StockId.eq(stock_id))
        .filter(bookings::Column::Status.is_in([
            BookingStatus::Confirmed.as_str(),
            BookingStatus::Used.as_str(),
        ]))
        .all(db_tx)
        .await?;
    let mut cancelled = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        match cancel_booking(db_tx, booking, reason, cancel_used, now).await {
            Ok(booking) => cancelled.push(booking),
            Err(
                err @ (EngineError::AlreadyUsed(_)
                | EngineError::AlreadyCancelled(_)
                | EngineError::AlreadyReimbursed(_)),
            ) => {
                tracing::info!(booking_id = %booking.id, error = %err, "Booking left as is");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(cancelled)
}

impl Engine {
    /// Books `quantity` places of a stock for a beneficiary.
    pub async fn book_offer(
        &self,
        user_id: Uuid,
        stock_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let user = require::<users::Entity>(&db_tx, user_id, "user").await?;
            let role = user.role()?;
            let context = stock_context(&db_tx, stock_id).await?;

            if role == UserRole::UnderageBeneficiary && context.is_forbidden_to_underage() {
                return Err(EngineError::BookingRefused(
                    "this offer is not bookable by underage beneficiaries".to_string(),
                ));
            }
            if context.stock.price == 0 && !role.is_beneficiary() {
                return Err(EngineError::BookingRefused(
                    "free offers can only be booked by beneficiaries".to_string(),
                ));
            }

            let offer_stock_ids: Vec<Uuid> = stocks::Entity::find()
                .filter(stocks::Column::OfferId.eq(context.offer.id))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|stock| stock.id)
                .collect();
            let already_booked = bookings::Entity::find()
                .filter(bookings::Column::UserId.eq(user_id))
                .filter(bookings::Column::StockId.is_in(offer_stock_ids))
                .filter(bookings::Column::Status.ne(BookingStatus::Cancelled.as_str()))
                .one(&db_tx)
                .await?
                .is_some();
            if already_booked {
                return Err(EngineError::BookingRefused(
                    "the offer has already been booked".to_string(),
                ));
            }

            let max_quantity = if context.offer.is_duo { 2 } else { 1 };
            if !(1..=max_quantity).contains(&quantity) {
                return Err(EngineError::BookingRefused(format!(
                    "invalid quantity {quantity}"
                )));
            }

            if !context.is_bookable(now) {
                return Err(EngineError::BookingRefused(
                    "the stock is not bookable".to_string(),
                ));
            }
            if context
                .stock
                .remaining_quantity()
                .is_some_and(|remaining| remaining < quantity)
            {
                return Err(EngineError::BookingRefused(
                    "not enough places left".to_string(),
                ));
            }

            let total = context.stock.price() * quantity;
            let deposit = active_deposit(&db_tx, user_id, now)
                .await?
                .ok_or_else(|| EngineError::InsufficientFunds("no active deposit".to_string()))?;
            let credit = deposit_credit(&db_tx, &deposit, now).await?;
            credit.check_expense(
                total,
                ExpenseDomain::of(context.subcategory, context.offer.is_digital()),
            )?;

            let has_codes = activation_codes::Entity::find()
                .filter(activation_codes::Column::StockId.eq(stock_id))
                .one(&db_tx)
                .await?
                .is_some();
            let code = if has_codes {
                let available = activation_codes::Entity::find()
                    .filter(activation_codes::Column::StockId.eq(stock_id))
                    .filter(activation_codes::Column::BookingId.is_null())
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .find(|code| code.expiration_date.is_none_or(|date| date > now));
                match available {
                    Some(code) => Some(code),
                    None => {
                        return Err(EngineError::BookingRefused(
                            "no activation code available".to_string(),
                        ));
                    }
                }
            } else {
                None
            };

            let token = unique_token(&db_tx).await?;
            let booking = bookings::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id),
                deposit_id: ActiveValue::Set(Some(deposit.id)),
                stock_id: ActiveValue::Set(stock_id),
                venue_id: ActiveValue::Set(context.venue.id),
                offerer_id: ActiveValue::Set(context.offerer.id),
                quantity: ActiveValue::Set(quantity),
                amount: ActiveValue::Set(context.stock.price),
                token: ActiveValue::Set(token),
                status: ActiveValue::Set(BookingStatus::Confirmed.as_str().to_string()),
                cancellation_reason: ActiveValue::Set(None),
                validation_author_type: ActiveValue::Set(None),
                date_created: ActiveValue::Set(now),
                date_used: ActiveValue::Set(None),
                cancellation_date: ActiveValue::Set(None),
                cancellation_limit_date: ActiveValue::Set(compute_cancellation_limit_date(
                    context.stock.beginning_datetime,
                    now,
                )),
                reimbursement_date: ActiveValue::Set(None),
                display_as_ended: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            add_to_booked_quantity(&db_tx, stock_id, quantity).await?;

            if let Some(code) = &code {
                activation_codes::ActiveModel {
                    id: ActiveValue::Set(code.id),
                    booking_id: ActiveValue::Set(Some(booking.id)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }
            tracing::info!(
                booking_id = %booking.id,
                stock_id = %stock_id,
                quantity,
                "Beneficiary booked an offer"
            );

            if code.is_some() || context.subcategory.is_automatically_used {
                mark_booking_used(
                    &db_tx,
                    &booking,
                    ValidationAuthorType::Auto,
                    FinanceEventMotive::BookingUsed,
                    now,
                )
                .await
            } else {
                Ok(booking)
            }
        })
    }

    pub async fn cancel_booking_by_beneficiary(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = bookings::Entity::find_by_id(booking_id)
                .filter(bookings::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("booking {booking_id}")))?;
            if booking.status()? == BookingStatus::Used {
                return Err(EngineError::AlreadyUsed(booking_id.to_string()));
            }
            let stock = require::<stocks::Entity>(&db_tx, booking.stock_id, "stock").await?;
            if stock.beginning_datetime.is_some()
                && booking
                    .cancellation_limit_date
                    .is_some_and(|limit| limit <= now)
            {
                return Err(EngineError::BookingRefused(
                    "cannot cancel more than 48h after booking and less than 48h before the event"
                        .to_string(),
                ));
            }
            cancel_booking(&db_tx, &booking, CancellationReason::Beneficiary, false, now).await
        })
    }

    pub async fn cancel_booking_by_offerer(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            cancel_booking(&db_tx, &booking, CancellationReason::Offerer, false, now).await
        })
    }

    pub async fn cancel_booking_for_fraud(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            cancel_booking(&db_tx, &booking, CancellationReason::Fraud, false, now).await
        })
    }

    /// Backoffice cancellation, used bookings included.
    pub async fn mark_as_cancelled(
        &self,
        booking_id: Uuid,
        reason: CancellationReason,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            cancel_booking(&db_tx, &booking, reason, true, now).await
        })
    }

    pub async fn mark_as_used(
        &self,
        booking_id: Uuid,
        author: ValidationAuthorType,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            check_is_usable(&booking, now)?;
            mark_booking_used(
                &db_tx,
                &booking,
                author,
                FinanceEventMotive::BookingUsed,
                now,
            )
            .await
        })
    }

    /// Marks a booking used, bringing it back first when it was cancelled.
    pub async fn mark_as_used_with_uncancelling(
        &self,
        booking_id: Uuid,
        author: ValidationAuthorType,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            if let Some(deposit_id) = booking.deposit_id {
                let deposit = require::<deposits::Entity>(&db_tx, deposit_id, "deposit").await?;
                if deposit.is_expired(now) {
                    return Err(EngineError::BookingRefused(
                        "the deposit of the beneficiary has expired".to_string(),
                    ));
                }
            }

            let motive = match booking.status()? {
                BookingStatus::Cancelled => {
                    add_to_booked_quantity(&db_tx, booking.stock_id, booking.quantity).await?;
                    FinanceEventMotive::BookingUsedAfterCancellation
                }
                BookingStatus::Confirmed => FinanceEventMotive::BookingUsed,
                BookingStatus::Used => {
                    return Err(EngineError::AlreadyUsed(booking_id.to_string()));
                }
                BookingStatus::Reimbursed => {
                    return Err(EngineError::AlreadyReimbursed(booking_id.to_string()));
                }
            };
            mark_booking_used(&db_tx, &booking, author, motive, now).await
        })
    }

    pub async fn mark_as_unused(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| {
            let booking = require::<bookings::Entity>(&db_tx, booking_id, "booking").await?;
            match booking.status()? {
                BookingStatus::Used => {}
                BookingStatus::Cancelled => {
                    return Err(EngineError::AlreadyCancelled(booking_id.to_string()));
                }
                BookingStatus::Reimbursed => {
                    return Err(EngineError::AlreadyReimbursed(booking_id.to_string()));
                }
                BookingStatus::Confirmed => {
                    return Err(EngineError::InvalidState(format!(
                        "booking {booking_id} is not used"
                    )));
                }
            }
            let has_code = activation_codes::Entity::find()
                .filter(activation_codes::Column::BookingId.eq(booking_id))
                .one(&db_tx)
                .await?
                .is_some();
            if has_code
                && booking.validation_author_type.as_deref()
                    == Some(ValidationAuthorType::Auto.as_str())
            {
                return Err(EngineError::Forbidden(
                    "a booking with an activation code cannot be marked as unused".to_string(),
                ));
            }
            unmark_booking_used(&db_tx, &booking, now).await
        })
    }

    /// Cancels the unused bookings of things that expired. Returns how many
    /// bookings were cancelled.
    pub async fn cancel_expired_bookings(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        with_tx!(self, |db_tx| {
            let confirmed = bookings::Entity::find()
                .filter(bookings::Column::Status.eq(BookingStatus::Confirmed.as_str()))
                .find_also_related(stocks::Entity)
                .all(&db_tx)
                .await?;
            let offer_ids: Vec<Uuid> = confirmed
                .iter()
                .filter_map(|(_, stock)| stock.as_ref().map(|stock| stock.offer_id))
                .collect();
            let offers_by_id: HashMap<Uuid, offers::Model> = offers::Entity::find()
                .filter(offers::Column::Id.is_in(offer_ids))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|offer| (offer.id, offer))
                .collect();

            let mut cancelled = 0;
            for (booking, stock) in confirmed {
                let Some(stock) = stock else { continue };
                if stock.beginning_datetime.is_some() {
                    continue;
                }
                let Some(offer) = offers_by_id.get(&stock.offer_id) else {
                    continue;
                };
                let Some(delay) = bookings::expiration_delay(offer.subcategory()?) else {
                    continue;
                };
                if booking.date_created + delay < now {
                    cancel_booking(&db_tx, &booking, CancellationReason::Expired, false, now)
                        .await?;
                    cancelled += 1;
                }
            }
            tracing::info!(cancelled, "Cancelled expired bookings");
            Ok(cancelled)
        })
    }

    /// Marks as used the confirmed bookings of events that began more than
    /// 48h ago, individual and collective.
    pub async fn auto_mark_as_used_after_event(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let threshold = now - Duration::hours(EVENT_DELAY_HOURS);
        with_tx!(self, |db_tx| {
            let past_stock_ids: Vec<Uuid> = stocks::Entity::find()
                .filter(stocks::Column::BeginningDatetime.lt(threshold))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|stock| stock.id)
                .collect();
            let individual = bookings::Entity::find()
                .filter(bookings::Column::StockId.is_in(past_stock_ids))
                .filter(bookings::Column::Status.eq(BookingStatus::Confirmed.as_str()))
                .all(&db_tx)
                .await?;
            let mut count = 0;
            for booking in &individual {
                mark_booking_used(
                    &db_tx,
                    booking,
                    ValidationAuthorType::Auto,
                    FinanceEventMotive::BookingUsed,
                    now,
                )
                .await?;
                count += 1;
            }

            let past_collective_stock_ids: Vec<Uuid> = collective_stocks::Entity::find()
                .filter(collective_stocks::Column::BeginningDatetime.lt(threshold))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|stock| stock.id)
                .collect();
            let collective = collective_bookings::Entity::find()
                .filter(collective_bookings::Column::CollectiveStockId.is_in(past_collective_stock_ids))
                .filter(
                    collective_bookings::Column::Status
                        .eq(CollectiveBookingStatus::Confirmed.as_str()),
                )
                .all(&db_tx)
                .await?;
            for booking in &collective {
                let booking = collective_bookings::ActiveModel {
                    id: ActiveValue::Set(booking.id),
                    status: ActiveValue::Set(CollectiveBookingStatus::Used.as_str().to_string()),
                    date_used: ActiveValue::Set(Some(now)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
                add_booking_event(
                    &db_tx,
                    FinanceEventMotive::BookingUsed,
                    EventBooking::Collective(&booking),
                    now,
                )
                .await?;
                count += 1;
            }
            tracing::info!(count, "Automatically marked bookings as used after event");
            Ok(count)
        })
    }

    /// Recomputes `dn_booked_quantity` from the non-cancelled bookings.
    pub async fn recompute_dn_booked_quantity(&self, stock_ids: &[Uuid]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            for stock_id in stock_ids {
                let booked: i64 = bookings::Entity::find()
                    .filter(bookings::Column::StockId.eq(*stock_id))
                    .filter(bookings::Column::Status.ne(BookingStatus::Cancelled.as_str()))
                    .all(&db_tx)
                    .await?
                    .iter()
                    .map(|booking| booking.quantity)
                    .sum();
                stocks::ActiveModel {
                    id: ActiveValue::Set(*stock_id),
                    dn_booked_quantity: ActiveValue::Set(booked),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }
            Ok(())
        })
    }

    /// Bookings of a beneficiary, split into `(ended, ongoing)`.
    pub async fn user_bookings(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<(Vec<UserBooking>, Vec<UserBooking>)> {
        with_tx!(self, |db_tx| {
            require::<users::Entity>(&db_tx, user_id, "user").await?;
            let rows = bookings::Entity::find()
                .filter(bookings::Column::UserId.eq(user_id))
                .order_by_desc(bookings::Column::DateCreated)
                .find_also_related(stocks::Entity)
                .all(&db_tx)
                .await?;
            let offer_ids: Vec<Uuid> = rows
                .iter()
                .filter_map(|(_, stock)| stock.as_ref().map(|stock| stock.offer_id))
                .collect();
            let offers_by_id: HashMap<Uuid, offers::Model> = offers::Entity::find()
                .filter(offers::Column::Id.is_in(offer_ids))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|offer| (offer.id, offer))
                .collect();
            let booking_ids: Vec<Uuid> = rows.iter().map(|(booking, _)| booking.id).collect();
            let codes: HashMap<Uuid, String> = activation_codes::Entity::find()
                .filter(activation_codes::Column::BookingId.is_in(booking_ids))
                .all(&db_tx)
                .await?
                .into_iter()
                .filter_map(|code| code.booking_id.map(|id| (id, code.code)))
                .collect();

            let mut user_bookings = Vec::with_capacity(rows.len());
            for (booking, stock) in rows {
                let stock = stock.ok_or_else(|| {
                    EngineError::KeyNotFound(format!("stock {}", booking.stock_id))
                })?;
                let offer = offers_by_id
                    .get(&stock.offer_id)
                    .ok_or_else(|| EngineError::KeyNotFound(format!("offer {}", stock.offer_id)))?;
                user_bookings.push(UserBooking {
                    activation_code: codes.get(&booking.id).cloned(),
                    booking,
                    offer_id: offer.id,
                    offer_name: offer.name.clone(),
                    subcategory: offer.subcategory()?,
                    beginning_datetime: stock.beginning_datetime,
                });
            }
            Ok(classify_user_bookings(user_bookings, now))
        })
    }

    pub async fn booking(&self, booking_id: Uuid) -> ResultEngine<bookings::Model> {
        with_tx!(self, |db_tx| require::<bookings::Entity>(&db_tx, booking_id, "booking").await)
    }

    /// Finds a booking by the token shown at the counter.
    pub async fn booking_by_token(&self, token: &str) -> ResultEngine<bookings::Model> {
        let token = token.trim().to_uppercase();
        with_tx!(self, |db_tx| {
            bookings::Entity::find()
                .filter(bookings::Column::Token.eq(token.as_str()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("booking token {token}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn booking(status: BookingStatus, limit: Option<DateTime<Utc>>) -> bookings::Model {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        bookings::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            deposit_id: None,
            stock_id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            offerer_id: Uuid::new_v4(),
            quantity: 1,
            amount: 1_000,
            token: "ABC123".to_string(),
            status: status.as_str().to_string(),
            cancellation_reason: None,
            validation_author_type: None,
            date_created: created,
            date_used: None,
            cancellation_date: None,
            cancellation_limit_date: limit,
            reimbursement_date: None,
            display_as_ended: None,
        }
    }

    #[test]
    fn usable_only_when_confirmed_and_past_limit() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert!(check_is_usable(&booking(BookingStatus::Confirmed, None), now).is_ok());
        assert!(
            check_is_usable(
                &booking(BookingStatus::Confirmed, Some(now - Duration::hours(1))),
                now
            )
            .is_ok()
        );
        assert!(matches!(
            check_is_usable(
                &booking(BookingStatus::Confirmed, Some(now + Duration::hours(1))),
                now
            ),
            Err(EngineError::BookingRefused(_))
        ));
        assert!(matches!(
            check_is_usable(&booking(BookingStatus::Used, None), now),
            Err(EngineError::AlreadyUsed(_))
        ));
        assert!(matches!(
            check_is_usable(&booking(BookingStatus::Cancelled, None), now),
            Err(EngineError::AlreadyCancelled(_))
        ));
        assert!(matches!(
            check_is_usable(&booking(BookingStatus::Reimbursed, None), now),
            Err(EngineError::AlreadyReimbursed(_))
        ));
    }
}
