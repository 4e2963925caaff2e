use chrono::Duration;

use engine::{
    BookingStatus, CancellationReason, EngineError, FinanceEventMotive, FinanceEventStatus,
    MoneyCents, ValidationAuthorType,
};

mod common;
use common::{fixture, new_beneficiary, t0};

#[tokio::test]
async fn booking_spends_credit_and_holds_a_place() {
    let fx = fixture().await;
    let stock = fx.book_stock(1250, Some(10)).await;

    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    assert_eq!(booking.status().unwrap(), BookingStatus::Confirmed);
    assert_eq!(booking.token.len(), 6);
    assert_eq!(booking.cancellation_limit_date, None);
    assert_eq!(fx.engine.stock(stock.id).await.unwrap().dn_booked_quantity, 1);
    assert_eq!(
        fx.engine.wallet_balance(fx.beneficiary.id, t0()).await.unwrap(),
        MoneyCents::new(30_000 - 1250)
    );
    let found = fx.engine.booking_by_token(&booking.token.to_lowercase()).await.unwrap();
    assert_eq!(found.id, booking.id);
}

#[tokio::test]
async fn same_offer_cannot_be_booked_twice() {
    let fx = fixture().await;
    let stock = fx.book_stock(1000, None).await;
    fx.engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));
}

#[tokio::test]
async fn duo_quantity_needs_a_duo_offer() {
    let fx = fixture().await;
    let solo = fx.event_stock(2000, t0() + Duration::days(10), false).await;
    let err = fx
        .engine
        .book_offer(fx.beneficiary.id, solo.id, 2, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));

    let duo = fx.event_stock(2000, t0() + Duration::days(10), true).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, duo.id, 2, t0())
        .await
        .unwrap();
    assert_eq!(booking.total_amount(), MoneyCents::new(4000));
    assert_eq!(fx.engine.stock(duo.id).await.unwrap().dn_booked_quantity, 2);
}

#[tokio::test]
async fn booking_beyond_remaining_credit_is_refused() {
    let fx = fixture().await;
    let expensive = fx.book_stock(25_000, None).await;
    let other = fx.book_stock(6_000, None).await;
    fx.engine
        .book_offer(fx.beneficiary.id, expensive.id, 1, t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .book_offer(fx.beneficiary.id, other.id, 1, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.engine.stock(other.id).await.unwrap().dn_booked_quantity, 0);
}

#[tokio::test]
async fn sold_out_stock_is_not_bookable() {
    let fx = fixture().await;
    let stock = fx.book_stock(500, Some(1)).await;
    fx.engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let other = new_beneficiary(&fx.engine, "other@example.com").await;
    let err = fx
        .engine
        .book_offer(other.id, stock.id, 1, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));
}

#[tokio::test]
async fn beneficiary_cancellation_gives_credit_back() {
    let fx = fixture().await;
    let stock = fx.book_stock(1500, Some(3)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let cancelled = fx
        .engine
        .cancel_booking_by_beneficiary(fx.beneficiary.id, booking.id, t0() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(cancelled.status().unwrap(), BookingStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason().unwrap(),
        Some(CancellationReason::Beneficiary)
    );
    assert_eq!(fx.engine.stock(stock.id).await.unwrap().dn_booked_quantity, 0);
    assert_eq!(
        fx.engine.wallet_balance(fx.beneficiary.id, t0()).await.unwrap(),
        MoneyCents::from_euros(300)
    );

    let again = fx
        .engine
        .cancel_booking_by_offerer(booking.id, t0() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(again, EngineError::AlreadyCancelled(_)));
}

#[tokio::test]
async fn event_booking_has_a_cancellation_window() {
    let fx = fixture().await;
    let stock = fx.event_stock(2000, t0() + Duration::days(10), false).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();
    assert_eq!(
        booking.cancellation_limit_date,
        Some(t0() + Duration::hours(48))
    );

    let early_use = fx
        .engine
        .mark_as_used(booking.id, ValidationAuthorType::Offerer, t0() + Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(early_use, EngineError::BookingRefused(_)));

    let late_cancel = fx
        .engine
        .cancel_booking_by_beneficiary(fx.beneficiary.id, booking.id, t0() + Duration::days(3))
        .await
        .unwrap_err();
    assert!(matches!(late_cancel, EngineError::BookingRefused(_)));

    let used = fx
        .engine
        .mark_as_used(booking.id, ValidationAuthorType::Offerer, t0() + Duration::days(3))
        .await
        .unwrap();
    assert_eq!(used.status().unwrap(), BookingStatus::Used);
}

#[tokio::test]
async fn cancellation_window_closes_at_the_limit() {
    let fx = fixture().await;
    let stock = fx.event_stock(2000, t0() + Duration::days(10), false).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();
    let limit = booking.cancellation_limit_date.unwrap();

    let err = fx
        .engine
        .cancel_booking_by_beneficiary(fx.beneficiary.id, booking.id, limit)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));

    let cancelled = fx
        .engine
        .cancel_booking_by_beneficiary(
            fx.beneficiary.id,
            booking.id,
            limit - Duration::seconds(1),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status().unwrap(), BookingStatus::Cancelled);
}

#[tokio::test]
async fn used_then_unused_booking_cancels_its_finance_event() {
    let fx = fixture().await;
    let booking = fx
        .used_book_booking(fx.beneficiary.id, 1000, t0() + Duration::hours(1))
        .await;
    assert_eq!(booking.date_used, Some(t0() + Duration::hours(1)));

    let events = fx.engine.booking_finance_events(booking.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].motive().unwrap(), FinanceEventMotive::BookingUsed);
    assert_eq!(events[0].status().unwrap(), FinanceEventStatus::Ready);
    assert_eq!(events[0].pricing_point_id, Some(fx.venue.id));

    let unused = fx
        .engine
        .mark_as_unused(booking.id, t0() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(unused.status().unwrap(), BookingStatus::Confirmed);
    assert_eq!(unused.date_used, None);

    let events = fx.engine.booking_finance_events(booking.id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status().unwrap(), FinanceEventStatus::Cancelled);
    assert_eq!(events[1].motive().unwrap(), FinanceEventMotive::BookingUnused);
    assert_eq!(events[1].status().unwrap(), FinanceEventStatus::NotToBePriced);

    let err = fx
        .engine
        .mark_as_unused(booking.id, t0() + Duration::hours(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn uncancelling_marks_the_booking_used_again() {
    let fx = fixture().await;
    let stock = fx.book_stock(800, Some(5)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();
    fx.engine
        .mark_as_cancelled(booking.id, CancellationReason::Backoffice, t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(fx.engine.stock(stock.id).await.unwrap().dn_booked_quantity, 0);

    let used = fx
        .engine
        .mark_as_used_with_uncancelling(
            booking.id,
            ValidationAuthorType::Backoffice,
            t0() + Duration::hours(2),
        )
        .await
        .unwrap();
    assert_eq!(used.status().unwrap(), BookingStatus::Used);
    assert_eq!(used.cancellation_reason, None);
    assert_eq!(fx.engine.stock(stock.id).await.unwrap().dn_booked_quantity, 1);

    let events = fx.engine.booking_finance_events(booking.id).await.unwrap();
    assert_eq!(
        events.last().unwrap().motive().unwrap(),
        FinanceEventMotive::BookingUsedAfterCancellation
    );
}

#[tokio::test]
async fn unused_thing_bookings_expire() {
    let fx = fixture().await;
    let book = fx.book_stock(700, Some(5)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, book.id, 1, t0())
        .await
        .unwrap();

    assert_eq!(
        fx.engine
            .cancel_expired_bookings(t0() + Duration::days(9))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        fx.engine
            .cancel_expired_bookings(t0() + Duration::days(11))
            .await
            .unwrap(),
        1
    );

    let booking = fx.engine.booking(booking.id).await.unwrap();
    assert_eq!(
        booking.cancellation_reason().unwrap(),
        Some(CancellationReason::Expired)
    );
    assert_eq!(fx.engine.stock(book.id).await.unwrap().dn_booked_quantity, 0);
}

#[tokio::test]
async fn past_event_bookings_are_used_automatically() {
    let fx = fixture().await;
    let stock = fx.event_stock(1800, t0() + Duration::days(5), false).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    assert_eq!(
        fx.engine
            .auto_mark_as_used_after_event(t0() + Duration::days(6))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        fx.engine
            .auto_mark_as_used_after_event(t0() + Duration::days(8))
            .await
            .unwrap(),
        1
    );

    let booking = fx.engine.booking(booking.id).await.unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Used);
    assert_eq!(
        booking.validation_author_type.as_deref(),
        Some(ValidationAuthorType::Auto.as_str())
    );
}

#[tokio::test]
async fn beneficiary_bookings_are_split_into_ended_and_ongoing() {
    let fx = fixture().await;
    let ongoing_stock = fx.book_stock(500, None).await;
    fx.engine
        .book_offer(fx.beneficiary.id, ongoing_stock.id, 1, t0())
        .await
        .unwrap();
    let used = fx
        .used_book_booking(fx.beneficiary.id, 600, t0() + Duration::hours(1))
        .await;

    let (ended, ongoing) = fx
        .engine
        .user_bookings(fx.beneficiary.id, t0() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].booking.id, used.id);
    assert_eq!(ongoing.len(), 1);
    assert_eq!(ongoing[0].booking.stock_id, ongoing_stock.id);
    assert_eq!(
        ongoing[0].expiration_date(),
        Some(t0() + Duration::days(10))
    );
}

#[tokio::test]
async fn activation_code_bookings_are_used_right_away() {
    let fx = fixture().await;
    let offer = fx.approved_digital_offer("LIVRE_NUMERIQUE").await;
    let stock = fx
        .engine
        .create_stock(
            offer.id,
            engine::NewStock {
                price: MoneyCents::new(3000),
                quantity: Some(2),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    fx.engine
        .add_activation_codes(stock.id, &["CODE-1".to_string(), "CODE-2".to_string()], None)
        .await
        .unwrap();

    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Used);

    let err = fx
        .engine
        .mark_as_unused(booking.id, t0() + Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}
