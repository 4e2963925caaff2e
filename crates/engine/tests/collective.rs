use chrono::{DateTime, Duration, Utc};
use sea_orm::EntityTrait;

use engine::{
    CancellationReason, CollectiveBookingStatus, CollectiveOfferSearch, CollectiveOfferStatus,
    EngineError, MoneyCents, NewCollectiveOffer, NewCollectiveStock, OfferValidation,
    collective_bookings, collective_offers, collective_stocks,
};

mod common;
use common::{Fixture, fixture, t0};

fn beginning() -> DateTime<Utc> {
    t0() + Duration::days(5)
}

async fn pending_offer(fx: &Fixture, name: &str, formats: &[&str]) -> collective_offers::Model {
    fx.engine
        .create_collective_offer(
            NewCollectiveOffer {
                venue_id: fx.venue.id,
                name: name.to_string(),
                formats: formats.iter().map(|format| format.to_string()).collect(),
                institution: None,
            },
            t0(),
        )
        .await
        .unwrap()
}

/// An approved collective offer with a 500€ stock beginning at `beginning()`.
async fn bookable_offer(
    fx: &Fixture,
    name: &str,
) -> (collective_offers::Model, collective_stocks::Model) {
    let offer = pending_offer(fx, name, &["Atelier de pratique"]).await;
    let offer = fx
        .engine
        .validate_collective_offers(&[offer.id], fx.admin.id, t0())
        .await
        .unwrap()
        .remove(0);
    let stock = fx
        .engine
        .create_collective_stock(
            offer.id,
            NewCollectiveStock {
                price: MoneyCents::from_euros(500),
                number_of_tickets: 30,
                beginning_datetime: beginning(),
                booking_limit_datetime: None,
            },
            t0(),
        )
        .await
        .unwrap();
    (offer, stock)
}

async fn confirmed_booking(
    fx: &Fixture,
    stock: &collective_stocks::Model,
) -> collective_bookings::Model {
    let booking = fx
        .engine
        .book_collective_offer(stock.id, "Collège Jean Moulin", t0())
        .await
        .unwrap();
    fx.engine
        .confirm_collective_booking(booking.id, t0() + Duration::hours(1))
        .await
        .unwrap()
}

async fn reload(fx: &Fixture, booking_id: uuid::Uuid) -> collective_bookings::Model {
    collective_bookings::Entity::find_by_id(booking_id)
        .one(&fx.db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn collective_offers_wait_for_moderation() {
    let fx = fixture().await;
    let offer = pending_offer(&fx, "Atelier théâtre", &["Atelier de pratique"]).await;
    assert_eq!(offer.validation().unwrap(), OfferValidation::Pending);
    assert!(!offer.is_active);
    assert_eq!(offer.date_created, t0());
    assert_eq!(
        fx.engine.collective_offer_status(offer.id, t0()).await.unwrap(),
        CollectiveOfferStatus::Pending
    );

    let err = fx
        .engine
        .validate_collective_offers(&[offer.id], fx.beneficiary.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let rejected = fx
        .engine
        .reject_collective_offers(&[offer.id], fx.admin.id, t0())
        .await
        .unwrap();
    assert_eq!(rejected[0].validation().unwrap(), OfferValidation::Rejected);
    assert_eq!(rejected[0].last_validation_author_id, Some(fx.admin.id));

    let err = fx
        .engine
        .validate_collective_offers(&[offer.id], fx.admin.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn collective_offer_status_follows_its_booking() {
    let fx = fixture().await;
    let (offer, stock) = bookable_offer(&fx, "Atelier théâtre").await;
    assert_eq!(
        fx.engine.collective_offer_status(offer.id, t0()).await.unwrap(),
        CollectiveOfferStatus::Active
    );

    let err = fx
        .engine
        .create_collective_stock(
            offer.id,
            NewCollectiveStock {
                price: MoneyCents::from_euros(100),
                number_of_tickets: 10,
                beginning_datetime: beginning(),
                booking_limit_datetime: None,
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let booking = confirmed_booking(&fx, &stock).await;
    assert_eq!(booking.status().unwrap(), CollectiveBookingStatus::Confirmed);
    assert_eq!(
        fx.engine.collective_offer_status(offer.id, t0()).await.unwrap(),
        CollectiveOfferStatus::SoldOut
    );

    let err = fx
        .engine
        .book_collective_offer(stock.id, "Lycée Victor Hugo", t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));

    let cancelled = fx
        .engine
        .cancel_collective_booking(booking.id, CancellationReason::Offerer, t0() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(cancelled.status().unwrap(), CollectiveBookingStatus::Cancelled);
    assert_eq!(
        fx.engine.collective_offer_status(offer.id, t0()).await.unwrap(),
        CollectiveOfferStatus::Active
    );
    let err = fx
        .engine
        .cancel_collective_booking(booking.id, CancellationReason::Offerer, t0() + Duration::hours(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCancelled(_)));

    assert_eq!(
        fx.engine
            .collective_offer_status(offer.id, beginning() + Duration::hours(1))
            .await
            .unwrap(),
        CollectiveOfferStatus::Expired
    );
    let err = fx
        .engine
        .book_collective_offer(stock.id, "Lycée Victor Hugo", beginning() + Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));
}

#[tokio::test]
async fn collective_bookings_are_used_priced_and_reimbursed() {
    let fx = fixture().await;
    let (_, stock) = bookable_offer(&fx, "Atelier théâtre").await;
    let booking = confirmed_booking(&fx, &stock).await;

    let used_at = beginning() + Duration::days(3);
    assert_eq!(fx.engine.auto_mark_as_used_after_event(used_at).await.unwrap(), 1);
    let used = reload(&fx, booking.id).await;
    assert_eq!(used.status().unwrap(), CollectiveBookingStatus::Used);
    assert_eq!(used.date_used, Some(used_at));

    let summary = fx
        .engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(summary.priced, 1);

    let now = used_at + Duration::days(1);
    let generation = fx.engine.generate_cashflows(now, now).await.unwrap();
    assert_eq!(generation.cashflows.len(), 1);
    assert_eq!(generation.cashflows[0].amount, -50_000);
    fx.engine
        .generate_invoices(generation.batch.id, now)
        .await
        .unwrap();

    let reimbursed = reload(&fx, booking.id).await;
    assert_eq!(reimbursed.status().unwrap(), CollectiveBookingStatus::Reimbursed);
    assert_eq!(reimbursed.reimbursement_date, Some(now));

    let err = fx
        .engine
        .cancel_collective_booking(booking.id, CancellationReason::Offerer, now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyReimbursed(_)));

    let incident = fx
        .engine
        .create_collective_overpayment_incident(booking.id, fx.admin.id, "sortie annulée", now)
        .await
        .unwrap();
    assert_eq!(incident.venue_id, fx.venue.id);
    let err = fx
        .engine
        .create_collective_overpayment_incident(booking.id, fx.admin.id, "doublon", now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn booked_collective_price_can_only_go_down() {
    let fx = fixture().await;
    let (offer, stock) = bookable_offer(&fx, "Atelier théâtre").await;
    let booking = confirmed_booking(&fx, &stock).await;

    let err = fx
        .engine
        .edit_collective_offer_price(offer.id, MoneyCents::from_euros(600), 30, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let used_at = beginning() + Duration::days(3);
    fx.engine.auto_mark_as_used_after_event(used_at).await.unwrap();
    let edited = fx
        .engine
        .edit_collective_offer_price(offer.id, MoneyCents::from_euros(400), 25, used_at)
        .await
        .unwrap();
    assert_eq!(edited.price(), MoneyCents::from_euros(400));
    assert_eq!(edited.number_of_tickets, 25);

    fx.engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();
    let now = used_at + Duration::days(1);
    let generation = fx.engine.generate_cashflows(now, now).await.unwrap();
    assert_eq!(generation.cashflows[0].amount, -40_000);
    assert_eq!(
        reload(&fx, booking.id).await.status().unwrap(),
        CollectiveBookingStatus::Used
    );

    let err = fx
        .engine
        .edit_collective_offer_price(offer.id, MoneyCents::from_euros(300), 25, now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn collective_search_filters_and_truncates() {
    let fx = fixture().await;
    let (theatre, _) = bookable_offer(&fx, "Atelier théâtre").await;
    let (museum, _) = bookable_offer(&fx, "Visite du musée").await;
    let pending = pending_offer(&fx, "Atelier d'écriture", &["Rencontre"]).await;

    let (rows, truncated) = fx
        .engine
        .search_collective_offers(
            &CollectiveOfferSearch {
                name: Some("THEATRE".to_string()),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert!(!truncated);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].offer.id, theatre.id);
    assert_eq!(rows[0].status, CollectiveOfferStatus::Active);

    let (rows, _) = fx
        .engine
        .search_collective_offers(
            &CollectiveOfferSearch {
                statuses: vec![CollectiveOfferStatus::Pending],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].offer.id, pending.id);
    assert!(rows[0].stock.is_none());

    let (rows, _) = fx
        .engine
        .search_collective_offers(
            &CollectiveOfferSearch {
                formats: vec!["Rencontre".to_string()],
                department_codes: vec!["75".to_string()],
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].offer.id, pending.id);

    let (rows, _) = fx
        .engine
        .search_collective_offers(
            &CollectiveOfferSearch {
                price_max: Some(MoneyCents::from_euros(500)),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    let mut ids: Vec<_> = rows.iter().map(|row| row.offer.id).collect();
    ids.sort();
    let mut expected = vec![theatre.id, museum.id];
    expected.sort();
    assert_eq!(ids, expected);

    let (rows, truncated) = fx
        .engine
        .search_collective_offers(
            &CollectiveOfferSearch {
                limit: 2,
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(truncated);
}
