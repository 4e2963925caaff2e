use chrono::Duration;

use engine::{
    BookingStatus, CancellationReason, EngineError, MoneyCents, NewOffer, NewStock, NewUser,
    OfferValidation, OffererScope, StockEdit, UserRole, ValidationType,
};

mod common;
use common::{fixture, t0};

fn new_offer(venue_id: uuid::Uuid, subcategory: &str) -> NewOffer {
    NewOffer {
        venue_id,
        name: "Le Petit Prince".to_string(),
        subcategory_id: subcategory.to_string(),
        is_duo: false,
        url: None,
    }
}

#[tokio::test]
async fn offers_go_from_draft_to_approved() {
    let fx = fixture().await;
    let offer = fx
        .engine
        .create_offer(new_offer(fx.venue.id, "LIVRE_PAPIER"), t0())
        .await
        .unwrap();
    assert_eq!(offer.validation().unwrap(), OfferValidation::Draft);
    assert_eq!(offer.date_created, t0());

    let err = fx
        .engine
        .validate_offers(&[offer.id], fx.admin.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let offer = fx.engine.publish_offer(offer.id).await.unwrap();
    assert_eq!(offer.validation().unwrap(), OfferValidation::Pending);
    let err = fx.engine.publish_offer(offer.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = fx
        .engine
        .validate_offers(&[offer.id], fx.beneficiary.id, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let approved = fx
        .engine
        .validate_offers(&[offer.id], fx.admin.id, t0())
        .await
        .unwrap();
    assert_eq!(approved[0].validation().unwrap(), OfferValidation::Approved);
    assert_eq!(approved[0].last_validation_date, Some(t0()));
    assert_eq!(
        approved[0].last_validation_type.as_deref(),
        Some(ValidationType::Manual.as_str())
    );
}

#[tokio::test]
async fn unknown_subcategories_and_bad_duos_are_refused() {
    let fx = fixture().await;
    let err = fx
        .engine
        .create_offer(new_offer(fx.venue.id, "PAS_UNE_CATEGORIE"), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let err = fx
        .engine
        .create_offer(
            NewOffer {
                is_duo: true,
                ..new_offer(fx.venue.id, "LIVRE_PAPIER")
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn digital_and_physical_offers_need_the_matching_venue() {
    let fx = fixture().await;
    let err = fx
        .engine
        .create_offer(
            NewOffer {
                url: Some("https://lecture.example.com".to_string()),
                ..new_offer(fx.venue.id, "LIVRE_NUMERIQUE")
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let digital = fx.approved_digital_offer("LIVRE_NUMERIQUE").await;
    let err = fx
        .engine
        .create_offer(new_offer(digital.venue_id, "LIVRE_PAPIER"), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn stock_creation_checks_price_and_dates() {
    let fx = fixture().await;
    let book = fx.approved_offer("LIVRE_PAPIER", false).await;
    let concert = fx.approved_offer("CONCERT", false).await;

    let err = fx
        .engine
        .create_stock(
            book.id,
            NewStock {
                price: MoneyCents::from_euros(301),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = fx
        .engine
        .create_stock(
            book.id,
            NewStock {
                price: MoneyCents::from_euros(10),
                beginning_datetime: Some(t0() + Duration::days(3)),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = fx
        .engine
        .create_stock(
            concert.id,
            NewStock {
                price: MoneyCents::from_euros(10),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let beginning = t0() + Duration::days(3);
    let stock = fx
        .engine
        .create_stock(
            concert.id,
            NewStock {
                price: MoneyCents::from_euros(10),
                quantity: Some(100),
                beginning_datetime: Some(beginning),
                booking_limit_datetime: None,
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(stock.booking_limit_datetime, Some(beginning));
    assert_eq!(stock.date_created, t0());
}

#[tokio::test]
async fn stock_quantity_cannot_drop_below_booked_places() {
    let fx = fixture().await;
    let stock = fx.book_stock(1000, Some(5)).await;
    fx.engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .edit_stock(
            stock.id,
            StockEdit {
                quantity: Some(Some(0)),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let edited = fx
        .engine
        .edit_stock(
            stock.id,
            StockEdit {
                quantity: Some(Some(1)),
                price: Some(MoneyCents::from_euros(8)),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap();
    assert_eq!(edited.quantity, Some(1));
    assert_eq!(edited.price(), MoneyCents::from_euros(8));
}

#[tokio::test]
async fn moving_an_event_moves_the_cancellation_limits() {
    let fx = fixture().await;
    let stock = fx
        .event_stock(2000, t0() + Duration::days(10), false)
        .await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();
    assert_eq!(
        booking.cancellation_limit_date,
        Some(t0() + Duration::hours(48))
    );

    let now = t0() + Duration::days(1);
    let new_beginning = now + Duration::hours(20);
    fx.engine
        .edit_stock(
            stock.id,
            StockEdit {
                beginning_datetime: Some(new_beginning),
                booking_limit_datetime: Some(Some(new_beginning)),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
    let booking = fx.engine.booking(booking.id).await.unwrap();
    assert_eq!(booking.cancellation_limit_date, Some(new_beginning));
}

#[tokio::test]
async fn deleting_a_stock_cancels_its_bookings() {
    let fx = fixture().await;
    let stock = fx.book_stock(1000, Some(5)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let cancelled = fx
        .engine
        .delete_stock(stock.id, t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, booking.id);
    assert_eq!(cancelled[0].status().unwrap(), BookingStatus::Cancelled);
    assert_eq!(
        cancelled[0].cancellation_reason().unwrap(),
        Some(CancellationReason::Offerer)
    );
    assert!(fx.engine.stock(stock.id).await.unwrap().is_soft_deleted);

    let err = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingRefused(_)));
}

#[tokio::test]
async fn rejecting_an_offer_cancels_its_bookings_for_fraud() {
    let fx = fixture().await;
    let stock = fx.book_stock(1000, Some(5)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let rejected = fx
        .engine
        .reject_offers(&[stock.offer_id], fx.admin.id, t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(rejected[0].validation().unwrap(), OfferValidation::Rejected);
    assert!(!rejected[0].is_active);

    let booking = fx.engine.booking(booking.id).await.unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Cancelled);
    assert_eq!(
        booking.cancellation_reason().unwrap(),
        Some(CancellationReason::Fraud)
    );
    assert_eq!(
        fx.engine.wallet_balance(fx.beneficiary.id, t0()).await.unwrap(),
        MoneyCents::from_euros(300)
    );

    let err = fx
        .engine
        .create_stock(
            stock.offer_id,
            NewStock {
                price: MoneyCents::from_euros(5),
                ..Default::default()
            },
            t0(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn pros_act_only_for_their_offerer() {
    let fx = fixture().await;
    let pro = fx
        .engine
        .create_user(NewUser {
            email: "pro@librairie.example.com".to_string(),
            password: "secret".to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            role: UserRole::Pro,
        })
        .await
        .unwrap();
    let stock = fx.book_stock(1000, Some(5)).await;
    let booking = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .check_offerer_access(pro.id, OffererScope::Booking(booking.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let attachment = fx
        .engine
        .attach_user_to_offerer(pro.id, fx.offerer.id)
        .await
        .unwrap();
    let again = fx
        .engine
        .attach_user_to_offerer(pro.id, fx.offerer.id)
        .await
        .unwrap();
    assert_eq!(attachment.id, again.id);

    for scope in [
        OffererScope::Offerer(fx.offerer.id),
        OffererScope::Venue(fx.venue.id),
        OffererScope::Offer(stock.offer_id),
        OffererScope::Stock(stock.id),
        OffererScope::Booking(booking.id),
    ] {
        let offerer_id = fx.engine.check_offerer_access(pro.id, scope).await.unwrap();
        assert_eq!(offerer_id, fx.offerer.id);
    }

    let other = fx.engine.create_offerer("Cinéma Utopia", true).await.unwrap();
    let err = fx
        .engine
        .check_offerer_access(pro.id, OffererScope::Offerer(other.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    fx.engine
        .check_offerer_access(fx.admin.id, OffererScope::Offerer(other.id))
        .await
        .unwrap();

    let err = fx
        .engine
        .check_offerer_access(fx.beneficiary.id, OffererScope::Booking(booking.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = fx
        .engine
        .attach_user_to_offerer(fx.beneficiary.id, fx.offerer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}
