use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{
    DepositEligibility, Engine, MoneyCents, NewOffer, NewStock, NewUser, NewVenue, UserRole,
    stocks,
};
use migration::MigratorTrait;
use server::{ServerState, router};

const PASSWORD: &str = "motdepasse";

struct TestApp {
    app: Router,
    engine: Arc<Engine>,
    stock: stocks::Model,
    venue_id: uuid::Uuid,
}

async fn create_user(engine: &Engine, email: &str, role: UserRole) -> engine::users::Model {
    engine
        .create_user(NewUser {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            role,
        })
        .await
        .unwrap()
}

async fn test_app() -> TestApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(Engine::builder().database(db).build().await.unwrap());

    let now = Utc::now();
    let admin = create_user(&engine, "admin@example.com", UserRole::Admin).await;
    let pro = create_user(&engine, "pro@example.com", UserRole::Pro).await;
    let other_pro = create_user(&engine, "pro@cinema.example.com", UserRole::Pro).await;
    let beneficiary = create_user(&engine, "jeune@example.com", UserRole::None).await;
    engine
        .create_deposit(beneficiary.id, "identity check", DepositEligibility::Age18, None, now)
        .await
        .unwrap();

    let offerer = engine.create_offerer("Librairie Mollat", true).await.unwrap();
    engine.attach_user_to_offerer(pro.id, offerer.id).await.unwrap();
    let other_offerer = engine.create_offerer("Cinéma Utopia", true).await.unwrap();
    engine
        .attach_user_to_offerer(other_pro.id, other_offerer.id)
        .await
        .unwrap();
    let venue = engine
        .create_venue(NewVenue {
            offerer_id: offerer.id,
            name: "Librairie Mollat - Bordeaux".to_string(),
            is_virtual: false,
            booking_email: None,
            department_code: Some("33".to_string()),
            is_validated: true,
        })
        .await
        .unwrap();
    let offer = engine
        .create_offer(
            NewOffer {
                venue_id: venue.id,
                name: "Roman graphique".to_string(),
                subcategory_id: "LIVRE_PAPIER".to_string(),
                is_duo: false,
                url: None,
            },
            now,
        )
        .await
        .unwrap();
    engine.publish_offer(offer.id).await.unwrap();
    engine
        .validate_offers(&[offer.id], admin.id, now)
        .await
        .unwrap();
    let stock = engine
        .create_stock(
            offer.id,
            NewStock {
                price: MoneyCents::from_euros(12),
                quantity: Some(3),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

    let app = router(ServerState {
        engine: engine.clone(),
    });
    TestApp {
        app,
        engine,
        stock,
        venue_id: venue.id,
    }
}

fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(email) = auth {
        request = request.header(header::AUTHORIZATION, basic(email, PASSWORD));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn requests_need_valid_credentials() {
    let test = test_app().await;
    let (status, _) = send(&test.app, Method::GET, "/wallet", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/wallet")
        .header(header::AUTHORIZATION, basic("jeune@example.com", "mauvais"))
        .body(Body::empty())
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn routes_are_restricted_by_role() {
    let test = test_app().await;
    let (status, body) = send(
        &test.app,
        Method::POST,
        "/backoffice/offers/validate",
        Some("jeune@example.com"),
        Some(json!({ "ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let offer = json!({
        "venue_id": test.venue_id,
        "name": "Roman du mois",
        "subcategory_id": "LIVRE_PAPIER",
    });
    let (status, _) = send(
        &test.app,
        Method::POST,
        "/pro/offers",
        Some("jeune@example.com"),
        Some(offer.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &test.app,
        Method::POST,
        "/pro/offers",
        Some("pro@example.com"),
        Some(offer),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["validation"], "draft");
}

#[tokio::test]
async fn beneficiary_books_and_cancels() {
    let test = test_app().await;
    let (status, wallet) = send(
        &test.app,
        Method::GET,
        "/wallet",
        Some("jeune@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["balance_cents"], 30_000);
    assert_eq!(wallet["digital"]["remaining_cents"], 10_000);

    let (status, booking) = send(
        &test.app,
        Method::POST,
        "/bookings",
        Some("jeune@example.com"),
        Some(json!({ "stock_id": test.stock.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["total_amount_cents"], 1_200);

    let (status, _) = send(
        &test.app,
        Method::POST,
        "/bookings",
        Some("jeune@example.com"),
        Some(json!({ "stock_id": test.stock.id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, wallet) = send(
        &test.app,
        Method::GET,
        "/wallet",
        Some("jeune@example.com"),
        None,
    )
    .await;
    assert_eq!(wallet["balance_cents"], 28_800);

    let (status, bookings) = send(
        &test.app,
        Method::GET,
        "/bookings",
        Some("jeune@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bookings["ongoing"].as_array().unwrap().len(), 1);

    let token = booking["token"].as_str().unwrap();
    let (status, found) = send(
        &test.app,
        Method::GET,
        &format!("/pro/bookings/token/{token}"),
        Some("pro@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], booking["id"]);

    let id = booking["id"].as_str().unwrap();
    let (status, cancelled) = send(
        &test.app,
        Method::POST,
        &format!("/bookings/{id}/cancel"),
        Some("jeune@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "beneficiary");

    let (status, _) = send(
        &test.app,
        Method::POST,
        &format!("/bookings/{id}/cancel"),
        Some("jeune@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::GONE);

    let stock = test.engine.stock(test.stock.id).await.unwrap();
    assert_eq!(stock.dn_booked_quantity, 0);
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let test = test_app().await;
    let (status, _) = send(
        &test.app,
        Method::GET,
        "/pro/bookings/token/ZZZZZZ",
        Some("pro@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pros_only_reach_their_own_offerer() {
    let test = test_app().await;
    let (status, booking) = send(
        &test.app,
        Method::POST,
        "/bookings",
        Some("jeune@example.com"),
        Some(json!({ "stock_id": test.stock.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = booking["token"].as_str().unwrap();

    let (status, _) = send(
        &test.app,
        Method::GET,
        &format!("/pro/bookings/token/{token}"),
        Some("pro@cinema.example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        Method::PATCH,
        &format!("/pro/bookings/token/{token}/use"),
        Some("pro@cinema.example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        Method::PATCH,
        &format!("/pro/bookings/token/{token}/cancel"),
        Some("pro@cinema.example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        Method::PATCH,
        &format!("/pro/stocks/{}", test.stock.id),
        Some("pro@cinema.example.com"),
        Some(json!({ "price_cents": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        Method::POST,
        "/pro/offers",
        Some("pro@cinema.example.com"),
        Some(json!({
            "venue_id": test.venue_id,
            "name": "Roman du mois",
            "subcategory_id": "LIVRE_PAPIER",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let booking = test.engine.booking_by_token(token).await.unwrap();
    assert_eq!(booking.status, "confirmed");
    assert_eq!(test.engine.stock(test.stock.id).await.unwrap().price, 1_200);

    let (status, used) = send(
        &test.app,
        Method::PATCH,
        &format!("/pro/bookings/token/{token}/use"),
        Some("pro@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(used["status"], "used");

    let (status, _) = send(
        &test.app,
        Method::GET,
        &format!("/pro/bookings/token/{token}"),
        Some("admin@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
