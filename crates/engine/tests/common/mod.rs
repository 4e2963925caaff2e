#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    DepositEligibility, Engine, MoneyCents, NewOffer, NewStock, NewUser, NewVenue, UserRole,
    bank_accounts::{self, BankAccountStatus},
    offerers, stocks, users, venues,
};
use migration::MigratorTrait;

/// Reference instant of the test scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// A validated offerer with one physical venue, priced by itself and paid on
/// an accepted bank account, plus an admin and an adult beneficiary.
pub struct Fixture {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub admin: users::Model,
    pub beneficiary: users::Model,
    pub offerer: offerers::Model,
    pub venue: venues::Model,
    pub bank_account: bank_accounts::Model,
}

pub async fn fixture() -> Fixture {
    let (engine, db) = engine_with_db().await;
    let admin = engine
        .create_user(NewUser {
            email: "admin@example.com".to_string(),
            password: "secret".to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            role: UserRole::Admin,
        })
        .await
        .unwrap();

    let offerer = engine.create_offerer("Librairie du Centre", true).await.unwrap();
    let venue = engine
        .create_venue(NewVenue {
            offerer_id: offerer.id,
            name: "Librairie du Centre - Paris".to_string(),
            is_virtual: false,
            booking_email: Some("contact@librairie.example.com".to_string()),
            department_code: Some("75".to_string()),
            is_validated: true,
        })
        .await
        .unwrap();
    let link_start = t0() - Duration::days(30);
    engine
        .link_venue_to_pricing_point(venue.id, venue.id, link_start)
        .await
        .unwrap();
    let bank_account = engine
        .create_bank_account(
            offerer.id,
            "Compte courant",
            "FR76 3000 6000 0112 3456 7890 189",
            BankAccountStatus::Accepted,
        )
        .await
        .unwrap();
    engine
        .link_venue_to_bank_account(venue.id, bank_account.id, link_start)
        .await
        .unwrap();

    let beneficiary = new_beneficiary(&engine, "jeune@example.com").await;
    Fixture {
        engine,
        db,
        admin,
        beneficiary,
        offerer,
        venue,
        bank_account,
    }
}

/// An 18-year-old beneficiary with a fresh deposit granted at `t0`.
pub async fn new_beneficiary(engine: &Engine, email: &str) -> users::Model {
    let user = engine
        .create_user(NewUser {
            email: email.to_string(),
            password: "secret".to_string(),
            first_name: Some("Camille".to_string()),
            last_name: Some("Martin".to_string()),
            date_of_birth: None,
            role: UserRole::None,
        })
        .await
        .unwrap();
    engine
        .create_deposit(user.id, "identity check", DepositEligibility::Age18, None, t0())
        .await
        .unwrap();
    engine.user(user.id).await.unwrap()
}

impl Fixture {
    /// Creates, publishes and approves an offer of `subcategory` on the venue.
    pub async fn approved_offer(&self, subcategory: &str, is_duo: bool) -> engine::offers::Model {
        let offer = self
            .engine
            .create_offer(
                NewOffer {
                    venue_id: self.venue.id,
                    name: format!("Offre {subcategory}"),
                    subcategory_id: subcategory.to_string(),
                    is_duo,
                    url: None,
                },
                t0(),
            )
            .await
            .unwrap();
        self.engine.publish_offer(offer.id).await.unwrap();
        self.engine
            .validate_offers(&[offer.id], self.admin.id, t0())
            .await
            .unwrap()
            .remove(0)
    }

    /// Creates and approves a digital offer on a new virtual venue of the
    /// offerer.
    pub async fn approved_digital_offer(&self, subcategory: &str) -> engine::offers::Model {
        let venue = self
            .engine
            .create_venue(NewVenue {
                offerer_id: self.offerer.id,
                name: "Offre numérique".to_string(),
                is_virtual: true,
                booking_email: None,
                department_code: None,
                is_validated: true,
            })
            .await
            .unwrap();
        self.engine
            .link_venue_to_pricing_point(venue.id, self.venue.id, t0() - Duration::days(30))
            .await
            .unwrap();
        let offer = self
            .engine
            .create_offer(
                NewOffer {
                    venue_id: venue.id,
                    name: format!("Offre {subcategory}"),
                    subcategory_id: subcategory.to_string(),
                    is_duo: false,
                    url: Some("https://lecture.example.com".to_string()),
                },
                t0(),
            )
            .await
            .unwrap();
        self.engine.publish_offer(offer.id).await.unwrap();
        self.engine
            .validate_offers(&[offer.id], self.admin.id, t0())
            .await
            .unwrap()
            .remove(0)
    }

    /// A bookable book stock at `price_cents`.
    pub async fn book_stock(&self, price_cents: i64, quantity: Option<i64>) -> stocks::Model {
        let offer = self.approved_offer("LIVRE_PAPIER", false).await;
        self.engine
            .create_stock(
                offer.id,
                NewStock {
                    price: MoneyCents::new(price_cents),
                    quantity,
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap()
    }

    /// A bookable concert stock beginning at `beginning`.
    pub async fn event_stock(
        &self,
        price_cents: i64,
        beginning: DateTime<Utc>,
        is_duo: bool,
    ) -> stocks::Model {
        let offer = self.approved_offer("CONCERT", is_duo).await;
        self.engine
            .create_stock(
                offer.id,
                NewStock {
                    price: MoneyCents::new(price_cents),
                    quantity: Some(50),
                    beginning_datetime: Some(beginning),
                    booking_limit_datetime: None,
                },
                t0(),
            )
            .await
            .unwrap()
    }

    /// Books a book stock and marks it used at `used_at`; returns the booking.
    pub async fn used_book_booking(
        &self,
        user_id: uuid::Uuid,
        price_cents: i64,
        used_at: DateTime<Utc>,
    ) -> engine::bookings::Model {
        let stock = self.book_stock(price_cents, Some(10)).await;
        let booking = self
            .engine
            .book_offer(user_id, stock.id, 1, t0())
            .await
            .unwrap();
        self.engine
            .mark_as_used(booking.id, engine::ValidationAuthorType::Offerer, used_at)
            .await
            .unwrap()
    }
}
