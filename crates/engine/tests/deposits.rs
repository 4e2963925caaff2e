use chrono::{Duration, NaiveDate, TimeZone, Utc};

use engine::{
    Credit, DepositEligibility, DepositType, EngineError, MoneyCents, NewUser, UserRole,
};

mod common;
use common::{engine_with_db, fixture, t0};

async fn registered_user(engine: &engine::Engine, email: &str) -> engine::users::Model {
    engine
        .create_user(NewUser {
            email: email.to_string(),
            password: "secret".to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            role: UserRole::None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn adult_grant_has_a_digital_cap() {
    let (engine, _db) = engine_with_db().await;
    let user = registered_user(&engine, "Adulte@Example.com ").await;
    assert_eq!(user.email, "adulte@example.com");

    let deposit = engine
        .create_deposit(user.id, "identity check", DepositEligibility::Age18, None, t0())
        .await
        .unwrap();
    assert_eq!(deposit.deposit_type().unwrap(), DepositType::Grant18);
    assert_eq!(deposit.amount(), MoneyCents::from_euros(300));
    assert!(deposit.expiration_date.unwrap() > t0() + Duration::days(365 * 2 - 1));
    assert_eq!(
        engine.user(user.id).await.unwrap().role().unwrap(),
        UserRole::Beneficiary
    );

    let credit = engine.domains_credit(user.id, t0()).await.unwrap().unwrap();
    assert_eq!(
        credit.digital,
        Some(Credit {
            initial: MoneyCents::from_euros(100),
            remaining: MoneyCents::from_euros(100),
        })
    );
    assert_eq!(credit.physical, None);

    let err = engine
        .create_deposit(user.id, "identity check", DepositEligibility::Age18, None, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn underage_grant_needs_a_validated_birth_date() {
    let (engine, _db) = engine_with_db().await;
    let user = registered_user(&engine, "ado@example.com").await;

    let err = engine
        .create_deposit(user.id, "educonnect", DepositEligibility::Underage, None, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    engine
        .set_validated_birth_date(user.id, NaiveDate::from_ymd_opt(2009, 6, 1).unwrap())
        .await
        .unwrap();
    let deposit = engine
        .create_deposit(user.id, "educonnect", DepositEligibility::Underage, None, t0())
        .await
        .unwrap();
    assert_eq!(deposit.deposit_type().unwrap(), DepositType::Grant15To17);
    assert_eq!(deposit.amount(), MoneyCents::from_euros(30));
    assert_eq!(
        engine.user(user.id).await.unwrap().role().unwrap(),
        UserRole::UnderageBeneficiary
    );
}

#[tokio::test]
async fn underage_beneficiaries_are_recredited_once_per_birthday() {
    let (engine, _db) = engine_with_db().await;
    let user = registered_user(&engine, "quinze@example.com").await;
    engine
        .set_validated_birth_date(user.id, NaiveDate::from_ymd_opt(2010, 6, 1).unwrap())
        .await
        .unwrap();
    engine
        .create_deposit(user.id, "educonnect", DepositEligibility::Underage, None, t0())
        .await
        .unwrap();
    assert_eq!(
        engine.wallet_balance(user.id, t0()).await.unwrap(),
        MoneyCents::from_euros(20)
    );

    let before_birthday = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
    assert_eq!(engine.recredit_underage_users(before_birthday).await.unwrap(), 0);

    let after_birthday = Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap();
    assert_eq!(engine.recredit_underage_users(after_birthday).await.unwrap(), 1);
    assert_eq!(engine.recredit_underage_users(after_birthday).await.unwrap(), 0);
    assert_eq!(
        engine.wallet_balance(user.id, after_birthday).await.unwrap(),
        MoneyCents::from_euros(50)
    );
}

#[tokio::test]
async fn expired_deposit_leaves_nothing_to_spend() {
    let fx = fixture().await;
    let stock = fx.book_stock(1000, None).await;

    fx.engine
        .expire_current_deposit(fx.beneficiary.id, t0() + Duration::days(1))
        .await
        .unwrap();
    let later = t0() + Duration::days(2);
    assert_eq!(
        fx.engine.wallet_balance(fx.beneficiary.id, later).await.unwrap(),
        MoneyCents::ZERO
    );
    let err = fx
        .engine
        .book_offer(fx.beneficiary.id, stock.id, 1, later)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
}

#[tokio::test]
async fn adult_grant_follows_an_expired_underage_one() {
    let (engine, _db) = engine_with_db().await;
    let user = registered_user(&engine, "majeur@example.com").await;
    engine
        .set_validated_birth_date(user.id, NaiveDate::from_ymd_opt(2009, 6, 1).unwrap())
        .await
        .unwrap();
    engine
        .create_deposit(user.id, "educonnect", DepositEligibility::Underage, None, t0())
        .await
        .unwrap();

    let err = engine
        .create_deposit(user.id, "identity check", DepositEligibility::Age18, None, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));

    let eighteen = Utc.with_ymd_and_hms(2027, 6, 2, 10, 0, 0).unwrap();
    engine
        .create_deposit(user.id, "identity check", DepositEligibility::Age18, None, eighteen)
        .await
        .unwrap();
    assert_eq!(
        engine.wallet_balance(user.id, eighteen).await.unwrap(),
        MoneyCents::from_euros(300)
    );
}

#[tokio::test]
async fn manual_recredit_cannot_make_a_deposit_negative() {
    let fx = fixture().await;
    let deposit = fx
        .engine
        .add_manual_recredit(fx.beneficiary.id, MoneyCents::from_euros(-50), t0())
        .await
        .unwrap();
    assert_eq!(deposit.amount(), MoneyCents::from_euros(250));

    let err = fx
        .engine
        .add_manual_recredit(fx.beneficiary.id, MoneyCents::from_euros(-300), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}
