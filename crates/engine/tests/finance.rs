use chrono::Duration;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use engine::{
    BookingStatus, EngineError, FinanceEventStatus, MoneyCents, NewCustomRule, PricingStatus,
    RuleTarget, RuleValue, StandardRule, pricing_lines::PricingLineCategory,
};

mod common;
use common::{fixture, new_beneficiary, t0};

fn line_amount(lines: &[engine::pricing_lines::Model], category: PricingLineCategory) -> i64 {
    lines
        .iter()
        .filter(|line| line.category == category.as_str())
        .map(|line| line.amount)
        .sum()
}

#[tokio::test]
async fn used_booking_is_priced_after_the_safety_delay() {
    let fx = fixture().await;
    let used_at = t0() + Duration::hours(1);
    let booking = fx.used_book_booking(fx.beneficiary.id, 1000, used_at).await;

    let too_early = fx.engine.price_events(None, used_at).await.unwrap();
    assert_eq!(too_early.priced, 0);

    let summary = fx
        .engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(summary.priced, 1);
    assert_eq!(summary.failed, 0);

    let pricings = fx.engine.booking_pricings(booking.id).await.unwrap();
    assert_eq!(pricings.len(), 1);
    let (pricing, lines) = &pricings[0];
    assert_eq!(pricing.status().unwrap(), PricingStatus::Validated);
    assert_eq!(pricing.amount(), MoneyCents::new(-1000));
    assert_eq!(pricing.value_date, used_at);
    assert_eq!(pricing.creation_date, used_at + Duration::minutes(5));
    assert_eq!(pricing.pricing_point_id, fx.venue.id);
    assert_eq!(
        pricing.standard_rule,
        StandardRule::BookBelow20000.description()
    );
    assert_eq!(line_amount(lines, PricingLineCategory::OffererRevenue), -1000);
    assert_eq!(line_amount(lines, PricingLineCategory::OffererContribution), 0);

    let events = fx.engine.booking_finance_events(booking.id).await.unwrap();
    assert_eq!(events[0].status().unwrap(), FinanceEventStatus::Priced);
}

#[tokio::test]
async fn custom_rule_overrides_the_standard_rates() {
    let fx = fixture().await;
    let rule = fx
        .engine
        .create_custom_reimbursement_rule(
            NewCustomRule {
                target: RuleTarget::Offerer(fx.offerer.id),
                subcategories: vec!["LIVRE_PAPIER".to_string()],
                value: RuleValue::RateBps(5_000),
                timespan_start: t0() - Duration::days(1),
                timespan_end: None,
            },
            t0() - Duration::days(10),
        )
        .await
        .unwrap();

    let used_at = t0() + Duration::hours(1);
    let booking = fx.used_book_booking(fx.beneficiary.id, 1000, used_at).await;
    fx.engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();

    let pricings = fx.engine.booking_pricings(booking.id).await.unwrap();
    let (pricing, lines) = &pricings[0];
    assert_eq!(pricing.custom_rule_id, Some(rule.id));
    assert_eq!(pricing.amount(), MoneyCents::new(-500));
    assert_eq!(line_amount(lines, PricingLineCategory::OffererRevenue), -1000);
    assert_eq!(line_amount(lines, PricingLineCategory::OffererContribution), 500);
}

#[tokio::test]
async fn overlapping_custom_rules_are_refused() {
    let fx = fixture().await;
    let new_rule = |subcategory: &str| NewCustomRule {
        target: RuleTarget::Venue(fx.venue.id),
        subcategories: vec![subcategory.to_string()],
        value: RuleValue::Amount(MoneyCents::new(200)),
        timespan_start: t0() + Duration::days(1),
        timespan_end: None,
    };
    let rule = fx
        .engine
        .create_custom_reimbursement_rule(new_rule("LIVRE_PAPIER"), t0())
        .await
        .unwrap();

    let err = fx
        .engine
        .create_custom_reimbursement_rule(new_rule("LIVRE_PAPIER"), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));
    fx.engine
        .create_custom_reimbursement_rule(new_rule("CONCERT"), t0())
        .await
        .unwrap();

    let past_start = NewCustomRule {
        timespan_start: t0() - Duration::days(1),
        ..new_rule("SEANCE_CINE")
    };
    let err = fx
        .engine
        .create_custom_reimbursement_rule(past_start, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));

    let ended = fx
        .engine
        .edit_reimbursement_rule(rule.id, t0() + Duration::days(30), t0())
        .await
        .unwrap();
    assert_eq!(ended.timespan_end, Some(t0() + Duration::days(30)));
    let err = fx
        .engine
        .edit_reimbursement_rule(rule.id, t0() + Duration::days(40), t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));
}

#[tokio::test]
async fn unusing_a_priced_booking_cancels_its_pricing() {
    let fx = fixture().await;
    let used_at = t0() + Duration::hours(1);
    let booking = fx.used_book_booking(fx.beneficiary.id, 1000, used_at).await;
    fx.engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();

    fx.engine
        .mark_as_unused(booking.id, used_at + Duration::hours(1))
        .await
        .unwrap();
    let pricings = fx.engine.booking_pricings(booking.id).await.unwrap();
    let pricing = &pricings[0].0;
    assert_eq!(pricing.status().unwrap(), PricingStatus::Cancelled);

    let logs = engine::pricing_logs::Entity::find()
        .filter(engine::pricing_logs::Column::PricingId.eq(pricing.id))
        .all(&fx.db)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].timestamp, used_at + Duration::hours(1));
    assert_eq!(logs[0].status_after, PricingStatus::Cancelled.as_str());
    assert_eq!(
        logs[0].reason,
        engine::pricing_logs::PricingLogReason::MarkAsUnused.as_str()
    );
}

#[tokio::test]
async fn older_event_reprices_the_younger_ones() {
    let fx = fixture().await;
    let second = new_beneficiary(&fx.engine, "second@example.com").await;
    let late = fx
        .used_book_booking(second.id, 2000, t0() + Duration::hours(3))
        .await;
    fx.engine
        .price_events(None, t0() + Duration::hours(4))
        .await
        .unwrap();
    assert_eq!(fx.engine.booking_pricings(late.id).await.unwrap().len(), 1);

    let early = fx
        .used_book_booking(fx.beneficiary.id, 1000, t0() + Duration::hours(1))
        .await;
    let summary = fx
        .engine
        .price_events(None, t0() + Duration::hours(4))
        .await
        .unwrap();
    assert_eq!(summary.priced, 1);
    assert!(fx.engine.booking_pricings(late.id).await.unwrap().is_empty());

    let summary = fx
        .engine
        .price_events(None, t0() + Duration::hours(4))
        .await
        .unwrap();
    assert_eq!(summary.priced, 1);

    let late_pricings = fx.engine.booking_pricings(late.id).await.unwrap();
    assert_eq!(late_pricings.len(), 1);
    assert_eq!(late_pricings[0].0.revenue, 3000);
    let early_pricings = fx.engine.booking_pricings(early.id).await.unwrap();
    assert_eq!(early_pricings[0].0.revenue, 1000);
}

#[tokio::test]
async fn cashflows_pay_bank_accounts_and_invoices_reimburse_bookings() {
    let fx = fixture().await;
    let used_at = t0() + Duration::hours(1);
    let booking = fx.used_book_booking(fx.beneficiary.id, 1000, used_at).await;
    let second = new_beneficiary(&fx.engine, "second@example.com").await;
    fx.used_book_booking(second.id, 2500, used_at).await;
    fx.engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();

    let now = t0() + Duration::days(1);
    let generation = fx.engine.generate_cashflows(now, now).await.unwrap();
    assert_eq!(generation.batch.label, "VIR1");
    assert!(generation.skipped_bank_accounts.is_empty());
    assert_eq!(generation.cashflows.len(), 1);
    assert_eq!(generation.cashflows[0].bank_account_id, fx.bank_account.id);
    assert_eq!(generation.cashflows[0].amount, -3500);
    assert!(!fx.engine.are_cashflows_being_generated(now).await.unwrap());
    assert_eq!(
        fx.engine.booking_pricings(booking.id).await.unwrap()[0]
            .0
            .status()
            .unwrap(),
        PricingStatus::Processed
    );

    let err = fx
        .engine
        .mark_as_unused(booking.id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NonCancellablePricing(_)));

    let invoices = fx
        .engine
        .generate_invoices(generation.batch.id, now)
        .await
        .unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].reference, "F260000001");
    assert_eq!(invoices[0].amount, -3500);

    let booking = fx.engine.booking(booking.id).await.unwrap();
    assert_eq!(booking.status().unwrap(), BookingStatus::Reimbursed);
    assert_eq!(booking.reimbursement_date, Some(now));
    assert_eq!(
        fx.engine.booking_pricings(booking.id).await.unwrap()[0]
            .0
            .status()
            .unwrap(),
        PricingStatus::Invoiced
    );

    let next = fx.engine.generate_cashflows(now, now).await.unwrap();
    assert_eq!(next.batch.label, "VIR2");
    assert!(next.cashflows.is_empty());
}

#[tokio::test]
async fn pricings_after_the_cutoff_wait_for_the_next_batch() {
    let fx = fixture().await;
    let used_at = t0() + Duration::days(2);
    fx.used_book_booking(fx.beneficiary.id, 1000, used_at).await;
    fx.engine
        .price_events(None, used_at + Duration::minutes(5))
        .await
        .unwrap();

    let now = t0() + Duration::days(3);
    let generation = fx
        .engine
        .generate_cashflows(t0() + Duration::days(1), now)
        .await
        .unwrap();
    assert!(generation.cashflows.is_empty());

    let generation = fx.engine.generate_cashflows(now, now).await.unwrap();
    assert_eq!(generation.cashflows.len(), 1);
}
