use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    BookingStatus, DepositType, EngineError, MoneyCents, ResultEngine, UserRole, bookings,
    deposits, offers,
    recredits::{self, RecreditType},
    stocks, users,
    util::{ACCOUNTING_TIMEZONE, add_years, age_on, latest_birthday},
    wallet::{
        DomainsCredit, Expense, ExpenseDomain, GRANT_15_AMOUNT, GRANT_16_17_AMOUNT,
        GRANT_18_AMOUNT, RECREDIT_AMOUNT, SpecificCaps,
    },
};

use super::{Engine, require, with_tx};

/// Which grant a user is eligible to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositEligibility {
    Age18,
    Underage,
}

const GRANT_18_VERSION: i32 = 2;
const GRANT_15_17_VERSION: i32 = 1;
const GRANT_18_VALIDITY_YEARS: i32 = 2;

/// Last instant of the given day, in the accounting timezone.
fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let next_day = date + Duration::days(1);
    local_midnight(next_day) - Duration::microseconds(1)
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    ACCOUNTING_TIMEZONE
        .with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .earliest()
        .map_or_else(
            || Utc.from_utc_datetime(&date.and_time(Default::default())),
            |dt| dt.with_timezone(&Utc),
        )
}

fn underage_grant_amount(age: i32) -> ResultEngine<MoneyCents> {
    match age {
        15 => Ok(GRANT_15_AMOUNT),
        16 | 17 => Ok(GRANT_16_17_AMOUNT),
        _ => Err(EngineError::Forbidden(format!(
            "age {age} is not eligible to the underage grant"
        ))),
    }
}

impl Engine {
    /// Grants a deposit to a user and turns them into a beneficiary.
    ///
    /// `age_at_registration` overrides the age computed from the validated
    /// birth date for underage grants.
    pub async fn create_deposit(
        &self,
        user_id: Uuid,
        source: &str,
        eligibility: DepositEligibility,
        age_at_registration: Option<i32>,
        now: DateTime<Utc>,
    ) -> ResultEngine<deposits::Model> {
        with_tx!(self, |db_tx| {
            let user = require::<users::Entity>(&db_tx, user_id, "user").await?;
            let today = now.with_timezone(&ACCOUNTING_TIMEZONE).date_naive();

            let (deposit_type, version, amount, expiration_date, role) = match eligibility {
                DepositEligibility::Age18 => (
                    DepositType::Grant18,
                    GRANT_18_VERSION,
                    GRANT_18_AMOUNT,
                    end_of_day(add_years(today, GRANT_18_VALIDITY_YEARS)),
                    UserRole::Beneficiary,
                ),
                DepositEligibility::Underage => {
                    let birth_date = user.validated_birth_date.ok_or_else(|| {
                        EngineError::Forbidden("birth date has not been validated".to_string())
                    })?;
                    let age = age_at_registration.unwrap_or_else(|| age_on(birth_date, today));
                    if !(15..=17).contains(&age) {
                        return Err(EngineError::Forbidden(format!(
                            "age {age} is not eligible to the underage grant"
                        )));
                    }
                    (
                        DepositType::Grant15To17,
                        GRANT_15_17_VERSION,
                        underage_grant_amount(age)?,
                        local_midnight(add_years(birth_date, 18)),
                        UserRole::UnderageBeneficiary,
                    )
                }
            };

            let existing = deposits::Entity::find()
                .filter(deposits::Column::UserId.eq(user_id))
                .all(&db_tx)
                .await?;
            if existing
                .iter()
                .any(|deposit| deposit.deposit_type == deposit_type.as_str())
            {
                return Err(EngineError::ExistingKey(format!(
                    "user {user_id} already received a {deposit_type} deposit"
                )));
            }
            if existing.iter().any(|deposit| !deposit.is_expired(now)) {
                return Err(EngineError::ExistingKey(format!(
                    "user {user_id} already has an active deposit"
                )));
            }

            let deposit = deposits::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id),
                deposit_type: ActiveValue::Set(deposit_type.as_str().to_string()),
                version: ActiveValue::Set(version),
                amount: ActiveValue::Set(amount.cents()),
                source: ActiveValue::Set(source.to_string()),
                expiration_date: ActiveValue::Set(Some(expiration_date)),
                date_created: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            users::ActiveModel {
                id: ActiveValue::Set(user_id),
                role: ActiveValue::Set(role.as_str().to_string()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            tracing::info!(
                user_id = %user_id,
                deposit_id = %deposit.id,
                deposit_type = %deposit_type,
                amount = %amount,
                "Granted deposit"
            );
            Ok(deposit)
        })
    }

    /// Adds the yearly recredit to underage beneficiaries who turned 16 or 17
    /// since their deposit was granted. Returns the number of recredited users.
    pub async fn recredit_underage_users(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let today = now.with_timezone(&ACCOUNTING_TIMEZONE).date_naive();
        with_tx!(self, |db_tx| {
            let candidates = deposits::Entity::find()
                .filter(deposits::Column::DepositType.eq(DepositType::Grant15To17.as_str()))
                .filter(deposits::Column::ExpirationDate.gt(now))
                .find_also_related(users::Entity)
                .all(&db_tx)
                .await?;

            let mut recredited = 0;
            for (deposit, user) in candidates {
                let Some(birth_date) = user.and_then(|user| user.birth_date()) else {
                    continue;
                };
                let age = age_on(birth_date, today);
                let recredit_type = match age {
                    16 => RecreditType::Recredit16,
                    17 => RecreditType::Recredit17,
                    _ => continue,
                };
                let deposit_day = deposit
                    .date_created
                    .with_timezone(&ACCOUNTING_TIMEZONE)
                    .date_naive();
                if latest_birthday(birth_date, today) <= deposit_day {
                    continue;
                }
                let already = recredits::Entity::find()
                    .filter(recredits::Column::DepositId.eq(deposit.id))
                    .filter(recredits::Column::RecreditType.eq(recredit_type.as_str()))
                    .one(&db_tx)
                    .await?
                    .is_some();
                if already {
                    continue;
                }

                add_recredit(&db_tx, &deposit, recredit_type, RECREDIT_AMOUNT, now).await?;
                tracing::info!(
                    user_id = %deposit.user_id,
                    deposit_id = %deposit.id,
                    recredit_type = %recredit_type,
                    "Recredited underage beneficiary"
                );
                recredited += 1;
            }
            Ok(recredited)
        })
    }

    /// Makes the active deposit of the user expire right now.
    pub async fn expire_current_deposit(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let deposit = active_deposit(&db_tx, user_id, now)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("active deposit of {user_id}")))?;
            deposits::ActiveModel {
                id: ActiveValue::Set(deposit.id),
                expiration_date: ActiveValue::Set(Some(now - Duration::seconds(1))),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(user_id = %user_id, deposit_id = %deposit.id, "Expired deposit");
            Ok(())
        })
    }

    /// Backoffice adjustment of the active deposit amount. The amount may be
    /// negative but the deposit cannot go below zero.
    pub async fn add_manual_recredit(
        &self,
        user_id: Uuid,
        amount: MoneyCents,
        now: DateTime<Utc>,
    ) -> ResultEngine<deposits::Model> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "recredit amount must not be zero".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let deposit = active_deposit(&db_tx, user_id, now)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("active deposit of {user_id}")))?;
            if (deposit.amount() + amount).is_negative() {
                return Err(EngineError::InvalidAmount(
                    "deposit amount cannot become negative".to_string(),
                ));
            }
            add_recredit(
                &db_tx,
                &deposit,
                RecreditType::ManualModification,
                amount,
                now,
            )
            .await
        })
    }

    /// Credit of the user's latest deposit, `None` when they never received one.
    pub async fn domains_credit(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<DomainsCredit>> {
        with_tx!(self, |db_tx| {
            match current_deposit(&db_tx, user_id).await? {
                Some(deposit) => Ok(Some(deposit_credit(&db_tx, &deposit, now).await?)),
                None => Ok(None),
            }
        })
    }

    /// What the user can still spend.
    pub async fn wallet_balance(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<MoneyCents> {
        Ok(self
            .domains_credit(user_id, now)
            .await?
            .map_or(MoneyCents::ZERO, |credit| credit.all.remaining))
    }
}

async fn add_recredit(
    db_tx: &DatabaseTransaction,
    deposit: &deposits::Model,
    recredit_type: RecreditType,
    amount: MoneyCents,
    now: DateTime<Utc>,
) -> ResultEngine<deposits::Model> {
    recredits::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        deposit_id: ActiveValue::Set(deposit.id),
        recredit_type: ActiveValue::Set(recredit_type.as_str().to_string()),
        amount: ActiveValue::Set(amount.cents()),
        date_created: ActiveValue::Set(now),
    }
    .insert(db_tx)
    .await?;
    let updated = deposits::ActiveModel {
        id: ActiveValue::Set(deposit.id),
        amount: ActiveValue::Set((deposit.amount() + amount).cents()),
        ..Default::default()
    }
    .update(db_tx)
    .await?;
    Ok(updated)
}

/// Most recently granted deposit, expired or not.
pub(super) async fn current_deposit(
    db_tx: &DatabaseTransaction,
    user_id: Uuid,
) -> ResultEngine<Option<deposits::Model>> {
    deposits::Entity::find()
        .filter(deposits::Column::UserId.eq(user_id))
        .order_by_desc(deposits::Column::DateCreated)
        .one(db_tx)
        .await
        .map_err(Into::into)
}

pub(super) async fn active_deposit(
    db_tx: &DatabaseTransaction,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> ResultEngine<Option<deposits::Model>> {
    Ok(current_deposit(db_tx, user_id)
        .await?
        .filter(|deposit| !deposit.is_expired(now)))
}

/// Credit left on `deposit`, counting every non-cancelled booking made with it.
pub(super) async fn deposit_credit(
    db_tx: &DatabaseTransaction,
    deposit: &deposits::Model,
    now: DateTime<Utc>,
) -> ResultEngine<DomainsCredit> {
    let bookings = bookings::Entity::find()
        .filter(bookings::Column::DepositId.eq(deposit.id))
        .filter(bookings::Column::Status.ne(BookingStatus::Cancelled.as_str()))
        .all(db_tx)
        .await?;

    let stock_ids: Vec<Uuid> = bookings.iter().map(|booking| booking.stock_id).collect();
    let offers_by_stock: HashMap<Uuid, offers::Model> = stocks::Entity::find()
        .filter(stocks::Column::Id.is_in(stock_ids))
        .find_also_related(offers::Entity)
        .all(db_tx)
        .await?
        .into_iter()
        .filter_map(|(stock, offer)| offer.map(|offer| (stock.id, offer)))
        .collect();

    let mut expenses = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        let domain = match offers_by_stock.get(&booking.stock_id) {
            Some(offer) => ExpenseDomain::of(offer.subcategory()?, offer.is_digital()),
            None => ExpenseDomain::Other,
        };
        expenses.push(Expense {
            total: booking.total_amount(),
            domain,
        });
    }

    let caps = SpecificCaps::for_deposit(deposit.deposit_type()?, deposit.version);
    Ok(DomainsCredit::compute(
        deposit.amount(),
        caps,
        deposit.is_expired(now),
        &expenses,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_18_expires_at_the_end_of_a_paris_day() {
        let expiration = end_of_day(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        // 23:59:59.999999 in Paris (UTC+2 in summer).
        assert_eq!(
            expiration + Duration::microseconds(1),
            Utc.with_ymd_and_hms(2026, 7, 1, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn underage_amounts() {
        assert_eq!(underage_grant_amount(15).unwrap(), GRANT_15_AMOUNT);
        assert_eq!(underage_grant_amount(17).unwrap(), GRANT_16_17_AMOUNT);
        assert!(underage_grant_amount(18).is_err());
    }
}
