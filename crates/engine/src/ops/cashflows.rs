use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    BookingStatus, CollectiveBookingStatus, EngineError, IncidentStatus, MoneyCents,
    PricingStatus, ResultEngine,
    app_locks::{self, CASHFLOW_GENERATION_LOCK},
    bank_accounts::{self, BankAccountStatus},
    bookings, cashflow_batches, cashflow_pricings,
    cashflows::{self, CashflowStatus},
    collective_bookings, collective_stocks, finance_incidents, invoice_cashflows, invoices,
    pricing_lines::{self, PricingLineCategory},
    pricing_logs::PricingLogReason,
    pricings, stocks,
    util::ACCOUNTING_TIMEZONE,
};

use super::{Engine, finance::log_pricing_status, offerers::bank_account_link, require, with_tx};

/// A pro that owes money is only debited when its last accepted cashflow is
/// older than this.
pub const DEBIT_NOTE_MIN_AGE_DAYS: i64 = 45;

const BATCH_LABEL_PREFIX: &str = "VIR";

/// Result of a cashflow generation.
#[derive(Clone, Debug)]
pub struct CashflowGeneration {
    pub batch: cashflow_batches::Model,
    pub cashflows: Vec<cashflows::Model>,
    pub skipped_bank_accounts: Vec<Uuid>,
}

fn next_batch_label(labels: &[String]) -> String {
    let last = labels
        .iter()
        .filter_map(|label| label.strip_prefix(BATCH_LABEL_PREFIX)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{BATCH_LABEL_PREFIX}{}", last + 1)
}

fn invoice_reference(year: i32, sequence: u64) -> String {
    format!("F{:02}{sequence:07}", year.rem_euclid(100))
}

/// Checks that the revenue line of each booking pricing matches the booking.
fn revenue_lines_match(
    pricings: &[pricings::Model],
    lines: &HashMap<Uuid, Vec<pricing_lines::Model>>,
    bookings: &HashMap<Uuid, bookings::Model>,
) -> bool {
    pricings.iter().all(|pricing| {
        let Some(booking) = pricing.booking_id.and_then(|id| bookings.get(&id)) else {
            return true;
        };
        let revenue: i64 = lines
            .get(&pricing.id)
            .into_iter()
            .flatten()
            .filter(|line| line.category == PricingLineCategory::OffererRevenue.as_str())
            .map(|line| line.amount)
            .sum();
        revenue == -booking.total_amount().cents()
    })
}

/// Beginning of the event a pricing is about, if any.
async fn pricing_event_beginning(
    db_tx: &DatabaseTransaction,
    pricing: &pricings::Model,
) -> ResultEngine<Option<DateTime<Utc>>> {
    if let Some(booking_id) = pricing.booking_id {
        let booking = require::<bookings::Entity>(db_tx, booking_id, "booking").await?;
        let stock = require::<stocks::Entity>(db_tx, booking.stock_id, "stock").await?;
        return Ok(stock.beginning_datetime);
    }
    if let Some(booking_id) = pricing.collective_booking_id {
        let booking =
            require::<collective_bookings::Entity>(db_tx, booking_id, "collective booking").await?;
        let stock = require::<collective_stocks::Entity>(
            db_tx,
            booking.collective_stock_id,
            "collective stock",
        )
        .await?;
        return Ok(Some(stock.beginning_datetime));
    }
    Ok(None)
}

async fn eligible_pricings(
    db_tx: &DatabaseTransaction,
    cutoff: DateTime<Utc>,
) -> ResultEngine<Vec<pricings::Model>> {
    let validated = pricings::Entity::find()
        .filter(pricings::Column::Status.eq(PricingStatus::Validated.as_str()))
        .filter(pricings::Column::ValueDate.lt(cutoff))
        .order_by_asc(pricings::Column::ValueDate)
        .all(db_tx)
        .await?;
    let ids: Vec<Uuid> = validated.iter().map(|pricing| pricing.id).collect();
    let already_linked: HashSet<Uuid> = cashflow_pricings::Entity::find()
        .filter(cashflow_pricings::Column::PricingId.is_in(ids))
        .all(db_tx)
        .await?
        .into_iter()
        .map(|link| link.pricing_id)
        .collect();

    let mut eligible = Vec::with_capacity(validated.len());
    for pricing in validated {
        if already_linked.contains(&pricing.id) {
            continue;
        }
        let beginning = pricing_event_beginning(db_tx, &pricing).await?;
        if beginning.is_none_or(|beginning| beginning < cutoff) {
            eligible.push(pricing);
        }
    }
    Ok(eligible)
}

/// Whether a positive total (the pro owes money) may be debited.
async fn may_debit(
    db_tx: &DatabaseTransaction,
    bank_account_id: Uuid,
    venue_ids: &[Uuid],
    now: DateTime<Utc>,
) -> ResultEngine<bool> {
    let forced = finance_incidents::Entity::find()
        .filter(finance_incidents::Column::VenueId.is_in(venue_ids.to_vec()))
        .filter(finance_incidents::Column::Status.eq(IncidentStatus::Validated.as_str()))
        .filter(finance_incidents::Column::ForceDebitNote.eq(true))
        .one(db_tx)
        .await?
        .is_some();
    if forced {
        return Ok(true);
    }
    let last_accepted = cashflows::Entity::find()
        .filter(cashflows::Column::BankAccountId.eq(bank_account_id))
        .filter(cashflows::Column::Status.eq(CashflowStatus::Accepted.as_str()))
        .order_by_desc(cashflows::Column::CreationDate)
        .one(db_tx)
        .await?;
    Ok(last_accepted.is_some_and(|cashflow| {
        cashflow.creation_date < now - Duration::days(DEBIT_NOTE_MIN_AGE_DAYS)
    }))
}

async fn acquire_lock(
    db_tx: &DatabaseTransaction,
    timeout: Duration,
    now: DateTime<Utc>,
) -> ResultEngine<()> {
    let current = app_locks::Entity::find_by_id(CASHFLOW_GENERATION_LOCK.to_string())
        .one(db_tx)
        .await?;
    match current {
        Some(lock) if lock.expires_at > now => {
            return Err(EngineError::InvalidState(
                "cashflows are already being generated".to_string(),
            ));
        }
        Some(_) => {
            app_locks::Entity::delete_by_id(CASHFLOW_GENERATION_LOCK.to_string())
                .exec(db_tx)
                .await?;
        }
        None => {}
    }
    app_locks::ActiveModel {
        name: ActiveValue::Set(CASHFLOW_GENERATION_LOCK.to_string()),
        acquired_at: ActiveValue::Set(now),
        expires_at: ActiveValue::Set(now + timeout),
    }
    .insert(db_tx)
    .await?;
    Ok(())
}

pub(super) async fn cashflows_being_generated(
    db_tx: &DatabaseTransaction,
    now: DateTime<Utc>,
) -> ResultEngine<bool> {
    Ok(
        app_locks::Entity::find_by_id(CASHFLOW_GENERATION_LOCK.to_string())
            .one(db_tx)
            .await?
            .is_some_and(|lock| lock.expires_at > now),
    )
}

impl Engine {
    pub async fn are_cashflows_being_generated(&self, now: DateTime<Utc>) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| cashflows_being_generated(&db_tx, now).await)
    }

    /// Groups the eligible pricings into one cashflow per bank account.
    ///
    /// The generation lock is released on success only: after a failure it
    /// stays held until it expires.
    pub async fn generate_cashflows(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ResultEngine<CashflowGeneration> {
        let timeout = self.cashflow_lock_timeout;
        with_tx!(self, |db_tx| acquire_lock(&db_tx, timeout, now).await)?;

        let generation: CashflowGeneration = with_tx!(self, |db_tx| {
            let labels: Vec<String> = cashflow_batches::Entity::find()
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|batch| batch.label)
                .collect();
            let batch = cashflow_batches::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                label: ActiveValue::Set(next_batch_label(&labels)),
                cutoff: ActiveValue::Set(cutoff),
                creation_date: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            let mut by_account: BTreeMap<Uuid, Vec<pricings::Model>> = BTreeMap::new();
            for pricing in eligible_pricings(&db_tx, cutoff).await? {
                let Some(link) = bank_account_link(&db_tx, pricing.venue_id, cutoff).await? else {
                    continue;
                };
                let account =
                    require::<bank_accounts::Entity>(&db_tx, link.bank_account_id, "bank account")
                        .await?;
                if account.status != BankAccountStatus::Accepted.as_str() {
                    continue;
                }
                by_account.entry(account.id).or_default().push(pricing);
            }

            let mut cashflows = Vec::with_capacity(by_account.len());
            let mut skipped_bank_accounts = Vec::new();
            for (bank_account_id, account_pricings) in by_account {
                let pricing_ids: Vec<Uuid> =
                    account_pricings.iter().map(|pricing| pricing.id).collect();
                let mut lines: HashMap<Uuid, Vec<pricing_lines::Model>> = HashMap::new();
                for line in pricing_lines::Entity::find()
                    .filter(pricing_lines::Column::PricingId.is_in(pricing_ids.clone()))
                    .all(&db_tx)
                    .await?
                {
                    lines.entry(line.pricing_id).or_default().push(line);
                }
                let booking_ids: Vec<Uuid> = account_pricings
                    .iter()
                    .filter_map(|pricing| pricing.booking_id)
                    .collect();
                let bookings: HashMap<Uuid, bookings::Model> = bookings::Entity::find()
                    .filter(bookings::Column::Id.is_in(booking_ids))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|booking| (booking.id, booking))
                    .collect();
                if !revenue_lines_match(&account_pricings, &lines, &bookings) {
                    tracing::error!(
                        bank_account_id = %bank_account_id,
                        "Pricing revenue lines do not match booking amounts, skipping bank account"
                    );
                    skipped_bank_accounts.push(bank_account_id);
                    continue;
                }

                let total: MoneyCents = account_pricings.iter().map(pricings::Model::amount).sum();
                if total > MoneyCents::ZERO {
                    let venue_ids: Vec<Uuid> = account_pricings
                        .iter()
                        .map(|pricing| pricing.venue_id)
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    if !may_debit(&db_tx, bank_account_id, &venue_ids, now).await? {
                        tracing::info!(
                            bank_account_id = %bank_account_id,
                            total = %total,
                            "Pro owes money but no debit note is due yet"
                        );
                        skipped_bank_accounts.push(bank_account_id);
                        continue;
                    }
                }

                let cashflow = cashflows::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    batch_id: ActiveValue::Set(batch.id),
                    bank_account_id: ActiveValue::Set(bank_account_id),
                    status: ActiveValue::Set(CashflowStatus::Pending.as_str().to_string()),
                    amount: ActiveValue::Set(total.cents()),
                    creation_date: ActiveValue::Set(now),
                }
                .insert(&db_tx)
                .await?;
                for pricing in &account_pricings {
                    cashflow_pricings::ActiveModel {
                        cashflow_id: ActiveValue::Set(cashflow.id),
                        pricing_id: ActiveValue::Set(pricing.id),
                    }
                    .insert(&db_tx)
                    .await?;
                    log_pricing_status(
                        &db_tx,
                        pricing,
                        PricingStatus::Processed,
                        PricingLogReason::GenerateCashflow,
                        now,
                    )
                    .await?;
                }
                pricings::Entity::update_many()
                    .col_expr(
                        pricings::Column::Status,
                        Expr::value(PricingStatus::Processed.as_str()),
                    )
                    .filter(pricings::Column::Id.is_in(pricing_ids))
                    .exec(&db_tx)
                    .await?;
                cashflows.push(cashflow);
            }

            tracing::info!(
                batch = %batch.label,
                cashflows = cashflows.len(),
                skipped = skipped_bank_accounts.len(),
                "Generated cashflows"
            );
            Ok::<_, EngineError>(CashflowGeneration {
                batch,
                cashflows,
                skipped_bank_accounts,
            })
        })?;

        with_tx!(self, |db_tx| {
            app_locks::Entity::delete_by_id(CASHFLOW_GENERATION_LOCK.to_string())
                .exec(&db_tx)
                .await
                .map_err(EngineError::from)
        })?;
        Ok(generation)
    }

    /// Invoices the pending cashflows of a batch, one invoice per bank
    /// account. Paid bookings become `reimbursed`.
    pub async fn generate_invoices(
        &self,
        batch_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<invoices::Model>> {
        with_tx!(self, |db_tx| {
            require::<cashflow_batches::Entity>(&db_tx, batch_id, "cashflow batch").await?;
            let pending = cashflows::Entity::find()
                .filter(cashflows::Column::BatchId.eq(batch_id))
                .filter(cashflows::Column::Status.eq(CashflowStatus::Pending.as_str()))
                .all(&db_tx)
                .await?;
            let mut by_account: BTreeMap<Uuid, Vec<cashflows::Model>> = BTreeMap::new();
            for cashflow in pending {
                by_account
                    .entry(cashflow.bank_account_id)
                    .or_default()
                    .push(cashflow);
            }

            let year = now.with_timezone(&ACCOUNTING_TIMEZONE).year();
            let prefix = invoice_reference(year, 0);
            let prefix = &prefix[..3];
            let mut sequence = invoices::Entity::find()
                .filter(invoices::Column::Reference.starts_with(prefix))
                .count(&db_tx)
                .await?;

            let mut created = Vec::with_capacity(by_account.len());
            for (bank_account_id, account_cashflows) in by_account {
                sequence += 1;
                let amount: i64 = account_cashflows.iter().map(|cashflow| cashflow.amount).sum();
                let invoice = invoices::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    reference: ActiveValue::Set(invoice_reference(year, sequence)),
                    bank_account_id: ActiveValue::Set(bank_account_id),
                    amount: ActiveValue::Set(amount),
                    date: ActiveValue::Set(now),
                }
                .insert(&db_tx)
                .await?;

                for cashflow in &account_cashflows {
                    invoice_cashflows::ActiveModel {
                        invoice_id: ActiveValue::Set(invoice.id),
                        cashflow_id: ActiveValue::Set(cashflow.id),
                    }
                    .insert(&db_tx)
                    .await?;
                    cashflows::ActiveModel {
                        id: ActiveValue::Set(cashflow.id),
                        status: ActiveValue::Set(CashflowStatus::Accepted.as_str().to_string()),
                        ..Default::default()
                    }
                    .update(&db_tx)
                    .await?;

                    let pricing_ids: Vec<Uuid> = cashflow_pricings::Entity::find()
                        .filter(cashflow_pricings::Column::CashflowId.eq(cashflow.id))
                        .all(&db_tx)
                        .await?
                        .into_iter()
                        .map(|link| link.pricing_id)
                        .collect();
                    let cashflow_pricings = pricings::Entity::find()
                        .filter(pricings::Column::Id.is_in(pricing_ids.clone()))
                        .all(&db_tx)
                        .await?;
                    for pricing in &cashflow_pricings {
                        log_pricing_status(
                            &db_tx,
                            pricing,
                            PricingStatus::Invoiced,
                            PricingLogReason::GenerateInvoice,
                            now,
                        )
                        .await?;
                    }
                    pricings::Entity::update_many()
                        .col_expr(
                            pricings::Column::Status,
                            Expr::value(PricingStatus::Invoiced.as_str()),
                        )
                        .filter(pricings::Column::Id.is_in(pricing_ids))
                        .exec(&db_tx)
                        .await?;

                    let booking_ids: Vec<Uuid> = cashflow_pricings
                        .iter()
                        .filter_map(|pricing| pricing.booking_id)
                        .collect();
                    bookings::Entity::update_many()
                        .col_expr(
                            bookings::Column::Status,
                            Expr::value(BookingStatus::Reimbursed.as_str()),
                        )
                        .col_expr(bookings::Column::ReimbursementDate, Expr::value(now))
                        .filter(bookings::Column::Id.is_in(booking_ids))
                        .filter(bookings::Column::Status.ne(BookingStatus::Cancelled.as_str()))
                        .exec(&db_tx)
                        .await?;
                    let collective_ids: Vec<Uuid> = cashflow_pricings
                        .iter()
                        .filter_map(|pricing| pricing.collective_booking_id)
                        .collect();
                    collective_bookings::Entity::update_many()
                        .col_expr(
                            collective_bookings::Column::Status,
                            Expr::value(CollectiveBookingStatus::Reimbursed.as_str()),
                        )
                        .col_expr(collective_bookings::Column::ReimbursementDate, Expr::value(now))
                        .filter(collective_bookings::Column::Id.is_in(collective_ids))
                        .filter(
                            collective_bookings::Column::Status
                                .ne(CollectiveBookingStatus::Cancelled.as_str()),
                        )
                        .exec(&db_tx)
                        .await?;
                }
                tracing::info!(
                    reference = %invoice.reference,
                    amount = %MoneyCents::new(invoice.amount),
                    "Generated invoice"
                );
                created.push(invoice);
            }
            Ok(created)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_labels_follow_the_highest_one() {
        assert_eq!(next_batch_label(&[]), "VIR1");
        assert_eq!(
            next_batch_label(&["VIR9".to_string(), "VIR10".to_string(), "other".to_string()]),
            "VIR11"
        );
    }

    #[test]
    fn invoice_references() {
        assert_eq!(invoice_reference(2024, 1), "F240000001");
        assert_eq!(invoice_reference(2031, 1_234_567), "F311234567");
    }
}
