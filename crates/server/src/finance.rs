//! Backoffice triggers for the finance jobs.

use api_types::finance::{
    CashflowBatchView, CashflowView, CashflowsNew, InvoiceView, PriceEvents, PricingSummary,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

pub async fn price_events(
    State(state): State<ServerState>,
    Json(payload): Json<PriceEvents>,
) -> Result<Json<PricingSummary>, ServerError> {
    let summary = state
        .engine
        .price_events(payload.min_date, Utc::now())
        .await?;
    Ok(Json(PricingSummary {
        priced: summary.priced,
        failed: summary.failed,
        skipped: summary.skipped,
    }))
}

pub async fn cashflows(
    State(state): State<ServerState>,
    Json(payload): Json<CashflowsNew>,
) -> Result<(StatusCode, Json<CashflowBatchView>), ServerError> {
    let generation = state
        .engine
        .generate_cashflows(payload.cutoff, Utc::now())
        .await?;
    let cashflows = generation
        .cashflows
        .iter()
        .map(|cashflow| CashflowView {
            id: cashflow.id,
            bank_account_id: cashflow.bank_account_id,
            status: cashflow.status.clone(),
            amount_cents: cashflow.amount,
        })
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(CashflowBatchView {
            id: generation.batch.id,
            label: generation.batch.label,
            cutoff: generation.batch.cutoff,
            cashflows,
            skipped_bank_accounts: generation.skipped_bank_accounts,
        }),
    ))
}

pub async fn invoices(
    State(state): State<ServerState>,
    Path(batch_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Vec<InvoiceView>>), ServerError> {
    let invoices = state
        .engine
        .generate_invoices(batch_id, Utc::now())
        .await?;
    let views = invoices
        .iter()
        .map(|invoice| InvoiceView {
            id: invoice.id,
            reference: invoice.reference.clone(),
            bank_account_id: invoice.bank_account_id,
            amount_cents: invoice.amount,
            date: invoice.date,
        })
        .collect();
    Ok((StatusCode::CREATED, Json(views)))
}
