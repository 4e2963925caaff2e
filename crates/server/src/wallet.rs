use api_types::wallet::{CreditView, WalletView};
use axum::{Extension, Json, extract::State};
use chrono::Utc;
use engine::{Credit, users};

use crate::{ServerError, server::ServerState};

fn credit_view(credit: Credit) -> CreditView {
    CreditView {
        initial_cents: credit.initial.cents(),
        remaining_cents: credit.remaining.cents(),
    }
}

/// Remaining credit of the current deposit, overall and per capped domain.
pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<WalletView>, ServerError> {
    let now = Utc::now();
    let balance = state.engine.wallet_balance(user.id, now).await?;
    let credit = state.engine.domains_credit(user.id, now).await?;
    Ok(Json(WalletView {
        balance_cents: balance.cents(),
        all: credit.map(|credit| credit_view(credit.all)),
        digital: credit.and_then(|credit| credit.digital).map(credit_view),
        physical: credit.and_then(|credit| credit.physical).map(credit_view),
    }))
}
