//! Backoffice moderation, booking corrections and reimbursement rules.

use api_types::{
    booking::{BookingCancel, BookingView},
    offer::{OfferIds, OfferView},
    rule::{RuleNew, RuleView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    CancellationReason, MoneyCents, NewCustomRule, RuleTarget, RuleValue, ValidationAuthorType,
    custom_reimbursement_rules, users,
};
use uuid::Uuid;

use crate::{ServerError, bookings::booking_view, pro::offer_view, server::ServerState};

fn rule_view(rule: &custom_reimbursement_rules::Model) -> RuleView {
    RuleView {
        id: rule.id,
        offer_id: rule.offer_id,
        venue_id: rule.venue_id,
        offerer_id: rule.offerer_id,
        amount_cents: rule.amount,
        rate_bps: rule.rate,
        timespan_start: rule.timespan_start,
        timespan_end: rule.timespan_end,
    }
}

fn rule_target(payload: &RuleNew) -> Result<RuleTarget, ServerError> {
    match (payload.offer_id, payload.venue_id, payload.offerer_id) {
        (Some(id), None, None) => Ok(RuleTarget::Offer(id)),
        (None, Some(id), None) => Ok(RuleTarget::Venue(id)),
        (None, None, Some(id)) => Ok(RuleTarget::Offerer(id)),
        _ => Err(ServerError::Generic(
            "exactly one of offer_id, venue_id and offerer_id is required".to_string(),
        )),
    }
}

fn rule_value(payload: &RuleNew) -> Result<RuleValue, ServerError> {
    match (payload.amount_cents, payload.rate_bps) {
        (Some(amount), None) => Ok(RuleValue::Amount(MoneyCents::new(amount))),
        (None, Some(rate)) => Ok(RuleValue::RateBps(rate)),
        _ => Err(ServerError::Generic(
            "exactly one of amount_cents and rate_bps is required".to_string(),
        )),
    }
}

pub async fn validate_offers(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OfferIds>,
) -> Result<Json<Vec<OfferView>>, ServerError> {
    let offers = state
        .engine
        .validate_offers(&payload.ids, user.id, Utc::now())
        .await?;
    Ok(Json(offers.iter().map(offer_view).collect()))
}

pub async fn reject_offers(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OfferIds>,
) -> Result<Json<Vec<OfferView>>, ServerError> {
    let offers = state
        .engine
        .reject_offers(&payload.ids, user.id, Utc::now())
        .await?;
    Ok(Json(offers.iter().map(offer_view).collect()))
}

pub async fn cancel_booking(
    State(state): State<ServerState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<BookingCancel>,
) -> Result<Json<BookingView>, ServerError> {
    let reason = CancellationReason::try_from(payload.reason.as_str())
        .map_err(|err| ServerError::Generic(err.to_string()))?;
    let booking = state
        .engine
        .mark_as_cancelled(booking_id, reason, Utc::now())
        .await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn uncancel_booking(
    State(state): State<ServerState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = state
        .engine
        .mark_as_used_with_uncancelling(booking_id, ValidationAuthorType::Backoffice, Utc::now())
        .await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn rule_new(
    State(state): State<ServerState>,
    Json(payload): Json<RuleNew>,
) -> Result<(StatusCode, Json<RuleView>), ServerError> {
    let new_rule = NewCustomRule {
        target: rule_target(&payload)?,
        value: rule_value(&payload)?,
        subcategories: payload.subcategories,
        timespan_start: payload.timespan_start,
        timespan_end: payload.timespan_end,
    };
    let rule = state
        .engine
        .create_custom_reimbursement_rule(new_rule, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(rule_view(&rule))))
}
