//! Endpoints for offerers: counter checks by token, offers and stocks.

use api_types::{
    booking::BookingView,
    offer::{OfferNew, OfferView, StockDeleted, StockNew, StockUpdate, StockView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    MoneyCents, NewOffer, NewStock, OffererScope, StockEdit, ValidationAuthorType, bookings,
    offers, stocks, users,
};
use uuid::Uuid;

use crate::{ServerError, bookings::booking_view, server::ServerState};

pub(crate) fn offer_view(offer: &offers::Model) -> OfferView {
    OfferView {
        id: offer.id,
        venue_id: offer.venue_id,
        name: offer.name.clone(),
        subcategory_id: offer.subcategory_id.clone(),
        is_duo: offer.is_duo,
        url: offer.url.clone(),
        is_active: offer.is_active,
        validation: offer.validation.clone(),
    }
}

fn stock_view(stock: &stocks::Model) -> StockView {
    StockView {
        id: stock.id,
        offer_id: stock.offer_id,
        price_cents: stock.price,
        quantity: stock.quantity,
        dn_booked_quantity: stock.dn_booked_quantity,
        beginning_datetime: stock.beginning_datetime,
        booking_limit_datetime: stock.booking_limit_datetime,
        is_soft_deleted: stock.is_soft_deleted,
    }
}

/// Finds a booking by its counter token, refusing bookings of offerers the
/// user is not attached to.
async fn owned_booking(
    state: &ServerState,
    user: &users::Model,
    token: &str,
) -> Result<bookings::Model, ServerError> {
    let booking = state.engine.booking_by_token(token).await?;
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Booking(booking.id))
        .await?;
    Ok(booking)
}

pub async fn booking_by_token(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = owned_booking(&state, &user, &token).await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn use_booking(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = owned_booking(&state, &user, &token).await?;
    let booking = state
        .engine
        .mark_as_used(booking.id, ValidationAuthorType::Offerer, Utc::now())
        .await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn unuse_booking(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = owned_booking(&state, &user, &token).await?;
    let booking = state.engine.mark_as_unused(booking.id, Utc::now()).await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn cancel_booking(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = owned_booking(&state, &user, &token).await?;
    let booking = state
        .engine
        .cancel_booking_by_offerer(booking.id, Utc::now())
        .await?;
    Ok(Json(booking_view(&booking)))
}

pub async fn offer_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OfferNew>,
) -> Result<(StatusCode, Json<OfferView>), ServerError> {
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Venue(payload.venue_id))
        .await?;
    let offer = state
        .engine
        .create_offer(
            NewOffer {
                venue_id: payload.venue_id,
                name: payload.name,
                subcategory_id: payload.subcategory_id,
                is_duo: payload.is_duo,
                url: payload.url,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(offer_view(&offer))))
}

pub async fn offer_publish(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<OfferView>, ServerError> {
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Offer(offer_id))
        .await?;
    let offer = state.engine.publish_offer(offer_id).await?;
    Ok(Json(offer_view(&offer)))
}

pub async fn stock_new(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(offer_id): Path<Uuid>,
    Json(payload): Json<StockNew>,
) -> Result<(StatusCode, Json<StockView>), ServerError> {
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Offer(offer_id))
        .await?;
    let stock = state
        .engine
        .create_stock(
            offer_id,
            NewStock {
                price: MoneyCents::new(payload.price_cents),
                quantity: payload.quantity,
                beginning_datetime: payload.beginning_datetime,
                booking_limit_datetime: payload.booking_limit_datetime,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(stock_view(&stock))))
}

pub async fn stock_update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(stock_id): Path<Uuid>,
    Json(payload): Json<StockUpdate>,
) -> Result<Json<StockView>, ServerError> {
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Stock(stock_id))
        .await?;
    let edit = StockEdit {
        price: payload.price_cents.map(MoneyCents::new),
        quantity: payload.quantity,
        beginning_datetime: payload.beginning_datetime,
        booking_limit_datetime: payload.booking_limit_datetime,
    };
    let stock = state.engine.edit_stock(stock_id, edit, Utc::now()).await?;
    Ok(Json(stock_view(&stock)))
}

pub async fn stock_delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(stock_id): Path<Uuid>,
) -> Result<Json<StockDeleted>, ServerError> {
    state
        .engine
        .check_offerer_access(user.id, OffererScope::Stock(stock_id))
        .await?;
    let cancelled = state.engine.delete_stock(stock_id, Utc::now()).await?;
    Ok(Json(StockDeleted {
        cancelled_bookings: cancelled.iter().map(|booking| booking.id).collect(),
    }))
}
