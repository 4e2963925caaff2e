//! Beneficiary booking endpoints.

use api_types::booking::{BookingNew, BookingView, UserBookingView, UserBookings};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{UserBooking, bookings, users};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

pub(crate) fn booking_view(booking: &bookings::Model) -> BookingView {
    BookingView {
        id: booking.id,
        token: booking.token.clone(),
        stock_id: booking.stock_id,
        status: booking.status.clone(),
        quantity: booking.quantity,
        amount_cents: booking.amount,
        total_amount_cents: booking.total_amount().cents(),
        cancellation_reason: booking.cancellation_reason.clone(),
        date_created: booking.date_created,
        date_used: booking.date_used,
        cancellation_date: booking.cancellation_date,
        cancellation_limit_date: booking.cancellation_limit_date,
    }
}

fn user_booking_view(user_booking: &UserBooking) -> UserBookingView {
    UserBookingView {
        booking: booking_view(&user_booking.booking),
        offer_id: user_booking.offer_id,
        offer_name: user_booking.offer_name.clone(),
        subcategory_id: user_booking.subcategory.id.to_string(),
        beginning_datetime: user_booking.beginning_datetime,
        activation_code: user_booking.activation_code.clone(),
        expiration_date: user_booking.expiration_date(),
    }
}

pub async fn book(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<BookingNew>,
) -> Result<(StatusCode, Json<BookingView>), ServerError> {
    let booking = state
        .engine
        .book_offer(user.id, payload.stock_id, payload.quantity, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(booking_view(&booking))))
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<UserBookings>, ServerError> {
    let (ended, ongoing) = state.engine.user_bookings(user.id, Utc::now()).await?;
    Ok(Json(UserBookings {
        ended: ended.iter().map(user_booking_view).collect(),
        ongoing: ongoing.iter().map(user_booking_view).collect(),
    }))
}

pub async fn cancel(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingView>, ServerError> {
    let booking = state
        .engine
        .cancel_booking_by_beneficiary(user.id, booking_id, Utc::now())
        .await?;
    Ok(Json(booking_view(&booking)))
}
