use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod backoffice;
mod bookings;
mod collective;
mod finance;
mod incidents;
mod pro;
mod server;
mod wallet;

pub mod types {
    pub mod booking {
        pub use api_types::booking::{
            BookingCancel, BookingNew, BookingView, UserBookingView, UserBookings,
        };
    }

    pub mod wallet {
        pub use api_types::wallet::{CreditView, WalletView};
    }

    pub mod offer {
        pub use api_types::offer::{
            OfferIds, OfferNew, OfferView, StockDeleted, StockNew, StockUpdate, StockView,
        };
    }

    pub mod collective {
        pub use api_types::collective::{
            CollectiveOfferList, CollectiveOfferQuery, CollectiveOfferView, CollectivePriceEdit,
            CollectiveStockView,
        };
    }

    pub mod incident {
        pub use api_types::incident::{
            CollectiveOverpaymentNew, CommercialGestureNew, IncidentCancel, IncidentValidate,
            IncidentView, OverpaymentNew,
        };
    }

    pub mod finance {
        pub use api_types::finance::{
            CashflowBatchView, CashflowView, CashflowsNew, InvoiceView, PriceEvents,
            PricingSummary,
        };
        pub use api_types::rule::{RuleNew, RuleView};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_)
        | EngineError::InvalidState(_)
        | EngineError::NonCancellablePricing(_) => StatusCode::CONFLICT,
        EngineError::AlreadyUsed(_)
        | EngineError::AlreadyCancelled(_)
        | EngineError::AlreadyReimbursed(_) => StatusCode::GONE,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InsufficientFunds(_)
        | EngineError::BookingRefused(_)
        | EngineError::InvalidRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_transitions_map_to_409() {
        for err in [
            EngineError::ExistingKey("x".to_string()),
            EngineError::InvalidState("x".to_string()),
            EngineError::NonCancellablePricing("x".to_string()),
        ] {
            assert_eq!(ServerError::from(err).into_response().status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn finished_bookings_map_to_410() {
        for err in [
            EngineError::AlreadyUsed("x".to_string()),
            EngineError::AlreadyCancelled("x".to_string()),
            EngineError::AlreadyReimbursed("x".to_string()),
        ] {
            assert_eq!(ServerError::from(err).into_response().status(), StatusCode::GONE);
        }
    }

    #[test]
    fn refused_booking_maps_to_422() {
        let res = ServerError::from(EngineError::BookingRefused("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
