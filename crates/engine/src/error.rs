//! The module contains the errors the engine can throw.
//!
//! Most variants carry a human readable message. The web layer maps each
//! variant to an HTTP status:
//!
//! - [`KeyNotFound`] when a row does not exist (or is not visible to the caller).
//! - [`BookingRefused`] when one of the booking checks fails.
//! - [`AlreadyUsed`], [`AlreadyCancelled`], [`AlreadyReimbursed`] when a
//!   booking is already past the requested state.
//! - [`NonCancellablePricing`] when a pricing has already left the cancellable
//!   statuses (it is part of a cashflow or an invoice).
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`BookingRefused`]: EngineError::BookingRefused
//!  [`AlreadyUsed`]: EngineError::AlreadyUsed
//!  [`AlreadyCancelled`]: EngineError::AlreadyCancelled
//!  [`AlreadyReimbursed`]: EngineError::AlreadyReimbursed
//!  [`NonCancellablePricing`]: EngineError::NonCancellablePricing
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Booking refused: {0}")]
    BookingRefused(String),
    #[error("Invalid reimbursement rule: {0}")]
    InvalidRule(String),
    #[error("Booking already used: {0}")]
    AlreadyUsed(String),
    #[error("Booking already cancelled: {0}")]
    AlreadyCancelled(String),
    #[error("Booking already reimbursed: {0}")]
    AlreadyReimbursed(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Pricing cannot be cancelled: {0}")]
    NonCancellablePricing(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::BookingRefused(a), Self::BookingRefused(b)) => a == b,
            (Self::InvalidRule(a), Self::InvalidRule(b)) => a == b,
            (Self::AlreadyUsed(a), Self::AlreadyUsed(b)) => a == b,
            (Self::AlreadyCancelled(a), Self::AlreadyCancelled(b)) => a == b,
            (Self::AlreadyReimbursed(a), Self::AlreadyReimbursed(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::NonCancellablePricing(a), Self::NonCancellablePricing(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
