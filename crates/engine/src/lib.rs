//! Booking and reimbursement core of pass Culture.
//!
//! Beneficiaries book offers proposed by venues with the credit of their
//! deposit; once a booking is used it produces a finance event, which is
//! priced according to reimbursement rules and finally paid to the offerer
//! through cashflows and invoices.
//!
//! Every operation lives on [`Engine`], which owns the database connection.

/// Declares a string-backed enum stored in a text column, with `as_str`,
/// `TryFrom<&str>` and serde support using the same names.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl TryFrom<&str> for $name {
            type Error = $crate::EngineError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::EngineError::InvalidState(format!(
                        concat!("invalid ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use db_enum;

pub use bookings::{BookingStatus, CancellationReason, UserBooking, ValidationAuthorType};
pub use collective_bookings::CollectiveBookingStatus;
pub use collective_offers::CollectiveOfferStatus;
pub use deposits::DepositType;
pub use error::EngineError;
pub use finance_events::{FinanceEventMotive, FinanceEventStatus};
pub use finance_incidents::{IncidentStatus, IncidentType};
pub use money::{MoneyCents, RATE_SCALE};
pub use offers::{OfferValidation, ValidationType};
pub use ops::{
    CashflowGeneration, CollectiveOfferRow, CollectiveOfferSearch, DEBIT_NOTE_MIN_AGE_DAYS,
    DEFAULT_CASHFLOW_LOCK_TIMEOUT_MINUTES, DepositEligibility, Engine, EngineBuilder,
    NewCollectiveOffer, NewCollectiveStock, NewOffer, NewStock, NewUser, NewVenue,
    OffererScope, PricingSummary, SortOrder, StockEdit, derive_collective_status,
};
pub use pricings::PricingStatus;
pub use reimbursement::{NewCustomRule, RuleTarget, RuleValue, StandardRule};
pub use subcategories::Subcategory;
pub use users::UserRole;
pub use wallet::{Credit, DomainsCredit};

pub mod activation_codes;
pub mod app_locks;
pub mod bank_accounts;
pub mod booking_finance_incidents;
pub mod bookings;
pub mod cashflow_batches;
pub mod cashflow_pricings;
pub mod cashflows;
pub mod collective_bookings;
pub mod collective_offers;
pub mod collective_stocks;
pub mod custom_reimbursement_rules;
pub mod deposits;
mod error;
pub mod finance_events;
pub mod finance_incidents;
pub mod invoice_cashflows;
pub mod invoices;
mod money;
pub mod offerers;
pub mod offers;
mod ops;
pub mod pricing_lines;
pub mod pricing_logs;
pub mod pricings;
pub mod recredits;
pub mod reimbursement;
pub mod stocks;
pub mod subcategories;
pub mod user_offerers;
pub mod users;
pub mod util;
pub mod venue_bank_account_links;
pub mod venue_pricing_point_links;
pub mod venues;
pub mod wallet;

type ResultEngine<T> = Result<T, EngineError>;
