//! JSON payloads exchanged with the HTTP API.
//!
//! Amounts are integer euro cents, rates are basis points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub mod booking {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BookingNew {
        pub stock_id: Uuid,
        #[serde(default = "one")]
        pub quantity: i64,
    }

    fn one() -> i64 {
        1
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BookingView {
        pub id: Uuid,
        pub token: String,
        pub stock_id: Uuid,
        pub status: String,
        pub quantity: i64,
        pub amount_cents: i64,
        pub total_amount_cents: i64,
        pub cancellation_reason: Option<String>,
        pub date_created: DateTime<Utc>,
        pub date_used: Option<DateTime<Utc>>,
        pub cancellation_date: Option<DateTime<Utc>>,
        pub cancellation_limit_date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserBookingView {
        pub booking: BookingView,
        pub offer_id: Uuid,
        pub offer_name: String,
        pub subcategory_id: String,
        pub beginning_datetime: Option<DateTime<Utc>>,
        pub activation_code: Option<String>,
        pub expiration_date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserBookings {
        pub ended: Vec<UserBookingView>,
        pub ongoing: Vec<UserBookingView>,
    }

    /// Backoffice cancellation.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BookingCancel {
        /// One of `offerer`, `beneficiary`, `expired`, `fraud`, ...
        pub reason: String,
    }
}

pub mod wallet {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreditView {
        pub initial_cents: i64,
        pub remaining_cents: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletView {
        pub balance_cents: i64,
        pub all: Option<CreditView>,
        pub digital: Option<CreditView>,
        pub physical: Option<CreditView>,
    }
}

pub mod offer {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OfferNew {
        pub venue_id: Uuid,
        pub name: String,
        pub subcategory_id: String,
        #[serde(default)]
        pub is_duo: bool,
        pub url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OfferView {
        pub id: Uuid,
        pub venue_id: Uuid,
        pub name: String,
        pub subcategory_id: String,
        pub is_duo: bool,
        pub url: Option<String>,
        pub is_active: bool,
        pub validation: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StockNew {
        pub price_cents: i64,
        /// `None` for unlimited stocks.
        pub quantity: Option<i64>,
        pub beginning_datetime: Option<DateTime<Utc>>,
        pub booking_limit_datetime: Option<DateTime<Utc>>,
    }

    /// Every field is optional; `null` clears the nullable ones.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct StockUpdate {
        pub price_cents: Option<i64>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub quantity: Option<Option<i64>>,
        pub beginning_datetime: Option<DateTime<Utc>>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub booking_limit_datetime: Option<Option<DateTime<Utc>>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StockView {
        pub id: Uuid,
        pub offer_id: Uuid,
        pub price_cents: i64,
        pub quantity: Option<i64>,
        pub dn_booked_quantity: i64,
        pub beginning_datetime: Option<DateTime<Utc>>,
        pub booking_limit_datetime: Option<DateTime<Utc>>,
        pub is_soft_deleted: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StockDeleted {
        pub cancelled_bookings: Vec<Uuid>,
    }

    /// Ids of the offers to validate or reject.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct OfferIds {
        pub ids: Vec<Uuid>,
    }
}

pub mod collective {
    use super::*;

    /// Query string of the backoffice search. List filters are comma
    /// separated.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CollectiveOfferQuery {
        pub ids: Option<String>,
        pub name: Option<String>,
        pub venue_id: Option<Uuid>,
        pub offerer_id: Option<Uuid>,
        pub validation: Option<String>,
        pub statuses: Option<String>,
        pub price_min_cents: Option<i64>,
        pub price_max_cents: Option<i64>,
        pub event_from: Option<DateTime<Utc>>,
        pub event_to: Option<DateTime<Utc>>,
        pub departments: Option<String>,
        pub formats: Option<String>,
        pub only_validated_offerers: Option<bool>,
        /// `asc` or `desc` (default).
        pub sort: Option<String>,
        pub limit: Option<usize>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CollectiveOfferView {
        pub id: Uuid,
        pub venue_id: Uuid,
        pub name: String,
        pub formats: Vec<String>,
        pub validation: String,
        pub status: String,
        pub price_cents: Option<i64>,
        pub number_of_tickets: Option<i64>,
        pub beginning_datetime: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CollectiveOfferList {
        pub offers: Vec<CollectiveOfferView>,
        /// More offers matched than `limit`.
        pub truncated: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CollectivePriceEdit {
        pub price_cents: i64,
        pub number_of_tickets: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CollectiveStockView {
        pub id: Uuid,
        pub collective_offer_id: Uuid,
        pub price_cents: i64,
        pub number_of_tickets: i64,
        pub beginning_datetime: DateTime<Utc>,
        pub booking_limit_datetime: DateTime<Utc>,
    }
}

pub mod incident {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct OverpaymentNew {
        pub booking_ids: Vec<Uuid>,
        pub origin: String,
        /// Amount to recover for a single booking, the whole booking otherwise.
        pub amount_cents: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CollectiveOverpaymentNew {
        pub collective_booking_id: Uuid,
        pub origin: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CommercialGestureNew {
        pub booking_ids: Vec<Uuid>,
        pub origin: String,
        pub amount_cents: i64,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct IncidentValidate {
        #[serde(default)]
        pub force_debit_note: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IncidentCancel {
        pub comment: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IncidentView {
        pub id: Uuid,
        pub kind: String,
        pub status: String,
        pub venue_id: Uuid,
        pub force_debit_note: bool,
        pub validation_date: Option<DateTime<Utc>>,
    }
}

pub mod rule {
    use super::*;

    /// Exactly one target and one of `amount_cents` / `rate_bps`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleNew {
        pub offer_id: Option<Uuid>,
        pub venue_id: Option<Uuid>,
        pub offerer_id: Option<Uuid>,
        #[serde(default)]
        pub subcategories: Vec<String>,
        pub amount_cents: Option<i64>,
        pub rate_bps: Option<i64>,
        pub timespan_start: DateTime<Utc>,
        pub timespan_end: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleView {
        pub id: Uuid,
        pub offer_id: Option<Uuid>,
        pub venue_id: Option<Uuid>,
        pub offerer_id: Option<Uuid>,
        pub amount_cents: Option<i64>,
        pub rate_bps: Option<i64>,
        pub timespan_start: DateTime<Utc>,
        pub timespan_end: Option<DateTime<Utc>>,
    }
}

pub mod finance {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct PriceEvents {
        pub min_date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PricingSummary {
        pub priced: usize,
        pub failed: usize,
        pub skipped: usize,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CashflowsNew {
        pub cutoff: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CashflowView {
        pub id: Uuid,
        pub bank_account_id: Uuid,
        pub status: String,
        pub amount_cents: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CashflowBatchView {
        pub id: Uuid,
        pub label: String,
        pub cutoff: DateTime<Utc>,
        pub cashflows: Vec<CashflowView>,
        pub skipped_bank_accounts: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceView {
        pub id: Uuid,
        pub reference: String,
        pub bank_account_id: Uuid,
        pub amount_cents: i64,
        pub date: DateTime<Utc>,
    }
}

#[cfg(test)]
mod tests {
    use super::offer::StockUpdate;

    #[test]
    fn stock_update_tells_null_from_absent() {
        let update: StockUpdate = serde_json::from_str(r#"{"quantity": null}"#).unwrap();
        assert_eq!(update.quantity, Some(None));
        assert_eq!(update.booking_limit_datetime, None);

        let update: StockUpdate = serde_json::from_str(r#"{"quantity": 4}"#).unwrap();
        assert_eq!(update.quantity, Some(Some(4)));
    }
}
