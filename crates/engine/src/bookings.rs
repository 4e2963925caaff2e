//! Individual bookings.
//!
//! A booking is created `confirmed`, becomes `used` when the beneficiary
//! collects it, may be `cancelled` by several actors, and ends `reimbursed`
//! once the offerer has been paid.

use std::cmp::Reverse;

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{MoneyCents, ResultEngine, stocks::EVENT_DELAY_HOURS, subcategories::Subcategory};

crate::db_enum! {
    BookingStatus {
        Confirmed => "confirmed",
        Used => "used",
        Cancelled => "cancelled",
        Reimbursed => "reimbursed",
    }
}

crate::db_enum! {
    CancellationReason {
        Offerer => "offerer",
        Beneficiary => "beneficiary",
        Expired => "expired",
        Fraud => "fraud",
        RefusedByInstitute => "refused_by_institute",
        FinanceIncident => "finance_incident",
        Backoffice => "backoffice",
    }
}

crate::db_enum! {
    ValidationAuthorType {
        Offerer => "offerer",
        Backoffice => "backoffice",
        Auto => "auto",
    }
}

/// Days after which an unused thing booking is cancelled.
pub const BOOKINGS_AUTO_EXPIRY_DAYS: i64 = 30;
pub const BOOKS_BOOKINGS_AUTO_EXPIRY_DAYS: i64 = 10;

const TOKEN_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const TOKEN_LENGTH: usize = 6;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub deposit_id: Option<Uuid>,
    pub stock_id: Uuid,
    pub venue_id: Uuid,
    pub offerer_id: Uuid,
    pub quantity: i64,
    /// Unit price at booking time, in cents.
    pub amount: i64,
    #[sea_orm(unique)]
    pub token: String,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub validation_author_type: Option<String>,
    pub date_created: DateTimeUtc,
    pub date_used: Option<DateTimeUtc>,
    pub cancellation_date: Option<DateTimeUtc>,
    pub cancellation_limit_date: Option<DateTimeUtc>,
    pub reimbursement_date: Option<DateTimeUtc>,
    pub display_as_ended: Option<bool>,
}

impl Model {
    pub fn status(&self) -> ResultEngine<BookingStatus> {
        BookingStatus::try_from(self.status.as_str())
    }

    pub fn cancellation_reason(&self) -> ResultEngine<Option<CancellationReason>> {
        self.cancellation_reason
            .as_deref()
            .map(CancellationReason::try_from)
            .transpose()
    }

    /// `amount × quantity`.
    pub fn total_amount(&self) -> MoneyCents {
        MoneyCents::new(self.amount) * self.quantity
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled.as_str()
    }

    pub fn is_used_or_reimbursed(&self) -> bool {
        self.status == BookingStatus::Used.as_str()
            || self.status == BookingStatus::Reimbursed.as_str()
    }
}

/// Last instant a beneficiary may cancel an event booking: 48h after the
/// booking, but never later than 48h before the event (and never before the
/// booking itself). Things have no limit.
pub fn compute_cancellation_limit_date(
    beginning: Option<DateTime<Utc>>,
    booking_date: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let beginning = beginning?;
    let delay = Duration::hours(EVENT_DELAY_HOURS);
    let limit = (beginning - delay).min(booking_date + delay);
    Some(limit.max(booking_date))
}

/// Delay after which an unused booking of this subcategory expires.
pub fn expiration_delay(subcategory: &Subcategory) -> Option<Duration> {
    if !subcategory.can_expire {
        return None;
    }
    if subcategory.is_book() {
        Some(Duration::days(BOOKS_BOOKINGS_AUTO_EXPIRY_DAYS))
    } else {
        Some(Duration::days(BOOKINGS_AUTO_EXPIRY_DAYS))
    }
}

/// Counter token read by offerers to check a booking.
pub fn generate_token() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    bytes
        .iter()
        .take(TOKEN_LENGTH)
        .map(|byte| char::from(TOKEN_ALPHABET[usize::from(*byte) % TOKEN_ALPHABET.len()]))
        .collect()
}

/// A booking as listed in the beneficiary's account.
#[derive(Clone, Debug)]
pub struct UserBooking {
    pub booking: Model,
    pub offer_id: Uuid,
    pub offer_name: String,
    pub subcategory: &'static Subcategory,
    pub beginning_datetime: Option<DateTime<Utc>>,
    pub activation_code: Option<String>,
}

impl UserBooking {
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        if self.booking.status != BookingStatus::Confirmed.as_str() {
            return None;
        }
        expiration_delay(self.subcategory).map(|delay| self.booking.date_created + delay)
    }

    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        if self.beginning_datetime.is_some_and(|beginning| beginning > now) {
            return false;
        }
        if self.activation_code.is_some() {
            return self.booking.display_as_ended.unwrap_or(false);
        }
        if self.booking.is_used_or_reimbursed() {
            return !self.subcategory.is_permanent();
        }
        self.booking.is_cancelled()
    }
}

/// Splits bookings into `(ended, ongoing)` and sorts both lists the way the
/// beneficiary app displays them.
pub fn classify_user_bookings(
    bookings: Vec<UserBooking>,
    now: DateTime<Utc>,
) -> (Vec<UserBooking>, Vec<UserBooking>) {
    let (mut ended, mut ongoing): (Vec<_>, Vec<_>) =
        bookings.into_iter().partition(|booking| booking.is_ended(now));

    ended.sort_by_key(|booking| {
        Reverse(
            booking
                .beginning_datetime
                .or(booking.booking.date_used)
                .or(booking.booking.cancellation_date),
        )
    });

    // Missing dates go last, ties are broken by the newest booking first.
    ongoing.sort_by_key(|booking| {
        let key = booking.expiration_date().or(booking.beginning_datetime);
        (key.is_none(), key, Reverse(booking.booking.date_created))
    });

    (ended, ongoing)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::stocks::Entity",
        from = "Column::StockId",
        to = "super::stocks::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Stock,
    #[sea_orm(
        belongs_to = "super::deposits::Entity",
        from = "Column::DepositId",
        to = "super::deposits::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Deposit,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::stocks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl Related<super::deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deposit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn booking(status: BookingStatus, created: DateTime<Utc>) -> Model {
        Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            deposit_id: None,
            stock_id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            offerer_id: Uuid::new_v4(),
            quantity: 1,
            amount: 1000,
            token: generate_token(),
            status: status.as_str().to_string(),
            cancellation_reason: None,
            validation_author_type: None,
            date_created: created,
            date_used: None,
            cancellation_date: None,
            cancellation_limit_date: None,
            reimbursement_date: None,
            display_as_ended: None,
        }
    }

    fn user_booking(
        booking: Model,
        subcategory: &str,
        beginning: Option<DateTime<Utc>>,
    ) -> UserBooking {
        UserBooking {
            booking,
            offer_id: Uuid::new_v4(),
            offer_name: "offer".to_string(),
            subcategory: Subcategory::get(subcategory).unwrap(),
            beginning_datetime: beginning,
            activation_code: None,
        }
    }

    #[test]
    fn cancellation_limit_for_far_event_is_48h_after_booking() {
        let booked = at(1, 10);
        let limit = compute_cancellation_limit_date(Some(at(20, 10)), booked);
        assert_eq!(limit, Some(at(3, 10)));
    }

    #[test]
    fn cancellation_limit_for_close_event_is_48h_before_it() {
        let booked = at(1, 10);
        let limit = compute_cancellation_limit_date(Some(at(4, 0)), booked);
        assert_eq!(limit, Some(at(2, 0)));
    }

    #[test]
    fn cancellation_limit_never_before_booking() {
        let booked = at(1, 10);
        let limit = compute_cancellation_limit_date(Some(at(2, 0)), booked);
        assert_eq!(limit, Some(booked));
        assert_eq!(compute_cancellation_limit_date(None, booked), None);
    }

    #[test]
    fn expiration_delays() {
        let book = Subcategory::get("LIVRE_PAPIER").unwrap();
        let instrument = Subcategory::get("ACHAT_INSTRUMENT").unwrap();
        let ebook = Subcategory::get("LIVRE_NUMERIQUE").unwrap();
        assert_eq!(expiration_delay(book), Some(Duration::days(10)));
        assert_eq!(expiration_delay(instrument), Some(Duration::days(30)));
        assert_eq!(expiration_delay(ebook), None);
    }

    #[test]
    fn token_is_six_uppercase_alphanumerics() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn classification_of_user_bookings() {
        let now = at(15, 12);

        let future_used_event = {
            let mut b = booking(BookingStatus::Used, at(1, 0));
            b.date_used = Some(at(2, 0));
            user_booking(b, "SEANCE_CINE", Some(at(20, 0)))
        };
        let used_book = {
            let mut b = booking(BookingStatus::Used, at(2, 0));
            b.date_used = Some(at(5, 0));
            user_booking(b, "LIVRE_PAPIER", None)
        };
        let used_subscription = {
            let mut b = booking(BookingStatus::Used, at(3, 0));
            b.date_used = Some(at(3, 0));
            user_booking(b, "ABO_PLATEFORME_MUSIQUE", None)
        };
        let cancelled = {
            let mut b = booking(BookingStatus::Cancelled, at(4, 0));
            b.cancellation_date = Some(at(6, 0));
            user_booking(b, "LIVRE_PAPIER", None)
        };
        let confirmed_book = user_booking(booking(BookingStatus::Confirmed, at(10, 0)), "LIVRE_PAPIER", None);

        let (ended, ongoing) = classify_user_bookings(
            vec![
                future_used_event.clone(),
                used_book.clone(),
                used_subscription.clone(),
                cancelled.clone(),
                confirmed_book.clone(),
            ],
            now,
        );

        let ended_ids: Vec<_> = ended.iter().map(|b| b.booking.id).collect();
        assert_eq!(ended_ids, vec![cancelled.booking.id, used_book.booking.id]);

        let ongoing_ids: Vec<_> = ongoing.iter().map(|b| b.booking.id).collect();
        // Confirmed book expires on the 20th at midnight, same as the event date;
        // the newest booking comes first. The subscription has no date.
        assert_eq!(
            ongoing_ids,
            vec![
                confirmed_book.booking.id,
                future_used_event.booking.id,
                used_subscription.booking.id
            ]
        );
    }

    #[test]
    fn activation_code_bookings_end_on_demand() {
        let now = at(15, 12);
        let mut b = booking(BookingStatus::Used, at(1, 0));
        b.date_used = Some(at(1, 0));
        let mut with_code = user_booking(b, "LIVRE_NUMERIQUE", None);
        with_code.activation_code = Some("CODE".to_string());
        assert!(!with_code.is_ended(now));
        with_code.booking.display_as_ended = Some(true);
        assert!(with_code.is_ended(now));
    }
}
