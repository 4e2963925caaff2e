//! Reimbursement rules.
//!
//! A used booking is reimbursed according to the first custom rule that
//! matches it or, failing that, to the least generous standard rule relevant
//! for the yearly revenue of its pricing point.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, RATE_SCALE, ResultEngine, custom_reimbursement_rules,
    subcategories::{ReimbursementRuleKind, Subcategory},
};

/// Revenue thresholds, in cents.
const THRESHOLD_20K: i64 = 2_000_000;
const THRESHOLD_40K: i64 = 4_000_000;
const THRESHOLD_150K: i64 = 15_000_000;

fn september_2021() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 9, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// What the rules need to know about a booking being priced.
#[derive(Clone, Debug)]
pub struct ReimbursedBooking {
    pub offer_id: Option<Uuid>,
    pub venue_id: Uuid,
    pub offerer_id: Uuid,
    pub subcategory: Option<&'static Subcategory>,
    pub is_digital: bool,
    pub is_collective: bool,
    pub quantity: i64,
    pub total_amount: MoneyCents,
    pub date_used: DateTime<Utc>,
}

impl ReimbursedBooking {
    fn is_book(&self) -> bool {
        self.subcategory.is_some_and(Subcategory::is_book)
    }

    /// Digital offers other than books, cinema cards and remote museum sales
    /// are not reimbursed.
    fn is_not_reimbursed_digital(&self) -> bool {
        self.is_digital
            && self
                .subcategory
                .is_some_and(|s| s.reimbursement_rule == ReimbursementRuleKind::NotReimbursed)
    }

    fn is_in_revenue_bands(&self) -> bool {
        !self.is_collective && !self.is_book() && !self.is_not_reimbursed_digital()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardRule {
    DigitalThings,
    EducationalOffers,
    PhysicalOffers,
    Between20000And40000,
    Between40000And150000,
    Above150000,
    LegacyBetween20000And40000,
    LegacyBetween40000And150000,
    LegacyAbove150000,
    BookBelow20000,
    BookAbove20000,
}

impl StandardRule {
    pub const ALL: [StandardRule; 11] = [
        Self::DigitalThings,
        Self::EducationalOffers,
        Self::PhysicalOffers,
        Self::Between20000And40000,
        Self::Between40000And150000,
        Self::Above150000,
        Self::LegacyBetween20000And40000,
        Self::LegacyBetween40000And150000,
        Self::LegacyAbove150000,
        Self::BookBelow20000,
        Self::BookAbove20000,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Self::DigitalThings => "Pas de remboursement pour les offres digitales",
            Self::EducationalOffers => "Remboursement total pour les offres éducationnelles",
            Self::PhysicalOffers => "Remboursement total pour les offres physiques",
            Self::Between20000And40000 => "Remboursement à 95% entre 20 000 € et 40 000 € par lieu",
            Self::Between40000And150000 => {
                "Remboursement à 92% entre 40 000 € et 150 000 € par lieu"
            }
            Self::Above150000 => "Remboursement à 90% au dessus de 150 000 € par lieu",
            Self::LegacyBetween20000And40000 => {
                "Remboursement à 95% entre 20 000 € et 40 000 € par lieu (ancien barème)"
            }
            Self::LegacyBetween40000And150000 => {
                "Remboursement à 85% entre 40 000 € et 150 000 € par lieu (ancien barème)"
            }
            Self::LegacyAbove150000 => {
                "Remboursement à 70% au dessus de 150 000 € par lieu (ancien barème)"
            }
            Self::BookBelow20000 => "Remboursement total pour les livres jusqu'à 20 000 €",
            Self::BookAbove20000 => "Remboursement à 95% au dessus de 20 000 € pour les livres",
        }
    }

    pub fn from_description(description: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.description() == description)
    }

    /// Rate in basis points.
    pub fn rate_bps(self) -> i64 {
        match self {
            Self::DigitalThings => 0,
            Self::EducationalOffers | Self::PhysicalOffers | Self::BookBelow20000 => RATE_SCALE,
            Self::Between20000And40000
            | Self::LegacyBetween20000And40000
            | Self::BookAbove20000 => 9_500,
            Self::Between40000And150000 => 9_200,
            Self::Above150000 => 9_000,
            Self::LegacyBetween40000And150000 => 8_500,
            Self::LegacyAbove150000 => 7_000,
        }
    }

    /// Validity period `[from, until)` on the date the booking was used.
    fn validity(self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            Self::Between20000And40000 | Self::Between40000And150000 | Self::Above150000 => {
                (Some(september_2021()), None)
            }
            Self::LegacyBetween20000And40000
            | Self::LegacyBetween40000And150000
            | Self::LegacyAbove150000 => (None, Some(september_2021())),
            _ => (None, None),
        }
    }

    pub fn is_active(self, booking: &ReimbursedBooking) -> bool {
        let (from, until) = self.validity();
        from.is_none_or(|from| from <= booking.date_used)
            && until.is_none_or(|until| booking.date_used < until)
    }

    /// `revenue` is the yearly revenue of the pricing point, in cents.
    pub fn is_relevant(self, booking: &ReimbursedBooking, revenue: i64) -> bool {
        match self {
            Self::DigitalThings => !booking.is_collective && booking.is_not_reimbursed_digital(),
            Self::EducationalOffers => booking.is_collective,
            Self::PhysicalOffers => booking.is_in_revenue_bands() && revenue <= THRESHOLD_20K,
            Self::Between20000And40000 | Self::LegacyBetween20000And40000 => {
                booking.is_in_revenue_bands() && THRESHOLD_20K < revenue && revenue <= THRESHOLD_40K
            }
            Self::Between40000And150000 | Self::LegacyBetween40000And150000 => {
                booking.is_in_revenue_bands()
                    && THRESHOLD_40K < revenue
                    && revenue <= THRESHOLD_150K
            }
            Self::Above150000 | Self::LegacyAbove150000 => {
                booking.is_in_revenue_bands() && revenue > THRESHOLD_150K
            }
            Self::BookBelow20000 => {
                !booking.is_collective && booking.is_book() && revenue <= THRESHOLD_20K
            }
            Self::BookAbove20000 => {
                !booking.is_collective && booking.is_book() && revenue > THRESHOLD_20K
            }
        }
    }

    pub fn apply(self, total: MoneyCents) -> MoneyCents {
        total.apply_rate_bps(self.rate_bps())
    }
}

/// The rule that priced a booking.
#[derive(Clone, Debug, PartialEq)]
pub enum AppliedRule {
    Standard(StandardRule),
    Custom(custom_reimbursement_rules::Model),
    CommercialGesture,
}

impl AppliedRule {
    /// Reimbursed amount (positive) for the booking, or for `custom_total`
    /// when the booking price was corrected by an incident.
    pub fn apply(&self, booking: &ReimbursedBooking, custom_total: Option<MoneyCents>) -> MoneyCents {
        let total = custom_total.unwrap_or(booking.total_amount);
        match self {
            Self::Standard(rule) => rule.apply(total),
            Self::Custom(rule) => match (rule.amount, rule.rate) {
                (Some(amount), _) => MoneyCents::new(amount) * booking.quantity,
                (None, Some(rate)) => total.apply_rate_bps(rate),
                (None, None) => MoneyCents::ZERO,
            },
            Self::CommercialGesture => total,
        }
    }

    pub fn standard_description(&self) -> &'static str {
        match self {
            Self::Standard(rule) => rule.description(),
            Self::Custom(_) => "",
            Self::CommercialGesture => "Remboursement total pour les gestes commerciaux",
        }
    }

    pub fn custom_rule_id(&self) -> Option<Uuid> {
        match self {
            Self::Custom(rule) => Some(rule.id),
            _ => None,
        }
    }
}

/// Custom rule matching the booking, by priority offer > venue > offerer.
/// Fails on an active rule whose subcategory list cannot be read.
pub fn find_custom_rule<'a>(
    rules: &'a [custom_reimbursement_rules::Model],
    booking: &ReimbursedBooking,
) -> ResultEngine<Option<&'a custom_reimbursement_rules::Model>> {
    let mut candidates = Vec::new();
    for rule in rules.iter().filter(|rule| rule.is_active(booking.date_used)) {
        let subcategories = rule.subcategories()?;
        if subcategories.is_empty()
            || booking
                .subcategory
                .is_some_and(|s| subcategories.iter().any(|id| id == s.id))
        {
            candidates.push(rule);
        }
    }

    Ok(booking
        .offer_id
        .and_then(|offer_id| {
            candidates
                .iter()
                .find(|rule| rule.offer_id == Some(offer_id))
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|rule| rule.venue_id == Some(booking.venue_id))
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|rule| rule.offerer_id == Some(booking.offerer_id))
        })
        .copied())
}

/// Picks the rule that prices `booking`. Custom rules win; otherwise the
/// relevant standard rule giving the lowest amount is chosen.
pub fn select_rule(
    custom_rules: &[custom_reimbursement_rules::Model],
    booking: &ReimbursedBooking,
    revenue: i64,
) -> ResultEngine<AppliedRule> {
    if let Some(rule) = find_custom_rule(custom_rules, booking)? {
        return Ok(AppliedRule::Custom(rule.clone()));
    }
    StandardRule::ALL
        .into_iter()
        .filter(|rule| rule.is_active(booking) && rule.is_relevant(booking, revenue))
        .min_by_key(|rule| rule.apply(booking.total_amount))
        .map(AppliedRule::Standard)
        .ok_or_else(|| EngineError::InvalidRule("no reimbursement rule applies".to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleTarget {
    Offer(Uuid),
    Venue(Uuid),
    Offerer(Uuid),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleValue {
    /// Per unit.
    Amount(MoneyCents),
    RateBps(i64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCustomRule {
    pub target: RuleTarget,
    pub subcategories: Vec<String>,
    pub value: RuleValue,
    pub timespan_start: DateTime<Utc>,
    pub timespan_end: Option<DateTime<Utc>>,
}

impl NewCustomRule {
    /// Checks that do not need the database.
    pub fn validate(&self, now: DateTime<Utc>) -> ResultEngine<()> {
        if !self.subcategories.is_empty() {
            if matches!(self.target, RuleTarget::Offer(_)) {
                return Err(EngineError::InvalidRule(
                    "a rule on an offer cannot restrict subcategories".to_string(),
                ));
            }
            for id in &self.subcategories {
                Subcategory::get(id)
                    .map_err(|_| EngineError::InvalidRule(format!("unknown subcategory {id}")))?;
            }
        }
        match self.value {
            RuleValue::Amount(amount) if amount.is_negative() => {
                return Err(EngineError::InvalidRule(
                    "amount must be positive".to_string(),
                ));
            }
            RuleValue::RateBps(rate) if !(0..=RATE_SCALE).contains(&rate) => {
                return Err(EngineError::InvalidRule(
                    "rate must be between 0 and 1".to_string(),
                ));
            }
            _ => {}
        }
        if self.timespan_start <= now {
            return Err(EngineError::InvalidRule(
                "start date must be in the future".to_string(),
            ));
        }
        if self.timespan_end.is_some_and(|end| end <= self.timespan_start) {
            return Err(EngineError::InvalidRule(
                "end date must be after start date".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether `[a_start, a_end)` and `[b_start, b_end)` intersect.
pub fn timespans_overlap(
    a_start: DateTime<Utc>,
    a_end: Option<DateTime<Utc>>,
    b_start: DateTime<Utc>,
    b_end: Option<DateTime<Utc>>,
) -> bool {
    a_end.is_none_or(|a_end| b_start < a_end) && b_end.is_none_or(|b_end| a_start < b_end)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn booking(subcategory: &str, digital: bool, euros: i64) -> ReimbursedBooking {
        ReimbursedBooking {
            offer_id: Some(Uuid::new_v4()),
            venue_id: Uuid::new_v4(),
            offerer_id: Uuid::new_v4(),
            subcategory: Some(Subcategory::get(subcategory).unwrap()),
            is_digital: digital,
            is_collective: false,
            quantity: 1,
            total_amount: MoneyCents::from_euros(euros),
            date_used: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    fn standard(booking: &ReimbursedBooking, revenue_euros: i64) -> StandardRule {
        match select_rule(&[], booking, revenue_euros * 100).unwrap() {
            AppliedRule::Standard(rule) => rule,
            other => panic!("unexpected rule {other:?}"),
        }
    }

    #[test]
    fn physical_offers_are_fully_reimbursed_below_20k() {
        let b = booking("SUPPORT_PHYSIQUE_MUSIQUE", false, 10);
        assert_eq!(standard(&b, 20_000), StandardRule::PhysicalOffers);
        assert_eq!(standard(&b, 20_001), StandardRule::Between20000And40000);
        assert_eq!(standard(&b, 40_001), StandardRule::Between40000And150000);
        assert_eq!(standard(&b, 150_001), StandardRule::Above150000);
    }

    #[test]
    fn legacy_bands_before_september_2021() {
        let mut b = booking("CONCERT", false, 10);
        b.date_used = Utc.with_ymd_and_hms(2021, 8, 31, 23, 0, 0).unwrap();
        assert_eq!(standard(&b, 50_000), StandardRule::LegacyBetween40000And150000);
        assert_eq!(standard(&b, 200_000), StandardRule::LegacyAbove150000);
    }

    #[test]
    fn books_stay_at_95_percent_in_every_band() {
        let b = booking("LIVRE_PAPIER", false, 10);
        assert_eq!(standard(&b, 100), StandardRule::BookBelow20000);
        assert_eq!(standard(&b, 200_000), StandardRule::BookAbove20000);
        let ebook = booking("LIVRE_NUMERIQUE", true, 10);
        assert_eq!(standard(&ebook, 200_000), StandardRule::BookAbove20000);
    }

    #[test]
    fn digital_offers_are_not_reimbursed() {
        let b = booking("ABO_PLATEFORME_MUSIQUE", true, 10);
        let rule = select_rule(&[], &b, 0).unwrap();
        assert_eq!(rule, AppliedRule::Standard(StandardRule::DigitalThings));
        assert_eq!(rule.apply(&b, None), MoneyCents::ZERO);

        let cinema_remote = booking("CINE_VENTE_DISTANCE", true, 10);
        assert_eq!(standard(&cinema_remote, 0), StandardRule::PhysicalOffers);
    }

    #[test]
    fn collective_bookings_are_educational() {
        let mut b = booking("CONCERT", false, 1_000);
        b.is_collective = true;
        b.subcategory = None;
        assert_eq!(standard(&b, 1_000_000), StandardRule::EducationalOffers);
    }

    fn custom_rule(
        offer: Option<Uuid>,
        venue: Option<Uuid>,
        offerer: Option<Uuid>,
        rate: i64,
    ) -> custom_reimbursement_rules::Model {
        custom_reimbursement_rules::Model {
            id: Uuid::new_v4(),
            offer_id: offer,
            venue_id: venue,
            offerer_id: offerer,
            subcategories: "[]".to_string(),
            amount: None,
            rate: Some(rate),
            timespan_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            timespan_end: None,
        }
    }

    #[test]
    fn custom_rules_priority() {
        let b = booking("CONCERT", false, 10);
        let by_offerer = custom_rule(None, None, Some(b.offerer_id), 5_000);
        let by_venue = custom_rule(None, Some(b.venue_id), None, 6_000);
        let by_offer = custom_rule(b.offer_id, None, None, 7_000);

        let rules = vec![by_offerer.clone(), by_venue.clone(), by_offer.clone()];
        assert_eq!(find_custom_rule(&rules, &b).unwrap(), Some(&by_offer));
        let rules = vec![by_offerer.clone(), by_venue.clone()];
        assert_eq!(find_custom_rule(&rules, &b).unwrap(), Some(&by_venue));

        let rule = select_rule(&[by_offerer], &b, 0).unwrap();
        assert_eq!(rule.apply(&b, None), MoneyCents::from_euros(5));
    }

    #[test]
    fn custom_rule_ignored_outside_its_period_or_subcategories() {
        let b = booking("CONCERT", false, 10);
        let mut expired = custom_rule(None, Some(b.venue_id), None, 5_000);
        expired.timespan_end = Some(b.date_used);
        let mut books_only = custom_rule(None, Some(b.venue_id), None, 5_000);
        books_only.subcategories = r#"["LIVRE_PAPIER"]"#.to_string();
        assert_eq!(find_custom_rule(&[expired, books_only], &b).unwrap(), None);
    }

    #[test]
    fn unreadable_custom_rule_fails_pricing() {
        let b = booking("CONCERT", false, 10);
        let mut corrupt = custom_rule(None, Some(b.venue_id), None, 5_000);
        corrupt.subcategories = "LIVRE_PAPIER".to_string();
        let err = select_rule(&[corrupt.clone()], &b, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule(_)));

        corrupt.timespan_end = Some(b.date_used);
        assert_eq!(find_custom_rule(&[corrupt], &b).unwrap(), None);
    }

    #[test]
    fn custom_amount_is_per_unit() {
        let mut b = booking("SEANCE_CINE", false, 20);
        b.quantity = 2;
        let mut rule = custom_rule(b.offer_id, None, None, 0);
        rule.rate = None;
        rule.amount = Some(700);
        assert_eq!(
            AppliedRule::Custom(rule).apply(&b, None),
            MoneyCents::new(1_400)
        );
    }

    #[test]
    fn new_rule_validation() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let valid = NewCustomRule {
            target: RuleTarget::Venue(Uuid::new_v4()),
            subcategories: vec!["LIVRE_PAPIER".to_string()],
            value: RuleValue::RateBps(9_000),
            timespan_start: now + Duration::days(1),
            timespan_end: None,
        };
        assert!(valid.validate(now).is_ok());

        let on_offer = NewCustomRule {
            target: RuleTarget::Offer(Uuid::new_v4()),
            ..valid.clone()
        };
        assert!(on_offer.validate(now).is_err());

        let bad_rate = NewCustomRule {
            value: RuleValue::RateBps(12_000),
            ..valid.clone()
        };
        assert!(bad_rate.validate(now).is_err());

        let past = NewCustomRule {
            timespan_start: now - Duration::days(1),
            ..valid.clone()
        };
        assert!(past.validate(now).is_err());
    }

    #[test]
    fn overlap() {
        let t = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        assert!(timespans_overlap(t(1), None, t(5), Some(t(6))));
        assert!(!timespans_overlap(t(1), Some(t(5)), t(5), None));
        assert!(timespans_overlap(t(1), Some(t(6)), t(5), None));
    }
}
