//! Static catalog of offer subcategories.
//!
//! A subcategory drives most booking rules: whether the offer is an event,
//! which deposit cap applies, whether underage beneficiaries may book it and
//! which standard reimbursement rule prices it.

use crate::{EngineError, ResultEngine};

/// How used bookings of a subcategory are reimbursed by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReimbursementRuleKind {
    Standard,
    Book,
    NotReimbursed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subcategory {
    pub id: &'static str,
    pub category: &'static str,
    pub is_event: bool,
    pub is_digital_deposit: bool,
    pub is_physical_deposit: bool,
    pub is_bookable_by_underage_when_free: bool,
    pub is_bookable_by_underage_when_not_free: bool,
    pub can_expire: bool,
    pub can_be_duo: bool,
    pub is_automatically_used: bool,
    pub reimbursement_rule: ReimbursementRuleKind,
}

impl Subcategory {
    /// Looks a subcategory up by its identifier.
    pub fn get(id: &str) -> ResultEngine<&'static Subcategory> {
        SUBCATEGORIES
            .iter()
            .find(|subcategory| subcategory.id == id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("subcategory {id}")))
    }

    pub fn is_book(&self) -> bool {
        self.category == BOOK
    }

    /// Permanent offers (digital subscriptions, platforms) never "end" in the
    /// beneficiary bookings list.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.id,
            "ABO_LIVRE_NUMERIQUE"
                | "ABO_PRESSE_EN_LIGNE"
                | "ABO_PLATEFORME_MUSIQUE"
                | "ABO_JEU_VIDEO"
                | "APP_CULTURELLE"
        )
    }
}

const BOOK: &str = "LIVRE";

const fn thing(
    id: &'static str,
    category: &'static str,
    digital: bool,
    underage_not_free: bool,
    rule: ReimbursementRuleKind,
) -> Subcategory {
    Subcategory {
        id,
        category,
        is_event: false,
        is_digital_deposit: digital,
        is_physical_deposit: !digital,
        is_bookable_by_underage_when_free: true,
        is_bookable_by_underage_when_not_free: underage_not_free,
        can_expire: !digital,
        can_be_duo: false,
        is_automatically_used: false,
        reimbursement_rule: rule,
    }
}

const fn event(id: &'static str, category: &'static str, can_be_duo: bool) -> Subcategory {
    Subcategory {
        id,
        category,
        is_event: true,
        is_digital_deposit: false,
        is_physical_deposit: false,
        is_bookable_by_underage_when_free: true,
        is_bookable_by_underage_when_not_free: true,
        can_expire: false,
        can_be_duo,
        is_automatically_used: false,
        reimbursement_rule: ReimbursementRuleKind::Standard,
    }
}

const fn automatically_used(mut subcategory: Subcategory) -> Subcategory {
    subcategory.is_automatically_used = true;
    subcategory
}

const fn not_bookable_by_underage(mut subcategory: Subcategory) -> Subcategory {
    subcategory.is_bookable_by_underage_when_free = false;
    subcategory.is_bookable_by_underage_when_not_free = false;
    subcategory
}

pub static SUBCATEGORIES: &[Subcategory] = &[
    // Books
    thing("LIVRE_PAPIER", BOOK, false, true, ReimbursementRuleKind::Book),
    thing("LIVRE_AUDIO_PHYSIQUE", BOOK, false, true, ReimbursementRuleKind::Book),
    thing("LIVRE_NUMERIQUE", BOOK, true, true, ReimbursementRuleKind::Book),
    automatically_used(thing(
        "ABO_LIVRE_NUMERIQUE",
        BOOK,
        true,
        true,
        ReimbursementRuleKind::Book,
    )),
    // Press and cultural apps
    automatically_used(thing(
        "ABO_PRESSE_EN_LIGNE",
        "MEDIA",
        true,
        true,
        ReimbursementRuleKind::NotReimbursed,
    )),
    automatically_used(thing(
        "APP_CULTURELLE",
        "MEDIA",
        true,
        false,
        ReimbursementRuleKind::NotReimbursed,
    )),
    // Cinema
    event("SEANCE_CINE", "CINEMA", true),
    thing(
        "CARTE_CINE_MULTISEANCES",
        "CINEMA",
        false,
        true,
        ReimbursementRuleKind::Standard,
    ),
    thing(
        "CINE_VENTE_DISTANCE",
        "CINEMA",
        true,
        false,
        ReimbursementRuleKind::Standard,
    ),
    // Live shows
    event("CONCERT", "MUSIQUE_LIVE", true),
    event("FESTIVAL_MUSIQUE", "MUSIQUE_LIVE", true),
    event("SPECTACLE_REPRESENTATION", "SPECTACLE", true),
    // Museums and heritage
    event("VISITE", "MUSEE", true),
    thing(
        "VISITE_VIRTUELLE",
        "MUSEE",
        true,
        false,
        ReimbursementRuleKind::NotReimbursed,
    ),
    thing(
        "MUSEE_VENTE_DISTANCE",
        "MUSEE",
        true,
        false,
        ReimbursementRuleKind::Standard,
    ),
    // Recorded music
    thing(
        "SUPPORT_PHYSIQUE_MUSIQUE",
        "MUSIQUE_ENREGISTREE",
        false,
        true,
        ReimbursementRuleKind::Standard,
    ),
    automatically_used(thing(
        "ABO_PLATEFORME_MUSIQUE",
        "MUSIQUE_ENREGISTREE",
        true,
        false,
        ReimbursementRuleKind::NotReimbursed,
    )),
    // Games
    thing(
        "JEU_EN_LIGNE",
        "JEU",
        true,
        false,
        ReimbursementRuleKind::NotReimbursed,
    ),
    not_bookable_by_underage(automatically_used(thing(
        "ABO_JEU_VIDEO",
        "JEU",
        true,
        false,
        ReimbursementRuleKind::NotReimbursed,
    ))),
    // Instruments and art practice
    thing(
        "ACHAT_INSTRUMENT",
        "INSTRUMENT",
        false,
        true,
        ReimbursementRuleKind::Standard,
    ),
    event("SEANCE_ESSAI_PRATIQUE_ART", "PRATIQUE_ART", false),
    event("ATELIER_PRATIQUE_ART", "PRATIQUE_ART", false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        let book = Subcategory::get("LIVRE_PAPIER").unwrap();
        assert!(book.is_book());
        assert!(book.is_physical_deposit);
        assert!(book.can_expire);
        assert!(Subcategory::get("NOPE").is_err());
    }

    #[test]
    fn video_game_subscriptions_are_forbidden_to_underage() {
        let sub = Subcategory::get("ABO_JEU_VIDEO").unwrap();
        assert!(!sub.is_bookable_by_underage_when_free);
        assert!(!sub.is_bookable_by_underage_when_not_free);
    }

    #[test]
    fn press_and_digital_books_stay_bookable_by_underage() {
        for id in ["ABO_PRESSE_EN_LIGNE", "LIVRE_NUMERIQUE"] {
            assert!(Subcategory::get(id).unwrap().is_bookable_by_underage_when_not_free);
        }
    }

    #[test]
    fn identifiers_are_unique() {
        for (i, a) in SUBCATEGORIES.iter().enumerate() {
            assert!(SUBCATEGORIES[i + 1..].iter().all(|b| b.id != a.id), "{}", a.id);
        }
    }
}
