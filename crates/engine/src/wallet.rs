//! Wallet credit computation.
//!
//! The credit of a beneficiary is the amount of their active deposit minus the
//! total of their non-cancelled bookings. Some deposits also cap what can be
//! spent on digital or physical goods.

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, MoneyCents, ResultEngine, deposits::DepositType, subcategories::Subcategory,
};

pub const GRANT_18_AMOUNT: MoneyCents = MoneyCents::from_euros(300);
pub const GRANT_18_V1_AMOUNT: MoneyCents = MoneyCents::from_euros(500);
pub const GRANT_15_AMOUNT: MoneyCents = MoneyCents::from_euros(20);
pub const GRANT_16_17_AMOUNT: MoneyCents = MoneyCents::from_euros(30);
pub const RECREDIT_AMOUNT: MoneyCents = MoneyCents::from_euros(30);

/// Which specific cap an expense counts against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseDomain {
    Digital,
    Physical,
    Other,
}

impl ExpenseDomain {
    pub fn of(subcategory: &Subcategory, is_digital_offer: bool) -> Self {
        if is_digital_offer && subcategory.is_digital_deposit {
            Self::Digital
        } else if !is_digital_offer && subcategory.is_physical_deposit {
            Self::Physical
        } else {
            Self::Other
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Expense {
    pub total: MoneyCents,
    pub domain: ExpenseDomain,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpecificCaps {
    pub digital: Option<MoneyCents>,
    pub physical: Option<MoneyCents>,
}

impl SpecificCaps {
    pub fn for_deposit(deposit_type: DepositType, version: i32) -> Self {
        match (deposit_type, version) {
            (DepositType::Grant18, 1) => Self {
                digital: Some(MoneyCents::from_euros(200)),
                physical: Some(MoneyCents::from_euros(200)),
            },
            (DepositType::Grant18, _) => Self {
                digital: Some(MoneyCents::from_euros(100)),
                physical: None,
            },
            (DepositType::Grant15To17, _) => Self::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub initial: MoneyCents,
    pub remaining: MoneyCents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainsCredit {
    pub all: Credit,
    pub digital: Option<Credit>,
    pub physical: Option<Credit>,
}

impl DomainsCredit {
    /// `deposit_amount` includes recredits. An expired deposit has nothing
    /// left to spend.
    pub fn compute(
        deposit_amount: MoneyCents,
        caps: SpecificCaps,
        is_expired: bool,
        expenses: &[Expense],
    ) -> Self {
        let spent = |domain: Option<ExpenseDomain>| -> MoneyCents {
            expenses
                .iter()
                .filter(|expense| domain.is_none_or(|d| expense.domain == d))
                .map(|expense| expense.total)
                .sum()
        };

        let all_remaining = if is_expired {
            MoneyCents::ZERO
        } else {
            (deposit_amount - spent(None)).at_least_zero()
        };
        let all = Credit {
            initial: deposit_amount,
            remaining: all_remaining,
        };

        let capped = |cap: Option<MoneyCents>, domain: ExpenseDomain| {
            cap.map(|cap| Credit {
                initial: cap,
                remaining: (cap - spent(Some(domain))).at_least_zero().min(all_remaining),
            })
        };

        Self {
            all,
            digital: capped(caps.digital, ExpenseDomain::Digital),
            physical: capped(caps.physical, ExpenseDomain::Physical),
        }
    }

    /// Checks that a new expense fits in the credit: the global credit first,
    /// then the specific cap of its domain.
    pub fn check_expense(&self, total: MoneyCents, domain: ExpenseDomain) -> ResultEngine<()> {
        if total > self.all.remaining {
            return Err(EngineError::InsufficientFunds(
                "the booking exceeds the remaining credit".to_string(),
            ));
        }
        let cap = match domain {
            ExpenseDomain::Digital => self.digital,
            ExpenseDomain::Physical => self.physical,
            ExpenseDomain::Other => None,
        };
        if let Some(cap) = cap
            && total > cap.remaining
        {
            let label = match domain {
                ExpenseDomain::Digital => "digital",
                _ => "physical",
            };
            return Err(EngineError::InsufficientFunds(format!(
                "the booking exceeds the {label} cap"
            )));
        }
        Ok(())
    }
}
