use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, custom_reimbursement_rules, offerers, offers,
    reimbursement::{NewCustomRule, RuleTarget, RuleValue, timespans_overlap},
    util::ACCOUNTING_TIMEZONE,
    venues,
};

use super::{Engine, require, with_tx};

/// Two rules on the same target conflict unless they are restricted to
/// disjoint subcategories.
fn subcategories_intersect(a: &[String], b: &[String]) -> bool {
    a.is_empty() || b.is_empty() || a.iter().any(|id| b.contains(id))
}

impl Engine {
    pub async fn create_custom_reimbursement_rule(
        &self,
        new_rule: NewCustomRule,
        now: DateTime<Utc>,
    ) -> ResultEngine<custom_reimbursement_rules::Model> {
        new_rule.validate(now)?;
        with_tx!(self, |db_tx| {
            let target_column = match new_rule.target {
                RuleTarget::Offer(id) => {
                    require::<offers::Entity>(&db_tx, id, "offer").await?;
                    custom_reimbursement_rules::Column::OfferId.eq(id)
                }
                RuleTarget::Venue(id) => {
                    require::<venues::Entity>(&db_tx, id, "venue").await?;
                    custom_reimbursement_rules::Column::VenueId.eq(id)
                }
                RuleTarget::Offerer(id) => {
                    require::<offerers::Entity>(&db_tx, id, "offerer").await?;
                    custom_reimbursement_rules::Column::OffererId.eq(id)
                }
            };

            let same_target = custom_reimbursement_rules::Entity::find()
                .filter(target_column)
                .all(&db_tx)
                .await?;
            for other in &same_target {
                if timespans_overlap(
                    new_rule.timespan_start,
                    new_rule.timespan_end,
                    other.timespan_start,
                    other.timespan_end,
                ) && subcategories_intersect(&new_rule.subcategories, &other.subcategories()?)
                {
                    return Err(EngineError::InvalidRule(format!(
                        "the rule overlaps with rule {}",
                        other.id
                    )));
                }
            }

            let (offer_id, venue_id, offerer_id) = match new_rule.target {
                RuleTarget::Offer(id) => (Some(id), None, None),
                RuleTarget::Venue(id) => (None, Some(id), None),
                RuleTarget::Offerer(id) => (None, None, Some(id)),
            };
            let (amount, rate) = match new_rule.value {
                RuleValue::Amount(amount) => (Some(amount.cents()), None),
                RuleValue::RateBps(rate) => (None, Some(rate)),
            };
            let subcategories = serde_json::to_string(&new_rule.subcategories)
                .map_err(|err| EngineError::InvalidRule(err.to_string()))?;

            let rule = custom_reimbursement_rules::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                offer_id: ActiveValue::Set(offer_id),
                venue_id: ActiveValue::Set(venue_id),
                offerer_id: ActiveValue::Set(offerer_id),
                subcategories: ActiveValue::Set(subcategories),
                amount: ActiveValue::Set(amount),
                rate: ActiveValue::Set(rate),
                timespan_start: ActiveValue::Set(new_rule.timespan_start),
                timespan_end: ActiveValue::Set(new_rule.timespan_end),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(rule_id = %rule.id, "Created custom reimbursement rule");
            Ok(rule)
        })
    }

    /// Sets the end date of a rule that has none yet.
    pub async fn edit_reimbursement_rule(
        &self,
        rule_id: Uuid,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ResultEngine<custom_reimbursement_rules::Model> {
        with_tx!(self, |db_tx| {
            let rule =
                require::<custom_reimbursement_rules::Entity>(&db_tx, rule_id, "custom rule")
                    .await?;
            if rule.timespan_end.is_some() {
                return Err(EngineError::InvalidRule(
                    "the end date of this rule is already set".to_string(),
                ));
            }
            let today = now.with_timezone(&ACCOUNTING_TIMEZONE).date_naive();
            if end_date.with_timezone(&ACCOUNTING_TIMEZONE).date_naive() <= today {
                return Err(EngineError::InvalidRule(
                    "the end date must be after today".to_string(),
                ));
            }
            if end_date <= rule.timespan_start {
                return Err(EngineError::InvalidRule(
                    "end date must be after start date".to_string(),
                ));
            }
            let rule = custom_reimbursement_rules::ActiveModel {
                id: ActiveValue::Set(rule_id),
                timespan_end: ActiveValue::Set(Some(end_date)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(rule)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_rules_on_disjoint_subcategories_coexist() {
        let books = vec!["LIVRE_PAPIER".to_string()];
        let concerts = vec!["CONCERT".to_string()];
        assert!(!subcategories_intersect(&books, &concerts));
        assert!(subcategories_intersect(&books, &books));
        assert!(subcategories_intersect(&[], &concerts));
    }
}
