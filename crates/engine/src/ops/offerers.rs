use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    UserRole,
    bank_accounts::{self, BankAccountStatus},
    offerers, user_offerers, venue_bank_account_links, venue_pricing_point_links, venues,
    util::{normalize_optional_text, normalize_required_text},
};

use super::{
    Engine, access::require_role, finance::make_pending_events_ready, require, with_tx,
};

#[derive(Clone, Debug)]
pub struct NewVenue {
    pub offerer_id: Uuid,
    pub name: String,
    pub is_virtual: bool,
    pub booking_email: Option<String>,
    pub department_code: Option<String>,
    pub is_validated: bool,
}

impl Engine {
    pub async fn create_offerer(
        &self,
        name: &str,
        is_validated: bool,
    ) -> ResultEngine<offerers::Model> {
        let name = normalize_required_text(name, "offerer name")?;
        with_tx!(self, |db_tx| {
            let offerer = offerers::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                name: ActiveValue::Set(name),
                is_active: ActiveValue::Set(true),
                is_validated: ActiveValue::Set(is_validated),
                date_created: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(offerer)
        })
    }

    pub async fn set_offerer_active(&self, offerer_id: Uuid, is_active: bool) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require::<offerers::Entity>(&db_tx, offerer_id, "offerer").await?;
            offerers::ActiveModel {
                id: ActiveValue::Set(offerer_id),
                is_active: ActiveValue::Set(is_active),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(())
        })
    }

    /// Attaches a pro user to an offerer. Attaching twice returns the
    /// existing attachment.
    pub async fn attach_user_to_offerer(
        &self,
        user_id: Uuid,
        offerer_id: Uuid,
    ) -> ResultEngine<user_offerers::Model> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, user_id, &[UserRole::Pro]).await?;
            require::<offerers::Entity>(&db_tx, offerer_id, "offerer").await?;
            let existing = user_offerers::Entity::find()
                .filter(user_offerers::Column::UserId.eq(user_id))
                .filter(user_offerers::Column::OffererId.eq(offerer_id))
                .one(&db_tx)
                .await?;
            if let Some(existing) = existing {
                return Ok(existing);
            }
            let attachment = user_offerers::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id),
                offerer_id: ActiveValue::Set(offerer_id),
                date_created: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(
                user_id = %user_id,
                offerer_id = %offerer_id,
                "Attached user to offerer"
            );
            Ok(attachment)
        })
    }

    pub async fn create_venue(&self, new_venue: NewVenue) -> ResultEngine<venues::Model> {
        let name = normalize_required_text(&new_venue.name, "venue name")?;
        with_tx!(self, |db_tx| {
            require::<offerers::Entity>(&db_tx, new_venue.offerer_id, "offerer").await?;
            let venue = venues::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                offerer_id: ActiveValue::Set(new_venue.offerer_id),
                name: ActiveValue::Set(name),
                is_virtual: ActiveValue::Set(new_venue.is_virtual),
                booking_email: ActiveValue::Set(normalize_optional_text(
                    new_venue.booking_email.as_deref(),
                )),
                department_code: ActiveValue::Set(normalize_optional_text(
                    new_venue.department_code.as_deref(),
                )),
                is_validated: ActiveValue::Set(new_venue.is_validated),
            }
            .insert(&db_tx)
            .await?;
            Ok(venue)
        })
    }

    /// Makes `pricing_point_id` price the bookings of `venue_id` from `start`.
    pub async fn link_venue_to_pricing_point(
        &self,
        venue_id: Uuid,
        pricing_point_id: Uuid,
        start: DateTime<Utc>,
    ) -> ResultEngine<venue_pricing_point_links::Model> {
        with_tx!(self, |db_tx| {
            let venue = require::<venues::Entity>(&db_tx, venue_id, "venue").await?;
            let pricing_point =
                require::<venues::Entity>(&db_tx, pricing_point_id, "pricing point").await?;
            if pricing_point.offerer_id != venue.offerer_id {
                return Err(EngineError::Forbidden(
                    "the pricing point must belong to the same offerer".to_string(),
                ));
            }
            if pricing_point.is_virtual {
                return Err(EngineError::Forbidden(
                    "a virtual venue cannot be a pricing point".to_string(),
                ));
            }

            let active = venue_pricing_point_links::Entity::find()
                .filter(venue_pricing_point_links::Column::VenueId.eq(venue_id))
                .filter(venue_pricing_point_links::Column::TimespanEnd.is_null())
                .one(&db_tx)
                .await?;
            if active.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "venue {venue_id} is already linked to a pricing point"
                )));
            }

            let link = venue_pricing_point_links::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                venue_id: ActiveValue::Set(venue_id),
                pricing_point_id: ActiveValue::Set(pricing_point_id),
                timespan_start: ActiveValue::Set(start),
                timespan_end: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            let ready =
                make_pending_events_ready(&db_tx, venue_id, pricing_point_id, start).await?;
            tracing::info!(
                venue_id = %venue_id,
                pricing_point_id = %pricing_point_id,
                ready_events = ready,
                "Linked venue to pricing point"
            );
            Ok(link)
        })
    }

    pub async fn create_bank_account(
        &self,
        offerer_id: Uuid,
        label: &str,
        iban: &str,
        status: BankAccountStatus,
    ) -> ResultEngine<bank_accounts::Model> {
        let label = normalize_required_text(label, "bank account label")?;
        let iban = normalize_required_text(iban, "iban")?.replace(' ', "");
        with_tx!(self, |db_tx| {
            require::<offerers::Entity>(&db_tx, offerer_id, "offerer").await?;
            let account = bank_accounts::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                offerer_id: ActiveValue::Set(offerer_id),
                label: ActiveValue::Set(label),
                iban: ActiveValue::Set(iban),
                status: ActiveValue::Set(status.as_str().to_string()),
                date_created: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(account)
        })
    }

    /// Pays `venue_id` on `bank_account_id` from `start`, closing the previous
    /// link if any.
    pub async fn link_venue_to_bank_account(
        &self,
        venue_id: Uuid,
        bank_account_id: Uuid,
        start: DateTime<Utc>,
    ) -> ResultEngine<venue_bank_account_links::Model> {
        with_tx!(self, |db_tx| {
            let venue = require::<venues::Entity>(&db_tx, venue_id, "venue").await?;
            let account =
                require::<bank_accounts::Entity>(&db_tx, bank_account_id, "bank account").await?;
            if account.offerer_id != venue.offerer_id {
                return Err(EngineError::Forbidden(
                    "the bank account must belong to the venue offerer".to_string(),
                ));
            }

            let current = venue_bank_account_links::Entity::find()
                .filter(venue_bank_account_links::Column::VenueId.eq(venue_id))
                .filter(venue_bank_account_links::Column::TimespanEnd.is_null())
                .one(&db_tx)
                .await?;
            if let Some(current) = current {
                if current.bank_account_id == bank_account_id {
                    return Ok(current);
                }
                venue_bank_account_links::ActiveModel {
                    id: ActiveValue::Set(current.id),
                    timespan_end: ActiveValue::Set(Some(start)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }

            let link = venue_bank_account_links::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                venue_id: ActiveValue::Set(venue_id),
                bank_account_id: ActiveValue::Set(bank_account_id),
                timespan_start: ActiveValue::Set(start),
                timespan_end: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(link)
        })
    }

    /// Pricing point link of a venue at a given date.
    pub async fn pricing_point_link(
        &self,
        venue_id: Uuid,
        at: DateTime<Utc>,
    ) -> ResultEngine<venue_pricing_point_links::Model> {
        with_tx!(self, |db_tx| pricing_point_link(&db_tx, venue_id, at).await)
    }
}

/// The link active at `at`, or else the single open-ended link starting
/// after `at`.
pub(super) async fn pricing_point_link(
    db_tx: &DatabaseTransaction,
    venue_id: Uuid,
    at: DateTime<Utc>,
) -> ResultEngine<venue_pricing_point_links::Model> {
    find_pricing_point_link(db_tx, venue_id, at)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("pricing point of venue {venue_id}")))
}

pub(super) async fn find_pricing_point_link(
    db_tx: &DatabaseTransaction,
    venue_id: Uuid,
    at: DateTime<Utc>,
) -> ResultEngine<Option<venue_pricing_point_links::Model>> {
    let active = venue_pricing_point_links::Entity::find()
        .filter(venue_pricing_point_links::Column::VenueId.eq(venue_id))
        .filter(venue_pricing_point_links::Column::TimespanStart.lte(at))
        .filter(
            Condition::any()
                .add(venue_pricing_point_links::Column::TimespanEnd.is_null())
                .add(venue_pricing_point_links::Column::TimespanEnd.gt(at)),
        )
        .one(db_tx)
        .await?;
    if active.is_some() {
        return Ok(active);
    }

    let upcoming = venue_pricing_point_links::Entity::find()
        .filter(venue_pricing_point_links::Column::VenueId.eq(venue_id))
        .filter(venue_pricing_point_links::Column::TimespanStart.gt(at))
        .filter(venue_pricing_point_links::Column::TimespanEnd.is_null())
        .all(db_tx)
        .await?;
    Ok(match upcoming.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    })
}

/// Bank account paying `venue_id` at `at`.
pub(super) async fn bank_account_link(
    db_tx: &DatabaseTransaction,
    venue_id: Uuid,
    at: DateTime<Utc>,
) -> ResultEngine<Option<venue_bank_account_links::Model>> {
    venue_bank_account_links::Entity::find()
        .filter(venue_bank_account_links::Column::VenueId.eq(venue_id))
        .filter(venue_bank_account_links::Column::TimespanStart.lte(at))
        .filter(
            Condition::any()
                .add(venue_bank_account_links::Column::TimespanEnd.is_null())
                .add(venue_bank_account_links::Column::TimespanEnd.gt(at)),
        )
        .order_by_desc(venue_bank_account_links::Column::TimespanStart)
        .one(db_tx)
        .await
        .map_err(Into::into)
}
