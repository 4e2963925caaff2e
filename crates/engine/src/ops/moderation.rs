use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CancellationReason, EngineError, OfferValidation, ResultEngine, UserRole, ValidationType,
    offers, stocks,
};

use super::{Engine, access::require_role, bookings::cancel_bookings_of_stock, with_tx};

/// Loads every requested offer, failing on the first missing one.
async fn load_offers(
    db_tx: &DatabaseTransaction,
    offer_ids: &[Uuid],
) -> ResultEngine<Vec<offers::Model>> {
    let found = offers::Entity::find()
        .filter(offers::Column::Id.is_in(offer_ids.to_vec()))
        .all(db_tx)
        .await?;
    if let Some(missing) = offer_ids
        .iter()
        .find(|id| !found.iter().any(|offer| offer.id == **id))
    {
        return Err(EngineError::KeyNotFound(format!("offer {missing}")));
    }
    Ok(found)
}

async fn set_validation(
    db_tx: &DatabaseTransaction,
    offer: &offers::Model,
    validation: OfferValidation,
    author_id: Uuid,
    now: DateTime<Utc>,
) -> ResultEngine<offers::Model> {
    offers::ActiveModel {
        id: ActiveValue::Set(offer.id),
        validation: ActiveValue::Set(validation.as_str().to_string()),
        is_active: ActiveValue::Set(validation == OfferValidation::Approved),
        last_validation_date: ActiveValue::Set(Some(now)),
        last_validation_type: ActiveValue::Set(Some(ValidationType::Manual.as_str().to_string())),
        last_validation_author_id: ActiveValue::Set(Some(author_id)),
        ..Default::default()
    }
    .update(db_tx)
    .await
    .map_err(Into::into)
}

impl Engine {
    /// Approves pending offers. Nothing is changed unless every offer is
    /// `pending`.
    pub async fn validate_offers(
        &self,
        offer_ids: &[Uuid],
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<offers::Model>> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let offers = load_offers(&db_tx, offer_ids).await?;
            if let Some(offer) = offers
                .iter()
                .find(|offer| offer.validation != OfferValidation::Pending.as_str())
            {
                return Err(EngineError::InvalidState(format!(
                    "offer {} is {}, only pending offers can be validated",
                    offer.id, offer.validation
                )));
            }
            let mut validated = Vec::with_capacity(offers.len());
            for offer in &offers {
                validated.push(
                    set_validation(&db_tx, offer, OfferValidation::Approved, author_id, now)
                        .await?,
                );
            }
            tracing::info!(count = validated.len(), author_id = %author_id, "Validated offers");
            Ok(validated)
        })
    }

    /// Rejects offers and cancels their bookings for fraud.
    pub async fn reject_offers(
        &self,
        offer_ids: &[Uuid],
        author_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Vec<offers::Model>> {
        with_tx!(self, |db_tx| {
            require_role(&db_tx, author_id, &[UserRole::Admin]).await?;
            let offers = load_offers(&db_tx, offer_ids).await?;
            let mut rejected = Vec::with_capacity(offers.len());
            for offer in &offers {
                let is_event = offer.subcategory()?.is_event;
                let offer_stocks = stocks::Entity::find()
                    .filter(stocks::Column::OfferId.eq(offer.id))
                    .all(&db_tx)
                    .await?;
                for stock in &offer_stocks {
                    cancel_bookings_of_stock(
                        &db_tx,
                        stock.id,
                        CancellationReason::Fraud,
                        is_event,
                        now,
                    )
                    .await?;
                }
                rejected.push(
                    set_validation(&db_tx, offer, OfferValidation::Rejected, author_id, now)
                        .await?,
                );
                tracing::info!(offer_id = %offer.id, "Rejected offer");
            }
            Ok(rejected)
        })
    }
}
