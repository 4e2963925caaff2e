use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, UserRole, bookings, offerers, offers,
    stocks::{self, StockContext},
    user_offerers, users, venues,
};

use super::{Engine, require, with_tx};

/// Loads a user and checks that it has one of `roles`.
pub(super) async fn require_role(
    db_tx: &DatabaseTransaction,
    user_id: Uuid,
    roles: &[UserRole],
) -> ResultEngine<users::Model> {
    let user = require::<users::Entity>(db_tx, user_id, "user").await?;
    let role = user.role()?;
    if !roles.contains(&role) {
        return Err(EngineError::Forbidden(format!(
            "user {user_id} ({role}) is not allowed to do this"
        )));
    }
    Ok(user)
}

/// Resource a pro user acts on, resolved to the offerer owning it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffererScope {
    Offerer(Uuid),
    Venue(Uuid),
    Offer(Uuid),
    Stock(Uuid),
    Booking(Uuid),
}

async fn scope_offerer(db_tx: &DatabaseTransaction, scope: OffererScope) -> ResultEngine<Uuid> {
    let venue_id = match scope {
        OffererScope::Offerer(offerer_id) => {
            require::<offerers::Entity>(db_tx, offerer_id, "offerer").await?;
            return Ok(offerer_id);
        }
        OffererScope::Venue(venue_id) => venue_id,
        OffererScope::Offer(offer_id) => {
            require::<offers::Entity>(db_tx, offer_id, "offer").await?.venue_id
        }
        OffererScope::Stock(stock_id) => {
            let stock = require::<stocks::Entity>(db_tx, stock_id, "stock").await?;
            require::<offers::Entity>(db_tx, stock.offer_id, "offer").await?.venue_id
        }
        OffererScope::Booking(booking_id) => {
            require::<bookings::Entity>(db_tx, booking_id, "booking").await?.venue_id
        }
    };
    Ok(require::<venues::Entity>(db_tx, venue_id, "venue").await?.offerer_id)
}

/// Checks that `user_id` may act for `offerer_id`: admins always can, pros
/// only when attached to it.
pub(super) async fn require_offerer_access(
    db_tx: &DatabaseTransaction,
    user_id: Uuid,
    offerer_id: Uuid,
) -> ResultEngine<users::Model> {
    let user = require_role(db_tx, user_id, &[UserRole::Pro, UserRole::Admin]).await?;
    if user.role()? == UserRole::Admin {
        return Ok(user);
    }
    let attachment = user_offerers::Entity::find()
        .filter(user_offerers::Column::UserId.eq(user_id))
        .filter(user_offerers::Column::OffererId.eq(offerer_id))
        .one(db_tx)
        .await?;
    if attachment.is_none() {
        return Err(EngineError::Forbidden(format!(
            "user {user_id} has no access to offerer {offerer_id}"
        )));
    }
    Ok(user)
}

/// Loads a stock with its offer, venue, offerer and subcategory.
pub(super) async fn stock_context(
    db_tx: &DatabaseTransaction,
    stock_id: Uuid,
) -> ResultEngine<StockContext> {
    let stock = require::<stocks::Entity>(db_tx, stock_id, "stock").await?;
    let offer = require::<offers::Entity>(db_tx, stock.offer_id, "offer").await?;
    let venue = require::<venues::Entity>(db_tx, offer.venue_id, "venue").await?;
    let offerer = require::<offerers::Entity>(db_tx, venue.offerer_id, "offerer").await?;
    let subcategory = offer.subcategory()?;
    Ok(StockContext {
        stock,
        offer,
        venue,
        offerer,
        subcategory,
    })
}

impl Engine {
    /// Checks that `user_id` has one of `roles`.
    pub async fn check_role(&self, user_id: Uuid, roles: &[UserRole]) -> ResultEngine<users::Model> {
        with_tx!(self, |db_tx| require_role(&db_tx, user_id, roles).await)
    }

    /// Checks that `user_id` may act on `scope`, returning the offerer id.
    pub async fn check_offerer_access(
        &self,
        user_id: Uuid,
        scope: OffererScope,
    ) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let offerer_id = scope_offerer(&db_tx, scope).await?;
            require_offerer_access(&db_tx, user_id, offerer_id).await?;
            Ok(offerer_id)
        })
    }

    pub async fn stock_context(&self, stock_id: Uuid) -> ResultEngine<StockContext> {
        with_tx!(self, |db_tx| stock_context(&db_tx, stock_id).await)
    }
}
