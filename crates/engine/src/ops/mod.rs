use chrono::Duration;
use sea_orm::{DatabaseConnection, DatabaseTransaction, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

mod access;
mod bookings;
mod cashflows;
mod collective;
mod deposits;
mod finance;
mod incidents;
mod moderation;
mod offerers;
mod offers;
mod reimbursement_rules;
mod users;

pub use access::OffererScope;
pub use cashflows::{CashflowGeneration, DEBIT_NOTE_MIN_AGE_DAYS};
pub use collective::{
    CollectiveOfferRow, CollectiveOfferSearch, NewCollectiveOffer, NewCollectiveStock, SortOrder,
    derive_collective_status,
};
pub use deposits::DepositEligibility;
pub use finance::PricingSummary;
pub use offerers::NewVenue;
pub use offers::{NewOffer, NewStock, StockEdit};
pub use users::NewUser;

/// Default lifetime of the cashflow generation lock.
pub const DEFAULT_CASHFLOW_LOCK_TIMEOUT_MINUTES: i64 = 24 * 60;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    cashflow_lock_timeout: Duration,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// Loads a row by primary key or fails with `KeyNotFound`.
pub(crate) async fn require<E>(
    db_tx: &DatabaseTransaction,
    id: Uuid,
    label: &str,
) -> ResultEngine<E::Model>
where
    E: EntityTrait,
    <E::PrimaryKey as sea_orm::PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    E::find_by_id(id)
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("{label} {id}")))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    cashflow_lock_timeout: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// How long the cashflow generation lock is held before it expires.
    pub fn cashflow_lock_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.cashflow_lock_timeout = Some(timeout);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            cashflow_lock_timeout: self
                .cashflow_lock_timeout
                .unwrap_or_else(|| Duration::minutes(DEFAULT_CASHFLOW_LOCK_TIMEOUT_MINUTES)),
        })
    }
}
