//! Custom reimbursement rules negotiated for an offer, a venue or an offerer.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "custom_reimbursement_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub offer_id: Option<Uuid>,
    pub venue_id: Option<Uuid>,
    pub offerer_id: Option<Uuid>,
    /// JSON array of subcategory ids, empty for every subcategory.
    pub subcategories: String,
    /// Reimbursed amount per unit, in cents.
    pub amount: Option<i64>,
    /// Reimbursed rate, in basis points.
    pub rate: Option<i64>,
    pub timespan_start: DateTimeUtc,
    pub timespan_end: Option<DateTimeUtc>,
}

impl Model {
    pub fn subcategories(&self) -> ResultEngine<Vec<String>> {
        serde_json::from_str(&self.subcategories)
            .map_err(|err| EngineError::InvalidRule(format!("invalid subcategories: {err}")))
    }

    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.timespan_start <= at && self.timespan_end.is_none_or(|end| at < end)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
