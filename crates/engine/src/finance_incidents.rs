//! Finance incidents: corrections applied to bookings after they were priced.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

crate::db_enum! {
    IncidentType {
        Overpayment => "overpayment",
        CommercialGesture => "commercial_gesture",
        OfferPriceRegulation => "offer_price_regulation",
        Fraud => "fraud",
    }
}

crate::db_enum! {
    IncidentStatus {
        Created => "created",
        Validated => "validated",
        Cancelled => "cancelled",
    }
}

/// Free-form audit data stored as JSON in `details`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDetails {
    pub origin: String,
    pub author_id: Option<Uuid>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "finance_incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub venue_id: Uuid,
    pub details: String,
    pub force_debit_note: bool,
    pub validation_date: Option<DateTimeUtc>,
}

impl Model {
    pub fn kind(&self) -> ResultEngine<IncidentType> {
        IncidentType::try_from(self.kind.as_str())
    }

    pub fn status(&self) -> ResultEngine<IncidentStatus> {
        IncidentStatus::try_from(self.status.as_str())
    }

    pub fn details(&self) -> ResultEngine<IncidentDetails> {
        serde_json::from_str(&self.details)
            .map_err(|err| EngineError::InvalidState(format!("invalid incident details: {err}")))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking_finance_incidents::Entity")]
    BookingIncidents,
}

impl Related<super::booking_finance_incidents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingIncidents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
