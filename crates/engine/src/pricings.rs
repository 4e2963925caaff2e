//! Pricings: the amount owed to an offerer for a finance event.
//!
//! The amount follows the ledger sign convention: negative means pass Culture
//! pays the offerer.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{MoneyCents, ResultEngine};

crate::db_enum! {
    PricingStatus {
        Validated => "validated",
        Cancelled => "cancelled",
        Processed => "processed",
        Invoiced => "invoiced",
    }
}

impl PricingStatus {
    /// A pricing in these statuses has not been paid yet.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Validated | Self::Cancelled)
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, Self::Validated | Self::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pricings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: String,
    pub creation_date: DateTimeUtc,
    pub value_date: DateTimeUtc,
    pub amount: i64,
    /// Description of the standard rule, empty when a custom rule applied.
    pub standard_rule: String,
    pub custom_rule_id: Option<Uuid>,
    /// Year-to-date revenue of the pricing point, this event included.
    pub revenue: i64,
    pub pricing_point_id: Uuid,
    pub venue_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub collective_booking_id: Option<Uuid>,
    pub event_id: Uuid,
}

impl Model {
    pub fn status(&self) -> ResultEngine<PricingStatus> {
        PricingStatus::try_from(self.status.as_str())
    }

    pub fn amount(&self) -> MoneyCents {
        MoneyCents::new(self.amount)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::finance_events::Entity",
        from = "Column::EventId",
        to = "super::finance_events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Event,
    #[sea_orm(has_many = "super::pricing_lines::Entity")]
    Lines,
    #[sea_orm(has_many = "super::pricing_logs::Entity")]
    Logs,
}

impl Related<super::finance_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::pricing_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::pricing_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Logs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
