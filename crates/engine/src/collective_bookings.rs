//! Collective bookings.
//!
//! Unlike individual bookings they start `pending` until the institution
//! confirms them.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::ResultEngine;

crate::db_enum! {
    CollectiveBookingStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Used => "used",
        Cancelled => "cancelled",
        Reimbursed => "reimbursed",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collective_bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub collective_stock_id: Uuid,
    pub venue_id: Uuid,
    pub offerer_id: Uuid,
    pub institution: String,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub date_created: DateTimeUtc,
    pub confirmation_date: Option<DateTimeUtc>,
    pub date_used: Option<DateTimeUtc>,
    pub cancellation_date: Option<DateTimeUtc>,
    pub cancellation_limit_date: Option<DateTimeUtc>,
    pub reimbursement_date: Option<DateTimeUtc>,
}

impl Model {
    pub fn status(&self) -> ResultEngine<CollectiveBookingStatus> {
        CollectiveBookingStatus::try_from(self.status.as_str())
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == CollectiveBookingStatus::Cancelled.as_str()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collective_stocks::Entity",
        from = "Column::CollectiveStockId",
        to = "super::collective_stocks::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Stock,
}

impl Related<super::collective_stocks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
