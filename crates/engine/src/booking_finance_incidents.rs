//! Per-booking rows of a finance incident.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "booking_finance_incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub incident_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub collective_booking_id: Option<Uuid>,
    pub beneficiary_id: Option<Uuid>,
    /// Total amount the booking is worth after the incident, in cents.
    pub new_total_amount: i64,
}

impl Model {
    pub fn new_total_amount(&self) -> MoneyCents {
        MoneyCents::new(self.new_total_amount)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::finance_incidents::Entity",
        from = "Column::IncidentId",
        to = "super::finance_incidents::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Incident,
}

impl Related<super::finance_incidents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incident.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
