//! Collective (educational) offers, bookable by school institutions.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, offers::OfferValidation};

crate::db_enum! {
    /// Status displayed to pros and backoffice users, derived from the offer,
    /// its stock and its bookings.
    CollectiveOfferStatus {
        Draft => "draft",
        Pending => "pending",
        Rejected => "rejected",
        Inactive => "inactive",
        Expired => "expired",
        SoldOut => "sold_out",
        Active => "active",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collective_offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    /// JSON array of format labels.
    pub formats: String,
    pub is_active: bool,
    pub validation: String,
    pub last_validation_date: Option<DateTimeUtc>,
    pub last_validation_type: Option<String>,
    pub last_validation_author_id: Option<Uuid>,
    pub institution: Option<String>,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn validation(&self) -> ResultEngine<OfferValidation> {
        OfferValidation::try_from(self.validation.as_str())
    }

    pub fn formats(&self) -> ResultEngine<Vec<String>> {
        serde_json::from_str(&self.formats)
            .map_err(|err| EngineError::InvalidState(format!("invalid formats: {err}")))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::venues::Entity",
        from = "Column::VenueId",
        to = "super::venues::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Venue,
    #[sea_orm(has_one = "super::collective_stocks::Entity")]
    Stock,
}

impl Related<super::venues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Venue.def()
    }
}

impl Related<super::collective_stocks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
