//! Individual offers.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{ResultEngine, offerers, subcategories::Subcategory, venues};

crate::db_enum! {
    /// Moderation status shared by individual and collective offers.
    OfferValidation {
        Draft => "draft",
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

crate::db_enum! {
    ValidationType {
        Auto => "auto",
        Manual => "manual",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub venue_id: Uuid,
    pub name: String,
    pub subcategory_id: String,
    pub is_duo: bool,
    /// Set for digital offers.
    pub url: Option<String>,
    pub is_active: bool,
    pub validation: String,
    pub last_validation_date: Option<DateTimeUtc>,
    pub last_validation_type: Option<String>,
    pub last_validation_author_id: Option<Uuid>,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn validation(&self) -> ResultEngine<OfferValidation> {
        OfferValidation::try_from(self.validation.as_str())
    }

    pub fn subcategory(&self) -> ResultEngine<&'static Subcategory> {
        Subcategory::get(&self.subcategory_id)
    }

    pub fn is_digital(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Whether beneficiaries can see and book the offer.
    pub fn is_released(&self, venue: &venues::Model, offerer: &offerers::Model) -> bool {
        self.is_active
            && self.validation == OfferValidation::Approved.as_str()
            && venue.is_validated
            && offerer.is_active
            && offerer.is_validated
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
    #[sea_orm(has_many = "super::stocks::Entity")]
    Stocks,
}

impl Related<super::venues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Venue.def()
    }
}

impl Related<super::stocks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stocks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
