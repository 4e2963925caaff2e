//! Bank accounts of offerers, and the links that tell which venue is paid
//! on which account.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::ResultEngine;

crate::db_enum! {
    BankAccountStatus {
        Draft => "draft",
        Accepted => "accepted",
        Refused => "refused",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bank_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub offerer_id: Uuid,
    pub label: String,
    pub iban: String,
    pub status: String,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn status(&self) -> ResultEngine<BankAccountStatus> {
        BankAccountStatus::try_from(self.status.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offerers::Entity",
        from = "Column::OffererId",
        to = "super::offerers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Offerer,
    #[sea_orm(has_many = "super::venue_bank_account_links::Entity")]
    VenueLinks,
}

impl Related<super::offerers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offerer.def()
    }
}

impl Related<super::venue_bank_account_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VenueLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
