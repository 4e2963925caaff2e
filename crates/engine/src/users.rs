//! Users table.
//!
//! A single table holds beneficiaries, pro users and backoffice admins; the
//! `role` column tells them apart.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::ResultEngine;

crate::db_enum! {
    UserRole {
        None => "none",
        Beneficiary => "beneficiary",
        UnderageBeneficiary => "underage_beneficiary",
        Pro => "pro",
        Admin => "admin",
    }
}

impl UserRole {
    pub fn is_beneficiary(self) -> bool {
        matches!(self, Self::Beneficiary | Self::UnderageBeneficiary)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Lowercased, unique.
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub validated_birth_date: Option<NaiveDate>,
    pub role: String,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn role(&self) -> ResultEngine<UserRole> {
        UserRole::try_from(self.role.as_str())
    }

    /// Birth date checked by identity verification, falling back to the
    /// declared one.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.validated_birth_date.or(self.date_of_birth)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::deposits::Entity")]
    Deposits,
    #[sea_orm(has_many = "super::bookings::Entity")]
    Bookings,
}

impl Related<super::deposits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deposits.def()
    }
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
