//! Deposits (the credit granted to a beneficiary) and their recredits.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{MoneyCents, ResultEngine};

crate::db_enum! {
    DepositType {
        Grant18 => "grant_18",
        Grant15To17 => "grant_15_17",
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deposits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub deposit_type: String,
    pub version: i32,
    /// Initial grant plus every recredit, in cents.
    pub amount: i64,
    pub source: String,
    pub expiration_date: Option<DateTimeUtc>,
    pub date_created: DateTimeUtc,
}

impl Model {
    pub fn deposit_type(&self) -> ResultEngine<DepositType> {
        DepositType::try_from(self.deposit_type.as_str())
    }

    pub fn amount(&self) -> MoneyCents {
        MoneyCents::new(self.amount)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|date| date <= now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::recredits::Entity")]
    Recredits,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::recredits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recredits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
