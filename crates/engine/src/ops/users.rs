use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, UserRole, users, util::normalize_optional_text};

use super::{Engine, require, with_tx};

/// Fields needed to open an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: UserRole,
}

fn normalize_email(email: &str) -> ResultEngine<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::InvalidAmount(format!(
            "invalid email: {email:?}"
        )));
    }
    Ok(email)
}

impl Engine {
    pub async fn create_user(&self, new_user: NewUser) -> ResultEngine<users::Model> {
        let email = normalize_email(&new_user.email)?;
        if new_user.password.is_empty() {
            return Err(EngineError::InvalidAmount(
                "password must not be empty".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            if find_user_by_email(&db_tx, &email).await?.is_some() {
                return Err(EngineError::ExistingKey(email));
            }
            let model = users::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                email: ActiveValue::Set(email.clone()),
                password: ActiveValue::Set(new_user.password),
                first_name: ActiveValue::Set(normalize_optional_text(new_user.first_name.as_deref())),
                last_name: ActiveValue::Set(normalize_optional_text(new_user.last_name.as_deref())),
                date_of_birth: ActiveValue::Set(new_user.date_of_birth),
                validated_birth_date: ActiveValue::Set(None),
                role: ActiveValue::Set(new_user.role.as_str().to_string()),
                date_created: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(user_id = %model.id, role = %new_user.role, "Created user");
            Ok(model)
        })
    }

    /// Returns the user when the credentials match.
    pub async fn authenticate(&self, email: &str, password: &str) -> ResultEngine<users::Model> {
        let email = email.trim().to_lowercase();
        with_tx!(self, |db_tx| {
            match find_user_by_email(&db_tx, &email).await? {
                Some(user) if user.password == password => Ok(user),
                _ => Err(EngineError::Forbidden("invalid credentials".to_string())),
            }
        })
    }

    pub async fn user(&self, user_id: Uuid) -> ResultEngine<users::Model> {
        with_tx!(self, |db_tx| require::<users::Entity>(&db_tx, user_id, "user").await)
    }

    /// Records the birth date checked by identity verification.
    pub async fn set_validated_birth_date(
        &self,
        user_id: Uuid,
        birth_date: NaiveDate,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require::<users::Entity>(&db_tx, user_id, "user").await?;
            users::ActiveModel {
                id: ActiveValue::Set(user_id),
                validated_birth_date: ActiveValue::Set(Some(birth_date)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(())
        })
    }
}

async fn find_user_by_email(
    db_tx: &DatabaseTransaction,
    email: &str,
) -> ResultEngine<Option<users::Model>> {
    users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db_tx)
        .await
        .map_err(Into::into)
}
