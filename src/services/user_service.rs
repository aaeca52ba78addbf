use crate::api::error::AppError;
use crate::entities::{prelude::*, tokens, users};
use crate::utils::auth::{IssuedToken, create_jwt, hash_password, verify_password};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

/// Accounts and the access tokens issued to them.
#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewUser) -> Result<users::Model, AppError> {
        let email = new.email.trim().to_lowercase();

        let existing = Users::find()
            .filter(users::Column::Email.eq(email.clone()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::validation("Email already registered"));
        }

        let user = users::ActiveModel {
            email: Set(email),
            hashed_password: Set(hash_password(&new.password)?),
            is_active: Set(true),
            is_superuser: Set(new.is_superuser),
            full_name: Set(new.full_name),
            ..Default::default()
        };

        let user = user.insert(&self.db).await?;
        tracing::info!("👤 Created user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn get(&self, id: i32) -> Result<users::Model, AppError> {
        Users::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update(&self, id: i32, changes: UserChanges) -> Result<users::Model, AppError> {
        let mut active: users::ActiveModel = self.get(id).await?.into();

        if let Some(full_name) = changes.full_name {
            active.full_name = Set(Some(full_name));
        }
        if let Some(password) = changes.password
            && !password.is_empty()
        {
            active.hashed_password = Set(hash_password(&password)?);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let user = self.get(id).await?;
        user.delete(&self.db).await?;
        tracing::info!("🗑️  Deleted user {}", id);
        Ok(())
    }

    /// Checks credentials; unknown email, wrong password and inactive
    /// accounts are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<users::Model, AppError> {
        let invalid = || AppError::Unauthorized("Incorrect email or password".to_string());

        let user = Users::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        if !user.is_active || !verify_password(password, &user.hashed_password) {
            return Err(invalid());
        }

        Ok(user)
    }

    /// Signs a JWT and records it so it can be revoked.
    pub async fn issue_token(
        &self,
        user: &users::Model,
        secret: &str,
        lifetime_minutes: i64,
    ) -> Result<IssuedToken, AppError> {
        let issued = create_jwt(user.id, secret, lifetime_minutes)?;

        let token = tokens::ActiveModel {
            access_token: Set(issued.token.clone()),
            user_id: Set(user.id),
            expires_at: Set(issued.expires_at),
            is_valid: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        token.insert(&self.db).await?;

        Ok(issued)
    }

    /// The user behind a stored token that is still valid, unexpired and active.
    pub async fn user_for_token(&self, access_token: &str) -> Result<Option<users::Model>, AppError> {
        let Some(token) = Tokens::find()
            .filter(tokens::Column::AccessToken.eq(access_token))
            .filter(tokens::Column::IsValid.eq(true))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        if token.expires_at <= Utc::now() {
            return Ok(None);
        }

        let user = Users::find_by_id(token.user_id).one(&self.db).await?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn revoke_token(&self, access_token: &str) -> Result<(), AppError> {
        let token = Tokens::find()
            .filter(tokens::Column::AccessToken.eq(access_token))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown token".to_string()))?;

        let mut active: tokens::ActiveModel = token.into();
        active.is_valid = Set(false);
        active.update(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::{ConnectOptions, Database};

    async fn service() -> UserService {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        let db = Database::connect(opt).await.unwrap();
        run_migrations(&db).await.unwrap();
        UserService::new(db)
    }

    fn alice() -> NewUser {
        NewUser {
            email: "Alice@Example.com".to_string(),
            password: "password123".to_string(),
            full_name: Some("Alice".to_string()),
            is_superuser: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let users = service().await;
        let user = users.create(alice()).await.unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_active);

        assert!(matches!(
            users.create(alice()).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        let found = users
            .authenticate("alice@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(matches!(
            users.authenticate("alice@example.com", "nope").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let users = service().await;
        let user = users.create(alice()).await.unwrap();

        let issued = users.issue_token(&user, "secret", 30).await.unwrap();
        let owner = users.user_for_token(&issued.token).await.unwrap().unwrap();
        assert_eq!(owner.id, user.id);

        users.revoke_token(&issued.token).await.unwrap();
        assert!(users.user_for_token(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_is_locked_out() {
        let users = service().await;
        let user = users.create(alice()).await.unwrap();
        let issued = users.issue_token(&user, "secret", 30).await.unwrap();

        users
            .update(
                user.id,
                UserChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(users.user_for_token(&issued.token).await.unwrap().is_none());
        assert!(users.authenticate("alice@example.com", "password123").await.is_err());
    }
}
