//! Account service
//!
//! Registration, credential checks and account lifecycle.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{hash_password, validate_new_password, validate_username, verify_password};
use crate::data::{Database, EntityId, Profile, User};
use crate::error::AppError;
use crate::metrics::USERS_TOTAL;

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Registration form
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    pub email: Option<String>,
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a user together with an empty profile
    ///
    /// # Errors
    /// `Validation` for bad usernames or passwords, `Conflict` when the
    /// username is already taken.
    pub async fn register(&self, input: RegisterInput) -> Result<User, AppError> {
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        validate_new_password(&input.password, &input.password_confirm, &username)?;

        if self.db.get_user_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }

        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            username,
            email: normalize_optional_text(input.email).unwrap_or_default(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            is_active: true,
            created_at: now,
        };
        let profile = Profile::empty(&user.id, now);

        self.db.create_user_with_profile(&user, &profile).await?;
        USERS_TOTAL.set(self.db.count_active_users().await?);

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Check credentials
    ///
    /// Unknown users, wrong passwords and deactivated accounts all yield
    /// `Unauthorized`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.db.get_user_by_username(username.trim()).await? else {
            return Err(AppError::Unauthorized);
        };

        let candidate = password.to_string();
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if !valid {
            tracing::debug!(username = %user.username, "Password mismatch");
            return Err(AppError::Unauthorized);
        }
        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused for inactive user");
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Replace the password after checking the old one
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<(), AppError> {
        let candidate = old_password.to_string();
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
        if !valid {
            return Err(AppError::Validation(
                "Your old password was entered incorrectly.".to_string(),
            ));
        }
        validate_new_password(new_password, confirm, &user.username)?;

        let password = new_password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        self.db.update_password_hash(&user.id, &password_hash).await
    }

    /// Patch email and first name; absent fields are kept
    pub async fn update_account(
        &self,
        user: &User,
        email: Option<String>,
        first_name: Option<String>,
    ) -> Result<User, AppError> {
        let mut updated = user.clone();
        if let Some(email) = normalize_optional_text(email) {
            if !email.is_empty() && !email.contains('@') {
                return Err(AppError::Validation("Enter a valid email address.".to_string()));
            }
            updated.email = email;
        }
        if let Some(first_name) = normalize_optional_text(first_name) {
            updated.first_name = first_name;
        }

        self.db
            .update_user_account(
                &updated.id,
                &updated.email,
                &updated.first_name,
                &updated.last_name,
            )
            .await?;
        Ok(updated)
    }

    /// Soft delete: the row stays, logins and sessions stop working
    pub async fn deactivate(&self, user: &User) -> Result<(), AppError> {
        self.db.set_user_active(&user.id, false).await?;
        USERS_TOTAL.set(self.db.count_active_users().await?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::create_test_db;

    fn input(username: &str, password: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
            email: Some("bird@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db.clone());

        let user = service
            .register(input("alice", "sky-high-2024"))
            .await
            .unwrap();
        assert_eq!(user.email, "bird@example.com");
        assert!(db.get_profile(&user.id).await.unwrap().is_some());

        let logged_in = service.authenticate("ALICE", "sky-high-2024").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            service.authenticate("alice", "wrong-password").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username_case_insensitively() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db);

        service.register(input("alice", "sky-high-2024")).await.unwrap();
        assert!(matches!(
            service.register(input("Alice", "sky-high-2024")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn register_rejects_mismatched_confirmation() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db);

        let mut form = input("alice", "sky-high-2024");
        form.password_confirm = "sky-high-2025".to_string();
        assert!(matches!(
            service.register(form).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn deactivated_user_cannot_log_in() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db);

        let user = service
            .register(input("alice", "sky-high-2024"))
            .await
            .unwrap();
        service.deactivate(&user).await.unwrap();

        assert!(matches!(
            service.authenticate("alice", "sky-high-2024").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db);

        let user = service
            .register(input("alice", "sky-high-2024"))
            .await
            .unwrap();

        assert!(
            service
                .change_password(&user, "nope", "river-stone-77", "river-stone-77")
                .await
                .is_err()
        );

        service
            .change_password(&user, "sky-high-2024", "river-stone-77", "river-stone-77")
            .await
            .unwrap();
        assert!(service.authenticate("alice", "river-stone-77").await.is_ok());
    }
}
