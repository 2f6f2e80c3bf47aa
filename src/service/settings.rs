//! Settings service
//!
//! Account, security, privacy and theme preferences. Every change is
//! written to the `audit` log target with the user id and client IP.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::data::{Database, Payment, User};
use crate::error::AppError;
use crate::service::AccountService;

pub const THEMES: [&str; 4] = ["light", "dark", "aurora", "midnight"];
pub const DEFAULT_THEME: &str = "aurora";

/// Known theme name, falling back to the default for anything else
pub fn normalize_theme(name: &str) -> &'static str {
    THEMES
        .iter()
        .copied()
        .find(|theme| *theme == name)
        .unwrap_or(DEFAULT_THEME)
}

/// Privacy toggles submitted from the settings page
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyUpdate {
    pub is_private: bool,
    pub tracking_protection: bool,
    pub recommendation_indexing: bool,
}

#[derive(Debug, Clone)]
pub struct SettingsView {
    pub user: User,
    pub privacy: Value,
    pub theme: String,
    pub is_premium: bool,
    pub payments_ready: bool,
    /// Checkout history, newest first
    pub payments: Vec<Payment>,
}

/// Merge the toggles into the stored privacy object
///
/// Unknown keys already present are preserved; a non-object value is replaced.
fn merge_privacy(current: &str, update: PrivacyUpdate) -> Value {
    let mut settings = match serde_json::from_str::<Value>(current) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    settings.insert("is_private".into(), Value::Bool(update.is_private));
    settings.insert(
        "tracking_protection".into(),
        Value::Bool(update.tracking_protection),
    );
    settings.insert(
        "recommendation_indexing".into(),
        Value::Bool(update.recommendation_indexing),
    );
    settings.insert("data_sovereignty_active".into(), Value::Bool(true));
    settings.insert("last_updated".into(), Value::String(Utc::now().to_rfc3339()));
    Value::Object(settings)
}

pub struct SettingsService {
    db: Arc<Database>,
    payments_ready: bool,
}

impl SettingsService {
    pub fn new(db: Arc<Database>, payments_ready: bool) -> Self {
        Self { db, payments_ready }
    }

    fn accounts(&self) -> AccountService {
        AccountService::new(self.db.clone())
    }

    pub async fn view(&self, user: &User) -> Result<SettingsView, AppError> {
        let profile = self.db.get_profile(&user.id).await?.ok_or(AppError::NotFound)?;
        let privacy = serde_json::from_str::<Value>(&profile.privacy_settings)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok(SettingsView {
            user: user.clone(),
            privacy,
            theme: profile.theme,
            is_premium: profile.is_premium,
            payments_ready: self.payments_ready,
            payments: self.db.list_payments(&user.id).await?,
        })
    }

    pub async fn update_account(
        &self,
        user: &User,
        email: Option<String>,
        first_name: Option<String>,
        client_ip: &str,
    ) -> Result<User, AppError> {
        tracing::info!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            form = "account",
            "Settings update"
        );
        self.accounts().update_account(user, email, first_name).await
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        confirm: &str,
        client_ip: &str,
    ) -> Result<(), AppError> {
        tracing::info!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            form = "security",
            "Settings update"
        );
        self.accounts()
            .change_password(user, old_password, new_password, confirm)
            .await
    }

    pub async fn update_privacy(
        &self,
        user: &User,
        update: PrivacyUpdate,
        client_ip: &str,
    ) -> Result<Value, AppError> {
        tracing::info!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            form = "privacy",
            "Settings update"
        );

        let profile = self.db.get_profile(&user.id).await?.ok_or(AppError::NotFound)?;
        let merged = merge_privacy(&profile.privacy_settings, update);
        self.db
            .update_privacy_settings(&user.id, &merged.to_string())
            .await?;
        Ok(merged)
    }

    /// Persist the theme; returns the normalized name
    pub async fn set_theme(
        &self,
        user: &User,
        name: &str,
        client_ip: &str,
    ) -> Result<&'static str, AppError> {
        let theme = normalize_theme(name);
        self.db.update_theme(&user.id, theme).await?;
        tracing::info!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            theme,
            "Interface change"
        );
        Ok(theme)
    }

    /// Soft delete
    pub async fn deactivate(&self, user: &User, client_ip: &str) -> Result<(), AppError> {
        tracing::warn!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            "Deactivation request"
        );
        self.accounts().deactivate(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{create_test_db, create_user};

    #[test]
    fn unknown_theme_falls_back_to_aurora() {
        assert_eq!(normalize_theme("midnight"), "midnight");
        assert_eq!(normalize_theme("light"), "light");
        assert_eq!(normalize_theme("neon"), "aurora");
        assert_eq!(normalize_theme(""), "aurora");
    }

    #[test]
    fn privacy_merge_keeps_unknown_keys() {
        let merged = merge_privacy(
            r#"{"custom": 1, "is_private": true}"#,
            PrivacyUpdate {
                is_private: false,
                tracking_protection: true,
                recommendation_indexing: false,
            },
        );
        assert_eq!(merged["custom"], 1);
        assert_eq!(merged["is_private"], false);
        assert_eq!(merged["tracking_protection"], true);
        assert_eq!(merged["recommendation_indexing"], false);
        assert_eq!(merged["data_sovereignty_active"], true);
        assert!(merged["last_updated"].is_string());

        let replaced = merge_privacy("[1, 2]", PrivacyUpdate::default());
        assert!(replaced.get("custom").is_none());
        assert_eq!(replaced["data_sovereignty_active"], true);
    }

    #[tokio::test]
    async fn privacy_update_turns_off_indexing() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = SettingsService::new(db.clone(), false);

        service
            .update_privacy(&alice, PrivacyUpdate::default(), "127.0.0.1")
            .await
            .unwrap();

        let profile = db.get_profile(&alice.id).await.unwrap().unwrap();
        assert!(!profile.allows_indexing());

        let view = service.view(&alice).await.unwrap();
        assert_eq!(view.privacy["is_private"], false);
        assert!(!view.payments_ready);
    }

    #[tokio::test]
    async fn theme_is_persisted_normalized() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = create_user(&db, "alice").await;
        let service = SettingsService::new(db, true);

        assert_eq!(service.set_theme(&alice, "dark", "::1").await.unwrap(), "dark");
        assert_eq!(service.view(&alice).await.unwrap().theme, "dark");

        assert_eq!(service.set_theme(&alice, "sepia", "::1").await.unwrap(), "aurora");
        assert_eq!(service.view(&alice).await.unwrap().theme, "aurora");
    }
}
