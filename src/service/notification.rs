//! Notification service
//!
//! Creates notifications for social actions and formats the recipient's
//! latest ones for display.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::{Database, EntityId, Notification, NotificationEntry, NotificationKind};
use crate::error::AppError;
use crate::storage::MediaStorage;

/// How many notifications `list` returns
pub const NOTIFICATION_PAGE_SIZE: i64 = 20;

const SYSTEM_AVATAR: &str = "https://ui-avatars.com/api/?name=System&background=334155&color=fff";

/// A notification ready for display
#[derive(Debug, Clone, Serialize)]
pub struct NotificationItem {
    pub id: String,
    pub kind: String,
    pub actor_name: String,
    pub actor_avatar: String,
    pub message: String,
    pub time_ago: String,
    pub icon: &'static str,
    pub color: &'static str,
    pub is_read: bool,
    pub url: String,
}

/// Latest notifications plus the unread total
#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationItem>,
    pub unread_count: i64,
}

/// Icon and badge color for a notification kind
pub fn kind_style(kind: &str) -> (&'static str, &'static str) {
    match kind {
        "like" => ("fas fa-heart", "bg-rose-500"),
        "comment" => ("fas fa-comment", "bg-blue-500"),
        "follow" => ("fas fa-user-plus", "bg-emerald-500"),
        "bond" => ("fas fa-user-friends", "bg-violet-500"),
        "system" => ("fas fa-shield-alt", "bg-indigo-600"),
        _ => ("fas fa-bell", "bg-slate-500"),
    }
}

/// Coarse relative age: days, else hours past the first hour, else minutes
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - created_at).max(chrono::Duration::zero());
    let seconds = elapsed.num_seconds();
    let days = seconds / 86_400;
    let remainder = seconds % 86_400;

    if days > 0 {
        format!("{days}d ago")
    } else if remainder > 3600 {
        format!("{}h ago", remainder / 3600)
    } else {
        format!("{}m ago", remainder / 60)
    }
}

/// Notification service
pub struct NotificationService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Store a notification; acting on your own content notifies nobody
    pub async fn notify(
        &self,
        recipient_id: &str,
        sender_id: Option<&str>,
        kind: NotificationKind,
        message: impl Into<String>,
        link: Option<String>,
    ) -> Result<(), AppError> {
        if sender_id == Some(recipient_id) {
            return Ok(());
        }

        let notification = Notification {
            id: EntityId::new().0,
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.map(ToOwned::to_owned),
            kind: kind.as_str().to_string(),
            message: message.into(),
            link,
            is_read: false,
            created_at: Utc::now(),
        };
        self.db.insert_notification(&notification).await?;

        tracing::debug!(
            recipient_id,
            kind = kind.as_str(),
            "Notification created"
        );
        Ok(())
    }

    pub async fn list(&self, recipient_id: &str) -> Result<NotificationList, AppError> {
        let entries = self
            .db
            .recent_notifications(recipient_id, NOTIFICATION_PAGE_SIZE)
            .await?;
        let unread_count = self.db.count_unread_notifications(recipient_id).await?;
        let now = Utc::now();

        let notifications = entries
            .into_iter()
            .map(|entry| self.format(entry, now))
            .collect();

        Ok(NotificationList {
            notifications,
            unread_count,
        })
    }

    fn format(&self, entry: NotificationEntry, now: DateTime<Utc>) -> NotificationItem {
        let NotificationEntry {
            notification,
            sender_username,
            sender_first_name,
            sender_full_name,
            sender_avatar_key,
        } = entry;

        let (actor_name, actor_avatar) = match sender_username {
            Some(username) => {
                let name = sender_full_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(username);
                let avatar = self.storage.avatar_url(
                    sender_avatar_key.as_deref(),
                    sender_first_name.as_deref().unwrap_or_default(),
                );
                (name, avatar)
            }
            None => ("System".to_string(), SYSTEM_AVATAR.to_string()),
        };

        let (icon, color) = kind_style(&notification.kind);

        NotificationItem {
            time_ago: time_ago(notification.created_at, now),
            url: notification.link.unwrap_or_else(|| "#".to_string()),
            id: notification.id,
            kind: notification.kind,
            actor_name,
            actor_avatar,
            message: notification.message,
            icon,
            color,
            is_read: notification.is_read,
        }
    }

    /// Mark one of the recipient's notifications read
    ///
    /// # Errors
    /// `NotFound` when the id does not belong to the recipient.
    pub async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<(), AppError> {
        if self.db.mark_notification_read(id, recipient_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        self.db.mark_all_notifications_read(recipient_id).await
    }
}
