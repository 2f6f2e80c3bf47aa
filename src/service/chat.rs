//! Chat service
//!
//! Rooms, message history and posting. Posted messages are persisted first
//! and then fanned out through the [`ChatHub`].

use std::sync::Arc;

use chrono::{Local, Utc};

use crate::chat::{ChatEvent, ChatHub};
use crate::data::{
    Database, EntityId, GLOBAL_ROOM_ID, Message, MessageEntry, Room, RoomSummary, User,
};
use crate::error::AppError;
use crate::metrics::CHAT_MESSAGES_TOTAL;
use crate::storage::MediaStorage;

/// Chat service
pub struct ChatService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    hub: Arc<ChatHub>,
    history_limit: i64,
}

impl ChatService {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        hub: Arc<ChatHub>,
        history_limit: i64,
    ) -> Self {
        Self {
            db,
            storage,
            hub,
            history_limit,
        }
    }

    /// Check the user may use the room, joining the global room on demand
    pub async fn ensure_access(&self, user: &User, room_id: &str) -> Result<Room, AppError> {
        let room = self.db.get_room(room_id).await?.ok_or(AppError::NotFound)?;

        if room.id == GLOBAL_ROOM_ID {
            self.db.add_room_participant(&room.id, &user.id).await?;
            return Ok(room);
        }

        if self.db.is_room_participant(&room.id, &user.id).await? {
            Ok(room)
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Rooms the user is in, most recently active first
    pub async fn rooms(&self, user: &User) -> Result<Vec<RoomSummary>, AppError> {
        self.db.add_room_participant(GLOBAL_ROOM_ID, &user.id).await?;
        self.db.rooms_for_user(&user.id).await
    }

    /// Find or open the direct room with `username`
    pub async fn start_chat(&self, user: &User, username: &str) -> Result<Room, AppError> {
        let other = self
            .db
            .get_user_by_username(username)
            .await?
            .filter(|other| other.is_active)
            .ok_or(AppError::NotFound)?;

        if other.id == user.id {
            return Err(AppError::Validation(
                "You cannot start a chat with yourself".to_string(),
            ));
        }
        if self.db.is_blocked_either_way(&user.id, &other.id).await? {
            return Err(AppError::Forbidden);
        }

        if let Some(room) = self.db.find_direct_room(&user.id, &other.id).await? {
            return Ok(room);
        }

        let room = Room {
            id: EntityId::new().0,
            name: None,
            is_group: false,
            updated_at: Utc::now(),
        };
        self.db
            .create_room(&room, &[user.id.as_str(), other.id.as_str()])
            .await?;

        tracing::info!(
            room_id = %room.id,
            user_id = %user.id,
            other_id = %other.id,
            "Direct room opened"
        );
        Ok(room)
    }

    /// Latest messages, oldest first
    pub async fn messages(
        &self,
        user: &User,
        room_id: &str,
    ) -> Result<Vec<MessageEntry>, AppError> {
        let room = self.ensure_access(user, room_id).await?;
        self.db.recent_messages(&room.id, self.history_limit).await
    }

    /// Persist a message and publish it to the room's subscribers
    pub async fn post_message(
        &self,
        user: &User,
        room_id: &str,
        content: &str,
    ) -> Result<ChatEvent, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".to_string()));
        }

        let room = self.ensure_access(user, room_id).await?;

        let message = Message {
            id: EntityId::new().0,
            room_id: room.id.clone(),
            sender_id: user.id.clone(),
            content: content.to_string(),
            media_key: None,
            created_at: Utc::now(),
            is_read: false,
        };
        self.db.insert_message(&message).await?;
        CHAT_MESSAGES_TOTAL.inc();

        let avatar_key = self
            .db
            .get_profile(&user.id)
            .await?
            .and_then(|profile| profile.avatar_key);

        let event = ChatEvent {
            message: message.content,
            username: user.username.clone(),
            avatar_url: self.storage.avatar_url(avatar_key.as_deref(), &user.username),
            timestamp: message
                .created_at
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string(),
            message_id: message.id,
            room_id: room.id,
        };

        let delivered = self.hub.publish(event.clone());
        tracing::debug!(room_id = %event.room_id, delivered, "Chat message published");

        Ok(event)
    }

    /// Mark other participants' messages read; returns how many changed
    pub async fn mark_read(&self, user: &User, room_id: &str) -> Result<u64, AppError> {
        let room = self.ensure_access(user, room_id).await?;
        self.db.mark_room_read(&room.id, &user.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{create_test_db, create_test_storage, create_user};

    async fn setup() -> (Arc<Database>, ChatService, Arc<ChatHub>, User, User, tempfile::TempDir) {
        let (db, temp_dir) = create_test_db().await;
        let hub = Arc::new(ChatHub::new(16));
        let service = ChatService::new(db.clone(), create_test_storage(&temp_dir), hub.clone(), 50);
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        (db, service, hub, alice, bob, temp_dir)
    }

    #[tokio::test]
    async fn global_room_is_joined_automatically() {
        let (_db, service, _hub, alice, _bob, _temp_dir) = setup().await;

        let rooms = service.rooms(&alice).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room.id, GLOBAL_ROOM_ID);
    }

    #[tokio::test]
    async fn start_chat_reuses_direct_room() {
        let (db, service, _hub, alice, bob, _temp_dir) = setup().await;

        let first = service.start_chat(&alice, "bob").await.unwrap();
        let second = service.start_chat(&bob, "alice").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.is_group);

        assert!(matches!(
            service.start_chat(&alice, "alice").await,
            Err(AppError::Validation(_))
        ));

        db.block_user(&bob.id, &alice.id).await.unwrap();
        assert!(matches!(
            service.start_chat(&alice, "bob").await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn post_message_persists_and_publishes() {
        let (_db, service, hub, alice, bob, _temp_dir) = setup().await;
        let room = service.start_chat(&alice, "bob").await.unwrap();
        let mut receiver = hub.subscribe(&room.id);

        let event = service.post_message(&alice, &room.id, "  hi bob ").await.unwrap();
        assert_eq!(event.message, "hi bob");
        assert_eq!(event.username, "alice");
        assert_eq!(event.timestamp.len(), 5);

        assert_eq!(receiver.recv().await.unwrap(), event);

        let history = service.messages(&bob, &room.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_username, "alice");

        assert_eq!(service.mark_read(&bob, &room.id).await.unwrap(), 1);
        assert_eq!(service.mark_read(&bob, &room.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outsiders_and_empty_messages_are_refused() {
        let (db, service, _hub, alice, _bob, _temp_dir) = setup().await;
        let carol = create_user(&db, "carol").await;
        let room = service.start_chat(&alice, "bob").await.unwrap();

        assert!(matches!(
            service.messages(&carol, &room.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            service.post_message(&alice, &room.id, "   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.messages(&alice, "missing").await,
            Err(AppError::NotFound)
        ));
        // Anyone may talk in the global room
        service.post_message(&carol, GLOBAL_ROOM_ID, "hello all").await.unwrap();
    }
}
