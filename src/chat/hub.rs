//! Per-room broadcast groups
//!
//! Every chat room that has at least one live WebSocket gets a
//! `tokio::sync::broadcast` channel. Messages posted over HTTP or WebSocket
//! are published to the room's channel and delivered to every subscriber.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Payload fanned out to room subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub message: String,
    pub username: String,
    pub avatar_url: String,
    /// Local wall-clock time, `HH:MM`
    pub timestamp: String,
    pub message_id: String,
    pub room_id: String,
}

/// In-process channel layer
pub struct ChatHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<ChatEvent>>>,
    capacity: usize,
}

impl ChatHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn rooms(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<ChatEvent>>> {
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Join a room's group, creating it on first use
    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ChatEvent> {
        let mut rooms = self.rooms();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to a room; returns how many subscribers received it
    pub fn publish(&self, event: ChatEvent) -> usize {
        let rooms = self.rooms();
        match rooms.get(&event.room_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the room's group once nobody listens any more
    pub fn release(&self, room_id: &str) {
        let mut rooms = self.rooms();
        if rooms
            .get(room_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            rooms.remove(room_id);
        }
    }

    /// Number of rooms with a live group
    pub fn active_rooms(&self) -> usize {
        self.rooms().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(room_id: &str, text: &str) -> ChatEvent {
        ChatEvent {
            message: text.to_string(),
            username: "alice".to_string(),
            avatar_url: String::new(),
            timestamp: "12:00".to_string(),
            message_id: "m1".to_string(),
            room_id: room_id.to_string(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber_in_room() {
        let hub = ChatHub::new(8);
        let mut first = hub.subscribe("room-a");
        let mut second = hub.subscribe("room-a");
        let mut other = hub.subscribe("room-b");

        assert_eq!(hub.publish(event("room-a", "hi")), 2);

        assert_eq!(first.recv().await.unwrap().message, "hi");
        assert_eq!(second.recv().await.unwrap().message, "hi");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let hub = ChatHub::new(8);
        assert_eq!(hub.publish(event("nobody", "hi")), 0);
    }

    #[test]
    fn release_removes_empty_groups_only() {
        let hub = ChatHub::new(8);
        let receiver = hub.subscribe("room-a");
        hub.release("room-a");
        assert_eq!(hub.active_rooms(), 1);

        drop(receiver);
        hub.release("room-a");
        assert_eq!(hub.active_rooms(), 0);
    }

    #[tokio::test]
    async fn lagging_receiver_skips_missed_messages() {
        let hub = ChatHub::new(2);
        let mut receiver = hub.subscribe("room-a");
        for n in 0..4 {
            hub.publish(event("room-a", &n.to_string()));
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(receiver.recv().await.unwrap().message, "2");
    }
}
