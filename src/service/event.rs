//! Event service

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::data::{Database, EntityId, Event, EventSummary, User, UserSummary};
use crate::error::AppError;

/// Input for a new event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventDetail {
    pub summary: EventSummary,
    pub participants: Vec<UserSummary>,
}

pub struct EventService {
    db: Arc<Database>,
}

impl EventService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Events not yet started, soonest first
    pub async fn list_upcoming(&self, viewer: &User) -> Result<Vec<EventSummary>, AppError> {
        self.db.upcoming_events(&viewer.id, Utc::now()).await
    }

    pub async fn create(&self, creator: &User, input: NewEvent) -> Result<EventSummary, AppError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Event title is required".to_string()));
        }
        let location = input.location.trim();
        if location.is_empty() {
            return Err(AppError::Validation("Event location is required".to_string()));
        }

        let now = Utc::now();
        let event = Event {
            id: EntityId::new().0,
            title: title.to_string(),
            description: input.description.unwrap_or_default().trim().to_string(),
            location: location.to_string(),
            starts_at: input.starts_at,
            cover_key: None,
            creator_id: creator.id.clone(),
            created_at: now,
        };
        self.db.insert_event(&event).await?;

        tracing::info!(event_id = %event.id, user_id = %creator.id, "Event created");

        self.db
            .get_event(&creator.id, &event.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn detail(&self, viewer: &User, id: &str) -> Result<EventDetail, AppError> {
        let summary = self
            .db
            .get_event(&viewer.id, id)
            .await?
            .ok_or(AppError::NotFound)?;
        let participants = self.db.list_event_participants(id).await?;
        Ok(EventDetail {
            summary,
            participants,
        })
    }

    /// Toggle attendance and return the refreshed summary
    pub async fn attend(&self, user: &User, id: &str) -> Result<EventSummary, AppError> {
        if self.db.get_event(&user.id, id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let attending = self.db.toggle_event_participation(id, &user.id).await?;
        tracing::debug!(event_id = %id, user_id = %user.id, attending, "Attendance toggled");

        self.db.get_event(&user.id, id).await?.ok_or(AppError::NotFound)
    }
}
