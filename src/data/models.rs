//! Data models
//!
//! Rust structs representing database entities and joined read models.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// The chat room every user can join.
pub const GLOBAL_ROOM_ID: &str = "00000000000000000000000000";

// =============================================================================
// Users & Profiles
// =============================================================================

/// Login identity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Public profile, created together with the user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
    pub document: String,
    /// M, F or O
    pub gender: String,
    pub birth_date: Option<NaiveDate>,
    pub show_birth_year: bool,
    pub current_city: String,
    pub hometown: String,
    /// JSON array of place names
    pub visited_places: String,
    pub phone: String,
    pub public_email: String,
    pub bio: String,
    pub avatar_key: Option<String>,
    pub cover_key: Option<String>,
    /// JSON object
    pub interests: String,
    /// JSON object
    pub privacy_settings: String,
    pub is_verified: bool,
    pub is_premium: bool,
    pub premium_since: Option<DateTime<Utc>>,
    pub theme: String,
    pub created_at: DateTime<Utc>,
}

pub const GENDERS: [&str; 3] = ["M", "F", "O"];

impl Profile {
    /// Empty profile for a freshly registered user
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            full_name: String::new(),
            document: String::new(),
            gender: "M".to_string(),
            birth_date: None,
            show_birth_year: false,
            current_city: String::new(),
            hometown: String::new(),
            visited_places: "[]".to_string(),
            phone: String::new(),
            public_email: String::new(),
            bio: String::new(),
            avatar_key: None,
            cover_key: None,
            interests: "{}".to_string(),
            privacy_settings: "{}".to_string(),
            is_verified: false,
            is_premium: false,
            premium_since: None,
            theme: "aurora".to_string(),
            created_at: now,
        }
    }

    /// Completed years since `birth_date` as of `today`
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth = self.birth_date?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Some(age)
    }

    pub fn visited_places_list(&self) -> Vec<String> {
        serde_json::from_str(&self.visited_places).unwrap_or_default()
    }

    pub fn interests_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.interests)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    pub fn privacy(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::from_str::<serde_json::Value>(&self.privacy_settings) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Whether posts may be sent to the recommendation service
    pub fn allows_indexing(&self) -> bool {
        self.privacy()
            .get("recommendation_indexing")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true)
    }
}

/// Compact user info used in lists and embedded objects
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub full_name: String,
    pub avatar_key: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkExperience {
    pub id: String,
    pub user_id: String,
    pub company: String,
    pub position: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Education {
    pub id: String,
    pub user_id: String,
    pub institution: String,
    pub course: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

// =============================================================================
// Birds (posts)
// =============================================================================

/// Post kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Text,
    Image,
    Video,
    /// Expires 24 hours after creation
    Story,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Story => "story",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "story" => Some(Self::Story),
            _ => None,
        }
    }
}

/// Who can see a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Author plus users with an active bond to the author
    Friends,
    /// Author only
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Friends => "friends",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "friends" => Some(Self::Friends),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bird {
    pub id: String,
    pub author_id: String,
    pub content: Option<String>,
    pub image_key: Option<String>,
    pub video_key: Option<String>,
    pub thumbnail_key: Option<String>,
    pub post_type: String,
    pub visibility: String,
    pub location: Option<String>,
    /// True while the thumbnail worker owns the post
    pub is_processing: bool,
    pub created_at: DateTime<Utc>,
    /// Set for stories only
    pub expires_at: Option<DateTime<Utc>>,
}

/// Bird joined with author info and viewer-relative flags
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedEntry {
    #[sqlx(flatten)]
    pub bird: Bird,
    pub author_username: String,
    pub author_full_name: String,
    pub author_avatar_key: Option<String>,
    pub author_is_verified: bool,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: bool,
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub bird_id: String,
    pub author_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with author info
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentEntry {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub author_avatar_key: Option<String>,
}

// =============================================================================
// Relationships
// =============================================================================

/// Unilateral follow
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Connection {
    pub follower_id: String,
    pub target_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Follower list row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConnectionEntry {
    #[sqlx(flatten)]
    pub user: UserSummary,
    pub connected_at: DateTime<Utc>,
}

/// Bilateral relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondType {
    Friend,
    Bestie,
    Dating,
    Married,
    Father,
    Mother,
    Son,
    Sibling,
    Colleague,
}

impl BondType {
    pub const ALL: [BondType; 9] = [
        Self::Friend,
        Self::Bestie,
        Self::Dating,
        Self::Married,
        Self::Father,
        Self::Mother,
        Self::Son,
        Self::Sibling,
        Self::Colleague,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friend => "friend",
            Self::Bestie => "bestie",
            Self::Dating => "dating",
            Self::Married => "married",
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Son => "son",
            Self::Sibling => "sibling",
            Self::Colleague => "colleague",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn is_family(&self) -> bool {
        matches!(
            self,
            Self::Married | Self::Father | Self::Mother | Self::Son | Self::Sibling
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondStatus {
    Pending,
    Active,
    Blocked,
}

impl BondStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }
}

/// Typed relationship requiring acceptance
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialBond {
    pub id: String,
    pub requester_id: String,
    pub target_id: String,
    pub bond_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Bond joined with the other party's summary
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BondEntry {
    #[sqlx(flatten)]
    pub bond: SocialBond,
    pub other_id: String,
    pub other_username: String,
    pub other_full_name: String,
    pub other_avatar_key: Option<String>,
}

// =============================================================================
// Communities
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub cover_key: Option<String>,
    pub creator_id: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommunitySummary {
    #[sqlx(flatten)]
    pub community: Community,
    pub member_count: i64,
    pub is_member: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityRole {
    Member,
    Moderator,
    Admin,
}

impl CommunityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommunityMember {
    pub community_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberEntry {
    #[sqlx(flatten)]
    pub user: UserSummary,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub updated_at: DateTime<Utc>,
}

/// Room with its latest message
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoomSummary {
    #[sqlx(flatten)]
    pub room: Room,
    pub last_message: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub media_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Message joined with sender info
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageEntry {
    #[sqlx(flatten)]
    pub message: Message,
    pub sender_username: String,
    pub sender_avatar_key: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub cover_key: Option<String>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventSummary {
    #[sqlx(flatten)]
    pub event: Event,
    pub participant_count: i64,
    pub is_participating: bool,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Bond,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Bond => "bond",
            Self::System => "system",
        }
    }
}

/// Persisted notification
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification joined with sender info (sender may be absent)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationEntry {
    #[sqlx(flatten)]
    pub notification: Notification,
    pub sender_username: Option<String>,
    pub sender_first_name: Option<String>,
    pub sender_full_name: Option<String>,
    pub sender_avatar_key: Option<String>,
}

// =============================================================================
// Payments
// =============================================================================

/// Premium checkout record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub preference_id: String,
    pub provider_payment_id: Option<String>,
    pub status: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
