//! API response DTOs
//!
//! Data Transfer Objects for JSON API responses. Storage keys never leave the
//! server; every media field here is a public URL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Education, SocialBond, WorkExperience};

/// Compact user, embedded in lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub full_name: String,
    pub avatar_url: String,
    pub is_verified: bool,
}

/// The signed-in account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// Login and registration result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: AccountResponse,
    /// Where the client should go next
    pub redirect: String,
    /// Same value as the session cookie, for bearer-token clients
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdAuthorResponse {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub is_verified: bool,
}

/// Bird response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdResponse {
    pub id: String,
    pub author: BirdAuthorResponse,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub post_type: String,
    pub visibility: String,
    pub location: Option<String>,
    pub is_processing: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: bool,
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub bird_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub author_username: String,
    pub author_avatar_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdDetailResponse {
    pub bird: BirdResponse,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub save_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub users: Vec<UserResponse>,
    pub birds: Vec<BirdResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub followers: i64,
    pub following: i64,
    pub friends_count: i64,
    pub posts_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResponse {
    pub following: bool,
    pub followed_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
    pub bonds: Vec<SocialBond>,
}

/// Bond as seen from one side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondEntryResponse {
    pub id: String,
    pub bond_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub other_id: String,
    pub other_username: String,
    pub other_full_name: String,
    pub other_avatar_url: String,
}

/// Profile page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub full_name: String,
    /// Only shown to the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub gender: String,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub show_birth_year: bool,
    pub current_city: String,
    pub hometown: String,
    pub visited_places: Vec<String>,
    pub phone: String,
    pub public_email: String,
    pub bio: String,
    pub avatar_url: String,
    pub cover_url: Option<String>,
    pub interests: serde_json::Value,
    pub is_premium: bool,
    pub premium_since: Option<DateTime<Utc>>,
    pub stats: StatsResponse,
    pub relationship: RelationshipResponse,
    pub family: Vec<BondEntryResponse>,
    pub work: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub birds: Vec<BirdResponse>,
    pub is_own_profile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
    pub followers_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResponse {
    pub blocking: bool,
}

/// Result of a bond action; `bond` is absent once the bond is deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondActionResponse {
    pub bond: Option<SocialBond>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub user: UserResponse,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub followers: Vec<ConnectionResponse>,
    pub following: Vec<ConnectionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestsResponse {
    pub pending_bonds: Vec<BondEntryResponse>,
    pub recent_followers: Vec<ConnectionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub creator_id: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
    pub is_member: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user: UserResponse,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDetailResponse {
    pub community: CommunityResponse,
    pub members: Vec<MemberResponse>,
    pub viewer_role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub content: String,
    pub username: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub cover_url: Option<String>,
    pub creator_id: String,
    pub participant_count: i64,
    pub is_participating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetailResponse {
    pub event: EventResponse,
    pub participants: Vec<UserResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub account: AccountResponse,
    pub privacy: serde_json::Value,
    pub theme: String,
    pub is_premium: bool,
    pub payments_ready: bool,
    pub payments: Vec<PaymentResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub status: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeResponse {
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub init_point: String,
    pub preference_id: String,
}

/// Acknowledgement for actions without a payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
