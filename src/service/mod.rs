//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database, media storage, chat fan-out and the
//! outbound recommendation and payment integrations.

mod account;
mod chat;
mod community;
mod event;
mod feed;
mod network;
mod notification;
mod payment;
mod post;
mod profile;
mod settings;

#[cfg(test)]
mod test_support;

pub use account::{AccountService, RegisterInput};
pub use chat::ChatService;
pub use community::{CommunityDetail, CommunityService, slugify};
pub use event::{EventDetail, EventService, NewEvent};
pub use feed::{FeedService, SearchResults, page_size};
pub use network::{BondAction, FollowState, NetworkDashboard, NetworkRequests, NetworkService};
pub use notification::{NotificationItem, NotificationList, NotificationService};
pub use payment::{Checkout, PaymentService, WebhookOutcome};
pub use post::{BirdDetail, LikeState, MediaUpload, NewBird, PostService, SaveState};
pub use profile::{
    EducationInput, ProfileService, ProfileStats, ProfileUpdate, ProfileView, Relationship,
    WorkInput,
};
pub use settings::{PrivacyUpdate, SettingsService, SettingsView, normalize_theme};
