//! API layer
//!
//! HTTP handlers for:
//! - The JSON API under `/api` (birds, feeds, profiles, network,
//!   communities, chat, events, notifications, settings, payments)
//! - The chat WebSocket
//! - The payment provider webhook
//! - Metrics (Prometheus)

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::AppState;

mod birds;
mod chat;
mod communities;
mod converters;
mod dto;
mod events;
mod extract;
mod feed;
pub mod metrics;
mod network;
mod notifications;
mod payments;
mod profiles;
mod settings;

pub use converters::*;
pub use dto::*;
pub use extract::{ClientIp, RequestMetrics, read_text, read_upload};

pub use chat::chat_socket_router;
pub use metrics::metrics_router;
pub use payments::payments_webhook_router;
pub use settings::THEME_COOKIE;

/// Create the `/api` router
///
/// Every route requires a signed-in user; handlers take `CurrentUser`.
pub fn api_router() -> Router<AppState> {
    let bird_routes = Router::new()
        .route("/birds", post(birds::create_bird))
        .route("/birds/:id", get(birds::get_bird).delete(birds::delete_bird))
        .route("/birds/:id/like", post(birds::toggle_like))
        .route("/birds/:id/save", post(birds::toggle_save))
        .route("/birds/:id/comments", post(birds::add_comment))
        .route("/birds/:id/share", post(birds::share_bird))
        .route("/birds/:id/report", post(birds::report_bird))
        .route("/comments/:id", delete(birds::delete_comment))
        .route("/comments/:id/replies", post(birds::reply_comment));

    let feed_routes = Router::new()
        .route("/feed", get(feed::home_feed))
        .route("/stories", get(feed::stories))
        .route("/explore", get(feed::explore))
        .route("/reels", get(feed::reels))
        .route("/search", get(feed::search))
        .route("/hashtags/:tag", get(feed::hashtag))
        .route("/saved", get(feed::saved));

    let profile_routes = Router::new()
        .route("/profiles/:username", get(profiles::get_profile))
        .route("/profile", patch(profiles::update_profile))
        .route("/profile/avatar", post(profiles::upload_avatar))
        .route("/profile/cover", post(profiles::upload_cover))
        .route("/profile/work", post(profiles::add_work))
        .route("/profile/work/:id", delete(profiles::delete_work))
        .route("/profile/education", post(profiles::add_education))
        .route("/profile/education/:id", delete(profiles::delete_education));

    let network_routes = Router::new()
        .route("/users/:username/follow", post(network::toggle_follow))
        .route("/users/:username/block", post(network::toggle_block))
        .route("/users/:username/bond", post(network::request_bond))
        .route("/bonds/:id/:action", post(network::manage_bond))
        .route("/network", get(network::dashboard))
        .route("/network/suggestions", get(network::suggestions))
        .route("/network/requests", get(network::requests));

    let community_routes = Router::new()
        .route(
            "/communities",
            get(communities::list_communities).post(communities::create_community),
        )
        .route("/communities/:slug", get(communities::get_community))
        .route("/communities/:slug/join", post(communities::join_community))
        .route("/communities/:slug/leave", post(communities::leave_community));

    let chat_routes = Router::new()
        .route("/chat/rooms", get(chat::list_rooms))
        .route("/chat/start/:username", post(chat::start_chat))
        .route(
            "/chat/rooms/:id/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        .route("/chat/rooms/:id/read", post(chat::mark_read));

    let event_routes = Router::new()
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/:id", get(events::get_event))
        .route("/events/:id/attend", post(events::toggle_attend));

    let notification_routes = Router::new()
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read_all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read));

    let settings_routes = Router::new()
        .route("/settings", get(settings::get_settings))
        .route("/settings/account", patch(settings::update_account))
        .route("/settings/password", post(settings::change_password))
        .route("/settings/privacy", put(settings::update_privacy))
        .route("/settings/theme/:name", post(settings::set_theme))
        .route("/settings/deactivate", post(settings::deactivate))
        .route("/payments/checkout", post(payments::checkout));

    Router::new()
        .merge(bird_routes)
        .merge(feed_routes)
        .merge(profile_routes)
        .merge(network_routes)
        .merge(community_routes)
        .merge(chat_routes)
        .merge(event_routes)
        .merge(notification_routes)
        .merge(settings_routes)
}
