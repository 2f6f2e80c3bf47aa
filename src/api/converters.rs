//! Conversion functions from domain models to API DTOs

use crate::api::dto::*;
use crate::data::{
    BondEntry, CommentEntry, CommunitySummary, ConnectionEntry, EventSummary, FeedEntry,
    MemberEntry, MessageEntry, Payment, RoomSummary, User, UserSummary,
};
use crate::service::{
    CommunityDetail, EventDetail, NetworkDashboard, NetworkRequests, ProfileView, SearchResults,
    SettingsView,
};
use crate::storage::MediaStorage;

fn display_name<'a>(full_name: &'a str, username: &'a str) -> &'a str {
    if full_name.trim().is_empty() {
        username
    } else {
        full_name
    }
}

pub fn account_to_response(user: &User) -> AccountResponse {
    AccountResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        created_at: user.created_at,
    }
}

pub fn user_to_response(user: &UserSummary, storage: &MediaStorage) -> UserResponse {
    UserResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        full_name: user.full_name.clone(),
        avatar_url: storage.avatar_url(
            user.avatar_key.as_deref(),
            display_name(&user.full_name, &user.username),
        ),
        is_verified: user.is_verified,
    }
}

pub fn bird_to_response(entry: &FeedEntry, storage: &MediaStorage) -> BirdResponse {
    let bird = &entry.bird;
    let media_url = |key: &Option<String>| key.as_deref().map(|key| storage.public_url(key));

    BirdResponse {
        id: bird.id.clone(),
        author: BirdAuthorResponse {
            id: bird.author_id.clone(),
            username: entry.author_username.clone(),
            full_name: entry.author_full_name.clone(),
            avatar_url: storage.avatar_url(
                entry.author_avatar_key.as_deref(),
                display_name(&entry.author_full_name, &entry.author_username),
            ),
            is_verified: entry.author_is_verified,
        },
        content: bird.content.clone(),
        image_url: media_url(&bird.image_key),
        video_url: media_url(&bird.video_key),
        thumbnail_url: media_url(&bird.thumbnail_key),
        post_type: bird.post_type.clone(),
        visibility: bird.visibility.clone(),
        location: bird.location.clone(),
        is_processing: bird.is_processing,
        created_at: bird.created_at,
        expires_at: bird.expires_at,
        like_count: entry.like_count,
        comment_count: entry.comment_count,
        liked: entry.liked,
        saved: entry.saved,
    }
}

pub fn birds_to_response(entries: &[FeedEntry], storage: &MediaStorage) -> Vec<BirdResponse> {
    entries
        .iter()
        .map(|entry| bird_to_response(entry, storage))
        .collect()
}

pub fn comment_to_response(entry: &CommentEntry, storage: &MediaStorage) -> CommentResponse {
    CommentResponse {
        id: entry.comment.id.clone(),
        bird_id: entry.comment.bird_id.clone(),
        parent_id: entry.comment.parent_id.clone(),
        content: entry.comment.content.clone(),
        author_username: entry.author_username.clone(),
        author_avatar_url: storage
            .avatar_url(entry.author_avatar_key.as_deref(), &entry.author_username),
        created_at: entry.comment.created_at,
    }
}

pub fn search_to_response(results: &SearchResults, storage: &MediaStorage) -> SearchResponse {
    SearchResponse {
        users: results
            .users
            .iter()
            .map(|user| user_to_response(user, storage))
            .collect(),
        birds: birds_to_response(&results.birds, storage),
    }
}

pub fn bond_entry_to_response(entry: &BondEntry, storage: &MediaStorage) -> BondEntryResponse {
    BondEntryResponse {
        id: entry.bond.id.clone(),
        bond_type: entry.bond.bond_type.clone(),
        status: entry.bond.status.clone(),
        created_at: entry.bond.created_at,
        other_id: entry.other_id.clone(),
        other_username: entry.other_username.clone(),
        other_full_name: entry.other_full_name.clone(),
        other_avatar_url: storage.avatar_url(
            entry.other_avatar_key.as_deref(),
            display_name(&entry.other_full_name, &entry.other_username),
        ),
    }
}

pub fn profile_to_response(view: &ProfileView, storage: &MediaStorage) -> ProfileResponse {
    let profile = &view.profile;

    ProfileResponse {
        user: user_to_response(&view.user, storage),
        full_name: profile.full_name.clone(),
        document: view.is_own_profile.then(|| profile.document.clone()),
        gender: profile.gender.clone(),
        age: view.age,
        birth_date: profile.birth_date,
        show_birth_year: profile.show_birth_year,
        current_city: profile.current_city.clone(),
        hometown: profile.hometown.clone(),
        visited_places: profile.visited_places_list(),
        phone: profile.phone.clone(),
        public_email: profile.public_email.clone(),
        bio: profile.bio.clone(),
        avatar_url: storage.avatar_url(
            profile.avatar_key.as_deref(),
            display_name(&profile.full_name, &view.user.username),
        ),
        cover_url: profile.cover_key.as_deref().map(|key| storage.public_url(key)),
        interests: profile.interests_value(),
        is_premium: profile.is_premium,
        premium_since: profile.premium_since,
        stats: StatsResponse {
            followers: view.stats.followers,
            following: view.stats.following,
            friends_count: view.stats.friends_count,
            posts_count: view.stats.posts_count,
        },
        relationship: RelationshipResponse {
            following: view.relationship.following,
            followed_by: view.relationship.followed_by,
            blocking: view.relationship.blocking,
            blocked_by: view.relationship.blocked_by,
            bonds: view.relationship.bonds.clone(),
        },
        family: view
            .family
            .iter()
            .map(|entry| bond_entry_to_response(entry, storage))
            .collect(),
        work: view.work.clone(),
        education: view.education.clone(),
        birds: birds_to_response(&view.birds, storage),
        is_own_profile: view.is_own_profile,
    }
}

fn connection_to_response(entry: &ConnectionEntry, storage: &MediaStorage) -> ConnectionResponse {
    ConnectionResponse {
        user: user_to_response(&entry.user, storage),
        connected_at: entry.connected_at,
    }
}

fn connections_to_response(
    entries: &[ConnectionEntry],
    storage: &MediaStorage,
) -> Vec<ConnectionResponse> {
    entries
        .iter()
        .map(|entry| connection_to_response(entry, storage))
        .collect()
}

pub fn network_to_response(
    dashboard: &NetworkDashboard,
    storage: &MediaStorage,
) -> NetworkResponse {
    NetworkResponse {
        followers: connections_to_response(&dashboard.followers, storage),
        following: connections_to_response(&dashboard.following, storage),
    }
}

pub fn requests_to_response(
    requests: &NetworkRequests,
    storage: &MediaStorage,
) -> RequestsResponse {
    RequestsResponse {
        pending_bonds: requests
            .pending_bonds
            .iter()
            .map(|entry| bond_entry_to_response(entry, storage))
            .collect(),
        recent_followers: connections_to_response(&requests.recent_followers, storage),
    }
}

pub fn community_to_response(
    summary: &CommunitySummary,
    storage: &MediaStorage,
) -> CommunityResponse {
    let community = &summary.community;
    CommunityResponse {
        id: community.id.clone(),
        name: community.name.clone(),
        slug: community.slug.clone(),
        description: community.description.clone(),
        cover_url: community.cover_key.as_deref().map(|key| storage.public_url(key)),
        creator_id: community.creator_id.clone(),
        is_private: community.is_private,
        created_at: community.created_at,
        member_count: summary.member_count,
        is_member: summary.is_member,
    }
}

fn member_to_response(member: &MemberEntry, storage: &MediaStorage) -> MemberResponse {
    MemberResponse {
        user: user_to_response(&member.user, storage),
        role: member.role.clone(),
        joined_at: member.joined_at,
    }
}

pub fn community_detail_to_response(
    detail: &CommunityDetail,
    storage: &MediaStorage,
) -> CommunityDetailResponse {
    CommunityDetailResponse {
        community: community_to_response(&detail.summary, storage),
        members: detail
            .members
            .iter()
            .map(|member| member_to_response(member, storage))
            .collect(),
        viewer_role: detail.viewer_role.clone(),
    }
}

pub fn room_to_response(summary: &RoomSummary) -> RoomResponse {
    RoomResponse {
        id: summary.room.id.clone(),
        name: summary.room.name.clone(),
        is_group: summary.room.is_group,
        updated_at: summary.room.updated_at,
        last_message: summary.last_message.clone(),
        unread_count: summary.unread_count,
    }
}

pub fn message_to_response(entry: &MessageEntry, storage: &MediaStorage) -> MessageResponse {
    MessageResponse {
        id: entry.message.id.clone(),
        room_id: entry.message.room_id.clone(),
        content: entry.message.content.clone(),
        username: entry.sender_username.clone(),
        avatar_url: storage.avatar_url(entry.sender_avatar_key.as_deref(), &entry.sender_username),
        created_at: entry.message.created_at,
        is_read: entry.message.is_read,
    }
}

pub fn event_to_response(summary: &EventSummary, storage: &MediaStorage) -> EventResponse {
    let event = &summary.event;
    EventResponse {
        id: event.id.clone(),
        title: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        starts_at: event.starts_at,
        cover_url: event.cover_key.as_deref().map(|key| storage.public_url(key)),
        creator_id: event.creator_id.clone(),
        participant_count: summary.participant_count,
        is_participating: summary.is_participating,
    }
}

pub fn event_detail_to_response(
    detail: &EventDetail,
    storage: &MediaStorage,
) -> EventDetailResponse {
    EventDetailResponse {
        event: event_to_response(&detail.summary, storage),
        participants: detail
            .participants
            .iter()
            .map(|user| user_to_response(user, storage))
            .collect(),
    }
}

pub fn settings_to_response(view: &SettingsView) -> SettingsResponse {
    SettingsResponse {
        account: account_to_response(&view.user),
        privacy: view.privacy.clone(),
        theme: view.theme.clone(),
        is_premium: view.is_premium,
        payments_ready: view.payments_ready,
        payments: view.payments.iter().map(payment_to_response).collect(),
    }
}

fn payment_to_response(payment: &Payment) -> PaymentResponse {
    PaymentResponse {
        id: payment.id.clone(),
        status: payment.status.clone(),
        amount: payment.amount,
        created_at: payment.created_at,
        updated_at: payment.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bird;
    use chrono::Utc;

    fn storage(root: &std::path::Path) -> MediaStorage {
        MediaStorage::new(&crate::config::MediaConfig {
            root: root.to_path_buf(),
            public_path: "/media".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn bird_media_keys_become_urls() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = storage(temp_dir.path());
        let entry = FeedEntry {
            bird: Bird {
                id: "b1".to_string(),
                author_id: "u1".to_string(),
                content: None,
                image_key: None,
                video_key: Some("posts/alice/b1.mp4".to_string()),
                thumbnail_key: Some("posts/alice/thumbnails/b1_thumb.jpg".to_string()),
                post_type: "video".to_string(),
                visibility: "public".to_string(),
                location: None,
                is_processing: false,
                created_at: Utc::now(),
                expires_at: None,
            },
            author_username: "alice".to_string(),
            author_full_name: String::new(),
            author_avatar_key: None,
            author_is_verified: false,
            like_count: 3,
            comment_count: 0,
            liked: true,
            saved: false,
        };

        let response = bird_to_response(&entry, &storage);
        assert_eq!(response.video_url.as_deref(), Some("/media/posts/alice/b1.mp4"));
        assert_eq!(
            response.thumbnail_url.as_deref(),
            Some("/media/posts/alice/thumbnails/b1_thumb.jpg")
        );
        assert!(response.image_url.is_none());
        assert!(response.author.avatar_url.contains("name=alice"));
        assert_eq!(response.like_count, 3);
    }
}
