//! E2E tests for follows, blocks, bonds and profile pages

mod common;

use common::TestServer;
use serde_json::{Value, json};

#[tokio::test]
async fn test_follow_toggle_updates_counts() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let _bob = server.register("bob").await;

    let response = server.post_empty(&alice, "/api/users/bob/follow").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "following": true, "followers_count": 1 }));

    let response = server.get(&alice, "/api/network").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["following"][0]["user"]["username"], "bob");

    let response = server.post_empty(&alice, "/api/users/bob/follow").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "following": false, "followers_count": 0 }));
}

#[tokio::test]
async fn test_cannot_follow_self_or_missing_user() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server.post_empty(&alice, "/api/users/alice/follow").await;
    assert_eq!(response.status(), 400);

    let response = server.post_empty(&alice, "/api/users/nobody/follow").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_block_prevents_follow_and_hides_birds() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let bird_id = server.post_bird(&bob, "Bob speaks").await;

    let response = server.post_empty(&alice, "/api/users/bob/block").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["blocking"], true);

    let response = server.post_empty(&bob, "/api/users/alice/follow").await;
    assert_eq!(response.status(), 403);

    let response = server.get(&alice, &format!("/api/birds/{bird_id}")).await;
    assert_eq!(response.status(), 404);

    let response = server.post_empty(&alice, "/api/users/bob/block").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["blocking"], false);
}

#[tokio::test]
async fn test_bond_request_accept_flow() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;

    let response = server
        .post(&alice, "/api/users/bob/bond", json!({ "bond_type": "friend" }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["bond"]["status"], "pending");
    let bond_id = body["bond"]["id"].as_str().unwrap().to_string();

    let response = server.get(&bob, "/api/network/requests").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["pending_bonds"][0]["id"], bond_id.as_str());
    assert_eq!(body["pending_bonds"][0]["other_username"], "alice");

    // Only the target may accept
    let response = server
        .post_empty(&alice, &format!("/api/bonds/{bond_id}/accept"))
        .await;
    assert_eq!(response.status(), 403);

    let response = server
        .post_empty(&bob, &format!("/api/bonds/{bond_id}/accept"))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["bond"]["status"], "active");

    let response = server.get(&alice, "/api/profiles/bob").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["stats"]["friends_count"], 1);
}

#[tokio::test]
async fn test_bond_reject_deletes_and_unknown_action_fails() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;

    let response = server
        .post(&alice, "/api/users/bob/bond", json!({ "bond_type": "sibling" }))
        .await;
    let body: Value = response.json().await.unwrap();
    let bond_id = body["bond"]["id"].as_str().unwrap().to_string();

    let response = server
        .post_empty(&bob, &format!("/api/bonds/{bond_id}/ignore"))
        .await;
    assert_eq!(response.status(), 400);

    let response = server
        .post_empty(&bob, &format!("/api/bonds/{bond_id}/reject"))
        .await;
    let body: Value = response.json().await.unwrap();
    assert!(body["bond"].is_null());

    let response = server.get(&bob, "/api/network/requests").await;
    let body: Value = response.json().await.unwrap();
    assert!(body["pending_bonds"].as_array().unwrap().is_empty());

    let response = server
        .post(&alice, "/api/users/bob/bond", json!({ "bond_type": "nemesis" }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_suggestions_exclude_self_and_followed() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    server.register("bob").await;
    server.register("carol").await;
    server.post_empty(&alice, "/api/users/bob/follow").await;

    let response = server.get(&alice, "/api/network/suggestions").await;
    let body: Value = response.json().await.unwrap();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["carol"]);
}

#[tokio::test]
async fn test_profile_document_is_owner_only() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;

    let response = server
        .client
        .patch(server.url("/api/profile"))
        .bearer_auth(&alice.token)
        .json(&json!({
            "full_name": "Alice Liddell",
            "document": "123.456.789-00",
            "bio": "Down the rabbit hole",
            "visited_places": ["Oxford", "Wonderland"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["full_name"], "Alice Liddell");
    assert_eq!(body["document"], "123.456.789-00");
    assert_eq!(body["is_own_profile"], true);

    let response = server.get(&bob, "/api/profiles/alice").await;
    let body: Value = response.json().await.unwrap();
    assert!(body["document"].is_null());
    assert_eq!(body["bio"], "Down the rabbit hole");
    assert_eq!(body["visited_places"], json!(["Oxford", "Wonderland"]));
    assert_eq!(body["is_own_profile"], false);
}

#[tokio::test]
async fn test_work_and_education_entries() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;

    let response = server
        .post(
            &alice,
            "/api/profile/work",
            json!({
                "company": "Acme",
                "position": "Engineer",
                "start_date": "2020-01-01",
                "is_current": true,
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let work: Value = response.json().await.unwrap();
    let work_id = work["id"].as_str().unwrap().to_string();

    let response = server
        .post(
            &alice,
            "/api/profile/education",
            json!({
                "institution": "State University",
                "course": "Physics",
                "start_date": "2015-03-01",
                "end_date": "2019-12-01",
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = server.get(&alice, "/api/profiles/alice").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["work"][0]["company"], "Acme");
    assert_eq!(body["education"][0]["course"], "Physics");

    // Someone else's entry looks missing
    let response = server
        .client
        .delete(server.url(&format!("/api/profile/work/{work_id}")))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .client
        .delete(server.url(&format!("/api/profile/work/{work_id}")))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_avatar_upload_replaces_placeholder() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server.get(&alice, "/api/profiles/alice").await;
    let body: Value = response.json().await.unwrap();
    assert!(body["avatar_url"].as_str().unwrap().contains("ui-avatars.com"));

    let part = reqwest::multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
        .file_name("me.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("avatar", part);
    let response = server
        .client
        .post(server.url("/api/profile/avatar"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/avatars/alice/"));

    let response = server.get(&alice, "/api/profiles/alice").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["avatar_url"], url.as_str());
}
