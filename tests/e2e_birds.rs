//! E2E tests for posting birds, interactions and the feeds

mod common;

use common::TestServer;
use serde_json::{Value, json};

#[tokio::test]
async fn test_create_text_bird_and_read_it_back() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let bird_id = server.post_bird(&alice, "Hello from the nest #first").await;

    let response = server.get(&alice, &format!("/api/birds/{bird_id}")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["bird"]["content"], "Hello from the nest #first");
    assert_eq!(body["bird"]["post_type"], "text");
    assert_eq!(body["bird"]["visibility"], "public");
    assert_eq!(body["bird"]["author"]["username"], "alice");
    assert!(body["comments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_bird_is_rejected() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let form = reqwest::multipart::Form::new().text("content", "   ");
    let response = server
        .client
        .post(server.url("/api/birds"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_image_bird_is_stored_and_served() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let image = reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4])
        .file_name("pic.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .text("content", "Look at this")
        .part("image", image);
    let response = server
        .client
        .post(server.url("/api/birds"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["post_type"], "image");
    let image_url = body["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/posts/alice/"));

    let media = server.client.get(server.url(&image_url)).send().await.unwrap();
    assert_eq!(media.status(), 200);
    assert_eq!(media.bytes().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_wrong_media_type_is_rejected() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let part = reqwest::multipart::Part::bytes(b"not an image".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("image", part);
    let response = server
        .client
        .post(server.url("/api/birds"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_like_toggles_and_notifies_author() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let bird_id = server.post_bird(&alice, "Like me").await;

    let response = server
        .post_empty(&bob, &format!("/api/birds/{bird_id}/like"))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "liked": true, "like_count": 1 }));

    let response = server
        .post_empty(&bob, &format!("/api/birds/{bird_id}/like"))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "liked": false, "like_count": 0 }));

    let response = server.get(&alice, "/api/notifications").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["unread_count"], 1);
    assert_eq!(body["notifications"][0]["kind"], "like");
    assert_eq!(body["notifications"][0]["actor_name"], "bob");
}

#[tokio::test]
async fn test_save_shows_up_in_saved_list() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bird_id = server.post_bird(&alice, "Keep this").await;

    let response = server
        .post_empty(&alice, &format!("/api/birds/{bird_id}/save"))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["saved"], true);

    let response = server.get(&alice, "/api/saved").await;
    let body: Value = response.json().await.unwrap();
    let saved = body.as_array().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["id"], bird_id.as_str());
    assert_eq!(saved[0]["saved"], true);
}

#[tokio::test]
async fn test_comments_and_replies() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let bird_id = server.post_bird(&alice, "Discuss").await;

    let response = server
        .post(&bob, &format!("/api/birds/{bird_id}/comments"), json!({ "content": "First!" }))
        .await;
    assert_eq!(response.status(), 200);
    let comment: Value = response.json().await.unwrap();
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let response = server
        .post(
            &alice,
            &format!("/api/comments/{comment_id}/replies"),
            json!({ "content": "Welcome" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["parent_id"], comment_id.as_str());
    assert_eq!(reply["bird_id"], bird_id.as_str());

    let response = server
        .post(&bob, &format!("/api/birds/{bird_id}/comments"), json!({ "content": "  " }))
        .await;
    assert_eq!(response.status(), 400);

    let response = server.get(&alice, &format!("/api/birds/{bird_id}")).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["comments"].as_array().unwrap().len(), 2);
    assert_eq!(body["bird"]["comment_count"], 2);
}

#[tokio::test]
async fn test_only_author_deletes_bird() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let bird_id = server.post_bird(&alice, "Mine").await;

    let response = server
        .client
        .delete(server.url(&format!("/api/birds/{bird_id}")))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = server
        .client
        .delete(server.url(&format!("/api/birds/{bird_id}")))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server.get(&alice, &format!("/api/birds/{bird_id}")).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_home_feed_contains_followed_authors_only() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;

    server.post_bird(&bob, "From bob").await;
    server.post_bird(&carol, "From carol").await;
    server.post_bird(&alice, "From alice").await;

    server.post_empty(&alice, "/api/users/bob/follow").await;

    let response = server.get(&alice, "/api/feed").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let contents: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|bird| bird["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["From alice", "From bob"]);
}

#[tokio::test]
async fn test_feed_pagination_with_max_id() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    for i in 0..3 {
        server.post_bird(&alice, &format!("bird {i}")).await;
    }

    let response = server.get(&alice, "/api/feed?limit=2").await;
    let first_page: Value = response.json().await.unwrap();
    let first_page = first_page.as_array().unwrap();
    assert_eq!(first_page.len(), 2);

    let last_id = first_page[1]["id"].as_str().unwrap();
    let response = server
        .get(&alice, &format!("/api/feed?limit=2&max_id={last_id}"))
        .await;
    let second_page: Value = response.json().await.unwrap();
    let second_page = second_page.as_array().unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0]["content"], "bird 0");
}

#[tokio::test]
async fn test_search_and_hashtags() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bobby").await;
    server.post_bird(&alice, "Sunset at the beach #travel").await;
    server.post_bird(&alice, "Coffee time").await;

    let response = server.get(&bob, "/api/search?q=sunset").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["birds"].as_array().unwrap().len(), 1);

    let response = server.get(&bob, "/api/search?q=bob").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["users"][0]["username"], "bobby");

    let response = server.get(&bob, "/api/search?q=").await;
    let body: Value = response.json().await.unwrap();
    assert!(body["users"].as_array().unwrap().is_empty());
    assert!(body["birds"].as_array().unwrap().is_empty());

    let response = server.get(&bob, "/api/hashtags/travel").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_story_is_listed_with_expiry() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let form = reqwest::multipart::Form::new()
        .text("content", "Today only")
        .text("post_type", "story");
    let response = server
        .client
        .post(server.url("/api/birds"))
        .bearer_auth(&alice.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let story: Value = response.json().await.unwrap();
    assert_eq!(story["post_type"], "story");
    assert!(story["expires_at"].is_string());

    let response = server.get(&alice, "/api/stories").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Stories stay out of the home feed
    let response = server.get(&alice, "/api/feed").await;
    let body: Value = response.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_report_and_share_acknowledge() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let bird_id = server.post_bird(&alice, "Questionable").await;

    let response = server
        .post(&bob, &format!("/api/birds/{bird_id}/report"), json!({ "reason": "spam" }))
        .await;
    assert_eq!(response.status(), 200);

    let response = server
        .post_empty(&bob, &format!("/api/birds/{bird_id}/share"))
        .await;
    assert_eq!(response.status(), 200);

    let response = server.post_empty(&bob, "/api/birds/missing/share").await;
    assert_eq!(response.status(), 404);
}
