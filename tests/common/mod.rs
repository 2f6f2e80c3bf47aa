//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::net::SocketAddr;

use bird::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_PASSWORD: &str = "correct-horse-9";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// A registered user and their bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub token: String,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a server whose config is adjusted by `customize` first
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig)) -> Self {
        bird::metrics::init_metrics();

        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        customize(&mut config);

        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = bird::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: format!("http://{}", addr),
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// WebSocket URL for the same server
    pub fn ws_url(&self, path: &str) -> String {
        format!("{}{}", self.addr.replacen("http://", "ws://", 1), path)
    }

    /// Register `username` and return its bearer token
    pub async fn register(&self, username: &str) -> TestUser {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "password": TEST_PASSWORD,
                "password_confirm": TEST_PASSWORD,
                "email": format!("{username}@example.com"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "registration of {username} failed");

        let body: Value = response.json().await.unwrap();
        TestUser {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            username: username.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_empty(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    /// Publish a text bird and return its id
    pub async fn post_bird(&self, user: &TestUser, content: &str) -> String {
        let form = reqwest::multipart::Form::new().text("content", content.to_string());
        let response = self
            .client
            .post(self.url("/api/birds"))
            .bearer_auth(&user.token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();

        // Ids are ULIDs; keep consecutive birds in distinct milliseconds
        tokio::time::sleep(tokio::time::Duration::from_millis(3)).await;
        body["id"].as_str().unwrap().to_string()
    }
}

/// Local-only configuration rooted in `temp_dir`
fn test_config(temp_dir: &TempDir) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        },
        media: config::MediaConfig {
            root: temp_dir.path().join("media"),
            public_path: "/media".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 604800,
        },
        recommendation: config::RecommendationConfig {
            enabled: false,
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
            rank_feed: false,
        },
        payments: config::PaymentsConfig {
            mercadopago_access_token: None,
            api_base_url: "http://127.0.0.1:9".to_string(),
            premium_price: 29.90,
        },
        cache: config::CacheConfig {
            ranking_ttl: 3600,
            ranking_max_entries: 1000,
        },
        chat: config::ChatConfig {
            channel_capacity: 100,
            history_limit: 50,
        },
        stories: config::StoriesConfig {
            sweep_interval_seconds: 0,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
