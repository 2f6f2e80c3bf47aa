//! Fixtures shared by service tests

use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use crate::data::{Database, EntityId, Profile, User};
use crate::storage::MediaStorage;

pub async fn create_test_db() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::connect(&temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (Arc::new(db), temp_dir)
}

pub fn create_test_storage(temp_dir: &TempDir) -> Arc<MediaStorage> {
    let storage = MediaStorage::new(&crate::config::MediaConfig {
        root: temp_dir.path().join("media"),
        public_path: "/media".to_string(),
        ffmpeg_path: "ffmpeg".to_string(),
    })
    .unwrap();
    Arc::new(storage)
}

/// Insert an active user with an empty profile; the password hash is not usable
pub async fn create_user(db: &Database, username: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: EntityId::new().0,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: username.to_string(),
        last_name: String::new(),
        password_hash: "not-a-hash".to_string(),
        is_active: true,
        created_at: now,
    };
    db.create_user_with_profile(&user, &Profile::empty(&user.id, now))
        .await
        .unwrap();
    user
}
