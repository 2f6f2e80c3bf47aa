//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with runtime-checked queries and embedded migrations.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use std::time::Instant;

use super::models::*;
use crate::error::AppError;

/// Bird columns plus author info and viewer flags.
///
/// `?1` is always the viewer id. Rows hidden from the viewer by
/// visibility or a block in either direction are filtered out.
const FEED_SELECT: &str = r#"
    SELECT b.id, b.author_id, b.content, b.image_key, b.video_key, b.thumbnail_key,
           b.post_type, b.visibility, b.location, b.is_processing, b.created_at, b.expires_at,
           u.username AS author_username,
           p.full_name AS author_full_name,
           p.avatar_key AS author_avatar_key,
           p.is_verified AS author_is_verified,
           (SELECT COUNT(*) FROM bird_likes l WHERE l.bird_id = b.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.bird_id = b.id) AS comment_count,
           EXISTS (SELECT 1 FROM bird_likes l WHERE l.bird_id = b.id AND l.user_id = ?1) AS liked,
           EXISTS (SELECT 1 FROM saved_posts s WHERE s.bird_id = b.id AND s.user_id = ?1) AS saved
    FROM birds b
    JOIN users u ON u.id = b.author_id
    JOIN profiles p ON p.user_id = b.author_id
    WHERE u.is_active = 1
      AND NOT EXISTS (
          SELECT 1 FROM blocks k
          WHERE (k.blocker_id = ?1 AND k.blocked_id = b.author_id)
             OR (k.blocker_id = b.author_id AND k.blocked_id = ?1)
      )
      AND (
          b.visibility = 'public'
          OR b.author_id = ?1
          OR (b.visibility = 'friends' AND EXISTS (
              SELECT 1 FROM social_bonds sb
              WHERE sb.status = 'active'
                AND ((sb.requester_id = ?1 AND sb.target_id = b.author_id)
                  OR (sb.target_id = ?1 AND sb.requester_id = b.author_id))
          ))
      )
"#;

const USER_SUMMARY_SELECT: &str = r#"
    SELECT u.id, u.username, u.first_name, p.full_name, p.avatar_key, p.is_verified
    FROM users u
    JOIN profiles p ON p.user_id = u.id
"#;

/// `LIKE` pattern matching `prefix` + `term` anywhere, with `term` taken literally.
///
/// Pair with `ESCAPE '\'` in the query.
pub(super) fn contains_pattern(prefix: &str, term: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + term.len() + 2);
    pattern.push('%');
    pattern.push_str(prefix);
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite file at `path`, creating it and running migrations.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        let db = Self { pool };
        db.ensure_global_room().await?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");
        Ok(db)
    }

    // =========================================================================
    // Users & Profiles
    // =========================================================================

    /// Insert a user and its empty profile in one transaction.
    ///
    /// Returns `Conflict` when the username is taken (case-insensitive).
    pub async fn create_user_with_profile(
        &self,
        user: &User,
        profile: &Profile,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name, password_hash, is_active,
                created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::Conflict(
                    "A user with that username already exists.".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query(
            r#"
            INSERT INTO profiles (
                user_id, full_name, document, gender, birth_date, show_birth_year,
                current_city, hometown, visited_places, phone, public_email, bio,
                avatar_key, cover_key, interests, privacy_settings, is_verified,
                is_premium, premium_since, theme, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.full_name)
        .bind(&profile.document)
        .bind(&profile.gender)
        .bind(profile.birth_date)
        .bind(profile.show_birth_year)
        .bind(&profile.current_city)
        .bind(&profile.hometown)
        .bind(&profile.visited_places)
        .bind(&profile.phone)
        .bind(&profile.public_email)
        .bind(&profile.bio)
        .bind(&profile.avatar_key)
        .bind(&profile.cover_key)
        .bind(&profile.interests)
        .bind(&profile.privacy_settings)
        .bind(profile.is_verified)
        .bind(profile.is_premium)
        .bind(profile.premium_since)
        .bind(&profile.theme)
        .bind(profile.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Case-insensitive lookup
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = ? COLLATE NOCASE",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_summary(&self, id: &str) -> Result<Option<UserSummary>, AppError> {
        let sql = format!("{USER_SUMMARY_SELECT} WHERE u.id = ?");
        let summary = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(summary)
    }

    pub async fn update_user_account(
        &self,
        id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET email = ?, first_name = ?, last_name = ? WHERE id = ?")
            .bind(email)
            .bind(first_name)
            .bind(last_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_password_hash(
        &self,
        id: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft delete or reactivate
    pub async fn set_user_active(&self, id: &str, is_active: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_active_users(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Active users whose username or first name contains `query`
    pub async fn search_users(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let sql = format!(
            "{USER_SUMMARY_SELECT}
             WHERE u.is_active = 1
               AND (u.username LIKE ?1 ESCAPE '\\' OR u.first_name LIKE ?1 ESCAPE '\\')
             ORDER BY u.username
             LIMIT ?2"
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(contains_pattern("", query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Random active users the viewer neither follows nor blocks
    pub async fn suggest_users(
        &self,
        viewer_id: &str,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let sql = format!(
            "{USER_SUMMARY_SELECT}
             WHERE u.is_active = 1
               AND u.id != ?1
               AND NOT EXISTS (SELECT 1 FROM connections c WHERE c.follower_id = ?1
                   AND c.target_id = u.id)
               AND NOT EXISTS (
                   SELECT 1 FROM blocks k
                   WHERE (k.blocker_id = ?1 AND k.blocked_id = u.id)
                      OR (k.blocker_id = u.id AND k.blocked_id = ?1)
               )
             ORDER BY RANDOM()
             LIMIT ?2"
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(viewer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// Write every editable profile field
    pub async fn update_profile(&self, profile: &Profile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE profiles SET
                full_name = ?, document = ?, gender = ?, birth_date = ?, show_birth_year = ?,
                current_city = ?, hometown = ?, visited_places = ?, phone = ?, public_email = ?,
                bio = ?, avatar_key = ?, cover_key = ?, interests = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&profile.full_name)
        .bind(&profile.document)
        .bind(&profile.gender)
        .bind(profile.birth_date)
        .bind(profile.show_birth_year)
        .bind(&profile.current_city)
        .bind(&profile.hometown)
        .bind(&profile.visited_places)
        .bind(&profile.phone)
        .bind(&profile.public_email)
        .bind(&profile.bio)
        .bind(&profile.avatar_key)
        .bind(&profile.cover_key)
        .bind(&profile.interests)
        .bind(&profile.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_privacy_settings(
        &self,
        user_id: &str,
        settings_json: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE profiles SET privacy_settings = ? WHERE user_id = ?")
            .bind(settings_json)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_theme(&self, user_id: &str, theme: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE profiles SET theme = ? WHERE user_id = ?")
            .bind(theme)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Work & Education
    // =========================================================================

    pub async fn insert_work_experience(&self, work: &WorkExperience) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO work_experiences (id, user_id, company, position, start_date, end_date,
                is_current, description)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&work.id)
        .bind(&work.user_id)
        .bind(&work.company)
        .bind(&work.position)
        .bind(work.start_date)
        .bind(work.end_date)
        .bind(work.is_current)
        .bind(&work.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent first
    pub async fn list_work_experiences(
        &self,
        user_id: &str,
    ) -> Result<Vec<WorkExperience>, AppError> {
        let rows = sqlx::query_as::<_, WorkExperience>(
            "SELECT * FROM work_experiences WHERE user_id = ? ORDER BY start_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete only when owned by `user_id`
    pub async fn delete_work_experience(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM work_experiences WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_education(&self, education: &Education) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO education (id, user_id, institution, course, start_date, end_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&education.id)
        .bind(&education.user_id)
        .bind(&education.institution)
        .bind(&education.course)
        .bind(education.start_date)
        .bind(education.end_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_education(&self, user_id: &str) -> Result<Vec<Education>, AppError> {
        let rows = sqlx::query_as::<_, Education>(
            "SELECT * FROM education WHERE user_id = ? ORDER BY start_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_education(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM education WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Birds
    // =========================================================================

    pub async fn insert_bird(&self, bird: &Bird) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO birds (
                id, author_id, content, image_key, video_key, thumbnail_key,
                post_type, visibility, location, is_processing, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bird.id)
        .bind(&bird.author_id)
        .bind(&bird.content)
        .bind(&bird.image_key)
        .bind(&bird.video_key)
        .bind(&bird.thumbnail_key)
        .bind(&bird.post_type)
        .bind(&bird.visibility)
        .bind(&bird.location)
        .bind(bird.is_processing)
        .bind(bird.created_at)
        .bind(bird.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw bird row, no visibility filtering
    pub async fn get_bird(&self, id: &str) -> Result<Option<Bird>, AppError> {
        let bird = sqlx::query_as::<_, Bird>("SELECT * FROM birds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bird)
    }

    /// Bird as seen by `viewer_id`; None when missing or hidden
    pub async fn get_feed_entry(
        &self,
        viewer_id: &str,
        bird_id: &str,
    ) -> Result<Option<FeedEntry>, AppError> {
        let sql = format!("{FEED_SELECT} AND b.id = ?2");
        let entry = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(bird_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn delete_bird(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM birds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Viewer's own posts plus posts of actively followed authors, stories excluded
    pub async fn home_feed(
        &self,
        viewer_id: &str,
        max_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.post_type != 'story'
               AND (b.author_id = ?1 OR b.author_id IN (
                   SELECT target_id FROM connections WHERE follower_id = ?1 AND status = 'active'
               ))
               AND (?2 IS NULL OR b.id < ?2)
             ORDER BY b.id DESC
             LIMIT ?3"
        );
        let started = Instant::now();
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(max_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        crate::metrics::observe_db_query("home_feed", "birds", started.elapsed());
        Ok(entries)
    }

    /// Unexpired stories from the viewer and followed authors, newest first
    pub async fn active_stories(
        &self,
        viewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.post_type = 'story'
               AND b.expires_at > ?2
               AND (b.author_id = ?1 OR b.author_id IN (
                   SELECT target_id FROM connections WHERE follower_id = ?1 AND status = 'active'
               ))
             ORDER BY b.created_at DESC"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Latest image posts
    pub async fn explore_feed(
        &self,
        viewer_id: &str,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.post_type = 'image'
             ORDER BY b.id DESC
             LIMIT ?2"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Random sample of video posts whose thumbnail is done
    pub async fn reels_feed(
        &self,
        viewer_id: &str,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.post_type = 'video'
               AND b.is_processing = 0
             ORDER BY RANDOM()
             LIMIT ?2"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Public birds whose content contains `query`
    pub async fn search_birds(
        &self,
        viewer_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.visibility = 'public'
               AND b.post_type != 'story'
               AND b.content LIKE ?2 ESCAPE '\\'
             ORDER BY b.id DESC
             LIMIT ?3"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(contains_pattern("", query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Public birds mentioning `#tag` (tag given without the hash)
    pub async fn hashtag_birds(
        &self,
        viewer_id: &str,
        tag: &str,
        max_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.visibility = 'public'
               AND b.post_type != 'story'
               AND b.content LIKE ?2 ESCAPE '\\'
               AND (?3 IS NULL OR b.id < ?3)
             ORDER BY b.id DESC
             LIMIT ?4"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(contains_pattern("#", tag))
            .bind(max_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// One author's non-story birds as seen by the viewer
    pub async fn author_birds(
        &self,
        viewer_id: &str,
        author_id: &str,
        max_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.author_id = ?2
               AND b.post_type != 'story'
               AND (?3 IS NULL OR b.id < ?3)
             ORDER BY b.id DESC
             LIMIT ?4"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(author_id)
            .bind(max_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Birds the viewer saved, most recently saved first
    pub async fn saved_birds(
        &self,
        viewer_id: &str,
        limit: i64,
    ) -> Result<Vec<FeedEntry>, AppError> {
        let sql = format!(
            "{FEED_SELECT}
               AND b.id IN (SELECT bird_id FROM saved_posts WHERE user_id = ?1)
             ORDER BY (SELECT s.created_at FROM saved_posts s WHERE s.bird_id = b.id
                 AND s.user_id = ?1) DESC
             LIMIT ?2"
        );
        let entries = sqlx::query_as::<_, FeedEntry>(&sql)
            .bind(viewer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn count_author_birds(&self, author_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM birds WHERE author_id = ? AND post_type != 'story'",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Clear the processing flag, storing the thumbnail key if one was produced.
    ///
    /// Returns false when the bird no longer exists.
    pub async fn finish_bird_processing(
        &self,
        id: &str,
        thumbnail_key: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE birds SET is_processing = 0, thumbnail_key = COALESCE(?, thumbnail_key)
                WHERE id = ?
            "#,
        )
        .bind(thumbnail_key)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete stories whose expiry has passed, returning the removed rows
    pub async fn delete_expired_stories(&self, now: DateTime<Utc>) -> Result<Vec<Bird>, AppError> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query_as::<_, Bird>(
            r#"
            SELECT * FROM birds WHERE post_type = 'story' AND expires_at IS NOT NULL
                AND expires_at <= ?
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        for bird in &expired {
            sqlx::query("DELETE FROM birds WHERE id = ?")
                .bind(&bird.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(expired)
    }

    // =========================================================================
    // Likes & Saves
    // =========================================================================

    /// Flip the like; returns the new state
    pub async fn toggle_like(&self, bird_id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM bird_likes WHERE bird_id = ? AND user_id = ?")
            .bind(bird_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let liked = if removed.rows_affected() == 0 {
            sqlx::query("INSERT INTO bird_likes (bird_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(bird_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            true
        } else {
            false
        };

        tx.commit().await?;
        Ok(liked)
    }

    pub async fn count_likes(&self, bird_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bird_likes WHERE bird_id = ?")
            .bind(bird_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Flip the bookmark; returns the new state
    pub async fn toggle_save(&self, bird_id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM saved_posts WHERE bird_id = ? AND user_id = ?")
            .bind(bird_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let saved = if removed.rows_affected() == 0 {
            sqlx::query("INSERT INTO saved_posts (user_id, bird_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(bird_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            true
        } else {
            false
        };

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn count_saves(&self, bird_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_posts WHERE bird_id = ?")
            .bind(bird_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, bird_id, author_id, content, parent_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.bird_id)
        .bind(&comment.author_id)
        .bind(&comment.content)
        .bind(&comment.parent_id)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// Replies are removed with their parent
    pub async fn delete_comment(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Oldest first
    pub async fn list_comments(&self, bird_id: &str) -> Result<Vec<CommentEntry>, AppError> {
        let rows = sqlx::query_as::<_, CommentEntry>(
            r#"
            SELECT c.*, u.username AS author_username, p.avatar_key AS author_avatar_key
            FROM comments c
            JOIN users u ON u.id = c.author_id
            JOIN profiles p ON p.user_id = c.author_id
            WHERE c.bird_id = ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(bird_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Connections (follows)
    // =========================================================================

    pub async fn get_connection(
        &self,
        follower_id: &str,
        target_id: &str,
    ) -> Result<Option<Connection>, AppError> {
        let connection = sqlx::query_as::<_, Connection>(
            "SELECT * FROM connections WHERE follower_id = ? AND target_id = ?",
        )
        .bind(follower_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(connection)
    }

    pub async fn insert_connection(
        &self,
        follower_id: &str,
        target_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO connections (follower_id, target_id, status, created_at)
            VALUES (?, ?, 'active', ?)
            ON CONFLICT(follower_id, target_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(target_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_connection(
        &self,
        follower_id: &str,
        target_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM connections WHERE follower_id = ? AND target_id = ?")
            .bind(follower_id)
            .bind(target_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Users following `user_id`, newest first
    pub async fn list_followers(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConnectionEntry>, AppError> {
        let rows = sqlx::query_as::<_, ConnectionEntry>(
            r#"
            SELECT u.id, u.username, u.first_name, p.full_name, p.avatar_key, p.is_verified,
                   c.created_at AS connected_at
            FROM connections c
            JOIN users u ON u.id = c.follower_id
            JOIN profiles p ON p.user_id = u.id
            WHERE c.target_id = ? AND c.status = 'active' AND u.is_active = 1
            ORDER BY c.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Users `user_id` follows, newest first
    pub async fn list_following(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ConnectionEntry>, AppError> {
        let rows = sqlx::query_as::<_, ConnectionEntry>(
            r#"
            SELECT u.id, u.username, u.first_name, p.full_name, p.avatar_key, p.is_verified,
                   c.created_at AS connected_at
            FROM connections c
            JOIN users u ON u.id = c.target_id
            JOIN profiles p ON p.user_id = u.id
            WHERE c.follower_id = ? AND c.status = 'active' AND u.is_active = 1
            ORDER BY c.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_followers(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM connections WHERE target_id = ? AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_following(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM connections WHERE follower_id = ? AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    pub async fn is_blocking(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blocks WHERE blocker_id = ? AND blocked_id = ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether either user blocked the other
    pub async fn is_blocked_either_way(&self, a: &str, b: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM blocks
                WHERE (blocker_id = ?1 AND blocked_id = ?2) OR (blocker_id = ?2 AND blocked_id = ?1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Record a block and sever follows (both ways) and bonds between the pair
    pub async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO blocks (blocker_id, blocked_id, created_at) VALUES (?, ?, ?)
            ON CONFLICT(blocker_id, blocked_id) DO NOTHING
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM connections
            WHERE (follower_id = ?1 AND target_id = ?2) OR (follower_id = ?2 AND target_id = ?1)
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM social_bonds
            WHERE (requester_id = ?1 AND target_id = ?2) OR (requester_id = ?2 AND target_id = ?1)
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Social bonds
    // =========================================================================

    /// Insert a pending bond; `Conflict` if the same (requester, target, type) exists
    pub async fn insert_bond(&self, bond: &SocialBond) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO social_bonds (id, requester_id, target_id, bond_type, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(requester_id, target_id, bond_type) DO NOTHING
            "#,
        )
        .bind(&bond.id)
        .bind(&bond.requester_id)
        .bind(&bond.target_id)
        .bind(&bond.bond_type)
        .bind(&bond.status)
        .bind(bond.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Bond request already exists".to_string()));
        }
        Ok(())
    }

    pub async fn get_bond(&self, id: &str) -> Result<Option<SocialBond>, AppError> {
        let bond = sqlx::query_as::<_, SocialBond>("SELECT * FROM social_bonds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bond)
    }

    pub async fn update_bond_status(&self, id: &str, status: BondStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE social_bonds SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_bond(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM social_bonds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Bonds in either direction between two users
    pub async fn bonds_between(&self, a: &str, b: &str) -> Result<Vec<SocialBond>, AppError> {
        let bonds = sqlx::query_as::<_, SocialBond>(
            r#"
            SELECT * FROM social_bonds
            WHERE (requester_id = ?1 AND target_id = ?2) OR (requester_id = ?2 AND target_id = ?1)
            ORDER BY created_at
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;
        Ok(bonds)
    }

    /// Bonds involving `user_id` with the given status, joined with the other party
    pub async fn bonds_for_user(
        &self,
        user_id: &str,
        status: BondStatus,
    ) -> Result<Vec<BondEntry>, AppError> {
        let rows = sqlx::query_as::<_, BondEntry>(
            r#"
            SELECT s.*, u.id AS other_id, u.username AS other_username,
                   p.full_name AS other_full_name, p.avatar_key AS other_avatar_key
            FROM social_bonds s
            JOIN users u ON u.id = CASE WHEN s.requester_id = ?1
                THEN s.target_id ELSE s.requester_id END
            JOIN profiles p ON p.user_id = u.id
            WHERE (s.requester_id = ?1 OR s.target_id = ?1) AND s.status = ?2
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Pending bonds addressed to `user_id`
    pub async fn pending_bonds_for(&self, user_id: &str) -> Result<Vec<BondEntry>, AppError> {
        let rows = sqlx::query_as::<_, BondEntry>(
            r#"
            SELECT s.*, u.id AS other_id, u.username AS other_username,
                   p.full_name AS other_full_name, p.avatar_key AS other_avatar_key
            FROM social_bonds s
            JOIN users u ON u.id = s.requester_id
            JOIN profiles p ON p.user_id = u.id
            WHERE s.target_id = ? AND s.status = 'pending'
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_active_bonds(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM social_bonds WHERE (requester_id = ?1 OR target_id = ?1)
                AND status = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Communities
    // =========================================================================

    pub async fn community_slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM communities WHERE slug = ?)",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert the community and its creator as admin in one transaction
    pub async fn create_community(&self, community: &Community) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO communities (id, name, slug, description, cover_key, creator_id, is_private,
                created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&community.id)
        .bind(&community.name)
        .bind(&community.slug)
        .bind(&community.description)
        .bind(&community.cover_key)
        .bind(&community.creator_id)
        .bind(community.is_private)
        .bind(community.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Community slug already taken: {}",
                community.slug
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, user_id, role, joined_at) VALUES (?, ?, ?,
                ?)
            "#,
        )
        .bind(&community.id)
        .bind(&community.creator_id)
        .bind(CommunityRole::Admin.as_str())
        .bind(community.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All communities, newest first, with member counts for the viewer
    pub async fn list_communities(
        &self,
        viewer_id: &str,
    ) -> Result<Vec<CommunitySummary>, AppError> {
        let rows = sqlx::query_as::<_, CommunitySummary>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM community_members m
                       WHERE m.community_id = c.id) AS member_count,
                   EXISTS (SELECT 1 FROM community_members m WHERE m.community_id = c.id
                       AND m.user_id = ?1) AS is_member
            FROM communities c
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_community_by_slug(
        &self,
        viewer_id: &str,
        slug: &str,
    ) -> Result<Option<CommunitySummary>, AppError> {
        let row = sqlx::query_as::<_, CommunitySummary>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM community_members m
                       WHERE m.community_id = c.id) AS member_count,
                   EXISTS (SELECT 1 FROM community_members m WHERE m.community_id = c.id
                       AND m.user_id = ?1) AS is_member
            FROM communities c
            WHERE c.slug = ?2
            "#,
        )
        .bind(viewer_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_community_members(
        &self,
        community_id: &str,
    ) -> Result<Vec<MemberEntry>, AppError> {
        let rows = sqlx::query_as::<_, MemberEntry>(
            r#"
            SELECT u.id, u.username, u.first_name, p.full_name, p.avatar_key, p.is_verified,
                   m.role, m.joined_at
            FROM community_members m
            JOIN users u ON u.id = m.user_id
            JOIN profiles p ON p.user_id = u.id
            WHERE m.community_id = ?
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Returns true if the user was added, false if already a member
    pub async fn add_community_member(
        &self,
        community_id: &str,
        user_id: &str,
        role: CommunityRole,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO community_members (community_id, user_id, role, joined_at) VALUES (?, ?, ?,
                ?)
            ON CONFLICT(community_id, user_id) DO NOTHING
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn remove_community_member(
        &self,
        community_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM community_members WHERE community_id = ? AND user_id = ?",
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Chat
    // =========================================================================

    async fn ensure_global_room(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, is_group, updated_at) VALUES (?, 'Global', 1, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(GLOBAL_ROOM_ID)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_room(&self, id: &str) -> Result<Option<Room>, AppError> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    pub async fn add_room_participant(&self, room_id: &str, user_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO room_participants (room_id, user_id) VALUES (?, ?)
            ON CONFLICT(room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_room_participant(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM room_participants WHERE room_id = ? AND user_id = ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Rooms the user participates in, most recently active first
    pub async fn rooms_for_user(&self, user_id: &str) -> Result<Vec<RoomSummary>, AppError> {
        let rows = sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT r.*,
                   (SELECT m.content FROM messages m WHERE m.room_id = r.id
                    ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message,
                   (SELECT COUNT(*) FROM messages m WHERE m.room_id = r.id
                    AND m.is_read = 0 AND m.sender_id != ?1) AS unread_count
            FROM rooms r
            JOIN room_participants rp ON rp.room_id = r.id
            WHERE rp.user_id = ?1
            ORDER BY r.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Existing one-to-one room between two users
    pub async fn find_direct_room(&self, a: &str, b: &str) -> Result<Option<Room>, AppError> {
        let room = sqlx::query_as::<_, Room>(
            r#"
            SELECT r.* FROM rooms r
            WHERE r.is_group = 0
              AND EXISTS (SELECT 1 FROM room_participants p WHERE p.room_id = r.id
                  AND p.user_id = ?1)
              AND EXISTS (SELECT 1 FROM room_participants p WHERE p.room_id = r.id
                  AND p.user_id = ?2)
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;
        Ok(room)
    }

    pub async fn create_room(&self, room: &Room, participant_ids: &[&str]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rooms (id, name, is_group, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(room.is_group)
            .bind(room.updated_at)
            .execute(&mut *tx)
            .await?;

        for user_id in participant_ids {
            sqlx::query("INSERT INTO room_participants (room_id, user_id) VALUES (?, ?)")
                .bind(&room.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Persist a message and bump the room's `updated_at`
    pub async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, room_id, sender_id, content, media_key, created_at, is_read)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(&message.media_key)
        .bind(message.created_at)
        .bind(message.is_read)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE rooms SET updated_at = ? WHERE id = ?")
            .bind(message.created_at)
            .bind(&message.room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Last `limit` messages in chronological order
    pub async fn recent_messages(
        &self,
        room_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageEntry>, AppError> {
        let rows = sqlx::query_as::<_, MessageEntry>(
            r#"
            SELECT * FROM (
                SELECT m.*, u.username AS sender_username, p.avatar_key AS sender_avatar_key
                FROM messages m
                JOIN users u ON u.id = m.sender_id
                JOIN profiles p ON p.user_id = m.sender_id
                WHERE m.room_id = ?
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT ?
            )
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Mark other participants' messages in the room as read
    pub async fn mark_room_read(&self, room_id: &str, reader_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE room_id = ? AND sender_id != ? AND is_read = 0",
        )
        .bind(room_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO events (id, title, description, location, starts_at, cover_key, creator_id,
                created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(&event.cover_key)
        .bind(&event.creator_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_event(
        &self,
        viewer_id: &str,
        id: &str,
    ) -> Result<Option<EventSummary>, AppError> {
        let row = sqlx::query_as::<_, EventSummary>(
            r#"
            SELECT e.*,
                   (SELECT COUNT(*) FROM event_participants ep
                       WHERE ep.event_id = e.id) AS participant_count,
                   EXISTS (SELECT 1 FROM event_participants ep WHERE ep.event_id = e.id
                       AND ep.user_id = ?1) AS is_participating
            FROM events e
            WHERE e.id = ?2
            "#,
        )
        .bind(viewer_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Events starting at or after `now`, soonest first
    pub async fn upcoming_events(
        &self,
        viewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, AppError> {
        let rows = sqlx::query_as::<_, EventSummary>(
            r#"
            SELECT e.*,
                   (SELECT COUNT(*) FROM event_participants ep
                       WHERE ep.event_id = e.id) AS participant_count,
                   EXISTS (SELECT 1 FROM event_participants ep WHERE ep.event_id = e.id
                       AND ep.user_id = ?1) AS is_participating
            FROM events e
            WHERE e.starts_at >= ?2
            ORDER BY e.starts_at ASC
            "#,
        )
        .bind(viewer_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_event_participants(
        &self,
        event_id: &str,
    ) -> Result<Vec<UserSummary>, AppError> {
        let sql = format!(
            "{USER_SUMMARY_SELECT}
             JOIN event_participants ep ON ep.user_id = u.id
             WHERE ep.event_id = ?
             ORDER BY u.username"
        );
        let rows = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Flip attendance; returns the new state
    pub async fn toggle_event_participation(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM event_participants WHERE event_id = ? AND user_id = ?",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let attending = if removed.rows_affected() == 0 {
            sqlx::query("INSERT INTO event_participants (event_id, user_id) VALUES (?, ?)")
                .bind(event_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            true
        } else {
            false
        };

        tx.commit().await?;
        Ok(attending)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, sender_id, kind, message, link, is_read,
                created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(&notification.sender_id)
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest first, joined with the (optional) sender
    pub async fn recent_notifications(
        &self,
        recipient_id: &str,
        limit: i64,
    ) -> Result<Vec<NotificationEntry>, AppError> {
        let rows = sqlx::query_as::<_, NotificationEntry>(
            r#"
            SELECT n.*, u.username AS sender_username, u.first_name AS sender_first_name,
                   p.full_name AS sender_full_name, p.avatar_key AS sender_avatar_key
            FROM notifications n
            LEFT JOIN users u ON u.id = n.sender_id
            LEFT JOIN profiles p ON p.user_id = n.sender_id
            WHERE n.recipient_id = ?
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT ?
            "#,
        )
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_unread_notifications(&self, recipient_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Returns false when the notification does not belong to the recipient
    pub async fn mark_notification_read(
        &self,
        id: &str,
        recipient_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND recipient_id = ?",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, user_id, preference_id, provider_payment_id, status, amount,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(&payment.preference_id)
        .bind(&payment.provider_payment_id)
        .bind(&payment.status)
        .bind(payment.amount)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_payments(&self, user_id: &str) -> Result<Vec<Payment>, AppError> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Record the provider status on the user's latest matching payment.
    ///
    /// When `approved`, the profile is flagged premium in the same transaction.
    /// Returns false if the user has no profile.
    pub async fn apply_payment_status(
        &self,
        user_id: &str,
        provider_payment_id: &str,
        status: &str,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE payments SET status = ?1, provider_payment_id = ?2, updated_at = ?3
            WHERE id = (
                SELECT id FROM payments
                WHERE user_id = ?4 AND (provider_payment_id = ?2 OR provider_payment_id IS NULL)
                ORDER BY (provider_payment_id IS NULL), created_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(status)
        .bind(provider_payment_id)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let profile_found = if approved {
            let result = sqlx::query(
                "UPDATE profiles SET is_premium = 1, premium_since = ? WHERE user_id = ?",
            )
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            result.rows_affected() == 1
        } else {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM profiles WHERE user_id = ?)",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            exists
        };

        tx.commit().await?;
        Ok(profile_found)
    }
}
