//! Community service

use std::sync::Arc;

use chrono::Utc;

use crate::data::{
    Community, CommunityRole, CommunitySummary, Database, EntityId, MemberEntry, User,
};
use crate::error::AppError;

const MAX_NAME_CHARS: usize = 100;

/// URL slug: lowercase ASCII letters and digits joined by single hyphens
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "community".to_string()
    } else {
        slug
    }
}

/// Community with its members, as seen by one viewer
#[derive(Debug, Clone)]
pub struct CommunityDetail {
    pub summary: CommunitySummary,
    pub members: Vec<MemberEntry>,
    pub viewer_role: Option<String>,
}

/// Community service
pub struct CommunityService {
    db: Arc<Database>,
}

impl CommunityService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, viewer: &User) -> Result<Vec<CommunitySummary>, AppError> {
        self.db.list_communities(&viewer.id).await
    }

    /// First free slug: `name`, `name-2`, `name-3`, ...
    async fn unique_slug(&self, name: &str) -> Result<String, AppError> {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.db.community_slug_exists(&candidate).await? {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }

    /// Create a community; the creator joins as admin
    pub async fn create(
        &self,
        creator: &User,
        name: &str,
        description: Option<String>,
        is_private: bool,
    ) -> Result<CommunitySummary, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Community name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(AppError::Validation(format!(
                "Community name cannot exceed {MAX_NAME_CHARS} characters"
            )));
        }

        let community = Community {
            id: EntityId::new().0,
            name: name.to_string(),
            slug: self.unique_slug(name).await?,
            description: description.unwrap_or_default().trim().to_string(),
            cover_key: None,
            creator_id: creator.id.clone(),
            is_private,
            created_at: Utc::now(),
        };
        self.db.create_community(&community).await?;

        tracing::info!(
            community_id = %community.id,
            slug = %community.slug,
            user_id = %creator.id,
            "Community created"
        );

        self.db
            .get_community_by_slug(&creator.id, &community.slug)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn detail(&self, viewer: &User, slug: &str) -> Result<CommunityDetail, AppError> {
        let summary = self
            .db
            .get_community_by_slug(&viewer.id, slug)
            .await?
            .ok_or(AppError::NotFound)?;
        let members = self.db.list_community_members(&summary.community.id).await?;
        let viewer_role = members
            .iter()
            .find(|member| member.user.id == viewer.id)
            .map(|member| member.role.clone());

        Ok(CommunityDetail {
            summary,
            members,
            viewer_role,
        })
    }

    /// Join a public community; joining twice is a no-op
    pub async fn join(&self, user: &User, slug: &str) -> Result<CommunitySummary, AppError> {
        let summary = self
            .db
            .get_community_by_slug(&user.id, slug)
            .await?
            .ok_or(AppError::NotFound)?;

        if summary.is_member {
            return Ok(summary);
        }
        if summary.community.is_private {
            return Err(AppError::Forbidden);
        }

        self.db
            .add_community_member(&summary.community.id, &user.id, CommunityRole::Member)
            .await?;

        self.db
            .get_community_by_slug(&user.id, slug)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Leave a community; the creator stays
    pub async fn leave(&self, user: &User, slug: &str) -> Result<(), AppError> {
        let summary = self
            .db
            .get_community_by_slug(&user.id, slug)
            .await?
            .ok_or(AppError::NotFound)?;

        if summary.community.creator_id == user.id {
            return Err(AppError::Validation(
                "The creator cannot leave the community".to_string(),
            ));
        }

        if self
            .db
            .remove_community_member(&summary.community.id, &user.id)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}
