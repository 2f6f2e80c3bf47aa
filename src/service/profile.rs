//! Profile service
//!
//! Profile page assembly, profile edits, avatar/cover uploads and the
//! work/education history.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::data::{
    BondEntry, BondStatus, BondType, Database, Education, EntityId, FeedEntry, GENDERS, Profile,
    SocialBond, User, UserSummary, WorkExperience,
};
use crate::error::AppError;
use crate::service::MediaUpload;
use crate::storage::{MediaKind, MediaStorage};

pub const MAX_BIO_CHARS: usize = 500;
const PROFILE_BIRDS_LIMIT: i64 = 20;

/// Follower/following/friend/post counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileStats {
    pub followers: i64,
    pub following: i64,
    pub friends_count: i64,
    pub posts_count: i64,
}

/// How the viewer relates to the profile owner
#[derive(Debug, Clone, Default)]
pub struct Relationship {
    pub following: bool,
    pub followed_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
    pub bonds: Vec<SocialBond>,
}

/// Everything shown on a profile page
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user: UserSummary,
    pub profile: Profile,
    pub age: Option<i32>,
    pub stats: ProfileStats,
    pub birds: Vec<FeedEntry>,
    pub relationship: Relationship,
    pub family: Vec<BondEntry>,
    pub work: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub is_own_profile: bool,
}

/// Partial profile edit; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub document: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub show_birth_year: Option<bool>,
    pub current_city: Option<String>,
    pub hometown: Option<String>,
    pub visited_places: Option<Vec<String>>,
    pub phone: Option<String>,
    pub public_email: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct WorkInput {
    pub company: String,
    pub position: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EducationInput {
    pub institution: String,
    pub course: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn check_period(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    match end {
        Some(end) if end < start => Err(AppError::Validation(
            "End date cannot be before start date".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Apply a partial update in place
fn apply_update(profile: &mut Profile, update: ProfileUpdate) -> Result<(), AppError> {
    if let Some(gender) = update.gender {
        let gender = gender.trim().to_uppercase();
        if !GENDERS.contains(&gender.as_str()) {
            return Err(AppError::Validation(format!("Unknown gender: {gender}")));
        }
        profile.gender = gender;
    }
    if let Some(bio) = update.bio {
        let bio = bio.trim().to_string();
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(AppError::Validation(format!(
                "Bio cannot exceed {MAX_BIO_CHARS} characters"
            )));
        }
        profile.bio = bio;
    }
    if let Some(interests) = update.interests {
        if !interests.is_object() {
            return Err(AppError::Validation(
                "Interests must be a JSON object".to_string(),
            ));
        }
        profile.interests = interests.to_string();
    }
    if let Some(places) = update.visited_places {
        let places: Vec<String> = places
            .into_iter()
            .map(|place| place.trim().to_string())
            .filter(|place| !place.is_empty())
            .collect();
        profile.visited_places =
            serde_json::to_string(&places).map_err(|e| AppError::Internal(e.into()))?;
    }

    let text_fields = [
        (update.full_name, &mut profile.full_name),
        (update.document, &mut profile.document),
        (update.current_city, &mut profile.current_city),
        (update.hometown, &mut profile.hometown),
        (update.phone, &mut profile.phone),
        (update.public_email, &mut profile.public_email),
    ];
    for (value, slot) in text_fields {
        if let Some(value) = value {
            *slot = value.trim().to_string();
        }
    }

    if update.birth_date.is_some() {
        profile.birth_date = update.birth_date;
    }
    if let Some(show) = update.show_birth_year {
        profile.show_birth_year = show;
    }
    Ok(())
}

/// Profile service
pub struct ProfileService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl ProfileService {
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    async fn own_profile(&self, user: &User) -> Result<Profile, AppError> {
        self.db.get_profile(&user.id).await?.ok_or(AppError::NotFound)
    }

    /// Assemble the profile page of `username` as seen by `viewer`
    pub async fn view(&self, viewer: &User, username: &str) -> Result<ProfileView, AppError> {
        let owner = self
            .db
            .get_user_by_username(username)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AppError::NotFound)?;
        let profile = self.db.get_profile(&owner.id).await?.ok_or(AppError::NotFound)?;
        let user = self
            .db
            .get_user_summary(&owner.id)
            .await?
            .ok_or(AppError::NotFound)?;

        let is_own_profile = viewer.id == owner.id;
        let relationship = if is_own_profile {
            Relationship::default()
        } else {
            Relationship {
                following: self.db.get_connection(&viewer.id, &owner.id).await?.is_some(),
                followed_by: self.db.get_connection(&owner.id, &viewer.id).await?.is_some(),
                blocking: self.db.is_blocking(&viewer.id, &owner.id).await?,
                blocked_by: self.db.is_blocking(&owner.id, &viewer.id).await?,
                bonds: self.db.bonds_between(&viewer.id, &owner.id).await?,
            }
        };

        let stats = ProfileStats {
            followers: self.db.count_followers(&owner.id).await?,
            following: self.db.count_following(&owner.id).await?,
            friends_count: self.db.count_active_bonds(&owner.id).await?,
            posts_count: self.db.count_author_birds(&owner.id).await?,
        };

        let family = self
            .db
            .bonds_for_user(&owner.id, BondStatus::Active)
            .await?
            .into_iter()
            .filter(|entry| {
                BondType::parse(&entry.bond.bond_type).is_some_and(|kind| kind.is_family())
            })
            .collect();

        let birds = self
            .db
            .author_birds(&viewer.id, &owner.id, None, PROFILE_BIRDS_LIMIT)
            .await?;

        Ok(ProfileView {
            age: profile.age_on(Utc::now().date_naive()),
            user,
            stats,
            birds,
            relationship,
            family,
            work: self.db.list_work_experiences(&owner.id).await?,
            education: self.db.list_education(&owner.id).await?,
            is_own_profile,
            profile,
        })
    }

    pub async fn update(&self, user: &User, update: ProfileUpdate) -> Result<Profile, AppError> {
        let mut profile = self.own_profile(user).await?;
        apply_update(&mut profile, update)?;
        self.db.update_profile(&profile).await?;
        tracing::info!(user_id = %user.id, "Profile updated");
        Ok(profile)
    }

    /// Replace the avatar image; returns its public URL
    pub async fn update_avatar(
        &self,
        user: &User,
        upload: MediaUpload,
    ) -> Result<String, AppError> {
        self.replace_image(user, upload, ImageSlot::Avatar).await
    }

    /// Replace the cover image; returns its public URL
    pub async fn update_cover(&self, user: &User, upload: MediaUpload) -> Result<String, AppError> {
        self.replace_image(user, upload, ImageSlot::Cover).await
    }

    async fn replace_image(
        &self,
        user: &User,
        upload: MediaUpload,
        slot: ImageSlot,
    ) -> Result<String, AppError> {
        let ext = MediaKind::Image.validate(&upload.content_type, upload.data.len())?;
        let mut profile = self.own_profile(user).await?;

        let key = format!("{}/{}/{}.{}", slot.dir(), user.username, EntityId::new().0, ext);
        let url = self.storage.save(&key, &upload.data).await?;

        let previous = match slot {
            ImageSlot::Avatar => profile.avatar_key.replace(key),
            ImageSlot::Cover => profile.cover_key.replace(key),
        };
        self.db.update_profile(&profile).await?;

        if let Some(old_key) = previous {
            if let Err(error) = self.storage.delete(&old_key).await {
                tracing::warn!(
                    user_id = %user.id,
                    key = %old_key,
                    %error,
                    "Failed to delete old image"
                );
            }
        }

        Ok(url)
    }

    pub async fn add_work(
        &self,
        user: &User,
        input: WorkInput,
    ) -> Result<WorkExperience, AppError> {
        check_period(input.start_date, input.end_date)?;
        let work = WorkExperience {
            id: EntityId::new().0,
            user_id: user.id.clone(),
            company: required(&input.company, "company")?,
            position: required(&input.position, "position")?,
            start_date: input.start_date,
            end_date: if input.is_current { None } else { input.end_date },
            is_current: input.is_current,
            description: input.description.unwrap_or_default().trim().to_string(),
        };
        self.db.insert_work_experience(&work).await?;
        Ok(work)
    }

    /// Owner only; someone else's entry looks missing
    pub async fn delete_work(&self, user: &User, id: &str) -> Result<(), AppError> {
        if self.db.delete_work_experience(id, &user.id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    pub async fn add_education(
        &self,
        user: &User,
        input: EducationInput,
    ) -> Result<Education, AppError> {
        check_period(input.start_date, input.end_date)?;
        let education = Education {
            id: EntityId::new().0,
            user_id: user.id.clone(),
            institution: required(&input.institution, "institution")?,
            course: required(&input.course, "course")?,
            start_date: input.start_date,
            end_date: input.end_date,
        };
        self.db.insert_education(&education).await?;
        Ok(education)
    }

    pub async fn delete_education(&self, user: &User, id: &str) -> Result<(), AppError> {
        if self.db.delete_education(id, &user.id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ImageSlot {
    Avatar,
    Cover,
}

impl ImageSlot {
    fn dir(&self) -> &'static str {
        match self {
            Self::Avatar => "avatars",
            Self::Cover => "covers",
        }
    }
}
