//! Network service
//!
//! Follows, blocks and typed social bonds between users.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{
    BondEntry, BondStatus, BondType, ConnectionEntry, Database, EntityId, NotificationKind,
    SocialBond, User, UserSummary,
};
use crate::error::AppError;
use crate::service::NotificationService;
use crate::storage::MediaStorage;

pub const SUGGESTION_LIMIT: i64 = 20;
pub const RECENT_FOLLOWERS_LIMIT: i64 = 10;
const DASHBOARD_LIMIT: i64 = 200;

/// What to do with a bond
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondAction {
    Accept,
    Reject,
    Block,
    Remove,
}

impl BondAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "block" => Some(Self::Block),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowState {
    pub following: bool,
    pub followers_count: i64,
}

#[derive(Debug, Clone)]
pub struct NetworkDashboard {
    pub followers: Vec<ConnectionEntry>,
    pub following: Vec<ConnectionEntry>,
}

#[derive(Debug, Clone)]
pub struct NetworkRequests {
    pub pending_bonds: Vec<BondEntry>,
    pub recent_followers: Vec<ConnectionEntry>,
}

/// Network service
pub struct NetworkService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl NetworkService {
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    fn notifications(&self) -> NotificationService {
        NotificationService::new(self.db.clone(), self.storage.clone())
    }

    /// Active user by username, refusing self-targeting
    async fn other_user(&self, user: &User, username: &str) -> Result<User, AppError> {
        let target = self
            .db
            .get_user_by_username(username)
            .await?
            .filter(|target| target.is_active)
            .ok_or(AppError::NotFound)?;
        if target.id == user.id {
            return Err(AppError::Validation(
                "You cannot do that to yourself".to_string(),
            ));
        }
        Ok(target)
    }

    /// Follow or unfollow
    ///
    /// # Errors
    /// `Validation` on self, `Forbidden` when a block exists either way.
    pub async fn toggle_follow(
        &self,
        user: &User,
        username: &str,
    ) -> Result<FollowState, AppError> {
        let target = self.other_user(user, username).await?;
        if self.db.is_blocked_either_way(&user.id, &target.id).await? {
            return Err(AppError::Forbidden);
        }

        let following = if self.db.delete_connection(&user.id, &target.id).await? {
            tracing::info!(user_id = %user.id, target_id = %target.id, "Unfollowed");
            false
        } else {
            self.db.insert_connection(&user.id, &target.id).await?;
            self.notifications()
                .notify(
                    &target.id,
                    Some(&user.id),
                    NotificationKind::Follow,
                    format!("{} started following you.", user.username),
                    Some(format!("/profile/{}", user.username)),
                )
                .await?;
            tracing::info!(user_id = %user.id, target_id = %target.id, "Followed");
            true
        };

        Ok(FollowState {
            following,
            followers_count: self.db.count_followers(&target.id).await?,
        })
    }

    /// Block or unblock; returns whether the target is now blocked
    ///
    /// Blocking severs follows in both directions and every bond between
    /// the pair.
    pub async fn toggle_block(&self, user: &User, username: &str) -> Result<bool, AppError> {
        let target = self.other_user(user, username).await?;

        if self.db.unblock_user(&user.id, &target.id).await? {
            tracing::info!(user_id = %user.id, target_id = %target.id, "Unblocked");
            return Ok(false);
        }

        self.db.block_user(&user.id, &target.id).await?;
        tracing::info!(user_id = %user.id, target_id = %target.id, "Blocked");
        Ok(true)
    }

    pub async fn request_bond(
        &self,
        user: &User,
        username: &str,
        bond_type: &str,
    ) -> Result<SocialBond, AppError> {
        let kind = BondType::parse(bond_type.trim())
            .ok_or_else(|| AppError::Validation(format!("Unknown bond type: {bond_type}")))?;
        let target = self.other_user(user, username).await?;
        if self.db.is_blocked_either_way(&user.id, &target.id).await? {
            return Err(AppError::Forbidden);
        }

        let bond = SocialBond {
            id: EntityId::new().0,
            requester_id: user.id.clone(),
            target_id: target.id.clone(),
            bond_type: kind.as_str().to_string(),
            status: BondStatus::Pending.as_str().to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_bond(&bond).await?;

        self.notifications()
            .notify(
                &target.id,
                Some(&user.id),
                NotificationKind::Bond,
                format!("{} sent you a {} request.", user.username, kind.as_str()),
                Some("/network/requests".to_string()),
            )
            .await?;

        Ok(bond)
    }

    /// Accept, reject or block (target only) or remove (either party)
    ///
    /// Returns the bond as it stands afterwards, `None` once deleted.
    pub async fn manage_bond(
        &self,
        user: &User,
        bond_id: &str,
        action: BondAction,
    ) -> Result<Option<SocialBond>, AppError> {
        let mut bond = self.db.get_bond(bond_id).await?.ok_or(AppError::NotFound)?;
        let is_target = bond.target_id == user.id;
        let is_party = is_target || bond.requester_id == user.id;
        if !is_party {
            return Err(AppError::NotFound);
        }

        match action {
            BondAction::Accept => {
                if !is_target {
                    return Err(AppError::Forbidden);
                }
                self.db.update_bond_status(&bond.id, BondStatus::Active).await?;
                bond.status = BondStatus::Active.as_str().to_string();
                self.notifications()
                    .notify(
                        &bond.requester_id,
                        Some(&user.id),
                        NotificationKind::Bond,
                        format!("{} accepted your {} request.", user.username, bond.bond_type),
                        Some(format!("/profile/{}", user.username)),
                    )
                    .await?;
                Ok(Some(bond))
            }
            BondAction::Block => {
                if !is_target {
                    return Err(AppError::Forbidden);
                }
                self.db.update_bond_status(&bond.id, BondStatus::Blocked).await?;
                bond.status = BondStatus::Blocked.as_str().to_string();
                Ok(Some(bond))
            }
            BondAction::Reject => {
                if !is_target {
                    return Err(AppError::Forbidden);
                }
                self.db.delete_bond(&bond.id).await?;
                Ok(None)
            }
            BondAction::Remove => {
                self.db.delete_bond(&bond.id).await?;
                Ok(None)
            }
        }
    }

    pub async fn dashboard(&self, user: &User) -> Result<NetworkDashboard, AppError> {
        Ok(NetworkDashboard {
            followers: self.db.list_followers(&user.id, DASHBOARD_LIMIT).await?,
            following: self.db.list_following(&user.id, DASHBOARD_LIMIT).await?,
        })
    }

    pub async fn suggestions(&self, user: &User) -> Result<Vec<UserSummary>, AppError> {
        self.db.suggest_users(&user.id, SUGGESTION_LIMIT).await
    }

    pub async fn requests(&self, user: &User) -> Result<NetworkRequests, AppError> {
        Ok(NetworkRequests {
            pending_bonds: self.db.pending_bonds_for(&user.id).await?,
            recent_followers: self
                .db
                .list_followers(&user.id, RECENT_FOLLOWERS_LIMIT)
                .await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{create_test_db, create_test_storage, create_user};

    async fn setup() -> (Arc<Database>, NetworkService, User, User, tempfile::TempDir) {
        let (db, temp_dir) = create_test_db().await;
        let service = NetworkService::new(db.clone(), create_test_storage(&temp_dir));
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        (db, service, alice, bob, temp_dir)
    }

    #[tokio::test]
    async fn follow_toggles_and_notifies() {
        let (db, service, alice, bob, _temp_dir) = setup().await;

        let state = service.toggle_follow(&alice, "bob").await.unwrap();
        assert!(state.following);
        assert_eq!(state.followers_count, 1);
        assert_eq!(db.count_unread_notifications(&bob.id).await.unwrap(), 1);

        let state = service.toggle_follow(&alice, "bob").await.unwrap();
        assert!(!state.following);
        assert_eq!(state.followers_count, 0);
    }

    #[tokio::test]
    async fn follow_self_and_blocked_are_refused() {
        let (_db, service, alice, bob, _temp_dir) = setup().await;

        assert!(matches!(
            service.toggle_follow(&alice, "alice").await,
            Err(AppError::Validation(_))
        ));

        assert!(service.toggle_block(&bob, "alice").await.unwrap());
        assert!(matches!(
            service.toggle_follow(&alice, "bob").await,
            Err(AppError::Forbidden)
        ));

        assert!(!service.toggle_block(&bob, "alice").await.unwrap());
        assert!(service.toggle_follow(&alice, "bob").await.unwrap().following);
    }

    #[tokio::test]
    async fn block_removes_follows_and_bonds() {
        let (db, service, alice, bob, _temp_dir) = setup().await;

        service.toggle_follow(&alice, "bob").await.unwrap();
        service.toggle_follow(&bob, "alice").await.unwrap();
        service.request_bond(&alice, "bob", "friend").await.unwrap();

        service.toggle_block(&alice, "bob").await.unwrap();

        assert!(db.get_connection(&alice.id, &bob.id).await.unwrap().is_none());
        assert!(db.get_connection(&bob.id, &alice.id).await.unwrap().is_none());
        assert!(db.bonds_between(&alice.id, &bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bond_lifecycle() {
        let (db, service, alice, bob, _temp_dir) = setup().await;

        assert!(matches!(
            service.request_bond(&alice, "bob", "nemesis").await,
            Err(AppError::Validation(_))
        ));

        let bond = service.request_bond(&alice, "bob", "bestie").await.unwrap();
        assert!(matches!(
            service.request_bond(&alice, "bob", "bestie").await,
            Err(AppError::Conflict(_))
        ));

        // Only the target may accept
        assert!(matches!(
            service.manage_bond(&alice, &bond.id, BondAction::Accept).await,
            Err(AppError::Forbidden)
        ));

        let accepted = service
            .manage_bond(&bob, &bond.id, BondAction::Accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, "active");
        assert_eq!(db.count_active_bonds(&alice.id).await.unwrap(), 1);
        // Request notified bob, acceptance notified alice
        assert_eq!(db.count_unread_notifications(&alice.id).await.unwrap(), 1);

        assert!(
            service
                .manage_bond(&alice, &bond.id, BondAction::Remove)
                .await
                .unwrap()
                .is_none()
        );
        assert!(db.get_bond(&bond.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn requests_list_pending_bonds_and_followers() {
        let (_db, service, alice, bob, _temp_dir) = setup().await;

        service.request_bond(&alice, "bob", "colleague").await.unwrap();
        service.toggle_follow(&alice, "bob").await.unwrap();

        let requests = service.requests(&bob).await.unwrap();
        assert_eq!(requests.pending_bonds.len(), 1);
        assert_eq!(requests.pending_bonds[0].other_username, "alice");
        assert_eq!(requests.recent_followers.len(), 1);

        let suggestions = service.suggestions(&bob).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].username, "alice");
        assert!(service.suggestions(&alice).await.unwrap().is_empty());
    }
}
