//! In-memory store for hosts without a database and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{PushSubscriptionStore, RequestCounter, UserStore};
use crate::error::{Error, Result};
use crate::models::{MediaType, PushSubscription, RequestStatus, User};
use crate::permissions::{PermissionCheck, Permissions, has_permission};

/// A media request as the counter sees it.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub user_id: i64,
    pub media_type: MediaType,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    /// Season rows attached to a series request; zero for movies.
    pub seasons: u64,
}

/// Thread-safe in-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    subscriptions: RwLock<Vec<PushSubscription>>,
    requests: RwLock<Vec<StoredRequest>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.write().push(user);
    }

    pub fn add_subscription(&self, subscription: PushSubscription) {
        self.subscriptions.write().push(subscription);
    }

    pub fn add_request(&self, request: StoredRequest) {
        self.requests.write().push(request);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn owner(&self) -> Result<User> {
        self.users
            .read()
            .iter()
            .find(|u| u.is_owner)
            .cloned()
            .ok_or_else(|| Error::not_found("User", "owner"))
    }

    async fn list_users_with_permission(
        &self,
        required: Permissions,
        check: PermissionCheck,
    ) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .filter(|u| has_permission(required, u.effective_permissions(), check))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PushSubscriptionStore for MemoryStore {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        Ok(self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.subscriptions.write().retain(|s| s.id != id);
        Ok(())
    }
}

#[async_trait]
impl RequestCounter for MemoryStore {
    async fn count_requests(
        &self,
        user_id: i64,
        media_type: MediaType,
        since: Option<DateTime<Utc>>,
        exclude_status: RequestStatus,
    ) -> Result<u64> {
        let requests = self.requests.read();
        let matching = requests.iter().filter(|r| {
            r.user_id == user_id
                && r.media_type == media_type
                && r.status != exclude_status
                && since.is_none_or(|cutoff| r.created_at >= cutoff)
        });

        Ok(match media_type {
            MediaType::Movie => matching.count() as u64,
            MediaType::Tv => matching.map(|r| r.seasons).sum(),
        })
    }
}
