//! Narrow persistence boundary.
//!
//! The core needs three capabilities from the data layer: resolve users by
//! permission (plus the owner account), enumerate and remove push
//! subscriptions, and count requests inside a quota window. Everything else
//! about persistence belongs to the host.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, StoredRequest};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{MediaType, PushSubscription, RequestStatus, User};
use crate::permissions::{PermissionCheck, Permissions};

/// Read access to user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The bootstrap owner account, used by the push agent for its sender
    /// identity.
    async fn owner(&self) -> Result<User>;

    /// Every user whose effective permissions satisfy `required`.
    async fn list_users_with_permission(
        &self,
        required: Permissions,
        check: PermissionCheck,
    ) -> Result<Vec<User>>;
}

/// Read/remove access to push subscriptions.
#[async_trait]
pub trait PushSubscriptionStore: Send + Sync {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>>;

    /// Remove a subscription by id. Removing an already-gone subscription is
    /// not an error.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Request-count query capability for the quota engine.
///
/// For movies the unit is one request; for series the unit is one season row,
/// summed across every matching request.
#[async_trait]
pub trait RequestCounter: Send + Sync {
    async fn count_requests(
        &self,
        user_id: i64,
        media_type: MediaType,
        since: Option<DateTime<Utc>>,
        exclude_status: RequestStatus,
    ) -> Result<u64>;
}
