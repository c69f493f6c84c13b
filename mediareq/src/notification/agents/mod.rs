//! Notification delivery agents.
//!
//! One agent per channel, each independently configured with an enablement
//! flag and a notification-type mask. Agents build channel-specific payloads
//! from the generic [`Notification`] and hand them to an injected
//! [`Transport`](crate::notification::transport::Transport).

mod discord;
mod telegram;
mod webhook;
mod webpush;

pub use discord::{DiscordAgent, DiscordConfig};
pub use telegram::{TelegramAgent, TelegramConfig};
pub use webhook::{WebhookAgent, WebhookConfig};
pub use webpush::{WebPushAgent, WebPushConfig};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::User;
use crate::notification::{Notification, NotificationTypes};
use crate::permissions::{PermissionCheck, Permissions};
use crate::store::UserStore;

/// A configured delivery channel.
#[async_trait]
pub trait NotificationAgent: Send + Sync {
    /// Stable channel name for logging.
    fn agent_type(&self) -> &'static str;

    /// Whether this agent wants events of `kind`: enabled and admitted by the
    /// configured type mask. A misconfigured-but-enabled agent still returns
    /// true here; the failure surfaces in [`send`](Self::send) with a logged
    /// reason.
    fn should_send(&self, kind: NotificationTypes) -> bool;

    /// Deliver the notification. Returns whether at least one transport call
    /// succeeded; per-recipient failures are isolated and logged, never
    /// raised.
    async fn send(&self, notification: &Notification) -> Result<bool>;
}

/// The management permission whose holders receive the admin broadcast for
/// events of `kind`.
#[must_use]
pub fn admin_requirement(kind: NotificationTypes) -> (Permissions, PermissionCheck) {
    if NotificationTypes::ISSUE_ALL.intersects(kind) {
        (
            Permissions::MANAGE_ISSUES | Permissions::VIEW_ISSUES,
            PermissionCheck::Any,
        )
    } else {
        (Permissions::MANAGE_REQUESTS, PermissionCheck::All)
    }
}

/// Resolve the users an agent delivers to.
///
/// The direct recipient comes first; the admin broadcast follows, minus the
/// direct recipient so nobody is notified twice for one event.
pub async fn resolve_audience(
    user_store: &Arc<dyn UserStore>,
    notification: &Notification,
) -> Result<Vec<User>> {
    let mut audience = Vec::new();
    if let Some(user) = &notification.notify_user {
        audience.push(user.clone());
    }

    if notification.notify_admin {
        let (required, check) = admin_requirement(notification.kind());
        let admins = user_store.list_users_with_permission(required, check).await?;
        let direct_id = notification.notify_user.as_ref().map(|u| u.id);
        audience.extend(admins.into_iter().filter(|u| Some(u.id) != direct_id));
    }

    Ok(audience)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueRef, IssueType, MediaRef, MediaStatus, MediaType};
    use crate::store::MemoryStore;

    fn movie() -> MediaRef {
        MediaRef {
            media_type: MediaType::Movie,
            tmdb_id: 550,
            status: MediaStatus::Pending,
        }
    }

    fn populated_store() -> Arc<dyn UserStore> {
        let store = MemoryStore::new();
        store.add_user(User::new(1, "Admin", Permissions::ADMIN));
        store.add_user(User::new(2, "ReqManager", Permissions::MANAGE_REQUESTS));
        store.add_user(User::new(3, "IssueViewer", Permissions::VIEW_ISSUES));
        store.add_user(User::new(4, "Requester", Permissions::REQUEST));
        Arc::new(store)
    }

    #[test]
    fn issue_events_target_issue_permissions() {
        let (required, check) = admin_requirement(NotificationTypes::ISSUE_RESOLVED);
        assert!(required.contains(Permissions::MANAGE_ISSUES));
        assert!(required.contains(Permissions::VIEW_ISSUES));
        assert_eq!(check, PermissionCheck::Any);

        let (required, _) = admin_requirement(NotificationTypes::MEDIA_DECLINED);
        assert_eq!(required, Permissions::MANAGE_REQUESTS);
    }

    #[tokio::test]
    async fn media_broadcast_reaches_request_managers() {
        let store = populated_store();
        let requester = User::new(4, "Requester", Permissions::REQUEST);
        let notification = Notification::request_pending(
            movie(),
            "Fight Club".into(),
            crate::models::RequestRef { id: 1 },
            &requester,
        );

        let audience = resolve_audience(&store, &notification).await.unwrap();
        let ids: Vec<i64> = audience.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn issue_broadcast_reaches_issue_holders() {
        let store = populated_store();
        let reporter = User::new(4, "Requester", Permissions::REQUEST);
        let notification = Notification::issue_created(
            IssueRef {
                id: 1,
                issue_type: IssueType::Audio,
                comment: None,
            },
            movie(),
            "Fight Club".into(),
            &reporter,
        );

        let audience = resolve_audience(&store, &notification).await.unwrap();
        let ids: Vec<i64> = audience.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn direct_recipient_is_not_duplicated_by_broadcast() {
        let store = populated_store();
        let manager = User::new(2, "ReqManager", Permissions::MANAGE_REQUESTS);
        let notification = Notification::request_approved(
            movie(),
            "Fight Club".into(),
            crate::models::RequestRef { id: 1 },
            manager,
        )
        .for_admins();

        let audience = resolve_audience(&store, &notification).await.unwrap();
        let ids: Vec<i64> = audience.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
