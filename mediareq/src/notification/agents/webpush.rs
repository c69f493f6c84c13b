//! Browser push agent.
//!
//! Fans out to every push subscription owned by the audience. The transport
//! collaborator performs the Web Push encryption and VAPID signing using the
//! subscription material carried on the request; this agent decides who
//! receives what and prunes subscriptions that are gone (404/410) or whose
//! endpoint cannot be reached. Pruning is the only persisted side effect of a
//! delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::{NotificationAgent, resolve_audience};
use crate::error::{Error, Result};
use crate::models::PushSubscription;
use crate::notification::transport::{DeliveryRequest, Transport};
use crate::notification::{Notification, NotificationTypes, has_notification_type};
use crate::store::{PushSubscriptionStore, UserStore};

const PUSH_CONCURRENCY: usize = 8;
/// Seconds the push service may hold an undelivered message.
const PUSH_TTL: u32 = 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebPushConfig {
    pub enabled: bool,
    /// Categories this agent delivers; zero means all.
    pub types: NotificationTypes,
}

pub struct WebPushAgent {
    config: WebPushConfig,
    user_store: Arc<dyn UserStore>,
    subscription_store: Arc<dyn PushSubscriptionStore>,
    transport: Arc<dyn Transport>,
}

impl WebPushAgent {
    pub fn new(
        config: WebPushConfig,
        user_store: Arc<dyn UserStore>,
        subscription_store: Arc<dyn PushSubscriptionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            user_store,
            subscription_store,
            transport,
        }
    }

    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        let event = &notification.event;
        json!({
            "notification_type": notification.kind().name(),
            "subject": event.subject(),
            "message": event.message(),
            "image": notification.image.as_ref().map(Url::as_str),
            "media": event.media().map(|m| json!({
                "media_type": m.media_type.to_string(),
                "tmdb_id": m.tmdb_id,
            })),
            "request_id": event.request().map(|r| r.id),
            "issue_id": event.issue().map(|i| i.id),
        })
    }

    fn build_request(
        &self,
        subscription: &PushSubscription,
        vapid_subject: &str,
        payload: &serde_json::Value,
    ) -> Result<DeliveryRequest> {
        let endpoint = Url::parse(&subscription.endpoint).map_err(|e| {
            Error::validation(format!(
                "Push subscription {} has an invalid endpoint: {e}",
                subscription.id
            ))
        })?;
        Ok(DeliveryRequest::json(endpoint, payload.clone())
            .with_header("TTL", PUSH_TTL.to_string())
            .with_header("X-WebPush-P256dh", subscription.p256dh.clone())
            .with_header("X-WebPush-Auth", subscription.auth.clone())
            .with_header("X-WebPush-Subject", vapid_subject.to_string()))
    }

    /// Deliver to one subscription. A gone status (404/410) or a transport
    /// error marks the subscription presumed-expired and prunes it; a plain
    /// rejection leaves it in place.
    async fn deliver_one(
        &self,
        subscription: &PushSubscription,
        vapid_subject: &str,
        payload: &serde_json::Value,
    ) -> bool {
        let request = match self.build_request(subscription, vapid_subject, payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(subscription_id = %subscription.id, error = %e, "Skipping push subscription");
                return false;
            }
        };

        match self.transport.deliver(request).await {
            Ok(response) if response.is_success() => true,
            Ok(response) if response.is_gone() => {
                info!(
                    subscription_id = %subscription.id,
                    status = response.status,
                    "Removing expired push subscription"
                );
                self.prune(subscription).await;
                false
            }
            Ok(response) => {
                warn!(
                    subscription_id = %subscription.id,
                    status = response.status,
                    "Push service rejected notification"
                );
                false
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Push delivery failed, removing unreachable subscription"
                );
                self.prune(subscription).await;
                false
            }
        }
    }

    async fn prune(&self, subscription: &PushSubscription) {
        if let Err(e) = self.subscription_store.remove(&subscription.id).await {
            warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to remove push subscription"
            );
        }
    }
}

#[async_trait]
impl NotificationAgent for WebPushAgent {
    fn agent_type(&self) -> &'static str {
        "webpush"
    }

    fn should_send(&self, kind: NotificationTypes) -> bool {
        self.config.enabled && has_notification_type(kind, self.config.types)
    }

    async fn send(&self, notification: &Notification) -> Result<bool> {
        // Sender identity for VAPID comes from the owner account.
        let vapid_subject = match self.user_store.owner().await {
            Ok(owner) => format!("mailto:{}", owner.email),
            Err(e) => {
                warn!(error = %e, "Push agent cannot resolve the owner account");
                return Ok(false);
            }
        };

        let kind = notification.kind();
        let audience = resolve_audience(&self.user_store, notification).await?;
        let mut subscriptions = Vec::new();
        for user in &audience {
            if !has_notification_type(kind, user.settings.push_types) {
                continue;
            }
            subscriptions.extend(self.subscription_store.list_for_user(user.id).await?);
        }
        if subscriptions.is_empty() {
            debug!("Push notification has no target subscriptions");
            return Ok(false);
        }

        let payload = self.build_payload(notification);
        let delivered = AtomicUsize::new(0);
        stream::iter(&subscriptions)
            .for_each_concurrent(PUSH_CONCURRENCY, |subscription| {
                let vapid_subject = &vapid_subject;
                let payload = &payload;
                let delivered = &delivered;
                async move {
                    if self.deliver_one(subscription, vapid_subject, payload).await {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        Ok(delivered.load(Ordering::Relaxed) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaRef, MediaStatus, MediaType, RequestRef, User};
    use crate::notification::transport::{DeliveryResponse, MockTransport};
    use crate::permissions::Permissions;
    use crate::store::MemoryStore;

    fn movie() -> MediaRef {
        MediaRef {
            media_type: MediaType::Movie,
            tmdb_id: 603,
            status: MediaStatus::Available,
        }
    }

    fn subscription(id: &str, user_id: i64, endpoint: &str) -> PushSubscription {
        PushSubscription {
            id: id.to_string(),
            user_id,
            endpoint: endpoint.to_string(),
            p256dh: "BPubKey".to_string(),
            auth: "authsecret".to_string(),
        }
    }

    fn store_with_owner_and_user() -> (Arc<MemoryStore>, User) {
        let store = MemoryStore::new();
        let mut owner = User::new(1, "Root", Permissions::empty());
        owner.is_owner = true;
        owner.email = "owner@example.com".into();
        store.add_user(owner);
        let user = User::new(5, "Trinity", Permissions::REQUEST);
        store.add_user(user.clone());
        (Arc::new(store), user)
    }

    fn available(requester: User) -> Notification {
        Notification::request_available(
            movie(),
            "The Matrix".into(),
            RequestRef { id: 7 },
            requester,
        )
    }

    fn enabled_config() -> WebPushConfig {
        WebPushConfig {
            enabled: true,
            types: NotificationTypes::empty(),
        }
    }

    #[tokio::test]
    async fn partial_failure_still_counts_as_delivered() {
        let (store, user) = store_with_owner_and_user();
        store.add_subscription(subscription("s1", 5, "https://push.example.com/a"));
        store.add_subscription(subscription("s2", 5, "https://push.example.com/b"));
        store.add_subscription(subscription("s3", 5, "https://push.example.com/c"));

        let mut transport = MockTransport::new();
        transport.expect_deliver().times(3).returning(|request| {
            if request.endpoint.path() == "/b" {
                Ok(DeliveryResponse {
                    status: 410,
                    body: None,
                })
            } else {
                Ok(DeliveryResponse {
                    status: 201,
                    body: None,
                })
            }
        });

        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store.clone(),
            Arc::new(transport),
        );
        let delivered = agent.send(&available(user)).await.unwrap();
        assert!(delivered);
        // The expired subscription was pruned, the other two survive.
        assert_eq!(store.subscription_count(), 2);
    }

    #[tokio::test]
    async fn vapid_subject_comes_from_owner_email() {
        let (store, user) = store_with_owner_and_user();
        store.add_subscription(subscription("s1", 5, "https://push.example.com/a"));

        let mut transport = MockTransport::new();
        transport
            .expect_deliver()
            .withf(|request| {
                request.headers.iter().any(|(n, v)| {
                    n == "X-WebPush-Subject" && v == "mailto:owner@example.com"
                }) && request.headers.iter().any(|(n, _)| n == "TTL")
            })
            .times(1)
            .returning(|_| {
                Ok(DeliveryResponse {
                    status: 201,
                    body: None,
                })
            });

        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store,
            Arc::new(transport),
        );
        assert!(agent.send(&available(user)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_owner_is_reported_not_raised() {
        let store = Arc::new(MemoryStore::new());
        let user = User::new(5, "Trinity", Permissions::REQUEST);
        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store,
            Arc::new(MockTransport::new()),
        );
        assert!(!agent.send(&available(user)).await.unwrap());
    }

    #[tokio::test]
    async fn personal_mask_filters_subscriptions() {
        let (store, mut user) = store_with_owner_and_user();
        store.add_subscription(subscription("s1", 5, "https://push.example.com/a"));
        user.settings.push_types = NotificationTypes::MEDIA_DECLINED;

        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store,
            Arc::new(MockTransport::new()),
        );
        // MEDIA_AVAILABLE is not in the user's mask, so nothing is attempted.
        assert!(!agent.send(&available(user)).await.unwrap());
    }

    #[tokio::test]
    async fn transport_error_prunes_without_escalating() {
        let (store, user) = store_with_owner_and_user();
        store.add_subscription(subscription("s1", 5, "https://push.example.com/a"));

        let mut transport = MockTransport::new();
        transport
            .expect_deliver()
            .returning(|_| Err(Error::transport("tls handshake failed")));

        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store.clone(),
            Arc::new(transport),
        );
        let delivered = agent.send(&available(user)).await.unwrap();
        assert!(!delivered);
        // An unreachable endpoint is presumed expired and removed.
        assert_eq!(store.subscription_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_subscription_is_pruned_and_siblings_deliver() {
        let (store, user) = store_with_owner_and_user();
        store.add_subscription(subscription("s1", 5, "https://push.example.com/a"));
        store.add_subscription(subscription("s2", 5, "https://push.example.com/b"));
        store.add_subscription(subscription("s3", 5, "https://push.example.com/c"));

        let mut transport = MockTransport::new();
        transport.expect_deliver().times(3).returning(|request| {
            if request.endpoint.path() == "/b" {
                Err(Error::transport("connection refused"))
            } else {
                Ok(DeliveryResponse {
                    status: 201,
                    body: None,
                })
            }
        });

        let agent = WebPushAgent::new(
            enabled_config(),
            store.clone(),
            store.clone(),
            Arc::new(transport),
        );
        let delivered = agent.send(&available(user)).await.unwrap();
        assert!(delivered);
        // Only the failed subscription is removed.
        let remaining = store.list_for_user(5).await.unwrap();
        let ids: Vec<&str> = remaining.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }
}
