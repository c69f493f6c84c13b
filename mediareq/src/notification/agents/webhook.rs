//! Generic JSON webhook agent.
//!
//! Posts a stable, machine-readable payload describing the event to one
//! configured endpoint. Unlike the chat agents it has no per-user identity, so
//! the audience resolves to the single configured URL.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::NotificationAgent;
use crate::error::Result;
use crate::notification::transport::{DeliveryRequest, Transport};
use crate::notification::{Notification, NotificationTypes, has_notification_type};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub enabled: bool,
    /// Categories this agent delivers; zero means all.
    pub types: NotificationTypes,
    pub webhook_url: Option<Url>,
    /// Sent verbatim as the `Authorization` header when set.
    pub auth_header: Option<String>,
}

pub struct WebhookAgent {
    config: WebhookConfig,
    transport: Arc<dyn Transport>,
}

impl WebhookAgent {
    pub fn new(config: WebhookConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        let event = &notification.event;
        let mut payload = json!({
            "notification_type": notification.kind().name(),
            "subject": event.subject(),
            "message": event.message(),
            "image": notification.image.as_ref().map(Url::as_str),
        });

        if let Some(media) = event.media() {
            payload["media"] = json!({
                "media_type": media.media_type.to_string(),
                "tmdb_id": media.tmdb_id,
                "status": media.status.to_string(),
            });
        }
        if let Some(request) = event.request() {
            payload["request"] = json!({ "request_id": request.id });
        }
        if let Some(issue) = event.issue() {
            payload["issue"] = json!({
                "issue_id": issue.id,
                "issue_type": issue.issue_type.to_string(),
                "comment": issue.comment,
            });
        }
        if let Some(user) = &notification.notify_user {
            payload["notify_user"] = json!({
                "id": user.id,
                "display_name": user.display_name,
                "email": user.email,
            });
        }
        if !notification.extra.is_empty() {
            payload["extra"] = json!(notification.extra);
        }

        payload
    }
}

#[async_trait]
impl NotificationAgent for WebhookAgent {
    fn agent_type(&self) -> &'static str {
        "webhook"
    }

    fn should_send(&self, kind: NotificationTypes) -> bool {
        self.config.enabled && has_notification_type(kind, self.config.types)
    }

    async fn send(&self, notification: &Notification) -> Result<bool> {
        let Some(url) = &self.config.webhook_url else {
            warn!("Webhook agent enabled but no webhook URL configured");
            return Ok(false);
        };

        let mut request =
            DeliveryRequest::json(url.clone(), self.build_payload(notification));
        if let Some(auth) = &self.config.auth_header {
            request = request.with_header("Authorization", auth.clone());
        }

        let response = self.transport.deliver(request).await?;
        if response.is_success() {
            debug!(subject = %notification.event.subject(), "Webhook notification sent");
            Ok(true)
        } else {
            warn!(
                status = response.status,
                body = response.body.as_deref().unwrap_or(""),
                "Webhook endpoint rejected notification"
            );
            Ok(false)
        }
    }
}
