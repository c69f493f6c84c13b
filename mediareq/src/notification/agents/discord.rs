//! Discord webhook agent.
//!
//! Delivers a rich embed to one configured channel webhook. Users who linked a
//! Discord id and whose personal mask admits the category are mentioned in the
//! message content, so a broadcast still pings the people it concerns.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{NotificationAgent, resolve_audience};
use crate::error::Result;
use crate::notification::events::media_link;
use crate::notification::transport::{DeliveryRequest, Transport};
use crate::notification::{Notification, NotificationTypes, has_notification_type};
use crate::store::UserStore;

const COLOR_ORANGE: u32 = 0xE87B03;
const COLOR_GREEN: u32 = 0x2ECC71;
const COLOR_PURPLE: u32 = 0x9B59B6;
const COLOR_RED: u32 = 0xE74C3C;
const COLOR_BLUE: u32 = 0x3498DB;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub enabled: bool,
    /// Categories this agent delivers; zero means all.
    pub types: NotificationTypes,
    pub webhook_url: Option<Url>,
    /// Override for the webhook's display name.
    pub bot_username: Option<String>,
    pub bot_avatar_url: Option<Url>,
    /// Mention linked users in the message content.
    pub enable_mentions: bool,
    /// Base URL of the host application, for embed deep links.
    pub application_url: Option<Url>,
}

pub struct DiscordAgent {
    config: DiscordConfig,
    user_store: Arc<dyn UserStore>,
    transport: Arc<dyn Transport>,
}

impl DiscordAgent {
    pub fn new(
        config: DiscordConfig,
        user_store: Arc<dyn UserStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            user_store,
            transport,
        }
    }

    fn embed_color(kind: NotificationTypes) -> u32 {
        const GREEN: NotificationTypes = NotificationTypes::MEDIA_APPROVED
            .union(NotificationTypes::MEDIA_AUTO_APPROVED)
            .union(NotificationTypes::MEDIA_AVAILABLE)
            .union(NotificationTypes::ISSUE_RESOLVED);
        const RED: NotificationTypes = NotificationTypes::MEDIA_DECLINED
            .union(NotificationTypes::MEDIA_FAILED)
            .union(NotificationTypes::ISSUE_CREATED)
            .union(NotificationTypes::ISSUE_REOPENED);

        if kind.intersects(NotificationTypes::MEDIA_PENDING) {
            COLOR_ORANGE
        } else if kind.intersects(GREEN) {
            COLOR_GREEN
        } else if kind.intersects(RED) {
            COLOR_RED
        } else if kind.intersects(NotificationTypes::ISSUE_COMMENT) {
            COLOR_PURPLE
        } else {
            COLOR_BLUE
        }
    }

    fn build_embed(&self, notification: &Notification) -> serde_json::Value {
        let event = &notification.event;
        let mut fields: Vec<serde_json::Value> = notification
            .extra
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": true }))
            .collect();
        if let Some(issue) = event.issue() {
            fields.push(json!({
                "name": "Issue Type",
                "value": issue.issue_type.to_string(),
                "inline": true,
            }));
        }

        let url = self.config.application_url.as_ref().and_then(|base| {
            event.media().and_then(|media| media_link(base, media))
        });

        json!({
            "title": event.subject(),
            "description": event.message(),
            "color": Self::embed_color(notification.kind()),
            "url": url.as_ref().map(Url::as_str),
            "thumbnail": notification.image.as_ref().map(|i| json!({ "url": i.as_str() })),
            "fields": fields,
        })
    }

    /// `<@id>` mentions for every audience member who linked a Discord id and
    /// whose personal mask admits this category.
    async fn mention_content(&self, notification: &Notification) -> Result<String> {
        if !self.config.enable_mentions {
            return Ok(String::new());
        }
        let kind = notification.kind();
        let audience = resolve_audience(&self.user_store, notification).await?;
        let mentions: Vec<String> = audience
            .iter()
            .filter(|user| has_notification_type(kind, user.settings.discord_types))
            .filter_map(|user| user.settings.discord_id.as_ref())
            .map(|id| format!("<@{id}>"))
            .collect();
        Ok(mentions.join(" "))
    }
}

#[async_trait]
impl NotificationAgent for DiscordAgent {
    fn agent_type(&self) -> &'static str {
        "discord"
    }

    fn should_send(&self, kind: NotificationTypes) -> bool {
        self.config.enabled && has_notification_type(kind, self.config.types)
    }

    async fn send(&self, notification: &Notification) -> Result<bool> {
        let Some(url) = &self.config.webhook_url else {
            warn!("Discord agent enabled but no webhook URL configured");
            return Ok(false);
        };

        let content = self.mention_content(notification).await?;
        let payload = json!({
            "username": self.config.bot_username,
            "avatar_url": self.config.bot_avatar_url.as_ref().map(Url::as_str),
            "content": content,
            "embeds": [self.build_embed(notification)],
        });

        let response = self
            .transport
            .deliver(DeliveryRequest::json(url.clone(), payload))
            .await?;
        if response.is_success() {
            debug!(subject = %notification.event.subject(), "Discord notification sent");
            Ok(true)
        } else {
            warn!(
                status = response.status,
                body = response.body.as_deref().unwrap_or(""),
                "Discord webhook rejected notification"
            );
            Ok(false)
        }
    }
}
