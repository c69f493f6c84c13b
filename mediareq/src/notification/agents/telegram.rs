//! Telegram bot agent.
//!
//! Sends an HTML-formatted message through the Bot API. Besides the optional
//! global chat, every audience member who linked a chat id gets a personal
//! copy, honouring their per-user type mask and silent-delivery preference.
//! Per-chat failures are isolated so one dead chat cannot starve the rest.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{NotificationAgent, resolve_audience};
use crate::error::{Error, Result};
use crate::notification::events::media_link;
use crate::notification::transport::{DeliveryRequest, Transport};
use crate::notification::{Notification, NotificationTypes, has_notification_type};
use crate::store::UserStore;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const CHAT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    /// Categories this agent delivers; zero means all.
    pub types: NotificationTypes,
    pub bot_token: Option<String>,
    /// Shared broadcast chat. Personal chats come from user settings.
    pub chat_id: Option<String>,
    /// Deliver to the shared chat without a client-side notification sound.
    pub send_silently: bool,
    /// Base URL of the host application, for deep links in the message.
    pub application_url: Option<Url>,
}

/// One sendMessage call: target chat plus its silent preference.
struct ChatDelivery {
    chat_id: String,
    silent: bool,
}

pub struct TelegramAgent {
    config: TelegramConfig,
    user_store: Arc<dyn UserStore>,
    transport: Arc<dyn Transport>,
}

impl TelegramAgent {
    pub fn new(
        config: TelegramConfig,
        user_store: Arc<dyn UserStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            user_store,
            transport,
        }
    }

    fn endpoint(&self, bot_token: &str) -> Result<Url> {
        Url::parse(&format!("{TELEGRAM_API_BASE}/bot{bot_token}/sendMessage"))
            .map_err(|e| Error::config(format!("Invalid Telegram bot token: {e}")))
    }

    fn build_text(&self, notification: &Notification) -> String {
        let event = &notification.event;
        let mut text = format!(
            "<b>{}</b>\n{}",
            html_escape(&event.subject()),
            html_escape(&event.message())
        );
        for field in &notification.extra {
            text.push_str(&format!(
                "\n<b>{}:</b> {}",
                html_escape(&field.name),
                html_escape(&field.value)
            ));
        }
        if let Some(link) = self.config.application_url.as_ref().and_then(|base| {
            event.media().and_then(|media| media_link(base, media))
        }) {
            text.push_str(&format!("\n<a href=\"{link}\">Open in app</a>"));
        }
        text
    }

    /// The shared chat plus one entry per linked audience member whose
    /// personal mask admits `kind`.
    async fn resolve_chats(&self, notification: &Notification) -> Result<Vec<ChatDelivery>> {
        let kind = notification.kind();
        let mut chats = Vec::new();
        if let Some(chat_id) = &self.config.chat_id {
            chats.push(ChatDelivery {
                chat_id: chat_id.clone(),
                silent: self.config.send_silently,
            });
        }

        let audience = resolve_audience(&self.user_store, notification).await?;
        for user in &audience {
            let Some(chat_id) = &user.settings.telegram_chat_id else {
                continue;
            };
            if !has_notification_type(kind, user.settings.telegram_types) {
                continue;
            }
            if chats.iter().any(|c| &c.chat_id == chat_id) {
                continue;
            }
            chats.push(ChatDelivery {
                chat_id: chat_id.clone(),
                silent: user.settings.telegram_send_silently,
            });
        }

        Ok(chats)
    }
}

#[async_trait]
impl NotificationAgent for TelegramAgent {
    fn agent_type(&self) -> &'static str {
        "telegram"
    }

    fn should_send(&self, kind: NotificationTypes) -> bool {
        self.config.enabled && has_notification_type(kind, self.config.types)
    }

    async fn send(&self, notification: &Notification) -> Result<bool> {
        let Some(bot_token) = &self.config.bot_token else {
            warn!("Telegram agent enabled but no bot token configured");
            return Ok(false);
        };
        let endpoint = self.endpoint(bot_token)?;

        let chats = self.resolve_chats(notification).await?;
        if chats.is_empty() {
            debug!("Telegram notification has no target chats");
            return Ok(false);
        }

        let text = self.build_text(notification);
        let delivered = AtomicUsize::new(0);
        stream::iter(chats)
            .for_each_concurrent(CHAT_CONCURRENCY, |chat| {
                let endpoint = endpoint.clone();
                let text = text.clone();
                let delivered = &delivered;
                async move {
                    let payload = json!({
                        "chat_id": chat.chat_id,
                        "text": text,
                        "parse_mode": "HTML",
                        "disable_notification": chat.silent,
                    });
                    match self
                        .transport
                        .deliver(DeliveryRequest::json(endpoint, payload))
                        .await
                    {
                        Ok(response) if response.is_success() => {
                            delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(response) => {
                            warn!(
                                chat_id = %chat.chat_id,
                                status = response.status,
                                "Telegram rejected notification"
                            );
                        }
                        Err(e) => {
                            warn!(
                                chat_id = %chat.chat_id,
                                error = %e,
                                "Telegram delivery failed"
                            );
                        }
                    }
                }
            })
            .await;

        Ok(delivered.load(Ordering::Relaxed) > 0)
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
