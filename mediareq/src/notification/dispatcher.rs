//! Fan-out across the registered agents.
//!
//! Dispatch is fire-and-forget: the caller's domain action finishes before any
//! delivery completes, and no agent outcome can fail it. [`fan_out`] is the
//! awaitable core, used directly where the caller wants the per-agent
//! outcomes.
//!
//! [`fan_out`]: NotificationDispatcher::fan_out

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::Notification;
use super::agents::NotificationAgent;

/// Result of one agent's delivery attempt.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub agent_type: &'static str,
    /// At least one transport call succeeded.
    pub delivered: bool,
    pub error: Option<String>,
}

/// Registry of agents plus the fan-out loop.
#[derive(Default)]
pub struct NotificationDispatcher {
    agents: RwLock<Vec<Arc<dyn NotificationAgent>>>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: Arc<dyn NotificationAgent>) {
        self.agents.write().push(agent);
    }

    /// Swap the whole agent set, applying a settings change atomically.
    pub fn replace_agents(&self, agents: Vec<Arc<dyn NotificationAgent>>) {
        *self.agents.write() = agents;
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.read().len()
    }

    /// Deliver through every agent that wants this event, concurrently, and
    /// collect the outcomes. Agent errors land in the outcome, never in a
    /// return error.
    pub async fn fan_out(&self, notification: Notification) -> Vec<AgentOutcome> {
        let kind = notification.kind();
        let agents: Vec<Arc<dyn NotificationAgent>> = self
            .agents
            .read()
            .iter()
            .filter(|agent| agent.should_send(kind))
            .cloned()
            .collect();
        if agents.is_empty() {
            debug!(kind = kind.name(), "No agent accepts this notification");
            return Vec::new();
        }

        let notification = Arc::new(notification);
        let deliveries = agents.into_iter().map(|agent| {
            let notification = Arc::clone(&notification);
            async move {
                let agent_type = agent.agent_type();
                match agent.send(&notification).await {
                    Ok(delivered) => {
                        if !delivered {
                            warn!(agent = agent_type, "Notification was not delivered");
                        }
                        AgentOutcome {
                            agent_type,
                            delivered,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(agent = agent_type, error = %e, "Notification agent failed");
                        AgentOutcome {
                            agent_type,
                            delivered: false,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });

        join_all(deliveries).await
    }

    /// Fire-and-forget dispatch. Returns once the fan-out task is spawned.
    pub fn dispatch(self: &Arc<Self>, notification: Notification) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.fan_out(notification).await;
        });
    }
}
