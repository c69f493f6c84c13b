//! mediareq core library.
//!
//! Permission checks, rolling request quotas, and multi-channel notification
//! fan-out for a media request manager. The host application owns the web
//! surface and persistence; this crate owns the decisions.

pub mod error;
pub mod models;
pub mod notification;
pub mod permissions;
pub mod quota;
pub mod store;

pub use error::{Error, Result};
pub use notification::{Notification, NotificationDispatcher, NotificationEvent, NotificationTypes};
pub use permissions::{PermissionCheck, Permissions, has_permission};
pub use quota::{QuotaEngine, QuotaPolicy, UserQuota};
