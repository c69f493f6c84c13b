//! Plain domain structs handed to the core by the host.
//!
//! The host owns persistence; these types carry only the fields the
//! permission, quota, and notification subsystems read.

use serde::{Deserialize, Serialize};

use crate::notification::NotificationTypes;
use crate::permissions::{PermissionCheck, Permissions, has_permission};

/// Kind of media a request targets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

/// Availability of a media item in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Unknown,
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
}

/// Lifecycle state of a media request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Declined,
}

/// Reference to a media item carried inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub media_type: MediaType,
    /// External catalog identifier (TMDB).
    pub tmdb_id: i64,
    pub status: MediaStatus,
}

/// Reference to a media request carried inside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRef {
    pub id: i64,
}

/// Category of a reported media issue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Video,
    Audio,
    Subtitles,
    Other,
}

/// Reference to a media issue carried inside a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: i64,
    pub issue_type: IssueType,
    /// Most recent comment text, when the event is comment-driven.
    pub comment: Option<String>,
}

/// A browser push registration owned by one user.
///
/// Removed by the push agent when the push service reports the endpoint gone;
/// every other mutation belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: String,
    pub user_id: i64,
    pub endpoint: String,
    /// Client public key (P-256, base64url).
    pub p256dh: String,
    /// Client auth secret (base64url).
    pub auth: String,
}

/// Per-user notification preferences.
///
/// Each channel a user can personally receive carries its own enablement mask;
/// an empty mask means the user has not filtered anything yet and receives all
/// types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotificationSettings {
    /// Discord user id to mention, when the user linked one.
    pub discord_id: Option<String>,
    pub discord_types: NotificationTypes,
    /// Telegram chat to deliver to, when the user linked one.
    pub telegram_chat_id: Option<String>,
    pub telegram_send_silently: bool,
    pub telegram_types: NotificationTypes,
    pub push_types: NotificationTypes,
}

/// A user account as the host hands it to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub permissions: Permissions,
    /// The unremovable bootstrap account. Carries implicit ADMIN.
    pub is_owner: bool,
    /// Per-user quota overrides; `None` falls back to the global default.
    pub movie_quota_limit: Option<u64>,
    pub movie_quota_days: Option<u64>,
    pub tv_quota_limit: Option<u64>,
    pub tv_quota_days: Option<u64>,
    pub settings: UserNotificationSettings,
}

impl User {
    /// Stored permissions plus the owner's implicit ADMIN grant.
    #[must_use]
    pub fn effective_permissions(&self) -> Permissions {
        if self.is_owner {
            self.permissions | Permissions::ADMIN
        } else {
            self.permissions
        }
    }

    /// Check this user's effective permissions against a requirement.
    #[must_use]
    pub fn has_permission(&self, required: Permissions, check: PermissionCheck) -> bool {
        has_permission(required, self.effective_permissions(), check)
    }

    /// Minimal user for tests and fixtures.
    #[must_use]
    pub fn new(id: i64, display_name: impl Into<String>, permissions: Permissions) -> Self {
        let display_name = display_name.into();
        let email = format!("{}@localhost", display_name.to_lowercase());
        Self {
            id,
            display_name,
            email,
            permissions,
            is_owner: false,
            movie_quota_limit: None,
            movie_quota_days: None,
            tv_quota_limit: None,
            tv_quota_days: None,
            settings: UserNotificationSettings::default(),
        }
    }
}
