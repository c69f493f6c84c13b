//! Notification fan-out subsystem.
//!
//! A domain event becomes a [`Notification`], the dispatcher filters the
//! registered agents by enablement and type mask, and every surviving agent
//! delivers concurrently through its transport. Delivery is best-effort: a
//! failing agent or recipient never fails the triggering domain action.

pub mod agents;
pub mod dispatcher;
pub mod events;
pub mod transport;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::User;

pub use dispatcher::{AgentOutcome, NotificationDispatcher};
pub use events::NotificationEvent;

bitflags! {
    /// Notification category bitmask.
    ///
    /// Categories are disjoint powers of two; combining several is a bitwise
    /// union. Bit values are part of the stored data format.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NotificationTypes: u32 {
        /// A request is awaiting approval.
        const MEDIA_PENDING = 1 << 1;
        /// A request was approved.
        const MEDIA_APPROVED = 1 << 2;
        /// Requested media became available.
        const MEDIA_AVAILABLE = 1 << 3;
        /// Processing of requested media failed.
        const MEDIA_FAILED = 1 << 4;
        /// A connectivity test issued from the settings screen.
        const TEST_NOTIFICATION = 1 << 5;
        /// A request was declined.
        const MEDIA_DECLINED = 1 << 6;
        /// A request was approved automatically.
        const MEDIA_AUTO_APPROVED = 1 << 7;
        /// An issue was reported.
        const ISSUE_CREATED = 1 << 8;
        /// A comment was added to an issue.
        const ISSUE_COMMENT = 1 << 9;
        /// An issue was resolved.
        const ISSUE_RESOLVED = 1 << 10;
        /// A resolved issue was reopened.
        const ISSUE_REOPENED = 1 << 11;
    }
}

impl NotificationTypes {
    /// Every issue-related category.
    pub const ISSUE_ALL: Self = Self::ISSUE_CREATED
        .union(Self::ISSUE_COMMENT)
        .union(Self::ISSUE_RESOLVED)
        .union(Self::ISSUE_REOPENED);

    /// Wire name of a single-category mask, e.g. `MEDIA_PENDING`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.iter_names().next().map_or("UNKNOWN", |(name, _)| name)
    }
}

/// Check whether a configured type mask admits `required`.
///
/// An empty requirement passes (nothing to filter). A configured mask of
/// exactly zero means "no filter configured yet" and admits everything.
/// `TEST_NOTIFICATION` is ORed into the configured mask before testing so test
/// sends can never be filtered out.
#[must_use]
pub fn has_notification_type(required: NotificationTypes, configured: NotificationTypes) -> bool {
    if required.is_empty() {
        return true;
    }
    if configured.is_empty() {
        return true;
    }
    (configured | NotificationTypes::TEST_NOTIFICATION).intersects(required)
}

/// A single name/value pair attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraField {
    pub name: String,
    pub value: String,
}

impl ExtraField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One dispatchable notification: the event plus its audience.
///
/// Created by an event source, consumed exactly once by the dispatcher, never
/// persisted.
#[derive(Debug, Clone)]
pub struct Notification {
    pub event: NotificationEvent,
    /// Direct recipient. When set, agents deliver to this user's channel
    /// identity only.
    pub notify_user: Option<User>,
    /// Broadcast to every user holding the management permission relevant to
    /// the event category.
    pub notify_admin: bool,
    /// Poster or artwork to embed where the channel supports it.
    pub image: Option<Url>,
    /// Ordered channel-agnostic detail rows (requester, seasons, comment...).
    pub extra: Vec<ExtraField>,
}

impl Notification {
    /// Notification with no audience; callers layer one on with the builder
    /// methods.
    #[must_use]
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            event,
            notify_user: None,
            notify_admin: false,
            image: None,
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_user(mut self, user: User) -> Self {
        self.notify_user = Some(user);
        self
    }

    #[must_use]
    pub fn for_admins(mut self) -> Self {
        self.notify_admin = true;
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: Url) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push(ExtraField::new(name, value));
        self
    }

    /// The single category bit this notification carries.
    #[must_use]
    pub fn kind(&self) -> NotificationTypes {
        self.event.notification_type()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_type_always_allowed() {
        assert!(has_notification_type(
            NotificationTypes::TEST_NOTIFICATION,
            NotificationTypes::empty(),
        ));
        assert!(has_notification_type(
            NotificationTypes::TEST_NOTIFICATION,
            NotificationTypes::MEDIA_PENDING,
        ));
    }

    #[test]
    fn zero_mask_allows_everything() {
        assert!(has_notification_type(
            NotificationTypes::ISSUE_RESOLVED,
            NotificationTypes::empty(),
        ));
    }

    #[test]
    fn empty_requirement_passes() {
        assert!(has_notification_type(
            NotificationTypes::empty(),
            NotificationTypes::MEDIA_APPROVED,
        ));
    }

    #[test]
    fn configured_mask_filters() {
        let configured = NotificationTypes::MEDIA_APPROVED | NotificationTypes::MEDIA_DECLINED;
        assert!(has_notification_type(
            NotificationTypes::MEDIA_APPROVED,
            configured
        ));
        assert!(!has_notification_type(
            NotificationTypes::ISSUE_CREATED,
            configured
        ));
    }

    #[rstest]
    #[case(NotificationTypes::MEDIA_PENDING, NotificationTypes::ISSUE_COMMENT)]
    #[case(NotificationTypes::MEDIA_AVAILABLE, NotificationTypes::MEDIA_FAILED)]
    fn union_matches_either_disjoint_bit(
        #[case] a: NotificationTypes,
        #[case] b: NotificationTypes,
    ) {
        let configured = NotificationTypes::MEDIA_PENDING
            | NotificationTypes::MEDIA_AVAILABLE
            | NotificationTypes::MEDIA_FAILED
            | NotificationTypes::ISSUE_COMMENT;
        let combined = has_notification_type(a | b, configured);
        let separate =
            has_notification_type(a, configured) || has_notification_type(b, configured);
        assert_eq!(combined, separate);
    }

    #[test]
    fn notification_types_are_disjoint_powers_of_two() {
        let mut seen = 0u32;
        for flag in NotificationTypes::all().iter() {
            let bits = flag.bits();
            assert_eq!(bits.count_ones(), 1, "{flag:?} is not a single bit");
            assert_eq!(seen & bits, 0, "{flag:?} overlaps another category");
            seen |= bits;
        }
    }
}
