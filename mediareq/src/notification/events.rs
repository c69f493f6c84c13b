//! Domain events that trigger notifications.
//!
//! Each trigger is its own variant carrying exactly the fields its payload
//! needs, so a new event kind cannot silently fall through an agent's payload
//! builder. Message templates live here; agents only decorate them.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{IssueRef, MediaRef, MediaType, RequestRef, User};
use crate::notification::{Notification, NotificationTypes};

/// A notification-worthy domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationEvent {
    /// A request entered the approval queue.
    MediaPending {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// A request was approved by a manager.
    MediaApproved {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// A request was approved without review.
    MediaAutoApproved {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// Requested media is ready to watch.
    MediaAvailable {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// A request was declined.
    MediaDeclined {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// Processing of requested media failed downstream.
    MediaFailed {
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requested_by: String,
    },
    /// A connectivity test issued from the settings screen.
    Test { subject: String, message: String },
    /// An issue was reported against a media item.
    IssueCreated {
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        reported_by: String,
    },
    /// A comment was added to an open issue.
    IssueComment {
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        commented_by: String,
    },
    /// An issue was marked resolved.
    IssueResolved {
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        resolved_by: String,
    },
    /// A resolved issue was reopened.
    IssueReopened {
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        reopened_by: String,
    },
}

impl NotificationEvent {
    /// The single category bit this event maps to.
    #[must_use]
    pub fn notification_type(&self) -> NotificationTypes {
        match self {
            Self::MediaPending { .. } => NotificationTypes::MEDIA_PENDING,
            Self::MediaApproved { .. } => NotificationTypes::MEDIA_APPROVED,
            Self::MediaAutoApproved { .. } => NotificationTypes::MEDIA_AUTO_APPROVED,
            Self::MediaAvailable { .. } => NotificationTypes::MEDIA_AVAILABLE,
            Self::MediaDeclined { .. } => NotificationTypes::MEDIA_DECLINED,
            Self::MediaFailed { .. } => NotificationTypes::MEDIA_FAILED,
            Self::Test { .. } => NotificationTypes::TEST_NOTIFICATION,
            Self::IssueCreated { .. } => NotificationTypes::ISSUE_CREATED,
            Self::IssueComment { .. } => NotificationTypes::ISSUE_COMMENT,
            Self::IssueResolved { .. } => NotificationTypes::ISSUE_RESOLVED,
            Self::IssueReopened { .. } => NotificationTypes::ISSUE_REOPENED,
        }
    }

    /// Whether this event belongs to the issue category.
    #[must_use]
    pub fn is_issue_event(&self) -> bool {
        NotificationTypes::ISSUE_ALL.contains(self.notification_type())
    }

    /// Human-readable subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Test { subject, .. } => subject.clone(),
            Self::MediaPending { media_title, .. }
            | Self::MediaApproved { media_title, .. }
            | Self::MediaAutoApproved { media_title, .. }
            | Self::MediaAvailable { media_title, .. }
            | Self::MediaDeclined { media_title, .. }
            | Self::MediaFailed { media_title, .. } => media_title.clone(),
            Self::IssueCreated { media_title, .. } => {
                format!("New issue reported for {media_title}")
            }
            Self::IssueComment { media_title, .. } => {
                format!("New comment on issue for {media_title}")
            }
            Self::IssueResolved { media_title, .. } => {
                format!("Issue resolved for {media_title}")
            }
            Self::IssueReopened { media_title, .. } => {
                format!("Issue reopened for {media_title}")
            }
        }
    }

    /// Fixed per-kind message template.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MediaPending { media, .. } => format!(
                "A new {} request is waiting for approval.",
                media_kind_label(media.media_type)
            ),
            Self::MediaApproved { media, .. } => format!(
                "Your {} request has been approved.",
                media_kind_label(media.media_type)
            ),
            Self::MediaAutoApproved { media, .. } => format!(
                "A new {} request has been automatically approved.",
                media_kind_label(media.media_type)
            ),
            Self::MediaAvailable { media, .. } => format!(
                "Your {} request is now available.",
                media_kind_label(media.media_type)
            ),
            Self::MediaDeclined { media, .. } => format!(
                "Your {} request has been declined.",
                media_kind_label(media.media_type)
            ),
            Self::MediaFailed { media, .. } => format!(
                "A {} request failed to process.",
                media_kind_label(media.media_type)
            ),
            Self::Test { message, .. } => message.clone(),
            Self::IssueCreated { issue, .. } => {
                format!("A new {} issue has been reported.", issue.issue_type)
            }
            Self::IssueComment { issue, .. } => issue
                .comment
                .clone()
                .unwrap_or_else(|| "A new comment was added.".to_string()),
            Self::IssueResolved { issue, .. } => {
                format!("The {} issue has been marked as resolved.", issue.issue_type)
            }
            Self::IssueReopened { issue, .. } => {
                format!("The {} issue has been reopened.", issue.issue_type)
            }
        }
    }

    /// The media item the event concerns, when any.
    #[must_use]
    pub fn media(&self) -> Option<&MediaRef> {
        match self {
            Self::MediaPending { media, .. }
            | Self::MediaApproved { media, .. }
            | Self::MediaAutoApproved { media, .. }
            | Self::MediaAvailable { media, .. }
            | Self::MediaDeclined { media, .. }
            | Self::MediaFailed { media, .. }
            | Self::IssueCreated { media, .. }
            | Self::IssueComment { media, .. }
            | Self::IssueResolved { media, .. }
            | Self::IssueReopened { media, .. } => Some(media),
            Self::Test { .. } => None,
        }
    }

    /// The request the event concerns, when any.
    #[must_use]
    pub fn request(&self) -> Option<RequestRef> {
        match self {
            Self::MediaPending { request, .. }
            | Self::MediaApproved { request, .. }
            | Self::MediaAutoApproved { request, .. }
            | Self::MediaAvailable { request, .. }
            | Self::MediaDeclined { request, .. }
            | Self::MediaFailed { request, .. } => Some(*request),
            _ => None,
        }
    }

    /// The issue the event concerns, when any.
    #[must_use]
    pub fn issue(&self) -> Option<&IssueRef> {
        match self {
            Self::IssueCreated { issue, .. }
            | Self::IssueComment { issue, .. }
            | Self::IssueResolved { issue, .. }
            | Self::IssueReopened { issue, .. } => Some(issue),
            _ => None,
        }
    }

    /// The display name of the user whose action produced the event.
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        match self {
            Self::MediaPending { requested_by, .. }
            | Self::MediaApproved { requested_by, .. }
            | Self::MediaAutoApproved { requested_by, .. }
            | Self::MediaAvailable { requested_by, .. }
            | Self::MediaDeclined { requested_by, .. }
            | Self::MediaFailed { requested_by, .. } => Some(requested_by),
            Self::IssueCreated { reported_by, .. } => Some(reported_by),
            Self::IssueComment { commented_by, .. } => Some(commented_by),
            Self::IssueResolved { resolved_by, .. } => Some(resolved_by),
            Self::IssueReopened { reopened_by, .. } => Some(reopened_by),
            Self::Test { .. } => None,
        }
    }
}

/// Deep link to a media item in the host application.
#[must_use]
pub fn media_link(application_url: &Url, media: &MediaRef) -> Option<Url> {
    application_url
        .join(&format!("{}/{}", media.media_type, media.tmdb_id))
        .ok()
}

fn media_kind_label(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Movie => "movie",
        MediaType::Tv => "series",
    }
}

impl Notification {
    /// A request entered the approval queue: broadcast to request managers.
    #[must_use]
    pub fn request_pending(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: &User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaPending {
            media,
            media_title,
            request,
            requested_by: requested_by.clone(),
        })
        .for_admins()
        .with_extra("Requested By", requested_by)
    }

    /// A request was approved: tell the requester.
    #[must_use]
    pub fn request_approved(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaApproved {
            media,
            media_title,
            request,
            requested_by,
        })
        .for_user(requester)
    }

    /// A request skipped review: broadcast to request managers.
    #[must_use]
    pub fn request_auto_approved(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: &User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaAutoApproved {
            media,
            media_title,
            request,
            requested_by: requested_by.clone(),
        })
        .for_admins()
        .with_extra("Requested By", requested_by)
    }

    /// Requested media became available: tell the requester.
    #[must_use]
    pub fn request_available(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaAvailable {
            media,
            media_title,
            request,
            requested_by,
        })
        .for_user(requester)
    }

    /// A request was declined: tell the requester.
    #[must_use]
    pub fn request_declined(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaDeclined {
            media,
            media_title,
            request,
            requested_by,
        })
        .for_user(requester)
    }

    /// Downstream processing failed: broadcast to request managers.
    #[must_use]
    pub fn request_failed(
        media: MediaRef,
        media_title: String,
        request: RequestRef,
        requester: &User,
    ) -> Self {
        let requested_by = requester.display_name.clone();
        Self::new(NotificationEvent::MediaFailed {
            media,
            media_title,
            request,
            requested_by: requested_by.clone(),
        })
        .for_admins()
        .with_extra("Requested By", requested_by)
    }

    /// An issue was reported: broadcast to issue managers.
    #[must_use]
    pub fn issue_created(
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        reporter: &User,
    ) -> Self {
        let reported_by = reporter.display_name.clone();
        Self::new(NotificationEvent::IssueCreated {
            issue,
            media,
            media_title,
            reported_by: reported_by.clone(),
        })
        .for_admins()
        .with_extra("Reported By", reported_by)
    }

    /// A comment was added: broadcast to issue managers and, when someone
    /// else commented, tell the issue's creator directly.
    #[must_use]
    pub fn issue_comment_added(
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        commenter: &User,
        issue_creator: User,
    ) -> Self {
        let commented_by = commenter.display_name.clone();
        let mut notification = Self::new(NotificationEvent::IssueComment {
            issue,
            media,
            media_title,
            commented_by: commented_by.clone(),
        })
        .for_admins()
        .with_extra("Comment By", commented_by);
        if issue_creator.id != commenter.id {
            notification = notification.for_user(issue_creator);
        }
        notification
    }

    /// An issue was resolved: broadcast to issue managers and, when someone
    /// else resolved it, tell the issue's creator directly.
    #[must_use]
    pub fn issue_resolved(
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        resolver: &User,
        issue_creator: User,
    ) -> Self {
        let mut notification = Self::new(NotificationEvent::IssueResolved {
            issue,
            media,
            media_title,
            resolved_by: resolver.display_name.clone(),
        })
        .for_admins();
        if issue_creator.id != resolver.id {
            notification = notification.for_user(issue_creator);
        }
        notification
    }

    /// A resolved issue was reopened: broadcast to issue managers and, when
    /// someone else reopened it, tell the issue's creator directly.
    #[must_use]
    pub fn issue_reopened(
        issue: IssueRef,
        media: MediaRef,
        media_title: String,
        reopener: &User,
        issue_creator: User,
    ) -> Self {
        let mut notification = Self::new(NotificationEvent::IssueReopened {
            issue,
            media,
            media_title,
            reopened_by: reopener.display_name.clone(),
        })
        .for_admins();
        if issue_creator.id != reopener.id {
            notification = notification.for_user(issue_creator);
        }
        notification
    }

    /// A connectivity test, delivered to the admin who asked for it.
    #[must_use]
    pub fn test(subject: impl Into<String>, message: impl Into<String>, admin: User) -> Self {
        Self::new(NotificationEvent::Test {
            subject: subject.into(),
            message: message.into(),
        })
        .for_user(admin)
    }
}
