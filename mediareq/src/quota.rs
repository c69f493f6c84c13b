//! Rolling-window request quota accounting.
//!
//! A user's allowance is a limit over a rolling day-window, per media kind.
//! Per-user overrides beat the global defaults; a limit of zero means
//! unlimited. Movies consume one unit per request, series consume one unit per
//! requested season.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{MediaType, RequestStatus, User};
use crate::permissions::{PermissionCheck, Permissions};
use crate::store::RequestCounter;

/// Global default limit/window for one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDefaults {
    /// Zero means unlimited.
    pub limit: u64,
    /// Zero means the window spans all time.
    pub days: u64,
}

impl Default for QuotaDefaults {
    fn default() -> Self {
        Self { limit: 0, days: 7 }
    }
}

/// Global quota defaults, overridable per user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub movie: QuotaDefaults,
    pub tv: QuotaDefaults,
}

/// Computed allowance for one media kind. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub limit: u64,
    pub days: u64,
    pub used: u64,
    /// `None` signals unlimited.
    pub remaining: Option<u64>,
    pub restricted: bool,
}

impl QuotaSnapshot {
    fn derive(limit: u64, days: u64, used: u64) -> Self {
        let restricted = limit > 0 && used >= limit;
        let remaining = (limit > 0).then(|| limit.saturating_sub(used));
        Self {
            limit,
            days,
            used,
            remaining,
            restricted,
        }
    }
}

/// Allowance for both media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    pub movie: QuotaSnapshot,
    pub tv: QuotaSnapshot,
}

impl UserQuota {
    /// Whether a new request of `media_type` must be rejected.
    #[must_use]
    pub fn is_restricted(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Movie => self.movie.restricted,
            MediaType::Tv => self.tv.restricted,
        }
    }
}

/// Quota computation over an injected request counter.
#[derive(Debug, Clone, Default)]
pub struct QuotaEngine {
    policy: QuotaPolicy,
}

impl QuotaEngine {
    #[must_use]
    pub fn new(policy: QuotaPolicy) -> Self {
        Self { policy }
    }

    /// Compute the user's current allowance.
    ///
    /// Users holding `MANAGE_USERS` bypass quotas entirely. Counter failures
    /// propagate: a silent "unlimited" fallback would be a policy bug, not a
    /// best-effort degradation.
    pub async fn compute(
        &self,
        user: &User,
        now: DateTime<Utc>,
        counter: &dyn RequestCounter,
    ) -> Result<UserQuota> {
        let bypass = user.has_permission(Permissions::MANAGE_USERS, PermissionCheck::Any);

        let movie = self
            .compute_kind(
                user,
                now,
                counter,
                MediaType::Movie,
                if bypass { 0 } else {
                    user.movie_quota_limit.unwrap_or(self.policy.movie.limit)
                },
                user.movie_quota_days.unwrap_or(self.policy.movie.days),
            )
            .await?;
        let tv = self
            .compute_kind(
                user,
                now,
                counter,
                MediaType::Tv,
                if bypass { 0 } else {
                    user.tv_quota_limit.unwrap_or(self.policy.tv.limit)
                },
                user.tv_quota_days.unwrap_or(self.policy.tv.days),
            )
            .await?;

        Ok(UserQuota { movie, tv })
    }

    async fn compute_kind(
        &self,
        user: &User,
        now: DateTime<Utc>,
        counter: &dyn RequestCounter,
        media_type: MediaType,
        limit: u64,
        days: u64,
    ) -> Result<QuotaSnapshot> {
        // Unlimited: skip the counting query entirely.
        let used = if limit == 0 {
            0
        } else {
            // A window too large to represent degrades to all-time.
            let since = (days > 0).then(|| {
                i64::try_from(days)
                    .ok()
                    .and_then(Duration::try_days)
                    .and_then(|window| now.checked_sub_signed(window))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            });
            counter
                .count_requests(user.id, media_type, since, RequestStatus::Declined)
                .await?
        };

        Ok(QuotaSnapshot::derive(limit, days, used))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Error;
    use crate::store::{MemoryStore, StoredRequest};

    fn requester(movie_limit: Option<u64>, movie_days: Option<u64>) -> User {
        let mut user = User::new(1, "Neo", Permissions::REQUEST);
        user.movie_quota_limit = movie_limit;
        user.movie_quota_days = movie_days;
        user
    }

    fn movie_request(age_days: i64) -> StoredRequest {
        StoredRequest {
            user_id: 1,
            media_type: MediaType::Movie,
            status: RequestStatus::Approved,
            created_at: Utc::now() - Duration::days(age_days),
            seasons: 0,
        }
    }

    #[tokio::test]
    async fn three_of_five_in_window() {
        let store = MemoryStore::new();
        for age in [1, 2, 3] {
            store.add_request(movie_request(age));
        }
        store.add_request(movie_request(30)); // outside the window

        let engine = QuotaEngine::default();
        let quota = engine
            .compute(&requester(Some(5), Some(7)), Utc::now(), &store)
            .await
            .unwrap();

        assert_eq!(quota.movie.limit, 5);
        assert_eq!(quota.movie.used, 3);
        assert_eq!(quota.movie.remaining, Some(2));
        assert!(!quota.movie.restricted);
    }

    #[tokio::test]
    async fn exhausted_quota_restricts() {
        let store = MemoryStore::new();
        for age in [1, 1, 2, 3, 4] {
            store.add_request(movie_request(age));
        }

        let engine = QuotaEngine::default();
        let quota = engine
            .compute(&requester(Some(5), Some(7)), Utc::now(), &store)
            .await
            .unwrap();

        assert_eq!(quota.movie.remaining, Some(0));
        assert!(quota.movie.restricted);
        assert!(quota.is_restricted(MediaType::Movie));
        assert!(!quota.is_restricted(MediaType::Tv));
    }

    #[tokio::test]
    async fn manage_users_bypasses_quota() {
        let store = MemoryStore::new();
        for age in [1, 2, 3] {
            store.add_request(movie_request(age));
        }

        let mut user = requester(Some(1), Some(7));
        user.permissions |= Permissions::MANAGE_USERS;

        let engine = QuotaEngine::default();
        let quota = engine.compute(&user, Utc::now(), &store).await.unwrap();

        assert_eq!(quota.movie.limit, 0);
        assert_eq!(quota.movie.remaining, None);
        assert!(!quota.movie.restricted);
    }

    #[tokio::test]
    async fn declined_requests_are_not_counted() {
        let store = MemoryStore::new();
        store.add_request(movie_request(1));
        store.add_request(StoredRequest {
            status: RequestStatus::Declined,
            ..movie_request(1)
        });

        let engine = QuotaEngine::default();
        let quota = engine
            .compute(&requester(Some(5), Some(7)), Utc::now(), &store)
            .await
            .unwrap();
        assert_eq!(quota.movie.used, 1);
    }

    #[tokio::test]
    async fn unrepresentable_window_degrades_to_all_time() {
        let store = MemoryStore::new();
        store.add_request(movie_request(1000));

        let engine = QuotaEngine::default();
        let quota = engine
            .compute(&requester(Some(5), Some(u64::MAX)), Utc::now(), &store)
            .await
            .unwrap();
        // The cutoff cannot land in the future; the old request still counts.
        assert_eq!(quota.movie.used, 1);
    }

    #[tokio::test]
    async fn zero_days_spans_all_time() {
        let store = MemoryStore::new();
        store.add_request(movie_request(1000));

        let engine = QuotaEngine::default();
        let quota = engine
            .compute(&requester(Some(5), Some(0)), Utc::now(), &store)
            .await
            .unwrap();
        assert_eq!(quota.movie.used, 1);
    }

    #[tokio::test]
    async fn global_defaults_apply_without_override() {
        let store = MemoryStore::new();
        store.add_request(movie_request(1));

        let engine = QuotaEngine::new(QuotaPolicy {
            movie: QuotaDefaults { limit: 2, days: 7 },
            tv: QuotaDefaults::default(),
        });
        let quota = engine
            .compute(&requester(None, None), Utc::now(), &store)
            .await
            .unwrap();
        assert_eq!(quota.movie.limit, 2);
        assert_eq!(quota.movie.used, 1);
        // TV default limit stays unlimited.
        assert_eq!(quota.tv.remaining, None);
    }

    #[tokio::test]
    async fn tv_units_are_seasons() {
        let store = MemoryStore::new();
        store.add_request(StoredRequest {
            user_id: 1,
            media_type: MediaType::Tv,
            status: RequestStatus::Approved,
            created_at: Utc::now() - Duration::days(1),
            seasons: 3,
        });

        let mut user = requester(None, None);
        user.tv_quota_limit = Some(4);
        user.tv_quota_days = Some(7);

        let engine = QuotaEngine::default();
        let quota = engine.compute(&user, Utc::now(), &store).await.unwrap();
        assert_eq!(quota.tv.used, 3);
        assert_eq!(quota.tv.remaining, Some(1));
    }

    #[tokio::test]
    async fn identical_inputs_yield_identical_snapshots() {
        let store = MemoryStore::new();
        store.add_request(movie_request(2));

        let engine = QuotaEngine::default();
        let now = Utc::now();
        let user = requester(Some(5), Some(7));
        let first = engine.compute(&user, now, &store).await.unwrap();
        let second = engine.compute(&user, now, &store).await.unwrap();
        assert_eq!(first, second);
    }

    struct FailingCounter;

    #[async_trait]
    impl RequestCounter for FailingCounter {
        async fn count_requests(
            &self,
            _user_id: i64,
            _media_type: MediaType,
            _since: Option<DateTime<Utc>>,
            _exclude_status: RequestStatus,
        ) -> Result<u64> {
            Err(Error::Other("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn counter_failure_propagates() {
        let engine = QuotaEngine::default();
        let result = engine
            .compute(&requester(Some(5), Some(7)), Utc::now(), &FailingCounter)
            .await;
        assert!(result.is_err());
    }
}
