//! SQLite implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{PushSubscriptionStore, RequestCounter, UserStore};
use crate::error::{Error, Result};
use crate::models::{
    MediaType, PushSubscription, RequestStatus, User, UserNotificationSettings,
};
use crate::permissions::{PermissionCheck, Permissions, has_permission};

/// SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Raw user row; permissions and settings are decoded into domain types.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
    display_name: String,
    email: String,
    permissions: i64,
    is_owner: bool,
    movie_quota_limit: Option<i64>,
    movie_quota_days: Option<i64>,
    tv_quota_limit: Option<i64>,
    tv_quota_days: Option<i64>,
    /// JSON blob of per-user notification settings.
    settings: Option<String>,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let settings = match self.settings.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => UserNotificationSettings::default(),
        };
        Ok(User {
            id: self.id,
            display_name: self.display_name,
            email: self.email,
            permissions: Permissions::from_bits_truncate(self.permissions as u32),
            is_owner: self.is_owner,
            movie_quota_limit: self.movie_quota_limit.map(|v| v.max(0) as u64),
            movie_quota_days: self.movie_quota_days.map(|v| v.max(0) as u64),
            tv_quota_limit: self.tv_quota_limit.map(|v| v.max(0) as u64),
            tv_quota_days: self.tv_quota_days.map(|v| v.max(0) as u64),
            settings,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct PushSubscriptionRow {
    id: String,
    user_id: i64,
    endpoint: String,
    p256dh: String,
    auth: String,
}

impl From<PushSubscriptionRow> for PushSubscription {
    fn from(row: PushSubscriptionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            endpoint: row.endpoint,
            p256dh: row.p256dh,
            auth: row.auth,
        }
    }
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the tables this store reads, when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        // raw_sql: the schema is a multi-statement batch.
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                permissions INTEGER NOT NULL DEFAULT 0,
                is_owner INTEGER NOT NULL DEFAULT 0,
                movie_quota_limit INTEGER,
                movie_quota_days INTEGER,
                tv_quota_limit INTEGER,
                tv_quota_days INTEGER,
                settings TEXT
            );

            CREATE TABLE IF NOT EXISTS push_subscription (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                endpoint TEXT NOT NULL,
                p256dh TEXT NOT NULL,
                auth TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS media_request (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                media_type TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS season_request (
                id INTEGER PRIMARY KEY,
                request_id INTEGER NOT NULL REFERENCES media_request(id) ON DELETE CASCADE,
                season_number INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn owner(&self) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM user WHERE is_owner = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("User", "owner"))?;
        row.into_user()
    }

    async fn list_users_with_permission(
        &self,
        required: Permissions,
        check: PermissionCheck,
    ) -> Result<Vec<User>> {
        // Implied grants (ADMIN, MANAGE_REQUESTS over auto-approval) cannot be
        // expressed as a bit test in SQL, so filtering happens in Rust.
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM user ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut users = Vec::new();
        for row in rows {
            let user = row.into_user()?;
            if has_permission(required, user.effective_permissions(), check) {
                users.push(user);
            }
        }
        Ok(users)
    }
}

#[async_trait]
impl PushSubscriptionStore for SqliteStore {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query_as::<_, PushSubscriptionRow>(
            "SELECT * FROM push_subscription WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PushSubscription::from).collect())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM push_subscription WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RequestCounter for SqliteStore {
    async fn count_requests(
        &self,
        user_id: i64,
        media_type: MediaType,
        since: Option<DateTime<Utc>>,
        exclude_status: RequestStatus,
    ) -> Result<u64> {
        let media_type_str = media_type.to_string();
        let exclude_status_str = exclude_status.to_string();
        let since_str = since.map(|s| s.to_rfc3339());

        // A series request consumes one quota unit per season row; a movie
        // request consumes one unit per request.
        let count: i64 = match (media_type, since_str) {
            (MediaType::Movie, Some(cutoff)) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM media_request
                    WHERE user_id = ? AND media_type = ? AND status != ? AND created_at >= ?
                    "#,
                )
                .bind(user_id)
                .bind(&media_type_str)
                .bind(&exclude_status_str)
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await?
            }
            (MediaType::Movie, None) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM media_request
                    WHERE user_id = ? AND media_type = ? AND status != ?
                    "#,
                )
                .bind(user_id)
                .bind(&media_type_str)
                .bind(&exclude_status_str)
                .fetch_one(&self.pool)
                .await?
            }
            (MediaType::Tv, Some(cutoff)) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(sr.id) FROM season_request sr
                    INNER JOIN media_request mr ON mr.id = sr.request_id
                    WHERE mr.user_id = ? AND mr.media_type = ? AND mr.status != ?
                      AND mr.created_at >= ?
                    "#,
                )
                .bind(user_id)
                .bind(&media_type_str)
                .bind(&exclude_status_str)
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await?
            }
            (MediaType::Tv, None) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(sr.id) FROM season_request sr
                    INNER JOIN media_request mr ON mr.id = sr.request_id
                    WHERE mr.user_id = ? AND mr.media_type = ? AND mr.status != ?
                    "#,
                )
                .bind(user_id)
                .bind(&media_type_str)
                .bind(&exclude_status_str)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(count.max(0) as u64)
    }
}
