use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::db::format_timestamp;
use crate::entities::{user_sessions, users};

/// A stored session joined with its owner.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub expires_at: DateTime<Utc>,
    pub user: users::Model,
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, user_id: i32, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        user_sessions::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(user_id),
            expires_at: Set(format_timestamp(expires_at)),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert session")?;

        Ok(())
    }

    /// Looks up a session by token regardless of expiry.
    pub async fn find_with_user(&self, token: &str) -> Result<Option<SessionRecord>> {
        let row = user_sessions::Entity::find()
            .filter(user_sessions::Column::Token.eq(token))
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query session by token")?;

        let Some((session, Some(user))) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&session.expires_at)
            .with_context(|| format!("Invalid session expiry: {}", session.expires_at))?
            .with_timezone(&Utc);

        Ok(Some(SessionRecord {
            expires_at,
            user,
        }))
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<bool> {
        let result = user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to delete session")?;

        Ok(result.rows_affected > 0)
    }

    /// Removes sessions that expired at or before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = user_sessions::Entity::delete_many()
            .filter(user_sessions::Column::ExpiresAt.lte(format_timestamp(now)))
            .exec(&self.conn)
            .await
            .context("Failed to purge expired sessions")?;

        Ok(result.rows_affected)
    }
}
