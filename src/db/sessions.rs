//! Session repository: bearer-token persistence and expiry.
//!
//! Tokens themselves never touch the database; only their SHA-256 hex
//! digests are stored (see [`crate::security::tokens`]).

use super::{DbError, User};
use sqlx::SqlitePool;

/// Repository for session operations.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a session for `user_id`. Returns the expiry timestamp.
    pub async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        ttl_secs: i64,
    ) -> Result<i64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let expires_at = now + ttl_secs;

        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, token_hash, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(expires_at)
    }

    /// Resolve a token hash to its owning user, if the session is unexpired.
    pub async fn resolve(&self, token_hash: &str) -> Result<Option<User>, DbError> {
        let now = chrono::Utc::now().timestamp();

        let row = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>, i64, i64)>(
            r#"
            SELECT u.id, u.username, u.email, u.display_name, u.created_at, u.last_seen_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(id, username, email, display_name, created_at, last_seen_at)| User {
                id,
                username,
                email,
                display_name,
                created_at,
                last_seen_at,
            },
        ))
    }

    /// Revoke a session by token hash. Returns whether a row was deleted.
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired sessions. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count live sessions (for the metrics gauge).
    pub async fn count_active(&self) -> Result<i64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE expires_at > ?")
            .bind(now)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn create_resolve_revoke() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("alice", "password1", None).await.unwrap();

        db.sessions().create(user.id, "hash-a", 3600).await.unwrap();

        let resolved = db.sessions().resolve("hash-a").await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(db.sessions().revoke("hash-a").await.unwrap());
        assert!(db.sessions().resolve("hash-a").await.unwrap().is_none());
        assert!(!db.sessions().revoke("hash-a").await.unwrap());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("bob", "password1", None).await.unwrap();

        // Already expired at creation time
        db.sessions().create(user.id, "hash-b", -10).await.unwrap();
        assert!(db.sessions().resolve("hash-b").await.unwrap().is_none());

        let removed = db.sessions().delete_expired().await.unwrap();
        assert_eq!(removed, 1);
    }
}
