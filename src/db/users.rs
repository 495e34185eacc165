//! User repository: account registration, authentication, profile updates.

use super::DbError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::SqlitePool;

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub last_seen_at: i64,
}

type UserRow = (i64, String, Option<String>, Option<String>, i64, i64);

fn row_to_user((id, username, email, display_name, created_at, last_seen_at): UserRow) -> User {
    User {
        id,
        username,
        email,
        display_name,
        created_at,
        last_seen_at,
    }
}

const USER_COLUMNS: &str = "id, username, email, display_name, created_at, last_seen_at";

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new account with the given username and password.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<User, DbError> {
        let password_hash = hash_password(password)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, created_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                // The UNIQUE constraint message names the offending column.
                if db_err.message().contains("email") {
                    return DbError::EmailExists(email.unwrap_or_default().to_string());
                }
                return DbError::UserExists(username.to_string());
            }
            DbError::from(e)
        })?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.map(String::from),
            display_name: None,
            created_at: now,
            last_seen_at: now,
        })
    }

    /// Verify a password and return the account if valid.
    ///
    /// When the user does not exist, a dummy verification burns equivalent
    /// Argon2 work so the response time does not reveal account existence.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, (i64, String, String, Option<String>, Option<String>, i64, i64)>(
            r#"
            SELECT id, username, password_hash, email, display_name, created_at, last_seen_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        let Some((id, username, password_hash, email, display_name, created_at, _last_seen_at)) =
            row
        else {
            dummy_password_verify(password);
            return Err(DbError::UserNotFound(username.to_string()));
        };

        verify_password(password, &password_hash)?;

        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE users SET last_seen_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(User {
            id,
            username,
            email,
            display_name,
            created_at,
            last_seen_at: now,
        })
    }

    /// Find a user by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_user))
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_user))
    }

    /// Update profile fields. `None` leaves a field untouched.
    pub async fn update_profile(
        &self,
        id: i64,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Option<User>, DbError> {
        if let Some(email) = email {
            sqlx::query("UPDATE users SET email = ? WHERE id = ?")
                .bind(email)
                .bind(id)
                .execute(self.pool)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.is_unique_violation()
                    {
                        return DbError::EmailExists(email.to_string());
                    }
                    DbError::from(e)
                })?;
        }
        if let Some(display_name) = display_name {
            sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
                .bind(display_name)
                .bind(id)
                .execute(self.pool)
                .await?;
        }
        self.find_by_id(id).await
    }

    /// Change password after verifying the old one.
    pub async fn change_password(
        &self,
        id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), DbError> {
        let current_hash =
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or_else(|| DbError::UserNotFound(id.to_string()))?;

        verify_password(old_password, &current_hash)?;

        let new_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(new_hash)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Delete an account after verifying the password.
    ///
    /// All owned rows (sessions, subjects, notes, cards, materials) go with
    /// it via ON DELETE CASCADE.
    pub async fn delete(&self, id: i64, password: &str) -> Result<(), DbError> {
        let current_hash =
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or_else(|| DbError::UserNotFound(id.to_string()))?;

        verify_password(password, &current_hash)?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, DbError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| DbError::InvalidCredentials)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), DbError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| DbError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| DbError::InvalidCredentials)
}

/// Dummy password verification for constant-time account lookup.
///
/// When an account doesn't exist, we still spend approximately the same
/// amount of time as a real verification so response timing does not
/// reveal whether a username is registered.
fn dummy_password_verify(password: &str) {
    // Pre-computed Argon2id hash of "dummy" - never matches a real password
    // but forces the CPU to do real Argon2 work.
    const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nLW9yYWNsZS1kdW1teQ$K4VZh8k8YL3E8H7E8H7E8H7E8H7E8H7E8H7E8H7E8Hs";

    if let Ok(parsed) = PasswordHash::new(DUMMY_HASH) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, DbError};

    #[tokio::test]
    async fn register_and_authenticate() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db
            .users()
            .register("alice", "correct horse", Some("alice@example.org"))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");

        let authed = db.users().authenticate("alice", "correct horse").await.unwrap();
        assert_eq!(authed.id, user.id);

        let err = db.users().authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, DbError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().register("bob", "password1", None).await.unwrap();
        let err = db.users().register("bob", "password2", None).await.unwrap_err();
        assert!(matches!(err, DbError::UserExists(_)));
    }

    #[tokio::test]
    async fn username_lookup_is_case_insensitive() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().register("Carol", "password1", None).await.unwrap();
        let found = db.users().find_by_username("carol").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn change_password_requires_old() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("dave", "old-password", None).await.unwrap();

        let err = db
            .users()
            .change_password(user.id, "not-the-old-one", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidCredentials));

        db.users()
            .change_password(user.id, "old-password", "new-password")
            .await
            .unwrap();
        db.users().authenticate("dave", "new-password").await.unwrap();
    }

    #[tokio::test]
    async fn delete_cascades_sessions() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("erin", "password1", None).await.unwrap();
        db.sessions()
            .create(user.id, "tokenhash", 3600)
            .await
            .unwrap();

        db.users().delete(user.id, "password1").await.unwrap();

        let resolved = db.sessions().resolve("tokenhash").await.unwrap();
        assert!(resolved.is_none());
    }
}
