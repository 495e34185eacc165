//! Subject repository.
//!
//! Subjects partition a user's notes, flashcards, questions and materials.
//! Deleting a subject cascades to everything filed under it.

use super::DbError;
use sqlx::SqlitePool;

/// A study subject.
#[derive(Debug, Clone)]
pub struct SubjectRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

type SubjectRow = (i64, i64, String, Option<String>, i64);

fn row_to_subject((id, user_id, name, description, created_at): SubjectRow) -> SubjectRecord {
    SubjectRecord {
        id,
        user_id,
        name,
        description,
        created_at,
    }
}

/// Repository for subject operations.
pub struct SubjectRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubjectRepository<'a> {
    /// Create a new subject repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a subject. Names are unique per user (case-insensitive).
    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<SubjectRecord, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO subjects (user_id, name, description, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::SubjectExists(name.to_string());
            }
            DbError::from(e)
        })?;

        Ok(SubjectRecord {
            id: result.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            description: description.map(String::from),
            created_at: now,
        })
    }

    /// Find a subject by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: i64) -> Result<Option<SubjectRecord>, DbError> {
        let row = sqlx::query_as::<_, SubjectRow>(
            r#"
            SELECT id, user_id, name, description, created_at
            FROM subjects
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_subject))
    }

    /// List all subjects owned by a user.
    pub async fn list(&self, user_id: i64) -> Result<Vec<SubjectRecord>, DbError> {
        let rows = sqlx::query_as::<_, SubjectRow>(
            r#"
            SELECT id, user_id, name, description, created_at
            FROM subjects
            WHERE user_id = ?
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_subject).collect())
    }

    /// Update name and/or description. Returns the updated record, or
    /// `None` when the subject does not exist (or isn't owned by `user_id`).
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<SubjectRecord>, DbError> {
        if let Some(name) = name {
            sqlx::query("UPDATE subjects SET name = ? WHERE id = ? AND user_id = ?")
                .bind(name)
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.is_unique_violation()
                    {
                        return DbError::SubjectExists(name.to_string());
                    }
                    DbError::from(e)
                })?;
        }
        if let Some(description) = description {
            sqlx::query("UPDATE subjects SET description = ? WHERE id = ? AND user_id = ?")
                .bind(description)
                .bind(id)
                .bind(user_id)
                .execute(self.pool)
                .await?;
        }
        self.find(user_id, id).await
    }

    /// Delete a subject. Returns whether a row was deleted.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
