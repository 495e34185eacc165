//! Note repository.

use super::DbError;
use sqlx::SqlitePool;

/// A note.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub shared: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

type NoteRow = (i64, i64, Option<i64>, String, String, bool, i64, i64);

fn row_to_note(
    (id, user_id, subject_id, title, body, shared, created_at, updated_at): NoteRow,
) -> NoteRecord {
    NoteRecord {
        id,
        user_id,
        subject_id,
        title,
        body,
        shared,
        created_at,
        updated_at,
    }
}

const NOTE_COLUMNS: &str = "id, user_id, subject_id, title, body, shared, created_at, updated_at";

/// Fields accepted by [`NoteRepository::update`]. `None` leaves the
/// column untouched.
#[derive(Debug, Default)]
pub struct NotePatch<'p> {
    pub subject_id: Option<Option<i64>>,
    pub title: Option<&'p str>,
    pub body: Option<&'p str>,
    pub shared: Option<bool>,
}

/// Repository for note operations.
pub struct NoteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NoteRepository<'a> {
    /// Create a new note repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a note.
    pub async fn create(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        title: &str,
        body: &str,
        shared: bool,
    ) -> Result<NoteRecord, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO notes (user_id, subject_id, title, body, shared, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(title)
        .bind(body)
        .bind(shared)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(NoteRecord {
            id: result.last_insert_rowid(),
            user_id,
            subject_id,
            title: title.to_string(),
            body: body.to_string(),
            shared,
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a note by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: i64) -> Result<Option<NoteRecord>, DbError> {
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_note))
    }

    /// List a user's notes, optionally filtered by subject, newest first.
    pub async fn list(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<NoteRecord>, DbError> {
        let rows = match subject_id {
            Some(subject_id) => {
                sqlx::query_as::<_, NoteRow>(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes \
                     WHERE user_id = ? AND subject_id = ? \
                     ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(subject_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, NoteRow>(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes \
                     WHERE user_id = ? \
                     ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(row_to_note).collect())
    }

    /// List notes other users have marked shared.
    pub async fn list_shared(
        &self,
        excluding_user: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<NoteRecord>, DbError> {
        let rows = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes \
             WHERE shared = 1 AND user_id != ? \
             ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(excluding_user)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_note).collect())
    }

    /// Apply a patch. Returns the updated note, or `None` when it does not
    /// exist (or isn't owned by `user_id`).
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        patch: NotePatch<'_>,
    ) -> Result<Option<NoteRecord>, DbError> {
        let Some(existing) = self.find(user_id, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let subject_id = patch.subject_id.unwrap_or(existing.subject_id);
        let title = patch.title.unwrap_or(&existing.title);
        let body = patch.body.unwrap_or(&existing.body);
        let shared = patch.shared.unwrap_or(existing.shared);

        sqlx::query(
            r#"
            UPDATE notes
            SET subject_id = ?, title = ?, body = ?, shared = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(subject_id)
        .bind(title)
        .bind(body)
        .bind(shared)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.find(user_id, id).await
    }

    /// Delete a note. Returns whether a row was deleted.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
