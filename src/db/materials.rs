//! Study material repository.
//!
//! Materials are metadata rows pointing at assembled files under
//! `<data_dir>/files`; the bytes themselves are written by the upload
//! engine ([`crate::uploads`]).

use super::DbError;
use sqlx::SqlitePool;

/// A study material record.
#[derive(Debug, Clone)]
pub struct MaterialRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_at: i64,
}

type MaterialRow = (
    i64,
    i64,
    Option<i64>,
    String,
    Option<String>,
    String,
    String,
    i64,
    String,
    i64,
);

fn row_to_material(
    (id, user_id, subject_id, title, description, file_name, original_name, size_bytes, sha256, created_at): MaterialRow,
) -> MaterialRecord {
    MaterialRecord {
        id,
        user_id,
        subject_id,
        title,
        description,
        file_name,
        original_name,
        size_bytes,
        sha256,
        created_at,
    }
}

const MATERIAL_COLUMNS: &str = "id, user_id, subject_id, title, description, file_name, \
                                original_name, size_bytes, sha256, created_at";

/// Parameters for creating a material record.
#[derive(Debug)]
pub struct NewMaterial<'p> {
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub title: &'p str,
    pub description: Option<&'p str>,
    pub file_name: &'p str,
    pub original_name: &'p str,
    pub size_bytes: i64,
    pub sha256: &'p str,
}

/// Repository for study material operations.
pub struct MaterialRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MaterialRepository<'a> {
    /// Create a new material repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a material record for an assembled file.
    pub async fn create(&self, material: NewMaterial<'_>) -> Result<MaterialRecord, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO materials
                (user_id, subject_id, title, description, file_name, original_name,
                 size_bytes, sha256, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(material.user_id)
        .bind(material.subject_id)
        .bind(material.title)
        .bind(material.description)
        .bind(material.file_name)
        .bind(material.original_name)
        .bind(material.size_bytes)
        .bind(material.sha256)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(MaterialRecord {
            id: result.last_insert_rowid(),
            user_id: material.user_id,
            subject_id: material.subject_id,
            title: material.title.to_string(),
            description: material.description.map(String::from),
            file_name: material.file_name.to_string(),
            original_name: material.original_name.to_string(),
            size_bytes: material.size_bytes,
            sha256: material.sha256.to_string(),
            created_at: now,
        })
    }

    /// Find a material by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: i64) -> Result<Option<MaterialRecord>, DbError> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_material))
    }

    /// List a user's materials, optionally filtered by subject.
    pub async fn list(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MaterialRecord>, DbError> {
        let rows = match subject_id {
            Some(subject_id) => {
                sqlx::query_as::<_, MaterialRow>(&format!(
                    "SELECT {MATERIAL_COLUMNS} FROM materials \
                     WHERE user_id = ? AND subject_id = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(subject_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MaterialRow>(&format!(
                    "SELECT {MATERIAL_COLUMNS} FROM materials \
                     WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(row_to_material).collect())
    }

    /// Update title/description/subject metadata.
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        title: Option<&str>,
        description: Option<&str>,
        subject_id: Option<Option<i64>>,
    ) -> Result<Option<MaterialRecord>, DbError> {
        let Some(existing) = self.find(user_id, id).await? else {
            return Ok(None);
        };

        let title = title.unwrap_or(&existing.title);
        let description = match description {
            Some(d) => Some(d.to_string()),
            None => existing.description.clone(),
        };
        let subject_id = subject_id.unwrap_or(existing.subject_id);

        sqlx::query(
            r#"
            UPDATE materials
            SET title = ?, description = ?, subject_id = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(subject_id)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.find(user_id, id).await
    }

    /// Delete a material record. Returns the record so the caller can
    /// remove the backing file.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<Option<MaterialRecord>, DbError> {
        let Some(existing) = self.find(user_id, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM materials WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(Some(existing))
    }
}
