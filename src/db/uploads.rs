//! Upload session repository.
//!
//! Bookkeeping for chunked uploads: one row per in-flight session plus one
//! row per received chunk. Chunk bytes live on disk under the staging
//! directory owned by [`crate::uploads::UploadStore`]; completing or
//! aborting a session removes both the rows and the staging directory.

use super::DbError;
use sqlx::SqlitePool;

/// An in-flight chunked upload session.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: String,
    pub user_id: i64,
    pub file_name: String,
    pub total_size: i64,
    pub chunk_count: u32,
    pub declared_sha256: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A received chunk row.
#[derive(Debug, Clone)]
pub struct UploadChunkRow {
    pub chunk_index: u32,
    pub size_bytes: i64,
}

/// Repository for upload session operations.
pub struct UploadRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UploadRepository<'a> {
    /// Create a new upload repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an upload session.
    pub async fn create(
        &self,
        id: &str,
        user_id: i64,
        file_name: &str,
        total_size: i64,
        chunk_count: u32,
        declared_sha256: Option<&str>,
    ) -> Result<UploadSession, DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO upload_sessions
                (id, user_id, file_name, total_size, chunk_count, declared_sha256,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(file_name)
        .bind(total_size)
        .bind(chunk_count)
        .bind(declared_sha256)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(UploadSession {
            id: id.to_string(),
            user_id,
            file_name: file_name.to_string(),
            total_size,
            chunk_count,
            declared_sha256: declared_sha256.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a session by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: &str) -> Result<Option<UploadSession>, DbError> {
        let row = sqlx::query_as::<_, (String, i64, String, i64, u32, Option<String>, i64, i64)>(
            r#"
            SELECT id, user_id, file_name, total_size, chunk_count, declared_sha256,
                   created_at, updated_at
            FROM upload_sessions
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(
            |(id, user_id, file_name, total_size, chunk_count, declared_sha256, created_at, updated_at)| {
                UploadSession {
                    id,
                    user_id,
                    file_name,
                    total_size,
                    chunk_count,
                    declared_sha256,
                    created_at,
                    updated_at,
                }
            },
        ))
    }

    /// Record a received chunk. Re-sending an index overwrites the prior
    /// row (the chunk file on disk is likewise overwritten).
    pub async fn record_chunk(
        &self,
        upload_id: &str,
        chunk_index: u32,
        size_bytes: i64,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO upload_chunks (upload_id, chunk_index, size_bytes, received_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (upload_id, chunk_index)
            DO UPDATE SET size_bytes = excluded.size_bytes, received_at = excluded.received_at
            "#,
        )
        .bind(upload_id)
        .bind(chunk_index)
        .bind(size_bytes)
        .bind(now)
        .execute(self.pool)
        .await?;

        sqlx::query("UPDATE upload_sessions SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(upload_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// All received chunks for a session, in index order.
    pub async fn chunks(&self, upload_id: &str) -> Result<Vec<UploadChunkRow>, DbError> {
        let rows = sqlx::query_as::<_, (u32, i64)>(
            r#"
            SELECT chunk_index, size_bytes
            FROM upload_chunks
            WHERE upload_id = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(upload_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(chunk_index, size_bytes)| UploadChunkRow {
                chunk_index,
                size_bytes,
            })
            .collect())
    }

    /// Delete a session and its chunk rows. Returns whether a row was
    /// deleted.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM upload_sessions WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ids of sessions idle since before `cutoff` (for the reaper).
    pub async fn stale_ids(&self, cutoff: i64) -> Result<Vec<String>, DbError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM upload_sessions WHERE updated_at < ?",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn chunk_bookkeeping() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("alice", "password1", None).await.unwrap();

        db.uploads()
            .create("upload-1", user.id, "notes.pdf", 300, 3, None)
            .await
            .unwrap();

        db.uploads().record_chunk("upload-1", 0, 100).await.unwrap();
        db.uploads().record_chunk("upload-1", 2, 100).await.unwrap();
        // Duplicate index overwrites, not duplicates
        db.uploads().record_chunk("upload-1", 0, 100).await.unwrap();

        let chunks = db.uploads().chunks("upload-1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 2);
    }

    #[tokio::test]
    async fn delete_cascades_chunks() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("bob", "password1", None).await.unwrap();

        db.uploads()
            .create("upload-2", user.id, "a.bin", 10, 1, None)
            .await
            .unwrap();
        db.uploads().record_chunk("upload-2", 0, 10).await.unwrap();

        assert!(db.uploads().delete("upload-2").await.unwrap());
        assert!(db.uploads().chunks("upload-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_ids_honor_cutoff() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("carol", "password1", None).await.unwrap();

        db.uploads()
            .create("upload-3", user.id, "b.bin", 10, 1, None)
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp();
        assert!(db.uploads().stale_ids(now - 100).await.unwrap().is_empty());
        let stale = db.uploads().stale_ids(now + 100).await.unwrap();
        assert_eq!(stale, vec!["upload-3".to_string()]);
    }
}
