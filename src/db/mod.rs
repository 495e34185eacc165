//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - User accounts and bearer-token sessions
//! - Subjects, notes, flashcards, practice questions
//! - Quiz attempts and per-subject progress counters
//! - Study material metadata and chunked upload bookkeeping

mod flashcards;
mod materials;
mod notes;
mod progress;
mod questions;
mod sessions;
mod subjects;
mod uploads;
mod users;

pub use flashcards::{FlashcardPatch, FlashcardRecord, FlashcardRepository};
pub use materials::{MaterialRecord, MaterialRepository, NewMaterial};
pub use notes::{NotePatch, NoteRecord, NoteRepository};
pub use progress::{ProgressRepository, ProgressRow};
pub use questions::{QuestionPatch, QuestionRecord, QuestionRepository, QuizAttempt};
pub use sessions::SessionRepository;
pub use subjects::{SubjectRecord, SubjectRepository};
pub use uploads::{UploadChunkRow, UploadRepository, UploadSession};
pub use users::{User, UserRepository};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("username already taken: {0}")]
    UserExists(String),
    #[error("email already registered: {0}")]
    EmailExists(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("subject already exists: {0}")]
    SubjectExists(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Use a uniquely named shared-cache memory database per call.
            // `file::memory:` is global-ish and will collide across parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:studyd-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        // Run embedded migrations
        Self::run_migrations(&pool).await?;

        // WAL mode allows reads to happen while writes are in progress
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        // Foreign keys drive the ON DELETE CASCADE schema
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        // NORMAL keeps transaction durability while avoiding a full fsync per write
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        // Check database integrity on startup (prevents silent corruption from crashes)
        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Sqlx(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Database integrity check failed: {}", integrity_result),
            ))));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get user repository.
    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    /// Get session repository.
    pub fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.pool)
    }

    /// Get subject repository.
    pub fn subjects(&self) -> SubjectRepository<'_> {
        SubjectRepository::new(&self.pool)
    }

    /// Get note repository.
    pub fn notes(&self) -> NoteRepository<'_> {
        NoteRepository::new(&self.pool)
    }

    /// Get flashcard repository.
    pub fn flashcards(&self) -> FlashcardRepository<'_> {
        FlashcardRepository::new(&self.pool)
    }

    /// Get practice question repository.
    pub fn questions(&self) -> QuestionRepository<'_> {
        QuestionRepository::new(&self.pool)
    }

    /// Get study material repository.
    pub fn materials(&self) -> MaterialRepository<'_> {
        MaterialRepository::new(&self.pool)
    }

    /// Get upload session repository.
    pub fn uploads(&self) -> UploadRepository<'_> {
        UploadRepository::new(&self.pool)
    }

    /// Get progress repository.
    pub fn progress(&self) -> ProgressRepository<'_> {
        ProgressRepository::new(&self.pool)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
