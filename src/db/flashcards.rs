//! Flashcard repository.
//!
//! Each card carries its SM-2 scheduling state (`repetition`,
//! `interval_days`, `ease_factor`, `due_at`). The scheduling math itself
//! lives in the `study-srs` crate; this repository only persists outcomes.

use super::DbError;
use sqlx::SqlitePool;
use study_srs::CardState;

/// A flashcard with its scheduling state.
#[derive(Debug, Clone)]
pub struct FlashcardRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub front: String,
    pub back: String,
    pub repetition: u32,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub due_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FlashcardRecord {
    /// The card's SM-2 state as the scheduler sees it.
    pub fn card_state(&self) -> CardState {
        CardState {
            repetition: self.repetition,
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
        }
    }
}

type CardRow = (
    i64,
    i64,
    Option<i64>,
    String,
    String,
    u32,
    u32,
    f64,
    i64,
    i64,
    i64,
);

fn row_to_card(
    (id, user_id, subject_id, front, back, repetition, interval_days, ease_factor, due_at, created_at, updated_at): CardRow,
) -> FlashcardRecord {
    FlashcardRecord {
        id,
        user_id,
        subject_id,
        front,
        back,
        repetition,
        interval_days,
        ease_factor,
        due_at,
        created_at,
        updated_at,
    }
}

const CARD_COLUMNS: &str = "id, user_id, subject_id, front, back, repetition, interval_days, \
                            ease_factor, due_at, created_at, updated_at";

/// Fields accepted by [`FlashcardRepository::update`].
#[derive(Debug, Default)]
pub struct FlashcardPatch<'p> {
    pub subject_id: Option<Option<i64>>,
    pub front: Option<&'p str>,
    pub back: Option<&'p str>,
}

/// Repository for flashcard operations.
pub struct FlashcardRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FlashcardRepository<'a> {
    /// Create a new flashcard repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a card. New cards are due immediately with fresh SM-2 state.
    pub async fn create(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        front: &str,
        back: &str,
    ) -> Result<FlashcardRecord, DbError> {
        let now = chrono::Utc::now().timestamp();
        let state = CardState::default();

        let result = sqlx::query(
            r#"
            INSERT INTO flashcards
                (user_id, subject_id, front, back, repetition, interval_days,
                 ease_factor, due_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(front)
        .bind(back)
        .bind(state.repetition)
        .bind(state.interval_days)
        .bind(state.ease_factor)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(FlashcardRecord {
            id: result.last_insert_rowid(),
            user_id,
            subject_id,
            front: front.to_string(),
            back: back.to_string(),
            repetition: state.repetition,
            interval_days: state.interval_days,
            ease_factor: state.ease_factor,
            due_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a card by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: i64) -> Result<Option<FlashcardRecord>, DbError> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_card))
    }

    /// List a user's cards. `due_before` restricts to cards due at or
    /// before the given timestamp (the "cards to review now" query).
    pub async fn list(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        due_before: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<FlashcardRecord>, DbError> {
        let mut sql = format!("SELECT {CARD_COLUMNS} FROM flashcards WHERE user_id = ?");
        if subject_id.is_some() {
            sql.push_str(" AND subject_id = ?");
        }
        if due_before.is_some() {
            sql.push_str(" AND due_at <= ?");
        }
        sql.push_str(" ORDER BY due_at, id LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, CardRow>(&sql).bind(user_id);
        if let Some(subject_id) = subject_id {
            query = query.bind(subject_id);
        }
        if let Some(due_before) = due_before {
            query = query.bind(due_before);
        }
        let rows = query.bind(limit).bind(offset).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(row_to_card).collect())
    }

    /// Apply a content patch (front/back/subject). Scheduling state is
    /// only ever changed through [`Self::apply_review`].
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        patch: FlashcardPatch<'_>,
    ) -> Result<Option<FlashcardRecord>, DbError> {
        let Some(existing) = self.find(user_id, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let subject_id = patch.subject_id.unwrap_or(existing.subject_id);
        let front = patch.front.unwrap_or(&existing.front);
        let back = patch.back.unwrap_or(&existing.back);

        sqlx::query(
            r#"
            UPDATE flashcards
            SET subject_id = ?, front = ?, back = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(subject_id)
        .bind(front)
        .bind(back)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.find(user_id, id).await
    }

    /// Persist the outcome of an SM-2 review.
    pub async fn apply_review(
        &self,
        user_id: i64,
        id: i64,
        state: CardState,
        due_at: i64,
    ) -> Result<Option<FlashcardRecord>, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET repetition = ?, interval_days = ?, ease_factor = ?, due_at = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(state.repetition)
        .bind(state.interval_days)
        .bind(state.ease_factor)
        .bind(due_at)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find(user_id, id).await
    }

    /// Delete a card. Returns whether a row was deleted.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
