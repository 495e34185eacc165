//! Practice question repository and quiz attempt history.
//!
//! Question options are stored as a JSON array of strings; the correct
//! answer is an index into that array and is withheld from quiz payloads
//! by the API layer.

use super::DbError;
use sqlx::SqlitePool;

/// A multiple-choice practice question.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A recorded quiz attempt.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub total: u32,
    pub correct: u32,
    pub taken_at: i64,
}

type QuestionRow = (i64, i64, Option<i64>, String, String, u32, i64, i64);

fn row_to_question(
    (id, user_id, subject_id, prompt, options, correct_index, created_at, updated_at): QuestionRow,
) -> Result<QuestionRecord, DbError> {
    let options: Vec<String> = serde_json::from_str(&options)
        .map_err(|e| DbError::Internal(format!("corrupt options for question {id}: {e}")))?;
    Ok(QuestionRecord {
        id,
        user_id,
        subject_id,
        prompt,
        options,
        correct_index,
        created_at,
        updated_at,
    })
}

const QUESTION_COLUMNS: &str =
    "id, user_id, subject_id, prompt, options, correct_index, created_at, updated_at";

/// Fields accepted by [`QuestionRepository::update`].
#[derive(Debug, Default)]
pub struct QuestionPatch<'p> {
    pub subject_id: Option<Option<i64>>,
    pub prompt: Option<&'p str>,
    pub options: Option<&'p [String]>,
    pub correct_index: Option<u32>,
}

/// Repository for practice questions and quiz attempts.
pub struct QuestionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuestionRepository<'a> {
    /// Create a new question repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a question.
    pub async fn create(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        prompt: &str,
        options: &[String],
        correct_index: u32,
    ) -> Result<QuestionRecord, DbError> {
        let now = chrono::Utc::now().timestamp();
        let options_json = serde_json::to_string(options)
            .map_err(|e| DbError::Internal(format!("encode options: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO questions
                (user_id, subject_id, prompt, options, correct_index, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(prompt)
        .bind(&options_json)
        .bind(correct_index)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(QuestionRecord {
            id: result.last_insert_rowid(),
            user_id,
            subject_id,
            prompt: prompt.to_string(),
            options: options.to_vec(),
            correct_index,
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a question by id, scoped to its owner.
    pub async fn find(&self, user_id: i64, id: i64) -> Result<Option<QuestionRecord>, DbError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(row_to_question).transpose()
    }

    /// List a user's questions, optionally filtered by subject.
    pub async fn list(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuestionRecord>, DbError> {
        let rows = match subject_id {
            Some(subject_id) => {
                sqlx::query_as::<_, QuestionRow>(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions \
                     WHERE user_id = ? AND subject_id = ? \
                     ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(subject_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, QuestionRow>(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions \
                     WHERE user_id = ? ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.into_iter().map(row_to_question).collect()
    }

    /// Draw a random sample of questions for a quiz.
    pub async fn sample(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        count: u32,
    ) -> Result<Vec<QuestionRecord>, DbError> {
        let rows = match subject_id {
            Some(subject_id) => {
                sqlx::query_as::<_, QuestionRow>(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions \
                     WHERE user_id = ? AND subject_id = ? \
                     ORDER BY RANDOM() LIMIT ?"
                ))
                .bind(user_id)
                .bind(subject_id)
                .bind(count)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, QuestionRow>(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions \
                     WHERE user_id = ? ORDER BY RANDOM() LIMIT ?"
                ))
                .bind(user_id)
                .bind(count)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.into_iter().map(row_to_question).collect()
    }

    /// Apply a patch. Returns the updated question, or `None` when it does
    /// not exist (or isn't owned by `user_id`).
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        patch: QuestionPatch<'_>,
    ) -> Result<Option<QuestionRecord>, DbError> {
        let Some(existing) = self.find(user_id, id).await? else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();
        let subject_id = patch.subject_id.unwrap_or(existing.subject_id);
        let prompt = patch.prompt.unwrap_or(&existing.prompt);
        let options = patch.options.unwrap_or(&existing.options);
        let correct_index = patch.correct_index.unwrap_or(existing.correct_index);
        let options_json = serde_json::to_string(options)
            .map_err(|e| DbError::Internal(format!("encode options: {e}")))?;

        sqlx::query(
            r#"
            UPDATE questions
            SET subject_id = ?, prompt = ?, options = ?, correct_index = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(subject_id)
        .bind(prompt)
        .bind(&options_json)
        .bind(correct_index)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.find(user_id, id).await
    }

    /// Delete a question. Returns whether a row was deleted.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a graded quiz attempt.
    pub async fn record_attempt(
        &self,
        user_id: i64,
        subject_id: Option<i64>,
        total: u32,
        correct: u32,
    ) -> Result<QuizAttempt, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO quiz_attempts (user_id, subject_id, total, correct, taken_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(total)
        .bind(correct)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(QuizAttempt {
            id: result.last_insert_rowid(),
            user_id,
            subject_id,
            total,
            correct,
            taken_at: now,
        })
    }

    /// List a user's quiz attempts, newest first.
    pub async fn list_attempts(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<QuizAttempt>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64, Option<i64>, u32, u32, i64)>(
            r#"
            SELECT id, user_id, subject_id, total, correct, taken_at
            FROM quiz_attempts
            WHERE user_id = ?
            ORDER BY taken_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, subject_id, total, correct, taken_at)| QuizAttempt {
                id,
                user_id,
                subject_id,
                total,
                correct,
                taken_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    fn options(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn options_roundtrip_as_json() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("alice", "password1", None).await.unwrap();

        let question = db
            .questions()
            .create(
                user.id,
                None,
                "Capital of France?",
                &options(&["London", "Paris", "Berlin"]),
                1,
            )
            .await
            .unwrap();

        let found = db.questions().find(user.id, question.id).await.unwrap().unwrap();
        assert_eq!(found.options, options(&["London", "Paris", "Berlin"]));
        assert_eq!(found.correct_index, 1);
    }

    #[tokio::test]
    async fn sample_respects_count_and_owner() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("bob", "password1", None).await.unwrap();
        let other = db.users().register("carol", "password1", None).await.unwrap();

        for i in 0..10 {
            db.questions()
                .create(user.id, None, &format!("q{i}"), &options(&["a", "b"]), 0)
                .await
                .unwrap();
        }
        db.questions()
            .create(other.id, None, "not yours", &options(&["a", "b"]), 0)
            .await
            .unwrap();

        let sample = db.questions().sample(user.id, None, 5).await.unwrap();
        assert_eq!(sample.len(), 5);
        assert!(sample.iter().all(|question| question.user_id == user.id));
    }

    #[tokio::test]
    async fn attempts_listed_newest_first() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("dave", "password1", None).await.unwrap();

        db.questions().record_attempt(user.id, None, 10, 7).await.unwrap();
        db.questions().record_attempt(user.id, None, 5, 5).await.unwrap();

        let attempts = db.questions().list_attempts(user.id, 50, 0).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].total, 5);
    }
}
