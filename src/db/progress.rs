//! Progress repository.
//!
//! Per-user, per-subject activity counters, upserted whenever a flashcard
//! is reviewed or a quiz attempt is recorded. Activity on cards or quizzes
//! with no subject is not tracked here.

use super::DbError;
use sqlx::SqlitePool;

/// A progress summary row (joined with the subject name).
#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub subject_id: i64,
    pub subject_name: String,
    pub cards_reviewed: i64,
    pub quizzes_taken: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,
    pub last_activity_at: i64,
}

/// Repository for progress counters.
pub struct ProgressRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProgressRepository<'a> {
    /// Create a new progress repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Bump the reviewed-cards counter for a subject.
    pub async fn record_review(&self, user_id: i64, subject_id: i64) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO progress
                (user_id, subject_id, cards_reviewed, last_activity_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (user_id, subject_id)
            DO UPDATE SET cards_reviewed = cards_reviewed + 1,
                          last_activity_at = excluded.last_activity_at
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Fold one graded quiz into the counters for a subject.
    pub async fn record_quiz(
        &self,
        user_id: i64,
        subject_id: i64,
        answered: u32,
        correct: u32,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO progress
                (user_id, subject_id, quizzes_taken, questions_answered,
                 correct_answers, last_activity_at)
            VALUES (?, ?, 1, ?, ?, ?)
            ON CONFLICT (user_id, subject_id)
            DO UPDATE SET quizzes_taken = quizzes_taken + 1,
                          questions_answered = questions_answered + excluded.questions_answered,
                          correct_answers = correct_answers + excluded.correct_answers,
                          last_activity_at = excluded.last_activity_at
            "#,
        )
        .bind(user_id)
        .bind(subject_id)
        .bind(answered)
        .bind(correct)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Per-subject summary for a user, most recently active first.
    pub async fn summary(&self, user_id: i64) -> Result<Vec<ProgressRow>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64, i64, i64, i64)>(
            r#"
            SELECT p.subject_id, s.name, p.cards_reviewed, p.quizzes_taken,
                   p.questions_answered, p.correct_answers, p.last_activity_at
            FROM progress p
            JOIN subjects s ON s.id = p.subject_id
            WHERE p.user_id = ?
            ORDER BY p.last_activity_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    subject_id,
                    subject_name,
                    cards_reviewed,
                    quizzes_taken,
                    questions_answered,
                    correct_answers,
                    last_activity_at,
                )| ProgressRow {
                    subject_id,
                    subject_name,
                    cards_reviewed,
                    quizzes_taken,
                    questions_answered,
                    correct_answers,
                    last_activity_at,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn counters_accumulate() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("alice", "password1", None).await.unwrap();
        let subject = db.subjects().create(user.id, "Chemistry", None).await.unwrap();

        db.progress().record_review(user.id, subject.id).await.unwrap();
        db.progress().record_review(user.id, subject.id).await.unwrap();
        db.progress()
            .record_quiz(user.id, subject.id, 10, 8)
            .await
            .unwrap();

        let summary = db.progress().summary(user.id).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].subject_name, "Chemistry");
        assert_eq!(summary[0].cards_reviewed, 2);
        assert_eq!(summary[0].quizzes_taken, 1);
        assert_eq!(summary[0].questions_answered, 10);
        assert_eq!(summary[0].correct_answers, 8);
    }

    #[tokio::test]
    async fn subject_delete_cascades_progress() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().register("bob", "password1", None).await.unwrap();
        let subject = db.subjects().create(user.id, "Latin", None).await.unwrap();

        db.progress().record_review(user.id, subject.id).await.unwrap();
        db.subjects().delete(user.id, subject.id).await.unwrap();

        assert!(db.progress().summary(user.id).await.unwrap().is_empty());
    }
}
