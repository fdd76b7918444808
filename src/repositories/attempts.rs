use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{ExamAttempt, StudentAnswer};

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, started_at, submitted_at, score, max_score, \
    percentage, is_completed, is_succeed";

const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, selected_choice_id, is_correct";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn has_completed_attempt(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM exam_attempts
         WHERE exam_id = $1 AND student_id = $2 AND is_completed",
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    exam_id: &str,
    student_id: &str,
    started_at: PrimitiveDateTime,
) -> Result<ExamAttempt, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts (id, exam_id, student_id, started_at, is_completed, is_succeed)
         VALUES ($1, $2, $3, $4, FALSE, FALSE)
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(exam_id)
    .bind(student_id)
    .bind(started_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct CompleteAttempt {
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub is_succeed: bool,
    pub submitted_at: PrimitiveDateTime,
}

/// One-way completion latch. The update is conditional on
/// `is_completed = FALSE`; a raced second submission affects zero rows and
/// the caller must treat that as a conflict.
pub(crate) async fn complete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: CompleteAttempt,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts
         SET score = $1,
             max_score = $2,
             percentage = $3,
             is_succeed = $4,
             is_completed = TRUE,
             submitted_at = $5
         WHERE id = $6 AND NOT is_completed",
    )
    .bind(params.score)
    .bind(params.max_score)
    .bind(params.percentage)
    .bind(params.is_succeed)
    .bind(params.submitted_at)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn insert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempt_id: &str,
    question_id: &str,
    selected_choice_id: Option<&str>,
    is_correct: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (id, attempt_id, question_id, selected_choice_id, is_correct)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(attempt_id)
    .bind(question_id)
    .bind(selected_choice_id)
    .bind(is_correct)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_answers(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE student_id = $1 ORDER BY started_at DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_instructor(
    pool: &PgPool,
    instructor_id: &str,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(
        "SELECT a.id, a.exam_id, a.student_id, a.started_at, a.submitted_at, a.score,
                a.max_score, a.percentage, a.is_completed, a.is_succeed
         FROM exam_attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE e.instructor_id = $1
         ORDER BY a.started_at DESC",
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_instructor_and_student(
    pool: &PgPool,
    instructor_id: &str,
    student_id: &str,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(
        "SELECT a.id, a.exam_id, a.student_id, a.started_at, a.submitted_at, a.score,
                a.max_score, a.percentage, a.is_completed, a.is_succeed
         FROM exam_attempts a
         JOIN exams e ON e.id = a.exam_id
         WHERE e.instructor_id = $1 AND a.student_id = $2
         ORDER BY a.started_at DESC",
    )
    .bind(instructor_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
}
