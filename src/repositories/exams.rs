use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamType;

pub(crate) const COLUMNS: &str = "\
    id, course_id, instructor_id, title, scheduled_at, duration_minutes, full_mark, \
    exam_type, passing_percentage, questions_count, is_active, is_automatic, \
    is_deleted, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub course_id: &'a str,
    pub instructor_id: &'a str,
    pub title: &'a str,
    pub scheduled_at: PrimitiveDateTime,
    pub duration_minutes: i32,
    pub exam_type: ExamType,
    pub passing_percentage: f64,
    pub questions_count: i32,
    pub is_automatic: bool,
    pub created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, course_id, instructor_id, title, scheduled_at, duration_minutes,
            full_mark, exam_type, passing_percentage, questions_count,
            is_active, is_automatic, is_deleted, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,0,$7,$8,$9,FALSE,$10,FALSE,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.instructor_id)
    .bind(params.title)
    .bind(params.scheduled_at)
    .bind(params.duration_minutes)
    .bind(params.exam_type)
    .bind(params.passing_percentage)
    .bind(params.questions_count)
    .bind(params.is_automatic)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn add_question(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    exam_id: &str,
    question_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_questions (id, exam_id, question_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (exam_id, question_id) DO NOTHING",
    )
    .bind(id)
    .bind(exam_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn remove_question(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1 AND question_id = $2")
        .bind(exam_id)
        .bind(question_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn clear_questions(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Sum of marks over the exam's current question set.
pub(crate) async fn sum_question_marks(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(q.mark), 0)
         FROM exam_questions eq
         JOIN questions q ON q.id = eq.question_id
         WHERE eq.exam_id = $1",
    )
    .bind(exam_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn set_full_mark(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    full_mark: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exams SET full_mark = $1 WHERE id = $2")
        .bind(full_mark)
        .bind(exam_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Flips the activation latch. Returns false when the exam was already
/// active, so the caller can surface a conflict instead of a silent no-op.
pub(crate) async fn activate(pool: &PgPool, exam_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE exams SET is_active = TRUE WHERE id = $1 AND NOT is_active")
        .bind(exam_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
