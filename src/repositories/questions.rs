use std::collections::HashMap;

use sqlx::PgPool;

use crate::db::models::{Choice, Question};
use crate::db::types::DifficultyLevel;
use crate::services::evaluator::QuestionWithChoices;

pub(crate) const COLUMNS: &str =
    "id, course_id, instructor_id, title, mark, difficulty, is_deleted, created_at";

const CHOICE_COLUMNS: &str = "id, question_id, text, is_correct, is_deleted";

/// The live question pool of a course for one difficulty tier.
pub(crate) async fn list_pool_by_difficulty(
    pool: &PgPool,
    course_id: &str,
    difficulty: DifficultyLevel,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE course_id = $1 AND difficulty = $2 AND NOT is_deleted"
    ))
    .bind(course_id)
    .bind(difficulty)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_many_by_ids(
    pool: &PgPool,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = ANY($1) AND NOT is_deleted"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        "SELECT q.id, q.course_id, q.instructor_id, q.title, q.mark, q.difficulty,
                q.is_deleted, q.created_at
         FROM questions q
         JOIN exam_questions eq ON eq.question_id = q.id
         WHERE eq.exam_id = $1",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// Pairs each question with its live choices, preserving question order.
pub(crate) async fn attach_choices(
    pool: &PgPool,
    questions: Vec<Question>,
) -> Result<Vec<QuestionWithChoices>, sqlx::Error> {
    let ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let choices = list_choices_for_questions(pool, &ids).await?;

    let mut by_question: HashMap<String, Vec<Choice>> = HashMap::new();
    for choice in choices {
        by_question.entry(choice.question_id.clone()).or_default().push(choice);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let choices = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithChoices { question, choices }
        })
        .collect())
}

pub(crate) async fn list_choices_for_questions(
    pool: &PgPool,
    question_ids: &[String],
) -> Result<Vec<Choice>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Choice>(&format!(
        "SELECT {CHOICE_COLUMNS} FROM choices WHERE question_id = ANY($1) AND NOT is_deleted"
    ))
    .bind(question_ids)
    .fetch_all(pool)
    .await
}
