use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_owner, require_exam_owner, CurrentInstructor};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::{Exam, Question};
use crate::db::types::DifficultyLevel;
use crate::repositories;
use crate::schemas::exam::{ExamCreate, ExamQuestionIds, ExamResponse};
use crate::schemas::question::QuestionPublic;
use crate::services::assembly::{self, AssemblyError};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_exam))
        .route("/automatic", post(create_automatic_exam))
        .route("/:exam_id/questions", post(add_questions).put(replace_questions))
        .route("/:exam_id/questions/:question_id", delete(remove_question))
        .route("/:exam_id/activate", post(activate_exam))
}

async fn create_exam(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
    require_course_owner(&state, &instructor, &payload.course_id).await?;

    let exam = insert_exam(&state, &instructor.id, &payload, false).await?;
    Ok(Json(ExamResponse::from_exam(exam, Vec::new())))
}

/// Creates an exam and assembles its question set from the course bank in a
/// single transaction. A failed assembly leaves no exam row behind.
async fn create_automatic_exam(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
    require_course_owner(&state, &instructor, &payload.course_id).await?;

    let (simple, medium, hard) = load_difficulty_pools(&state, &payload.course_id).await?;
    let mut rng = StdRng::from_entropy();
    let selected = assembly::select_balanced(
        &mut rng,
        simple,
        medium,
        hard,
        payload.questions_count as usize,
    )
    .map_err(|err| match err {
        deficit @ AssemblyError::InsufficientPool { .. } => {
            ApiError::BadRequest(deficit.to_string())
        }
        mismatch @ AssemblyError::SizeMismatch { .. } => {
            ApiError::internal(mismatch, "Question assembly produced a wrong-sized set")
        }
    })?;

    let full_mark: i32 = selected.iter().map(|question| question.mark).sum();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let exam = repositories::exams::create(
        &mut *tx,
        build_create_params(&instructor.id, &payload, true, &Uuid::new_v4().to_string()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    for question in &selected {
        repositories::exams::add_question(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &exam.id,
            &question.id,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach question to exam"))?;
    }

    repositories::exams::set_full_mark(&mut *tx, &exam.id, full_mark)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to set exam full mark"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let mut exam = exam;
    exam.full_mark = full_mark;
    let questions = public_questions(&state, selected).await?;
    Ok(Json(ExamResponse::from_exam(exam, questions)))
}

async fn add_questions(
    Path(exam_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<ExamQuestionIds>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
    let exam = require_exam_owner(&state, &instructor, &exam_id).await?;
    ensure_mutable(&exam)?;

    let questions = load_course_questions(&state, &exam, &payload.question_ids).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    for question in &questions {
        repositories::exams::add_question(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &exam.id,
            &question.id,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach question to exam"))?;
    }

    finish_question_mutation(&state, tx, exam).await
}

async fn replace_questions(
    Path(exam_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
    Json(payload): Json<ExamQuestionIds>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
    let exam = require_exam_owner(&state, &instructor, &exam_id).await?;
    ensure_mutable(&exam)?;

    let questions = load_course_questions(&state, &exam, &payload.question_ids).await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    repositories::exams::clear_questions(&mut *tx, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to clear exam questions"))?;

    for question in &questions {
        repositories::exams::add_question(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &exam.id,
            &question.id,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach question to exam"))?;
    }

    finish_question_mutation(&state, tx, exam).await
}

async fn remove_question(
    Path((exam_id, question_id)): Path<(String, String)>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = require_exam_owner(&state, &instructor, &exam_id).await?;
    ensure_mutable(&exam)?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let removed = repositories::exams::remove_question(&mut *tx, &exam.id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove question from exam"))?;

    if !removed {
        return Err(ApiError::NotFound("Question is not part of this exam".to_string()));
    }

    finish_question_mutation(&state, tx, exam).await
}

async fn activate_exam(
    Path(exam_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let mut exam = require_exam_owner(&state, &instructor, &exam_id).await?;

    let activated = repositories::exams::activate(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to activate exam"))?;

    if !activated {
        return Err(ApiError::Conflict("Exam is already active".to_string()));
    }

    exam.is_active = true;
    let questions = repositories::questions::list_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;
    let questions = public_questions(&state, questions).await?;
    Ok(Json(ExamResponse::from_exam(exam, questions)))
}

/// Active exams have a frozen question set.
fn ensure_mutable(exam: &Exam) -> Result<(), ApiError> {
    if exam.is_active {
        return Err(ApiError::Conflict(
            "Exam is active; its question set can no longer be changed".to_string(),
        ));
    }
    Ok(())
}

async fn insert_exam(
    state: &AppState,
    instructor_id: &str,
    payload: &ExamCreate,
    is_automatic: bool,
) -> Result<Exam, ApiError> {
    let id = Uuid::new_v4().to_string();
    repositories::exams::create(state.db(), build_create_params(instructor_id, payload, is_automatic, &id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create exam"))
}

fn build_create_params<'a>(
    instructor_id: &'a str,
    payload: &'a ExamCreate,
    is_automatic: bool,
    id: &'a str,
) -> repositories::exams::CreateExam<'a> {
    repositories::exams::CreateExam {
        id,
        course_id: &payload.course_id,
        instructor_id,
        title: &payload.title,
        scheduled_at: to_primitive_utc(payload.scheduled_at),
        duration_minutes: payload.duration_minutes,
        exam_type: payload.exam_type,
        passing_percentage: payload.passing_percentage,
        questions_count: payload.questions_count,
        is_automatic,
        created_at: primitive_now_utc(),
    }
}

type DifficultyPools = (Vec<Question>, Vec<Question>, Vec<Question>);

async fn load_difficulty_pools(
    state: &AppState,
    course_id: &str,
) -> Result<DifficultyPools, ApiError> {
    let pool_for = |difficulty: DifficultyLevel| {
        repositories::questions::list_pool_by_difficulty(state.db(), course_id, difficulty)
    };

    let simple = pool_for(DifficultyLevel::Simple)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question pool"))?;
    let medium = pool_for(DifficultyLevel::Medium)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question pool"))?;
    let hard = pool_for(DifficultyLevel::Hard)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question pool"))?;

    Ok((simple, medium, hard))
}

/// Loads candidate questions and checks they all exist and belong to the
/// exam's course.
async fn load_course_questions(
    state: &AppState,
    exam: &Exam,
    question_ids: &[String],
) -> Result<Vec<Question>, ApiError> {
    let questions = repositories::questions::find_many_by_ids(state.db(), question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    if questions.len() != question_ids.len() {
        return Err(ApiError::NotFound("One or more questions not found".to_string()));
    }

    for question in &questions {
        if question.course_id != exam.course_id {
            return Err(ApiError::BadRequest(format!(
                "Question {} does not belong to the exam's course",
                question.id
            )));
        }
    }

    Ok(questions)
}

/// Recomputes the full mark from the resulting question set and commits, so
/// readers never observe a full mark out of step with the exam's questions.
async fn finish_question_mutation(
    state: &AppState,
    mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
    mut exam: Exam,
) -> Result<Json<ExamResponse>, ApiError> {
    let full_mark = repositories::exams::sum_question_marks(&mut *tx, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute exam full mark"))?;
    let full_mark = i32::try_from(full_mark)
        .map_err(|e| ApiError::internal(e, "Exam full mark out of range"))?;

    repositories::exams::set_full_mark(&mut *tx, &exam.id, full_mark)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to set exam full mark"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    exam.full_mark = full_mark;
    let questions = repositories::questions::list_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;
    let questions = public_questions(state, questions).await?;
    Ok(Json(ExamResponse::from_exam(exam, questions)))
}

async fn public_questions(
    state: &AppState,
    questions: Vec<Question>,
) -> Result<Vec<QuestionPublic>, ApiError> {
    let entries = repositories::questions::attach_choices(state.db(), questions)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question choices"))?;
    Ok(entries.into_iter().map(QuestionPublic::from).collect())
}
