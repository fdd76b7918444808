use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{
    require_course_enrollment, require_exam_assignment, require_exam_owner, CurrentInstructor,
    CurrentUser,
};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::ExamAttempt;
use crate::repositories;
use crate::schemas::attempt::{
    AttemptDetailResponse, AttemptResponse, AttemptResultResponse, AttemptStartResponse,
    SubmitExamRequest,
};
use crate::schemas::question::QuestionPublic;
use crate::services::attempt_policy::{self, PolicyViolation};
use crate::services::evaluator::{self, AnswerSelection, QuestionWithChoices};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams/:exam_id/start", post(start_exam))
        .route("/:attempt_id/submit", post(submit_exam))
        .route("/my", get(list_my_attempts))
        .route("/instructor", get(list_instructor_attempts))
        .route("/instructor/students/:student_id", get(list_student_attempts_for_instructor))
        .route("/:attempt_id", get(get_attempt))
}

/// Opens a new attempt after the eligibility chain passes: exam assignment,
/// exam existence, course enrollment, activation, and the final-retake gate,
/// checked in that order so the first failure wins.
async fn start_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptStartResponse>, ApiError> {
    require_exam_assignment(&state, &exam_id, &user.id).await?;

    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    require_course_enrollment(&state, &exam.course_id, &user.id).await?;
    attempt_policy::ensure_active(&exam)?;

    let has_completed =
        repositories::attempts::has_completed_attempt(state.db(), &exam.id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check prior attempts"))?;
    attempt_policy::ensure_retake_allowed(&exam, has_completed)?;

    let attempt = repositories::attempts::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &exam.id,
        &user.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    let questions = exam_question_set(&state, &exam.id).await?;
    let questions: Vec<QuestionPublic> =
        questions.into_iter().map(QuestionPublic::from).collect();

    Ok(Json(AttemptStartResponse {
        attempt_id: attempt.id,
        exam_id: exam.id,
        student_id: attempt.student_id,
        started_at: crate::schemas::attempt::format_primitive(attempt.started_at),
        duration_minutes: exam.duration_minutes,
        questions,
    }))
}

/// Scores the submission and persists answers plus the attempt completion in
/// one transaction. The completion update is a compare-and-set on the
/// `is_completed` latch, so a raced duplicate submission rolls back whole.
async fn submit_exam(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let answers: Vec<AnswerSelection> =
        payload.answers.into_iter().map(AnswerSelection::from).collect();
    if answers.is_empty() {
        return Err(PolicyViolation::NoAnswers.into());
    }

    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("This attempt does not belong to you"));
    }
    if attempt.is_completed {
        return Err(ApiError::Conflict("Exam has already been submitted".to_string()));
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let now = primitive_now_utc();
    attempt_policy::check_time_limit(attempt.started_at, now, exam.duration_minutes)?;
    attempt_policy::check_answer_set(&answers, exam.questions_count as usize)?;

    let questions = exam_question_set(&state, &exam.id).await?;
    let evaluation = evaluator::evaluate(&answers, &questions);
    let is_succeed = evaluation.percentage >= exam.passing_percentage;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let completed = repositories::attempts::complete(
        &mut *tx,
        &attempt.id,
        repositories::attempts::CompleteAttempt {
            score: evaluation.total_score,
            max_score: evaluation.max_score,
            percentage: evaluation.percentage,
            is_succeed,
            submitted_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to complete attempt"))?;

    if !completed {
        // Lost the race against a concurrent submission.
        return Err(ApiError::Conflict("Exam has already been submitted".to_string()));
    }

    for answer in &evaluation.answers {
        repositories::attempts::insert_answer(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &attempt.id,
            &answer.question_id,
            answer.selected_choice_id.as_deref(),
            answer.is_correct,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store answer"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let completed_attempt = ExamAttempt {
        submitted_at: Some(now),
        score: Some(evaluation.total_score),
        max_score: Some(evaluation.max_score),
        percentage: Some(evaluation.percentage),
        is_completed: true,
        is_succeed,
        ..attempt
    };

    Ok(Json(AttemptResultResponse {
        attempt: AttemptResponse::from(completed_attempt),
        passing_percentage: exam.passing_percentage,
        answers: evaluation.answers.into_iter().map(Into::into).collect(),
    }))
}

async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != user.id {
        require_exam_owner(&state, &user, &attempt.exam_id).await?;
    }

    let answers = repositories::attempts::list_answers(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    Ok(Json(AttemptDetailResponse {
        attempt: AttemptResponse::from(attempt),
        answers: answers.into_iter().map(Into::into).collect(),
    }))
}

async fn list_my_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = repositories::attempts::list_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempts"))?;

    non_empty(attempts)
}

async fn list_instructor_attempts(
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = repositories::attempts::list_by_instructor(state.db(), &instructor.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempts"))?;

    non_empty(attempts)
}

async fn list_student_attempts_for_instructor(
    Path(student_id): Path<String>,
    CurrentInstructor(instructor): CurrentInstructor,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = repositories::attempts::list_by_instructor_and_student(
        state.db(),
        &instructor.id,
        &student_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to fetch attempts"))?;

    non_empty(attempts)
}

/// Empty result sets surface as not-found rather than an empty list; callers
/// rely on the distinction.
fn non_empty(attempts: Vec<ExamAttempt>) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    if attempts.is_empty() {
        return Err(ApiError::NotFound("No attempts found".to_string()));
    }
    Ok(Json(attempts.into_iter().map(AttemptResponse::from).collect()))
}

async fn exam_question_set(
    state: &AppState,
    exam_id: &str,
) -> Result<Vec<QuestionWithChoices>, ApiError> {
    let questions = repositories::questions::list_for_exam(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

    repositories::questions::attach_choices(state.db(), questions)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question choices"))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::core::time::primitive_now_utc;
    use crate::db::types::{DifficultyLevel, ExamType, UserRole};
    use crate::repositories;
    use crate::test_support;

    #[tokio::test]
    async fn second_submission_conflicts_and_keeps_first_result() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let db = ctx.state.db();

        let instructor = test_support::insert_user(db, "Grace Hopper", UserRole::Instructor).await;
        let student = test_support::insert_user(db, "Ada Lovelace", UserRole::Student).await;
        let course = test_support::insert_course(db, "Databases", &instructor.id).await;
        test_support::enroll_student(db, &course.id, &student.id).await;

        let q1 = test_support::insert_question(
            db,
            &course.id,
            &instructor.id,
            "What is a join?",
            5,
            DifficultyLevel::Simple,
        )
        .await;
        let q2 = test_support::insert_question(
            db,
            &course.id,
            &instructor.id,
            "What is an index?",
            5,
            DifficultyLevel::Medium,
        )
        .await;

        let exam = test_support::insert_exam(
            db,
            &course.id,
            &instructor.id,
            ExamType::Quiz,
            &[&q1, &q2],
            60,
            50.0,
            true,
        )
        .await;
        test_support::assign_exam(db, &exam.id, &student.id).await;

        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/attempts/exams/{}/start", exam.id),
                Some(&token),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let started = test_support::read_json(response).await;
        // Question payloads handed to the student must not carry answer keys.
        assert!(!started.to_string().contains("is_correct"));
        let attempt_id = started["attempt_id"].as_str().expect("attempt id").to_string();

        // First submission: q1 correct, q2 wrong, so 5 of 10 at a 50% bar.
        let submission = json!({
            "answers": [
                { "question_id": q1.id, "selected_choice_id": q1.correct_choice_id },
                { "question_id": q2.id, "selected_choice_id": q2.wrong_choice_id },
            ]
        });
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/attempts/{attempt_id}/submit"),
                Some(&token),
                Some(submission),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let result = test_support::read_json(response).await;
        assert_eq!(result["score"], 5);
        assert_eq!(result["max_score"], 10);
        assert_eq!(result["is_succeed"], true);

        // Second submission (all correct) must be refused outright.
        let retry = json!({
            "answers": [
                { "question_id": q1.id, "selected_choice_id": q1.correct_choice_id },
                { "question_id": q2.id, "selected_choice_id": q2.correct_choice_id },
            ]
        });
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/attempts/{attempt_id}/submit"),
                Some(&token),
                Some(retry),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error = test_support::read_json(response).await;
        assert_eq!(error["detail"], "Exam has already been submitted");

        // The completion update is guarded on the latch, so even a direct
        // write cannot overwrite a finished attempt.
        let overwritten = repositories::attempts::complete(
            db,
            &attempt_id,
            repositories::attempts::CompleteAttempt {
                score: 9,
                max_score: 10,
                percentage: 90.0,
                is_succeed: true,
                submitted_at: primitive_now_utc(),
            },
        )
        .await
        .expect("complete query");
        assert!(!overwritten);

        let attempt = repositories::attempts::find_by_id(db, &attempt_id)
            .await
            .expect("fetch attempt")
            .expect("attempt row");
        assert!(attempt.is_completed);
        assert_eq!(attempt.score, Some(5));
        assert_eq!(attempt.max_score, Some(10));
        assert_eq!(attempt.percentage, Some(50.0));
    }

    #[tokio::test]
    async fn attempt_lists_report_not_found_when_empty() {
        let Some(ctx) = test_support::setup_test_context().await else { return };
        let db = ctx.state.db();

        let instructor = test_support::insert_user(db, "Grace Hopper", UserRole::Instructor).await;
        let student = test_support::insert_user(db, "Ada Lovelace", UserRole::Student).await;

        let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/attempts/my",
                Some(&student_token),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = test_support::read_json(response).await;
        assert_eq!(error["detail"], "No attempts found");

        let instructor_token = test_support::bearer_token(&instructor.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/attempts/instructor",
                Some(&instructor_token),
                None,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
