use serde::{Deserialize, Serialize};

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{ExamAttempt, StudentAnswer};
use crate::schemas::question::QuestionPublic;
use crate::services::evaluator::{AnswerSelection, EvaluatedAnswer};

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerSubmission {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default, alias = "selectedChoiceId")]
    pub(crate) selected_choice_id: Option<String>,
}

impl From<AnswerSubmission> for AnswerSelection {
    fn from(answer: AnswerSubmission) -> Self {
        AnswerSelection {
            question_id: answer.question_id,
            selected_choice_id: answer.selected_choice_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitExamRequest {
    #[serde(default)]
    pub(crate) answers: Vec<AnswerSubmission>,
}

/// Snapshot returned when an attempt starts. Questions come through the
/// public shape, so correct choices stay hidden.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptStartResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) started_at: String,
    pub(crate) duration_minutes: i32,
    pub(crate) questions: Vec<QuestionPublic>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResultResponse {
    pub(crate) question_id: String,
    pub(crate) selected_choice_id: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) mark: i32,
}

impl From<EvaluatedAnswer> for AnswerResultResponse {
    fn from(answer: EvaluatedAnswer) -> Self {
        AnswerResultResponse {
            question_id: answer.question_id,
            selected_choice_id: answer.selected_choice_id,
            is_correct: answer.is_correct,
            mark: answer.mark,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) score: Option<i32>,
    pub(crate) max_score: Option<i32>,
    pub(crate) percentage: Option<f64>,
    pub(crate) is_completed: bool,
    pub(crate) is_succeed: bool,
}

impl From<ExamAttempt> for AttemptResponse {
    fn from(attempt: ExamAttempt) -> Self {
        AttemptResponse {
            id: attempt.id,
            exam_id: attempt.exam_id,
            student_id: attempt.student_id,
            started_at: format_primitive(attempt.started_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            score: attempt.score,
            max_score: attempt.max_score,
            percentage: attempt.percentage,
            is_completed: attempt.is_completed,
            is_succeed: attempt.is_succeed,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StoredAnswerResponse {
    pub(crate) question_id: String,
    pub(crate) selected_choice_id: Option<String>,
    pub(crate) is_correct: bool,
}

impl From<StudentAnswer> for StoredAnswerResponse {
    fn from(answer: StudentAnswer) -> Self {
        StoredAnswerResponse {
            question_id: answer.question_id,
            selected_choice_id: answer.selected_choice_id,
            is_correct: answer.is_correct,
        }
    }
}

/// One attempt with its recorded answers, as seen by instructors or the
/// attempt's owner after submission.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    #[serde(flatten)]
    pub(crate) attempt: AttemptResponse,
    pub(crate) answers: Vec<StoredAnswerResponse>,
}

/// Full submission result: the completed attempt, the threshold it was
/// judged against, and per-question correctness.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    #[serde(flatten)]
    pub(crate) attempt: AttemptResponse,
    pub(crate) passing_percentage: f64,
    pub(crate) answers: Vec<AnswerResultResponse>,
}
