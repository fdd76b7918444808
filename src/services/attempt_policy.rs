//! Pure precondition checks for starting and submitting exam attempts.
//! Handlers translate each violation into the matching HTTP response.

use std::collections::HashSet;

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamType;
use crate::services::evaluator::AnswerSelection;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum PolicyViolation {
    #[error("Exam is not active")]
    ExamNotActive,
    #[error("You have already completed this final exam. Retakes are not allowed.")]
    FinalAlreadyCompleted,
    #[error("Time limit exceeded. Allowed: {allowed_minutes} minutes, elapsed: {elapsed_minutes:.2} minutes")]
    TimeLimitExceeded { allowed_minutes: i32, elapsed_minutes: f64 },
    #[error("Answers are required")]
    NoAnswers,
    #[error("Invalid number of answers. Expected: {expected}, Received: {received}")]
    WrongAnswerCount { expected: usize, received: usize },
    #[error("Duplicate answer for question {question_id}")]
    DuplicateAnswer { question_id: String },
}

pub(crate) fn ensure_active(exam: &Exam) -> Result<(), PolicyViolation> {
    if exam.is_active {
        Ok(())
    } else {
        Err(PolicyViolation::ExamNotActive)
    }
}

/// A quiz can be retaken any number of times; a final exam admits a single
/// completed attempt per student.
pub(crate) fn ensure_retake_allowed(
    exam: &Exam,
    has_completed_attempt: bool,
) -> Result<(), PolicyViolation> {
    if exam.exam_type == ExamType::Final && has_completed_attempt {
        return Err(PolicyViolation::FinalAlreadyCompleted);
    }
    Ok(())
}

/// Rejects a submission arriving after the attempt's time window closed.
/// Elapsed time is measured from the attempt's start, not the exam schedule.
pub(crate) fn check_time_limit(
    started_at: PrimitiveDateTime,
    now: PrimitiveDateTime,
    duration_minutes: i32,
) -> Result<(), PolicyViolation> {
    let elapsed_minutes = (now - started_at).whole_seconds() as f64 / 60.0;
    if elapsed_minutes > f64::from(duration_minutes) {
        return Err(PolicyViolation::TimeLimitExceeded {
            allowed_minutes: duration_minutes,
            elapsed_minutes,
        });
    }
    Ok(())
}

/// A submission must answer every exam question exactly once.
pub(crate) fn check_answer_set(
    answers: &[AnswerSelection],
    expected: usize,
) -> Result<(), PolicyViolation> {
    if answers.is_empty() {
        return Err(PolicyViolation::NoAnswers);
    }
    if answers.len() != expected {
        return Err(PolicyViolation::WrongAnswerCount { expected, received: answers.len() });
    }

    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        if !seen.insert(answer.question_id.as_str()) {
            return Err(PolicyViolation::DuplicateAnswer {
                question_id: answer.question_id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn exam(exam_type: ExamType, is_active: bool) -> Exam {
        Exam {
            id: "exam-1".to_string(),
            course_id: "course-1".to_string(),
            instructor_id: "instructor-1".to_string(),
            title: "Midterm".to_string(),
            scheduled_at: datetime!(2025-03-01 10:00:00),
            duration_minutes: 60,
            full_mark: 50,
            exam_type,
            passing_percentage: 60.0,
            questions_count: 10,
            is_active,
            is_automatic: false,
            is_deleted: false,
            created_at: datetime!(2025-02-01 09:00:00),
        }
    }

    fn answer(question_id: &str) -> AnswerSelection {
        AnswerSelection { question_id: question_id.to_string(), selected_choice_id: None }
    }

    #[test]
    fn inactive_exam_cannot_be_started() {
        let err = ensure_active(&exam(ExamType::Quiz, false)).unwrap_err();
        assert_eq!(err, PolicyViolation::ExamNotActive);
    }

    #[test]
    fn quiz_retake_is_allowed_after_completion() {
        assert!(ensure_retake_allowed(&exam(ExamType::Quiz, true), true).is_ok());
    }

    #[test]
    fn final_retake_is_blocked_after_completion() {
        let err = ensure_retake_allowed(&exam(ExamType::Final, true), true).unwrap_err();
        assert_eq!(err, PolicyViolation::FinalAlreadyCompleted);
    }

    #[test]
    fn final_first_attempt_is_allowed() {
        assert!(ensure_retake_allowed(&exam(ExamType::Final, true), false).is_ok());
    }

    #[test]
    fn submission_within_the_window_passes() {
        let started = datetime!(2025-03-01 10:00:00);
        let now = datetime!(2025-03-01 11:00:00);
        assert!(check_time_limit(started, now, 60).is_ok());
    }

    #[test]
    fn late_submission_reports_allowed_and_elapsed_minutes() {
        let started = datetime!(2025-03-01 10:00:00);
        let now = datetime!(2025-03-01 11:01:00);
        let err = check_time_limit(started, now, 60).unwrap_err();

        assert_eq!(
            err,
            PolicyViolation::TimeLimitExceeded { allowed_minutes: 60, elapsed_minutes: 61.0 }
        );
        let message = err.to_string();
        assert!(message.contains("Allowed: 60 minutes"), "message was: {message}");
        assert!(message.contains("elapsed: 61.00 minutes"), "message was: {message}");
    }

    #[test]
    fn empty_answer_sheet_is_rejected() {
        let err = check_answer_set(&[], 3).unwrap_err();
        assert_eq!(err, PolicyViolation::NoAnswers);
    }

    #[test]
    fn wrong_answer_count_names_both_numbers() {
        let answers = [answer("q1"), answer("q2")];
        let err = check_answer_set(&answers, 3).unwrap_err();

        assert_eq!(err, PolicyViolation::WrongAnswerCount { expected: 3, received: 2 });
        assert_eq!(err.to_string(), "Invalid number of answers. Expected: 3, Received: 2");
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let answers = [answer("q1"), answer("q1")];
        let err = check_answer_set(&answers, 2).unwrap_err();

        assert_eq!(err, PolicyViolation::DuplicateAnswer { question_id: "q1".to_string() });
    }

    #[test]
    fn exact_answer_count_passes() {
        let answers = [answer("q1"), answer("q2"), answer("q3")];
        assert!(check_answer_set(&answers, 3).is_ok());
    }
}
