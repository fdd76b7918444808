//! Pure scoring of a submitted answer sheet against the exam's question set.
//! No persistence access; the caller loads questions and stores the result.

use std::collections::HashMap;

use crate::db::models::{Choice, Question};

#[derive(Debug, Clone)]
pub(crate) struct AnswerSelection {
    pub(crate) question_id: String,
    pub(crate) selected_choice_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionWithChoices {
    pub(crate) question: Question,
    pub(crate) choices: Vec<Choice>,
}

impl QuestionWithChoices {
    pub(crate) fn correct_choice_id(&self) -> Option<&str> {
        self.choices.iter().find(|choice| choice.is_correct).map(|choice| choice.id.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EvaluatedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_choice_id: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) mark: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct Evaluation {
    pub(crate) answers: Vec<EvaluatedAnswer>,
    pub(crate) total_score: i32,
    pub(crate) max_score: i32,
    pub(crate) percentage: f64,
}

/// Scores every submitted answer against its question's correct choice.
///
/// Answers referencing a question outside the provided set are skipped and
/// contribute to neither score nor max score (lenient policy). An answer
/// without a selected choice is always incorrect but its question still
/// counts toward the max score.
pub(crate) fn evaluate(
    answers: &[AnswerSelection],
    questions: &[QuestionWithChoices],
) -> Evaluation {
    let by_id: HashMap<&str, &QuestionWithChoices> =
        questions.iter().map(|entry| (entry.question.id.as_str(), entry)).collect();

    let mut evaluated = Vec::with_capacity(answers.len());
    let mut total_score = 0;
    let mut max_score = 0;

    for answer in answers {
        let Some(entry) = by_id.get(answer.question_id.as_str()) else {
            continue;
        };

        let is_correct = match (&answer.selected_choice_id, entry.correct_choice_id()) {
            (Some(selected), Some(correct)) => selected == correct,
            _ => false,
        };

        max_score += entry.question.mark;
        if is_correct {
            total_score += entry.question.mark;
        }

        evaluated.push(EvaluatedAnswer {
            question_id: answer.question_id.clone(),
            selected_choice_id: answer.selected_choice_id.clone(),
            is_correct,
            mark: entry.question.mark,
        });
    }

    let percentage =
        if max_score > 0 { f64::from(total_score) / f64::from(max_score) * 100.0 } else { 0.0 };

    Evaluation { answers: evaluated, total_score, max_score, percentage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::DifficultyLevel;
    use time::macros::datetime;

    fn question(id: &str, mark: i32, correct_choice: &str, wrong_choice: &str) -> QuestionWithChoices {
        QuestionWithChoices {
            question: Question {
                id: id.to_string(),
                course_id: "course-1".to_string(),
                instructor_id: "instructor-1".to_string(),
                title: format!("question {id}"),
                mark,
                difficulty: DifficultyLevel::Medium,
                is_deleted: false,
                created_at: datetime!(2025-01-01 09:00:00),
            },
            choices: vec![
                Choice {
                    id: correct_choice.to_string(),
                    question_id: id.to_string(),
                    text: "right".to_string(),
                    is_correct: true,
                    is_deleted: false,
                },
                Choice {
                    id: wrong_choice.to_string(),
                    question_id: id.to_string(),
                    text: "wrong".to_string(),
                    is_correct: false,
                    is_deleted: false,
                },
            ],
        }
    }

    fn answer(question_id: &str, choice_id: Option<&str>) -> AnswerSelection {
        AnswerSelection {
            question_id: question_id.to_string(),
            selected_choice_id: choice_id.map(str::to_string),
        }
    }

    #[test]
    fn correct_choice_earns_full_mark() {
        let questions = vec![question("q1", 5, "c1", "c2")];
        let result = evaluate(&[answer("q1", Some("c1"))], &questions);

        assert_eq!(result.total_score, 5);
        assert_eq!(result.max_score, 5);
        assert!(result.answers[0].is_correct);
    }

    #[test]
    fn wrong_choice_scores_zero_but_counts_toward_max() {
        let questions = vec![question("q1", 5, "c1", "c2")];
        let result = evaluate(&[answer("q1", Some("c2"))], &questions);

        assert_eq!(result.total_score, 0);
        assert_eq!(result.max_score, 5);
        assert!(!result.answers[0].is_correct);
    }

    #[test]
    fn missing_selection_is_incorrect() {
        let questions = vec![question("q1", 5, "c1", "c2")];
        let result = evaluate(&[answer("q1", None)], &questions);

        assert_eq!(result.total_score, 0);
        assert_eq!(result.max_score, 5);
        assert!(!result.answers[0].is_correct);
    }

    #[test]
    fn unknown_question_is_skipped_entirely() {
        let questions = vec![question("q1", 5, "c1", "c2")];
        let result =
            evaluate(&[answer("q1", Some("c1")), answer("q-unknown", Some("c9"))], &questions);

        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.total_score, 5);
        assert_eq!(result.max_score, 5);
    }

    #[test]
    fn percentage_at_passing_boundary() {
        let questions = vec![
            question("q1", 7, "a1", "a2"),
            question("q2", 3, "b1", "b2"),
        ];
        let result = evaluate(&[answer("q1", Some("a1")), answer("q2", Some("b2"))], &questions);

        assert_eq!(result.total_score, 7);
        assert_eq!(result.max_score, 10);
        assert!((result.percentage - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_inputs_yield_zero_percentage() {
        let result = evaluate(&[], &[]);

        assert_eq!(result.total_score, 0);
        assert_eq!(result.max_score, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let questions = vec![
            question("q1", 4, "a1", "a2"),
            question("q2", 6, "b1", "b2"),
        ];
        let answers = [answer("q1", Some("a2")), answer("q2", Some("b1"))];

        let first = evaluate(&answers, &questions);
        let second = evaluate(&answers, &questions);

        assert_eq!(first.total_score, second.total_score);
        assert_eq!(first.max_score, second.max_score);
        assert_eq!(first.percentage, second.percentage);
    }
}
