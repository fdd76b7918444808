use serde::Serialize;

use crate::db::types::DifficultyLevel;
use crate::services::evaluator::QuestionWithChoices;

/// A choice as shown to a student taking an exam. The correctness flag is
/// deliberately absent from this shape.
#[derive(Debug, Serialize)]
pub(crate) struct ChoicePublic {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionPublic {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) mark: i32,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) choices: Vec<ChoicePublic>,
}

impl From<QuestionWithChoices> for QuestionPublic {
    fn from(entry: QuestionWithChoices) -> Self {
        QuestionPublic {
            id: entry.question.id,
            title: entry.question.title,
            mark: entry.question.mark,
            difficulty: entry.question.difficulty,
            choices: entry
                .choices
                .into_iter()
                .map(|choice| ChoicePublic { id: choice.id, text: choice.text })
                .collect(),
        }
    }
}
