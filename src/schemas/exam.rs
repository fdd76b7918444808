use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::db::types::ExamType;
use crate::schemas::question::QuestionPublic;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(alias = "courseId")]
    pub(crate) course_id: String,
    #[serde(alias = "scheduledAt", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) scheduled_at: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(alias = "examType")]
    pub(crate) exam_type: ExamType,
    #[serde(alias = "passingPercentage")]
    #[validate(range(min = 0.0, max = 100.0, message = "passing_percentage must be within 0..=100"))]
    pub(crate) passing_percentage: f64,
    #[serde(alias = "questionsCount")]
    #[validate(range(min = 1, message = "questions_count must be positive"))]
    pub(crate) questions_count: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamQuestionIds {
    #[serde(alias = "questionIds")]
    #[validate(length(min = 1, message = "question_ids must not be empty"))]
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) instructor_id: String,
    pub(crate) title: String,
    pub(crate) scheduled_at: String,
    pub(crate) duration_minutes: i32,
    pub(crate) full_mark: i32,
    pub(crate) exam_type: ExamType,
    pub(crate) passing_percentage: f64,
    pub(crate) questions_count: i32,
    pub(crate) is_active: bool,
    pub(crate) is_automatic: bool,
    pub(crate) created_at: String,
    pub(crate) questions: Vec<QuestionPublic>,
}

impl ExamResponse {
    pub(crate) fn from_exam(exam: Exam, questions: Vec<QuestionPublic>) -> Self {
        ExamResponse {
            id: exam.id,
            course_id: exam.course_id,
            instructor_id: exam.instructor_id,
            title: exam.title,
            scheduled_at: format_primitive(exam.scheduled_at),
            duration_minutes: exam.duration_minutes,
            full_mark: exam.full_mark,
            exam_type: exam.exam_type,
            passing_percentage: exam.passing_percentage,
            questions_count: exam.questions_count,
            is_active: exam.is_active,
            is_automatic: exam.is_automatic,
            created_at: format_primitive(exam.created_at),
            questions,
        }
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Scheduling UIs often send local datetimes without a zone suffix.
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_create_accepts_camel_case_aliases() {
        let payload: ExamCreate = serde_json::from_str(
            r#"{
                "title": "Midterm",
                "courseId": "course-1",
                "scheduledAt": "2025-03-01T10:00:00Z",
                "durationMinutes": 60,
                "examType": "final",
                "passingPercentage": 70.0,
                "questionsCount": 10
            }"#,
        )
        .unwrap();

        assert_eq!(payload.course_id, "course-1");
        assert_eq!(payload.exam_type, ExamType::Final);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn exam_create_accepts_zoneless_datetime() {
        let payload: ExamCreate = serde_json::from_str(
            r#"{
                "title": "Quiz 1",
                "course_id": "course-1",
                "scheduled_at": "2025-03-01T10:00",
                "duration_minutes": 30,
                "exam_type": "quiz",
                "passing_percentage": 50.0,
                "questions_count": 5
            }"#,
        )
        .unwrap();

        assert_eq!(payload.scheduled_at.hour(), 10);
    }

    #[test]
    fn zero_duration_fails_validation() {
        let payload: ExamCreate = serde_json::from_str(
            r#"{
                "title": "Quiz 1",
                "course_id": "course-1",
                "scheduled_at": "2025-03-01T10:00:00Z",
                "duration_minutes": 0,
                "exam_type": "quiz",
                "passing_percentage": 50.0,
                "questions_count": 5
            }"#,
        )
        .unwrap();

        assert!(payload.validate().is_err());
    }
}
