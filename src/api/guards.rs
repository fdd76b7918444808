use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Exam, User};
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentInstructor(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentInstructor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Instructor {
            Ok(CurrentInstructor(user))
        } else {
            Err(ApiError::Forbidden("Instructor access required"))
        }
    }
}

/// Loads the exam and checks that the caller owns it. Every exam mutation
/// re-derives ownership from storage instead of trusting the request.
pub(crate) async fn require_exam_owner(
    state: &AppState,
    user: &User,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    if exam.instructor_id != user.id {
        return Err(ApiError::Forbidden("You do not own this exam"));
    }

    Ok(exam)
}

pub(crate) async fn require_course_owner(
    state: &AppState,
    user: &User,
    course_id: &str,
) -> Result<(), ApiError> {
    let course = repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    if course.instructor_id != user.id {
        return Err(ApiError::Forbidden("You do not own this course"));
    }

    Ok(())
}

pub(crate) async fn require_exam_assignment(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> Result<(), ApiError> {
    let assigned = repositories::enrollments::is_assigned_to_exam(state.db(), exam_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check exam assignment"))?;

    if assigned {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You are not enrolled in this exam"))
    }
}

pub(crate) async fn require_course_enrollment(
    state: &AppState,
    course_id: &str,
    student_id: &str,
) -> Result<(), ApiError> {
    let enrolled =
        repositories::enrollments::is_enrolled_in_course(state.db(), course_id, student_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check course enrollment"))?;

    if enrolled {
        Ok(())
    } else {
        Err(ApiError::Forbidden("You are not enrolled in this course"))
    }
}
