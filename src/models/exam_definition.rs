// src/models/exam_definition.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exam_definitions' table: an admin-authored exam template.
///
/// Field names on the wire are camelCase, the way the admin dashboard
/// has always consumed them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    pub passing_grade_percent: i32,

    #[sqlx(rename = "specialization_id")]
    pub specialization: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub show_result_immediately: bool,
    pub allow_retries: bool,
    pub allow_navigate_back: bool,
    pub allow_auto_grading: bool,
}

fn default_true() -> bool {
    true
}

/// DTO for creating an exam definition. Behavioral flags fall back to the
/// usual defaults when omitted.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamDefinitionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration_minutes: i32,
    #[validate(range(min = 0, max = 100, message = "Passing grade must be a percentage"))]
    pub passing_grade_percent: i32,
    pub specialization: i64,
    #[serde(default = "default_true")]
    pub show_result_immediately: bool,
    #[serde(default)]
    pub allow_retries: bool,
    #[serde(default = "default_true")]
    pub allow_navigate_back: bool,
    #[serde(default = "default_true")]
    pub allow_auto_grading: bool,
}

/// DTO for updating an exam definition. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamDefinitionRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100, message = "Passing grade must be a percentage"))]
    pub passing_grade_percent: Option<i32>,
    pub specialization: Option<i64>,
    pub show_result_immediately: Option<bool>,
    pub allow_retries: Option<bool>,
    pub allow_navigate_back: Option<bool>,
    pub allow_auto_grading: Option<bool>,
}

impl UpdateExamDefinitionRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.duration_minutes.is_none()
            && self.passing_grade_percent.is_none()
            && self.specialization.is_none()
            && self.show_result_immediately.is_none()
            && self.allow_retries.is_none()
            && self.allow_navigate_back.is_none()
            && self.allow_auto_grading.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExamDefinitionListParams {
    pub specialization: Option<i64>,
}
