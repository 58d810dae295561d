// src/models/exam_session.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    exam_definition::ExamDefinition, question::QuestionDetail, specialization::Specialization,
    user::User,
};

/// Represents the 'exam_sessions' table.
/// One student's attempt, with the score recorded as given by the client.
#[derive(Debug, Clone, FromRow)]
pub struct ExamSession {
    pub id: i64,
    pub student_id: i64,
    pub exam_definition_id: Option<i64>,
    pub specialization_id: i64,
    pub exam_name: String,
    pub score: i32,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'student_answers' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentAnswer {
    pub id: i64,
    #[sqlx(rename = "exam_session_id")]
    pub exam_session: i64,
    #[sqlx(rename = "question_id")]
    pub question: i64,
    #[sqlx(rename = "selected_choice_id")]
    pub selected_choice: Option<i64>,
}

/// Fully expanded session, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ExamSessionDetail {
    pub id: i64,
    pub student: User,
    pub admin_exam_definition: Option<ExamDefinition>,
    pub specialization: Specialization,
    pub exam_name: String,
    pub score: i32,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<QuestionDetail>,
    pub answers: Vec<StudentAnswer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    pub question: i64,
    pub selected_choice: Option<i64>,
}

/// DTO for recording an exam attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamSessionRequest {
    /// Subject of the session. Only honored for admins; everyone else
    /// records sessions for themselves.
    pub student: Option<i64>,
    pub admin_exam_definition: Option<i64>,
    pub specialization: i64,
    #[validate(length(min = 1, max = 255))]
    pub exam_name: String,
    pub score: i32,
    #[serde(default)]
    pub questions: Vec<i64>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

/// DTO for updating a session. A present `questions` or `answers` list
/// replaces the stored set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExamSessionRequest {
    #[validate(length(min = 1, max = 255))]
    pub exam_name: Option<String>,
    pub score: Option<i32>,
    pub questions: Option<Vec<i64>>,
    pub answers: Option<Vec<AnswerInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExamSessionListParams {
    pub specialization: Option<i64>,
}
