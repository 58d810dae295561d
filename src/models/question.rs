// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use url::Url;
use validator::{Validate, ValidationError};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub text: String,

    #[sqlx(rename = "specialization_id")]
    pub specialization: i64,

    pub course_year: i32,

    /// Points awarded for this question.
    pub mark: i32,

    pub is_ai_generated: bool,
}

/// Represents the 'choices' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    #[serde(skip)]
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// Kind of material attached to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Image,
    Code,
    Diagram,
    Text,
}

impl AttachmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentType::Image => "image",
            AttachmentType::Code => "code",
            AttachmentType::Diagram => "diagram",
            AttachmentType::Text => "text",
        }
    }
}

impl TryFrom<String> for AttachmentType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "image" => Ok(AttachmentType::Image),
            "code" => Ok(AttachmentType::Code),
            "diagram" => Ok(AttachmentType::Diagram),
            "text" => Ok(AttachmentType::Text),
            other => Err(format!("unknown attachment type '{}'", other)),
        }
    }
}

/// Represents the 'attachments' table.
/// Carries either a file reference or inline content, never both.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    #[sqlx(rename = "question_id")]
    pub question: i64,
    #[sqlx(try_from = "String")]
    pub attachment_type: AttachmentType,
    pub file: Option<String>,
    pub content: Option<String>,
    pub file_name: Option<String>,
}

/// A question together with its choices and attachments, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
    pub attachments: Vec<Attachment>,
}

/// A choice as sent by clients. On update, an `id` keeps and edits an
/// existing choice; entries without one are added.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChoiceInput {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_attachment_body))]
pub struct AttachmentInput {
    pub id: Option<i64>,
    pub attachment_type: AttachmentType,
    #[validate(length(min = 1, max = 500))]
    pub file: Option<String>,
    #[validate(length(min = 1, max = 100000))]
    pub content: Option<String>,
    #[validate(length(max = 255))]
    pub file_name: Option<String>,
}

/// DTO for creating a new question with its nested choices and attachments.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,
    pub specialization: i64,
    #[validate(range(min = 1, message = "Course year must be positive"))]
    pub course_year: i32,
    #[validate(range(min = 1, message = "Mark must be positive"))]
    pub mark: i32,
    #[serde(default)]
    pub is_ai_generated: bool,
    #[serde(default)]
    #[validate(nested)]
    pub choices: Vec<ChoiceInput>,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentInput>,
}

/// DTO for updating a question. Fields are optional.
/// A present `choices` or `attachments` list replaces the stored set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: Option<String>,
    pub specialization: Option<i64>,
    #[validate(range(min = 1, message = "Course year must be positive"))]
    pub course_year: Option<i32>,
    #[validate(range(min = 1, message = "Mark must be positive"))]
    pub mark: Option<i32>,
    pub is_ai_generated: Option<bool>,
    #[validate(nested)]
    pub choices: Option<Vec<ChoiceInput>>,
    #[validate(nested)]
    pub attachments: Option<Vec<AttachmentInput>>,
}

/// Query parameters for listing questions.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionListParams {
    pub specialization: Option<i64>,
    pub course_year: Option<i32>,
    pub is_ai_generated: Option<bool>,
}

/// Exactly one of `file` / `content` must be present.
/// Absolute file references must parse as URLs.
fn validate_attachment_body(input: &AttachmentInput) -> Result<(), ValidationError> {
    match (&input.file, &input.content) {
        (Some(file), None) => {
            if file.contains("://") && Url::parse(file).is_err() {
                return Err(ValidationError::new("invalid_file_url"));
            }
            Ok(())
        }
        (None, Some(_)) => Ok(()),
        (Some(_), Some(_)) => Err(ValidationError::new("file_and_content_are_exclusive")),
        (None, None) => Err(ValidationError::new("file_or_content_required")),
    }
}
