// src/models/ai_settings.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'ai_settings' table.
/// Usually holds a single row with the question generator configuration.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AiSettings {
    pub id: i64,
    pub gemini_api_key: String,
    pub selected_model_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAiSettingsRequest {
    #[validate(length(min = 1, max = 255))]
    pub gemini_api_key: String,
    #[validate(length(min = 1, max = 100))]
    pub selected_model_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAiSettingsRequest {
    #[validate(length(min = 1, max = 255))]
    pub gemini_api_key: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub selected_model_name: Option<String>,
}
