// src/models/specialization.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'specializations' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Specialization {
    pub id: i64,

    /// Unique track name (e.g., "Computer Science").
    pub name: String,
}

/// DTO for creating or renaming a specialization.
#[derive(Debug, Deserialize, Validate)]
pub struct SpecializationRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 characters."))]
    pub name: String,
}
