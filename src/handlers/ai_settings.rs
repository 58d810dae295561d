// src/handlers/ai_settings.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::ai_settings::{AiSettings, CreateAiSettingsRequest, UpdateAiSettingsRequest},
};

fn not_found() -> AppError {
    AppError::NotFound("AI settings not found".to_string())
}

/// Admin only.
pub async fn list_ai_settings(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let settings = sqlx::query_as::<_, AiSettings>(
        "SELECT id, gemini_api_key, selected_model_name FROM ai_settings ORDER BY id",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(settings))
}

/// Admin only.
pub async fn get_ai_settings(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let settings = sqlx::query_as::<_, AiSettings>(
        "SELECT id, gemini_api_key, selected_model_name FROM ai_settings WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(settings))
}

/// Admin only.
pub async fn create_ai_settings(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateAiSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = sqlx::query_as::<_, AiSettings>(
        r#"
        INSERT INTO ai_settings (gemini_api_key, selected_model_name)
        VALUES ($1, $2)
        RETURNING id, gemini_api_key, selected_model_name
        "#,
    )
    .bind(&payload.gemini_api_key)
    .bind(&payload.selected_model_name)
    .fetch_one(&pool)
    .await?;

    tracing::info!(settings_id = settings.id, model = %settings.selected_model_name, "AI settings created");

    Ok((StatusCode::CREATED, Json(settings)))
}

/// Admin only. Omitted fields keep their stored value.
pub async fn update_ai_settings(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAiSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let settings = sqlx::query_as::<_, AiSettings>(
        r#"
        UPDATE ai_settings
        SET gemini_api_key = COALESCE($1, gemini_api_key),
            selected_model_name = COALESCE($2, selected_model_name)
        WHERE id = $3
        RETURNING id, gemini_api_key, selected_model_name
        "#,
    )
    .bind(payload.gemini_api_key)
    .bind(payload.selected_model_name)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(settings))
}

/// Admin only.
pub async fn delete_ai_settings(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM ai_settings WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
