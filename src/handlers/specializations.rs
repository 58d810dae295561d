// src/handlers/specializations.rs

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
    models::specialization::{Specialization, SpecializationRequest},
};

fn name_conflict(name: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict(format!("Specialization '{}' already exists", name))
        }
        other => other,
    }
}

fn checked_name(payload: &SpecializationRequest) -> Result<&str, AppError> {
    payload.validate()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name cannot be blank".to_string()));
    }
    Ok(name)
}

/// Lists all specializations, alphabetically.
pub async fn list_specializations(
    State(pool): State<PgPool>,
) -> Result<impl IntoResponse, AppError> {
    let specializations =
        sqlx::query_as::<_, Specialization>("SELECT id, name FROM specializations ORDER BY name")
            .fetch_all(&pool)
            .await?;

    Ok(Json(specializations))
}

pub async fn get_specialization(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let specialization =
        sqlx::query_as::<_, Specialization>("SELECT id, name FROM specializations WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Specialization not found".to_string()))?;

    Ok(Json(specialization))
}

/// Creates a specialization. Names are unique.
pub async fn create_specialization(
    State(pool): State<PgPool>,
    Json(payload): Json<SpecializationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = checked_name(&payload)?;

    let specialization = sqlx::query_as::<_, Specialization>(
        "INSERT INTO specializations (name) VALUES ($1) RETURNING id, name",
    )
    .bind(name)
    .fetch_one(&pool)
    .await
    .map_err(name_conflict(name))?;

    Ok((StatusCode::CREATED, Json(specialization)))
}

/// Renames a specialization.
pub async fn update_specialization(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<SpecializationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = checked_name(&payload)?;

    let specialization = sqlx::query_as::<_, Specialization>(
        "UPDATE specializations SET name = $1 WHERE id = $2 RETURNING id, name",
    )
    .bind(name)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(name_conflict(name))?
    .ok_or(AppError::NotFound("Specialization not found".to_string()))?;

    Ok(Json(specialization))
}

/// Deletes a specialization.
/// Cascades to its questions, exam definitions and sessions.
pub async fn delete_specialization(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM specializations WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete specialization: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Specialization not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
