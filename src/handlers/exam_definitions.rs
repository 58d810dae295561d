// src/handlers/exam_definitions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::exam_definition::{
        CreateExamDefinitionRequest, ExamDefinition, ExamDefinitionListParams,
        UpdateExamDefinitionRequest,
    },
    utils::sanitize::clean_html,
};

pub(crate) const DEFINITION_COLUMNS: &str = "id, name, description, duration_minutes, \
    passing_grade_percent, specialization_id, created_at, show_result_immediately, \
    allow_retries, allow_navigate_back, allow_auto_grading";

fn missing_specialization(e: sqlx::Error) -> AppError {
    match AppError::from(e) {
        AppError::BadRequest(_) => AppError::BadRequest("Specialization does not exist".to_string()),
        other => other,
    }
}

/// Lists exam definitions, newest first.
/// Admin only.
pub async fn list_exam_definitions(
    State(pool): State<PgPool>,
    Query(params): Query<ExamDefinitionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let definitions = sqlx::query_as::<_, ExamDefinition>(&format!(
        r#"
        SELECT {DEFINITION_COLUMNS}
        FROM exam_definitions
        WHERE ($1::BIGINT IS NULL OR specialization_id = $1)
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(params.specialization)
    .fetch_all(&pool)
    .await?;

    Ok(Json(definitions))
}

async fn fetch_definition(pool: &PgPool, id: i64) -> Result<ExamDefinition, AppError> {
    sqlx::query_as::<_, ExamDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM exam_definitions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Exam definition not found".to_string()))
}

/// Admin only.
pub async fn get_exam_definition(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_definition(&pool, id).await?))
}

/// Creates an exam template.
/// Admin only.
pub async fn create_exam_definition(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateExamDefinitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let definition = sqlx::query_as::<_, ExamDefinition>(&format!(
        r#"
        INSERT INTO exam_definitions
        (name, description, duration_minutes, passing_grade_percent, specialization_id,
         show_result_immediately, allow_retries, allow_navigate_back, allow_auto_grading)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {DEFINITION_COLUMNS}
        "#
    ))
    .bind(&payload.name)
    .bind(clean_html(&payload.description))
    .bind(payload.duration_minutes)
    .bind(payload.passing_grade_percent)
    .bind(payload.specialization)
    .bind(payload.show_result_immediately)
    .bind(payload.allow_retries)
    .bind(payload.allow_navigate_back)
    .bind(payload.allow_auto_grading)
    .fetch_one(&pool)
    .await
    .map_err(missing_specialization)?;

    tracing::info!(definition_id = definition.id, "exam definition created");

    Ok((StatusCode::CREATED, Json(definition)))
}

/// Updates an exam template by ID.
/// Admin only.
pub async fn update_exam_definition(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamDefinitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.is_empty() {
        return Ok(Json(fetch_definition(&pool, id).await?));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exam_definitions SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(duration_minutes) = payload.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration_minutes);
    }

    if let Some(passing_grade_percent) = payload.passing_grade_percent {
        separated.push("passing_grade_percent = ");
        separated.push_bind_unseparated(passing_grade_percent);
    }

    if let Some(specialization) = payload.specialization {
        separated.push("specialization_id = ");
        separated.push_bind_unseparated(specialization);
    }

    if let Some(flag) = payload.show_result_immediately {
        separated.push("show_result_immediately = ");
        separated.push_bind_unseparated(flag);
    }

    if let Some(flag) = payload.allow_retries {
        separated.push("allow_retries = ");
        separated.push_bind_unseparated(flag);
    }

    if let Some(flag) = payload.allow_navigate_back {
        separated.push("allow_navigate_back = ");
        separated.push_bind_unseparated(flag);
    }

    if let Some(flag) = payload.allow_auto_grading {
        separated.push("allow_auto_grading = ");
        separated.push_bind_unseparated(flag);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {DEFINITION_COLUMNS}"));

    let definition = builder
        .build_query_as::<ExamDefinition>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update exam definition: {:?}", e);
            missing_specialization(e)
        })?
        .ok_or(AppError::NotFound("Exam definition not found".to_string()))?;

    Ok(Json(definition))
}

/// Deletes an exam template. Sessions recorded against it are removed too.
/// Admin only.
pub async fn delete_exam_definition(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exam_definitions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam definition not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
