// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    access::Identity,
    error::AppError,
    models::user::{CreateUserRequest, UpdateUserRequest, User, validate_assignable_role},
    utils::hash::hash_password,
};

const USER_COLUMNS: &str =
    "id, username, password, email, first_name, last_name, role, created_at";

fn username_conflict(username: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict(format!("Username '{}' already exists", username))
        }
        other => other,
    }
}

pub(crate) async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

/// Retrieves a single user.
/// Admin only.
pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_user(&pool, id).await?))
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let role = payload.role.as_deref().unwrap_or("student");
    validate_assignable_role(role)
        .map_err(|_| AppError::BadRequest(format!("Invalid role '{}'", role)))?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, password, email, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&payload.username)
    .bind(hashed_password)
    .bind(payload.email.unwrap_or_default())
    .bind(payload.first_name.unwrap_or_default())
    .bind(payload.last_name.unwrap_or_default())
    .bind(role)
    .fetch_one(&pool)
    .await
    .map_err(username_conflict(&payload.username))?;

    tracing::info!(user_id = user.id, role = %user.role, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    let mut touched = false;

    if let Some(username) = &payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username.clone());
        touched = true;
    }

    if let Some(role) = payload.role {
        validate_assignable_role(&role)
            .map_err(|_| AppError::BadRequest(format!("Invalid role '{}'", role)))?;
        separated.push("role = ");
        separated.push_bind_unseparated(role);
        touched = true;
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
        touched = true;
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
        touched = true;
    }

    if let Some(first_name) = payload.first_name {
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
        touched = true;
    }

    if let Some(last_name) = payload.last_name {
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
        touched = true;
    }

    if !touched {
        return Ok(Json(fetch_user(&pool, id).await?));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let username = payload.username.unwrap_or_default();
    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(username_conflict(&username))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == identity.user_id {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
