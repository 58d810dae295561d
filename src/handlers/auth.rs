// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RefreshRequest, User},
    utils::{
        hash::verify_password,
        jwt::{TokenType, sign_jwt, verify_jwt},
    },
};

/// Authenticates a user and returns an access/refresh token pair.
///
/// Verifies the username and password against the database.
/// Both tokens carry the user's ID and role.
pub async fn obtain_token(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, email, first_name, last_name, role, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Same message for unknown users and bad passwords.
    let user = user.ok_or(AppError::AuthError("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }

    let access = sign_jwt(
        user.id,
        &user.role,
        TokenType::Access,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;
    let refresh = sign_jwt(
        user.id,
        &user.role,
        TokenType::Refresh,
        &config.jwt_secret,
        config.jwt_refresh_expiration,
    )?;

    tracing::info!(user_id = user.id, "issued token pair");

    Ok(Json(json!({
        "access": access,
        "refresh": refresh,
    })))
}

/// Exchanges a refresh token for a new access token.
///
/// The role is re-read from the database so that role changes and
/// deleted accounts take effect at the next refresh.
pub async fn refresh_token(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = verify_jwt(&payload.refresh, &config.jwt_secret, TokenType::Refresh)?;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::AuthError("User no longer exists".to_string()))?;

    let access = sign_jwt(
        user_id,
        &role,
        TokenType::Access,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({ "access": access })))
}
