// src/handlers/questions.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{
        Attachment, AttachmentInput, Choice, ChoiceInput, CreateQuestionRequest, Question,
        QuestionDetail, QuestionListParams, UpdateQuestionRequest,
    },
    utils::sanitize::{clean_bounded, clean_html},
};

/// Length of `choices.text`.
const CHOICE_TEXT_MAX: usize = 255;

const QUESTION_COLUMNS: &str = "id, text, specialization_id, course_year, mark, is_ai_generated";

/// Loads the given questions with their choices and attachments, ordered by id.
/// Ids that do not exist are skipped.
pub(crate) async fn load_question_details(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<Vec<QuestionDetail>, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1) ORDER BY id"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    attach_nested(conn, questions).await
}

/// Fetches choices and attachments for a batch of questions in two queries.
async fn attach_nested(
    conn: &mut PgConnection,
    questions: Vec<Question>,
) -> Result<Vec<QuestionDetail>, AppError> {
    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();

    let choices = sqlx::query_as::<_, Choice>(
        "SELECT id, question_id, text, is_correct FROM choices WHERE question_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let attachments = sqlx::query_as::<_, Attachment>(
        r#"
        SELECT id, question_id, attachment_type, file, content, file_name
        FROM attachments
        WHERE question_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut choices_by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
    for choice in choices {
        choices_by_question.entry(choice.question_id).or_default().push(choice);
    }

    let mut attachments_by_question: HashMap<i64, Vec<Attachment>> = HashMap::new();
    for attachment in attachments {
        attachments_by_question.entry(attachment.question).or_default().push(attachment);
    }

    Ok(questions
        .into_iter()
        .map(|question| QuestionDetail {
            choices: choices_by_question.remove(&question.id).unwrap_or_default(),
            attachments: attachments_by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect())
}

async fn load_one(conn: &mut PgConnection, id: i64) -> Result<QuestionDetail, AppError> {
    load_question_details(conn, &[id])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Question not found".to_string()))
}

async fn insert_choice(
    conn: &mut PgConnection,
    question_id: i64,
    choice: &ChoiceInput,
) -> Result<(), AppError> {
    let text = clean_bounded(&choice.text, CHOICE_TEXT_MAX, "Choice text")?;

    sqlx::query("INSERT INTO choices (question_id, text, is_correct) VALUES ($1, $2, $3)")
        .bind(question_id)
        .bind(text)
        .bind(choice.is_correct)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_attachment(
    conn: &mut PgConnection,
    question_id: i64,
    attachment: &AttachmentInput,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO attachments (question_id, attachment_type, file, content, file_name)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(question_id)
    .bind(attachment.attachment_type.as_str())
    .bind(&attachment.file)
    .bind(&attachment.content)
    .bind(&attachment.file_name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Makes the stored choices match `choices`: entries with an id are edited,
/// the rest are inserted, and stored choices not mentioned are removed.
async fn sync_choices(
    conn: &mut PgConnection,
    question_id: i64,
    choices: &[ChoiceInput],
) -> Result<(), AppError> {
    let kept: Vec<i64> = choices.iter().filter_map(|c| c.id).collect();

    sqlx::query("DELETE FROM choices WHERE question_id = $1 AND NOT (id = ANY($2))")
        .bind(question_id)
        .bind(&kept)
        .execute(&mut *conn)
        .await?;

    for choice in choices {
        match choice.id {
            Some(choice_id) => {
                let text = clean_bounded(&choice.text, CHOICE_TEXT_MAX, "Choice text")?;
                let result = sqlx::query(
                    "UPDATE choices SET text = $1, is_correct = $2 WHERE id = $3 AND question_id = $4",
                )
                .bind(text)
                .bind(choice.is_correct)
                .bind(choice_id)
                .bind(question_id)
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::BadRequest(format!(
                        "Choice {} does not belong to this question",
                        choice_id
                    )));
                }
            }
            None => insert_choice(conn, question_id, choice).await?,
        }
    }

    Ok(())
}

/// Same as [`sync_choices`], for attachments.
async fn sync_attachments(
    conn: &mut PgConnection,
    question_id: i64,
    attachments: &[AttachmentInput],
) -> Result<(), AppError> {
    let kept: Vec<i64> = attachments.iter().filter_map(|a| a.id).collect();

    sqlx::query("DELETE FROM attachments WHERE question_id = $1 AND NOT (id = ANY($2))")
        .bind(question_id)
        .bind(&kept)
        .execute(&mut *conn)
        .await?;

    for attachment in attachments {
        match attachment.id {
            Some(attachment_id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE attachments
                    SET attachment_type = $1, file = $2, content = $3, file_name = $4
                    WHERE id = $5 AND question_id = $6
                    "#,
                )
                .bind(attachment.attachment_type.as_str())
                .bind(&attachment.file)
                .bind(&attachment.content)
                .bind(&attachment.file_name)
                .bind(attachment_id)
                .bind(question_id)
                .execute(&mut *conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::BadRequest(format!(
                        "Attachment {} does not belong to this question",
                        attachment_id
                    )));
                }
            }
            None => insert_attachment(conn, question_id, attachment).await?,
        }
    }

    Ok(())
}

/// Lists questions with their choices and attachments.
/// Optional filters: specialization, course_year, is_ai_generated.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let questions = sqlx::query_as::<_, Question>(&format!(
        r#"
        SELECT {QUESTION_COLUMNS}
        FROM questions
        WHERE ($1::BIGINT IS NULL OR specialization_id = $1)
          AND ($2::INT IS NULL OR course_year = $2)
          AND ($3::BOOLEAN IS NULL OR is_ai_generated = $3)
        ORDER BY id
        "#
    ))
    .bind(params.specialization)
    .bind(params.course_year)
    .bind(params.is_ai_generated)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(attach_nested(&mut conn, questions).await?))
}

/// Retrieves a single question by ID.
pub async fn get_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(Json(load_one(&mut conn, id).await?))
}

/// Creates a new question together with its choices and attachments.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (text, specialization_id, course_year, mark, is_ai_generated)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(clean_html(&payload.text))
    .bind(payload.specialization)
    .bind(payload.course_year)
    .bind(payload.mark)
    .bind(payload.is_ai_generated)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::BadRequest(_) => AppError::BadRequest("Specialization does not exist".to_string()),
        other => other,
    })?;

    for choice in &payload.choices {
        insert_choice(&mut tx, id, choice).await?;
    }

    for attachment in &payload.attachments {
        insert_attachment(&mut tx, id, attachment).await?;
    }

    let question = load_one(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(question_id = id, "question created");

    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question by ID.
/// A present `choices` or `attachments` list replaces the stored set.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");
    let mut touched = false;

    if let Some(text) = &payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(clean_html(text));
        touched = true;
    }

    if let Some(specialization) = payload.specialization {
        separated.push("specialization_id = ");
        separated.push_bind_unseparated(specialization);
        touched = true;
    }

    if let Some(course_year) = payload.course_year {
        separated.push("course_year = ");
        separated.push_bind_unseparated(course_year);
        touched = true;
    }

    if let Some(mark) = payload.mark {
        separated.push("mark = ");
        separated.push_bind_unseparated(mark);
        touched = true;
    }

    if let Some(is_ai_generated) = payload.is_ai_generated {
        separated.push("is_ai_generated = ");
        separated.push_bind_unseparated(is_ai_generated);
        touched = true;
    }

    let found = if touched {
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.build().execute(&mut *tx).await?.rows_affected() > 0
    } else {
        sqlx::query("SELECT id FROM questions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some()
    };

    if !found {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    if let Some(choices) = &payload.choices {
        sync_choices(&mut tx, id, choices).await?;
    }

    if let Some(attachments) = &payload.attachments {
        sync_attachments(&mut tx, id, attachments).await?;
    }

    let question = load_one(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(question))
}

/// Deletes a question by ID.
/// Choices, attachments, session links and answers go with it.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
