// src/handlers/exam_sessions.rs

use std::collections::{BTreeSet, HashMap};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    access::{Identity, SessionScope},
    error::AppError,
    handlers::{exam_definitions::DEFINITION_COLUMNS, questions::load_question_details},
    models::{
        exam_definition::ExamDefinition,
        exam_session::{
            AnswerInput, CreateExamSessionRequest, ExamSession, ExamSessionDetail,
            ExamSessionListParams, StudentAnswer, UpdateExamSessionRequest,
        },
        specialization::Specialization,
        user::User,
    },
};

const SESSION_COLUMNS: &str =
    "id, student_id, exam_definition_id, specialization_id, exam_name, score, completed_at";

fn session_not_found() -> AppError {
    AppError::NotFound("Exam session not found".to_string())
}

/// Expands sessions into their client shape with a fixed number of queries,
/// whatever the number of sessions.
async fn expand_sessions(
    conn: &mut PgConnection,
    sessions: Vec<ExamSession>,
) -> Result<Vec<ExamSessionDetail>, AppError> {
    if sessions.is_empty() {
        return Ok(Vec::new());
    }

    let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let student_ids: Vec<i64> = sessions.iter().map(|s| s.student_id).collect();
    let specialization_ids: Vec<i64> = sessions.iter().map(|s| s.specialization_id).collect();
    let definition_ids: Vec<i64> = sessions.iter().filter_map(|s| s.exam_definition_id).collect();

    let students: HashMap<i64, User> = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, email, first_name, last_name, role, created_at
        FROM users
        WHERE id = ANY($1)
        "#,
    )
    .bind(&student_ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|u| (u.id, u))
    .collect();

    let specializations: HashMap<i64, Specialization> =
        sqlx::query_as::<_, Specialization>("SELECT id, name FROM specializations WHERE id = ANY($1)")
            .bind(&specialization_ids)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

    let definitions: HashMap<i64, ExamDefinition> = sqlx::query_as::<_, ExamDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM exam_definitions WHERE id = ANY($1)"
    ))
    .bind(&definition_ids)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|d| (d.id, d))
    .collect();

    let links: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT exam_session_id, question_id
        FROM exam_session_questions
        WHERE exam_session_id = ANY($1)
        ORDER BY question_id
        "#,
    )
    .bind(&session_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut answers_by_session: HashMap<i64, Vec<StudentAnswer>> = HashMap::new();
    let answers = sqlx::query_as::<_, StudentAnswer>(
        r#"
        SELECT id, exam_session_id, question_id, selected_choice_id
        FROM student_answers
        WHERE exam_session_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(&session_ids)
    .fetch_all(&mut *conn)
    .await?;
    for answer in answers {
        answers_by_session.entry(answer.exam_session).or_default().push(answer);
    }

    let question_ids: Vec<i64> = links
        .iter()
        .map(|(_, question_id)| *question_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let questions: HashMap<i64, _> = load_question_details(conn, &question_ids)
        .await?
        .into_iter()
        .map(|q| (q.question.id, q))
        .collect();

    let mut questions_by_session: HashMap<i64, Vec<_>> = HashMap::new();
    for (session_id, question_id) in links {
        if let Some(question) = questions.get(&question_id) {
            questions_by_session.entry(session_id).or_default().push(question.clone());
        }
    }

    sessions
        .into_iter()
        .map(|session| {
            let student = students.get(&session.student_id).cloned().ok_or_else(|| {
                AppError::InternalServerError(format!("Session {} has no student", session.id))
            })?;
            let specialization =
                specializations.get(&session.specialization_id).cloned().ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "Session {} has no specialization",
                        session.id
                    ))
                })?;

            Ok(ExamSessionDetail {
                id: session.id,
                student,
                admin_exam_definition: session
                    .exam_definition_id
                    .and_then(|id| definitions.get(&id).cloned()),
                specialization,
                exam_name: session.exam_name,
                score: session.score,
                completed_at: session.completed_at,
                questions: questions_by_session.remove(&session.id).unwrap_or_default(),
                answers: answers_by_session.remove(&session.id).unwrap_or_default(),
            })
        })
        .collect()
}

/// Fetches one session if it is visible within `scope`.
/// Out-of-scope sessions are reported as missing.
async fn fetch_in_scope(
    conn: &mut PgConnection,
    id: i64,
    scope: SessionScope,
    lock: bool,
) -> Result<ExamSession, AppError> {
    if scope == SessionScope::Nothing {
        return Err(session_not_found());
    }

    let suffix = if lock { " FOR UPDATE" } else { "" };
    let session = sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE id = $1{suffix}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(session_not_found)?;

    if !scope.permits(session.student_id) {
        return Err(session_not_found());
    }

    Ok(session)
}

async fn expand_one(
    conn: &mut PgConnection,
    session: ExamSession,
) -> Result<ExamSessionDetail, AppError> {
    expand_sessions(conn, vec![session])
        .await?
        .pop()
        .ok_or_else(session_not_found)
}

async fn replace_questions(
    conn: &mut PgConnection,
    session_id: i64,
    question_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM exam_session_questions WHERE exam_session_id = $1")
        .bind(session_id)
        .execute(&mut *conn)
        .await?;

    let unique: Vec<i64> = question_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    sqlx::query(
        r#"
        INSERT INTO exam_session_questions (exam_session_id, question_id)
        SELECT $1, UNNEST($2::BIGINT[])
        "#,
    )
    .bind(session_id)
    .bind(&unique)
    .execute(&mut *conn)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::BadRequest(_) => AppError::BadRequest("Unknown question in session".to_string()),
        other => other,
    })?;

    Ok(())
}

/// Replaces the session's answers. A selected choice must belong to the
/// question it answers.
async fn replace_answers(
    conn: &mut PgConnection,
    session_id: i64,
    answers: &[AnswerInput],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM student_answers WHERE exam_session_id = $1")
        .bind(session_id)
        .execute(&mut *conn)
        .await?;

    for answer in answers {
        if let Some(choice_id) = answer.selected_choice {
            let owner: Option<i64> = sqlx::query_scalar("SELECT question_id FROM choices WHERE id = $1")
                .bind(choice_id)
                .fetch_optional(&mut *conn)
                .await?;

            if owner != Some(answer.question) {
                return Err(AppError::BadRequest(format!(
                    "Choice {} is not an option of question {}",
                    choice_id, answer.question
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO student_answers (exam_session_id, question_id, selected_choice_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_id)
        .bind(answer.question)
        .bind(answer.selected_choice)
        .execute(&mut *conn)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::BadRequest(_) => {
                AppError::BadRequest(format!("Question {} does not exist", answer.question))
            }
            other => other,
        })?;
    }

    Ok(())
}

/// Lists exam sessions visible to the caller.
///
/// * Admin: every session.
/// * Student: only sessions where they are the subject.
/// * Any other role: nothing.
pub async fn list_exam_sessions(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<ExamSessionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let scope = SessionScope::for_identity(&identity);
    if scope == SessionScope::Nothing {
        return Ok(Json(Vec::<ExamSessionDetail>::new()));
    }

    let mut conn = pool.acquire().await?;

    let sessions = sqlx::query_as::<_, ExamSession>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM exam_sessions
        WHERE ($1::BIGINT IS NULL OR student_id = $1)
          AND ($2::BIGINT IS NULL OR specialization_id = $2)
        ORDER BY completed_at DESC, id DESC
        "#
    ))
    .bind(scope.owner())
    .bind(params.specialization)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list exam sessions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(expand_sessions(&mut conn, sessions).await?))
}

/// Retrieves one session, if it is within the caller's scope.
pub async fn get_exam_session(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let scope = SessionScope::for_identity(&identity);
    if scope == SessionScope::Nothing {
        return Err(session_not_found());
    }

    let mut conn = pool.acquire().await?;
    let session = fetch_in_scope(&mut conn, id, scope, false).await?;
    Ok(Json(expand_one(&mut conn, session).await?))
}

/// Records an exam attempt with its questions and answers.
///
/// The subject is the caller; admins may record a session for any student.
pub async fn create_exam_session(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateExamSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let student_id = match payload.student {
        Some(student) if identity.is_admin() => student,
        Some(student) if student != identity.user_id => {
            return Err(AppError::Forbidden(
                "You may only record sessions for yourself".to_string(),
            ));
        }
        _ => identity.user_id,
    };

    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, ExamSession>(&format!(
        r#"
        INSERT INTO exam_sessions (student_id, exam_definition_id, specialization_id, exam_name, score)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(student_id)
    .bind(payload.admin_exam_definition)
    .bind(payload.specialization)
    .bind(&payload.exam_name)
    .bind(payload.score)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::BadRequest(_) => AppError::BadRequest(
            "Student, specialization or exam definition does not exist".to_string(),
        ),
        other => other,
    })?;

    replace_questions(&mut tx, session.id, &payload.questions).await?;
    replace_answers(&mut tx, session.id, &payload.answers).await?;

    let detail = expand_one(&mut tx, session).await?;
    tx.commit().await?;

    tracing::info!(session_id = detail.id, student_id, score = detail.score, "exam session recorded");

    Ok((StatusCode::CREATED, Json(detail)))
}

/// Updates a session within the caller's scope.
pub async fn update_exam_session(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let scope = SessionScope::for_identity(&identity);

    let mut tx = pool.begin().await?;
    let mut session = fetch_in_scope(&mut tx, id, scope, true).await?;

    if payload.exam_name.is_some() || payload.score.is_some() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE exam_sessions SET ");
        let mut separated = builder.separated(", ");

        if let Some(exam_name) = &payload.exam_name {
            separated.push("exam_name = ");
            separated.push_bind_unseparated(exam_name.clone());
        }

        if let Some(score) = payload.score {
            separated.push("score = ");
            separated.push_bind_unseparated(score);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {SESSION_COLUMNS}"));

        session = builder
            .build_query_as::<ExamSession>()
            .fetch_one(&mut *tx)
            .await?;
    }

    if let Some(questions) = &payload.questions {
        replace_questions(&mut tx, id, questions).await?;
    }

    if let Some(answers) = &payload.answers {
        replace_answers(&mut tx, id, answers).await?;
    }

    let detail = expand_one(&mut tx, session).await?;
    tx.commit().await?;

    Ok(Json(detail))
}

/// Deletes a session within the caller's scope, with its answers.
pub async fn delete_exam_session(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let scope = SessionScope::for_identity(&identity);
    if scope == SessionScope::Nothing {
        return Err(session_not_found());
    }

    let result = sqlx::query(
        "DELETE FROM exam_sessions WHERE id = $1 AND ($2::BIGINT IS NULL OR student_id = $2)",
    )
    .bind(id)
    .bind(scope.owner())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to delete exam session: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(session_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
