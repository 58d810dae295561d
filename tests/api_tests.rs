// tests/api_tests.rs
//
// End-to-end tests against a real Postgres. They need DATABASE_URL and
// return early when it is not set.

use exam_backend::{
    config::Config, routes, state::AppState, utils::hash::hash_password,
};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::net::SocketAddr;

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

/// Spawns the app on a random port for testing.
/// Returns `None` when no database is configured.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        jwt_refresh_expiration: 1200,
        rust_log: "error".to_string(),
        server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        admin_username: None,
        admin_password: None,
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    })
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Inserts a user directly and returns its id.
    async fn insert_user(&self, username: &str, role: &str) -> i64 {
        let hashed = hash_password("password123").unwrap();
        sqlx::query_scalar("INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id")
            .bind(username)
            .bind(hashed)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn login(&self, username: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/token"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }

    /// Creates a user with `role` and returns (id, access token).
    async fn user_with_token(&self, role: &str) -> (i64, String) {
        let username = unique(role);
        let id = self.insert_user(&username, role).await;
        let tokens = self.login(&username).await;
        (id, tokens["access"].as_str().unwrap().to_string())
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn patch(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates a question with two choices (the first one correct) and a code attachment.
    async fn create_question(&self, admin: &str, specialization: i64) -> Value {
        let response = self
            .post(
                "/api/questions",
                admin,
                json!({
                    "text": unique("question"),
                    "specialization": specialization,
                    "course_year": 1,
                    "mark": 2,
                    "choices": [
                        { "text": "right", "is_correct": true },
                        { "text": "wrong" }
                    ],
                    "attachments": [
                        { "attachment_type": "code", "content": "let x = 1;" }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    async fn create_specialization(&self, admin: &str) -> i64 {
        let response = self
            .post("/api/specializations", admin, json!({ "name": unique("spec") }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    async fn record_session(&self, token: &str, specialization: i64, student: Option<i64>) -> Value {
        let response = self
            .post(
                "/api/exam-sessions",
                token,
                json!({
                    "student": student,
                    "specialization": specialization,
                    "exam_name": "Midterm",
                    "score": 7,
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn unknown_path_is_404() {
    let Some(app) = spawn_app().await else { return };

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn token_pair_and_refresh() {
    let Some(app) = spawn_app().await else { return };
    let username = unique("student");
    app.insert_user(&username, "student").await;

    let tokens = app.login(&username).await;
    assert!(tokens["access"].is_string());
    let refresh = tokens["refresh"].as_str().unwrap();

    let response = app
        .client
        .post(app.url("/api/token/refresh"))
        .json(&json!({ "refresh": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let access = body["access"].as_str().unwrap();

    let response = app.get("/api/questions", access).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn bad_password_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let username = unique("student");
    app.insert_user(&username, "student").await;

    let response = app
        .client
        .post(app.url("/api/token"))
        .json(&json!({ "username": username, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_creates_user_with_hashed_password() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let username = unique("new");

    let response = app
        .post(
            "/api/users",
            &admin,
            json!({ "username": username, "password": "password123", "email": "new@example.com" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "student");
    assert!(body.get("password").is_none());

    let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_ne!(stored, "password123");

    // The new account can log in.
    app.login(&username).await;
}

#[tokio::test]
async fn invalid_username_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;

    let response = app
        .post(
            "/api/users",
            &admin,
            json!({ "username": "bad name!", "password": "password123" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_specialization_is_a_conflict() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let name = unique("spec");

    let first = app.post("/api/specializations", &admin, json!({ "name": name })).await;
    assert_eq!(first.status().as_u16(), 201);

    let second = app.post("/api/specializations", &admin, json!({ "name": name })).await;
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn question_delete_cascades_to_choices_and_attachments() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let specialization = app.create_specialization(&admin).await;

    let response = app
        .post(
            "/api/questions",
            &admin,
            json!({
                "text": "What does <b>ACID</b> stand for?",
                "specialization": specialization,
                "course_year": 2,
                "mark": 3,
                "choices": [
                    { "text": "Atomicity, Consistency, Isolation, Durability", "is_correct": true },
                    { "text": "Nothing" }
                ],
                "attachments": [
                    { "attachment_type": "code", "content": "BEGIN; COMMIT;" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let question: Value = response.json().await.unwrap();
    let id = question["id"].as_i64().unwrap();
    assert_eq!(question["choices"].as_array().unwrap().len(), 2);
    assert_eq!(question["attachments"][0]["attachment_type"], "code");

    let response = app
        .client
        .delete(app.url(&format!("/api/questions/{}", id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let choices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM choices WHERE question_id = $1")
        .bind(id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    let attachments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attachments WHERE question_id = $1")
            .bind(id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(choices, 0);
    assert_eq!(attachments, 0);
}

#[tokio::test]
async fn attachment_needs_exactly_one_body() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let specialization = app.create_specialization(&admin).await;

    let response = app
        .post(
            "/api/questions",
            &admin,
            json!({
                "text": "Q",
                "specialization": specialization,
                "course_year": 1,
                "mark": 1,
                "attachments": [{ "attachment_type": "image" }]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn exam_definition_uses_camel_case_and_defaults() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let specialization = app.create_specialization(&admin).await;

    let response = app
        .post(
            "/api/exam-definitions",
            &admin,
            json!({
                "name": "Final",
                "durationMinutes": 90,
                "passingGradePercent": 60,
                "specialization": specialization,
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["durationMinutes"], 90);
    assert_eq!(body["showResultImmediately"], true);
    assert_eq!(body["allowRetries"], false);
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn sessions_are_scoped_by_role() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (alice_id, alice) = app.user_with_token("student").await;
    let (bob_id, bob) = app.user_with_token("student").await;
    let specialization = app.create_specialization(&admin).await;

    let alice_session = app.record_session(&alice, specialization, None).await;
    assert_eq!(alice_session["student"]["id"], alice_id);
    let bob_session = app.record_session(&admin, specialization, Some(bob_id)).await;
    assert_eq!(bob_session["student"]["id"], bob_id);

    // Alice only sees her own sessions.
    let response = app.get("/api/exam-sessions", &alice).await;
    assert_eq!(response.status().as_u16(), 200);
    let listed: Vec<Value> = response.json().await.unwrap();
    assert!(!listed.is_empty());
    assert!(listed.iter().all(|s| s["student"]["id"] == alice_id));

    // Bob's session is invisible to Alice.
    let bob_path = format!("/api/exam-sessions/{}", bob_session["id"]);
    assert_eq!(app.get(&bob_path, &alice).await.status().as_u16(), 404);
    assert_eq!(app.get(&bob_path, &bob).await.status().as_u16(), 200);

    // The admin sees both.
    let listed: Vec<Value> = app.get("/api/exam-sessions", &admin).await.json().await.unwrap();
    let ids: Vec<&Value> = listed.iter().map(|s| &s["id"]).collect();
    assert!(ids.contains(&&alice_session["id"]));
    assert!(ids.contains(&&bob_session["id"]));
}

#[tokio::test]
async fn student_cannot_record_for_someone_else() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (_, alice) = app.user_with_token("student").await;
    let (bob_id, _) = app.user_with_token("student").await;
    let specialization = app.create_specialization(&admin).await;

    let response = app
        .post(
            "/api/exam-sessions",
            &alice,
            json!({
                "student": bob_id,
                "specialization": specialization,
                "exam_name": "Midterm",
                "score": 10,
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_cannot_delete_itself() {
    let Some(app) = spawn_app().await else { return };
    let (admin_id, admin) = app.user_with_token("admin").await;

    let response = app
        .client
        .delete(app.url(&format!("/api/users/{}", admin_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn choice_text_too_long_after_escaping_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let specialization = app.create_specialization(&admin).await;
    let text = unique("question");
    let choice = "1 < 2 & ".repeat(31) + "1 < 2 &";
    assert_eq!(choice.chars().count(), 255);

    let response = app
        .post(
            "/api/questions",
            &admin,
            json!({
                "text": text,
                "specialization": specialization,
                "course_year": 1,
                "mark": 1,
                "choices": [{ "text": choice, "is_correct": true }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE text = $1")
        .bind(&text)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);

    // Same limit when the choice arrives through an update.
    let question = app.create_question(&admin, specialization).await;
    let path = format!("/api/questions/{}", question["id"]);
    let response = app
        .patch(&path, &admin, json!({ "choices": [{ "text": choice }] }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn student_cannot_update_or_delete_another_students_session() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (_, alice) = app.user_with_token("student").await;
    let (_, bob) = app.user_with_token("student").await;
    let specialization = app.create_specialization(&admin).await;

    let session = app.record_session(&bob, specialization, None).await;
    let path = format!("/api/exam-sessions/{}", session["id"]);

    let response = app.patch(&path, &alice, json!({ "score": 100 })).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.delete(&path, &alice).await;
    assert_eq!(response.status().as_u16(), 404);

    // Untouched for the owner.
    let response = app.get(&path, &bob).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["score"], 7);

    let response = app.delete(&path, &bob).await;
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn question_update_replaces_choices_and_attachments() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let specialization = app.create_specialization(&admin).await;

    let question = app.create_question(&admin, specialization).await;
    let other = app.create_question(&admin, specialization).await;
    let path = format!("/api/questions/{}", question["id"]);
    let kept_choice = question["choices"][0]["id"].as_i64().unwrap();

    let response = app
        .patch(
            &path,
            &admin,
            json!({
                "mark": 5,
                "choices": [
                    { "id": kept_choice, "text": "edited", "is_correct": false },
                    { "text": "added", "is_correct": true }
                ],
                "attachments": []
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["mark"], 5);
    let choices = body["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 2);
    assert_eq!(choices[0]["id"], kept_choice);
    assert_eq!(choices[0]["text"], "edited");
    assert_eq!(choices[1]["text"], "added");
    assert!(body["attachments"].as_array().unwrap().is_empty());

    // A choice id from another question is refused and nothing changes.
    let foreign_choice = other["choices"][0]["id"].as_i64().unwrap();
    let response = app
        .patch(
            &path,
            &admin,
            json!({ "mark": 9, "choices": [{ "id": foreign_choice, "text": "stolen" }] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let body: Value = app.get(&path, &admin).await.json().await.unwrap();
    assert_eq!(body["mark"], 5);
    assert_eq!(body["choices"].as_array().unwrap().len(), 2);

    let other_body: Value = app
        .get(&format!("/api/questions/{}", other["id"]), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(other_body["choices"][0]["text"], "right");
}

#[tokio::test]
async fn answer_must_pick_a_choice_of_its_question() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (_, student) = app.user_with_token("student").await;
    let specialization = app.create_specialization(&admin).await;
    let first = app.create_question(&admin, specialization).await;
    let second = app.create_question(&admin, specialization).await;

    let response = app
        .post(
            "/api/exam-sessions",
            &student,
            json!({
                "specialization": specialization,
                "exam_name": "Quiz",
                "score": 0,
                "questions": [first["id"]],
                "answers": [
                    { "question": first["id"], "selected_choice": second["choices"][0]["id"] }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(
            "/api/exam-sessions",
            &student,
            json!({
                "specialization": specialization,
                "exam_name": "Quiz",
                "score": 2,
                "questions": [first["id"]],
                "answers": [
                    { "question": first["id"], "selected_choice": first["choices"][0]["id"] }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["answers"].as_array().unwrap().len(), 1);
    assert_eq!(body["answers"][0]["selected_choice"], first["choices"][0]["id"]);
}

#[tokio::test]
async fn session_update_replaces_questions_and_answers() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (_, student) = app.user_with_token("student").await;
    let specialization = app.create_specialization(&admin).await;
    let first = app.create_question(&admin, specialization).await;
    let second = app.create_question(&admin, specialization).await;

    let session = app.record_session(&student, specialization, None).await;
    let path = format!("/api/exam-sessions/{}", session["id"]);

    let response = app
        .patch(
            &path,
            &student,
            json!({
                "exam_name": "Retake",
                "score": 9,
                "questions": [first["id"], second["id"], first["id"]],
                "answers": [
                    { "question": second["id"], "selected_choice": second["choices"][1]["id"] },
                    { "question": first["id"], "selected_choice": null }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["exam_name"], "Retake");
    assert_eq!(body["score"], 9);
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);
    assert_eq!(body["answers"].as_array().unwrap().len(), 2);

    // A bad answer rolls the whole update back.
    let response = app
        .patch(
            &path,
            &student,
            json!({
                "score": 1,
                "answers": [
                    { "question": first["id"], "selected_choice": second["choices"][0]["id"] }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let body: Value = app.get(&path, &student).await.json().await.unwrap();
    assert_eq!(body["score"], 9);
    assert_eq!(body["answers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_update_rejects_invalid_username() {
    let Some(app) = spawn_app().await else { return };
    let (_, admin) = app.user_with_token("admin").await;
    let (student_id, _) = app.user_with_token("student").await;

    let response = app
        .patch(
            &format!("/api/users/{}", student_id),
            &admin,
            json!({ "username": "bad name!" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}
