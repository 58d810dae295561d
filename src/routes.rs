// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    access::{Resource, access_middleware},
    handlers::{
        ai_settings, auth, exam_definitions, exam_sessions, questions, specializations, users,
    },
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Frontend dev server origins allowed by CORS.
const ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Gates a resource router with the access table for `resource`.
fn guarded(resource: Resource, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(resource, access_middleware))
}

/// Assembles the main application router.
///
/// * Token endpoints (`/api/token`, `/api/token/refresh`) are public.
/// * Every resource collection requires an access token (`auth_middleware`)
///   and then passes the access table (`access_middleware`).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let token_routes = Router::new()
        .route("/", post(auth::obtain_token))
        .route("/refresh", post(auth::refresh_token));

    let user_routes = guarded(
        Resource::Users,
        Router::new()
            .route("/", get(users::list_users).post(users::create_user))
            .route(
                "/{id}",
                get(users::get_user)
                    .put(users::update_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
            ),
    );

    let specialization_routes = guarded(
        Resource::Specializations,
        Router::new()
            .route(
                "/",
                get(specializations::list_specializations)
                    .post(specializations::create_specialization),
            )
            .route(
                "/{id}",
                get(specializations::get_specialization)
                    .put(specializations::update_specialization)
                    .patch(specializations::update_specialization)
                    .delete(specializations::delete_specialization),
            ),
    );

    let question_routes = guarded(
        Resource::Questions,
        Router::new()
            .route(
                "/",
                get(questions::list_questions).post(questions::create_question),
            )
            .route(
                "/{id}",
                get(questions::get_question)
                    .put(questions::update_question)
                    .patch(questions::update_question)
                    .delete(questions::delete_question),
            ),
    );

    let exam_definition_routes = guarded(
        Resource::ExamDefinitions,
        Router::new()
            .route(
                "/",
                get(exam_definitions::list_exam_definitions)
                    .post(exam_definitions::create_exam_definition),
            )
            .route(
                "/{id}",
                get(exam_definitions::get_exam_definition)
                    .put(exam_definitions::update_exam_definition)
                    .patch(exam_definitions::update_exam_definition)
                    .delete(exam_definitions::delete_exam_definition),
            ),
    );

    let exam_session_routes = guarded(
        Resource::ExamSessions,
        Router::new()
            .route(
                "/",
                get(exam_sessions::list_exam_sessions).post(exam_sessions::create_exam_session),
            )
            .route(
                "/{id}",
                get(exam_sessions::get_exam_session)
                    .put(exam_sessions::update_exam_session)
                    .patch(exam_sessions::update_exam_session)
                    .delete(exam_sessions::delete_exam_session),
            ),
    );

    let ai_settings_routes = guarded(
        Resource::AiSettings,
        Router::new()
            .route(
                "/",
                get(ai_settings::list_ai_settings).post(ai_settings::create_ai_settings),
            )
            .route(
                "/{id}",
                get(ai_settings::get_ai_settings)
                    .put(ai_settings::update_ai_settings)
                    .patch(ai_settings::update_ai_settings)
                    .delete(ai_settings::delete_ai_settings),
            ),
    );

    // Authentication runs before every access check. Token routes are
    // nested after the layer so they stay public.
    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/specializations", specialization_routes)
        .nest("/questions", question_routes)
        .nest("/exam-definitions", exam_definition_routes)
        .nest("/exam-sessions", exam_session_routes)
        .nest("/ai-settings", ai_settings_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .nest("/token", token_routes);

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
