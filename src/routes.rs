// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, classes, quizzes, submissions},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public routes: registration and login.
/// * Everything else sits behind the bearer-token middleware, which
///   resolves the caller's capabilities. Services enforce the scoping.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                "Ignoring invalid CORS_ORIGIN '{}'",
                state.config.cors_origin
            );
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/logout", post(auth::logout))
        .route("/change-password", post(auth::change_password));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/users/professors", get(admin::list_professors))
        .route("/users/students", get(admin::list_students))
        .route(
            "/users/{id}",
            get(admin::get_user)
                .put(admin::update_user)
                .delete(admin::delete_user),
        )
        .route("/users/{id}/role", put(admin::update_role))
        .route("/users/{id}/active", put(admin::set_active))
        .route("/users/{id}/reset-password", post(admin::reset_password))
        .route("/audit-logs", get(admin::list_audit_logs));

    let class_routes = Router::new()
        .route("/", get(classes::list_classes).post(classes::create_class))
        .route("/enroll", post(classes::enroll))
        .route("/{id}", get(classes::get_class))
        .route("/{id}/students", get(classes::list_students))
        .route(
            "/{id}/students/{student_id}",
            delete(classes::remove_student),
        )
        .route(
            "/{id}/quizzes",
            get(classes::list_quizzes).post(classes::create_quiz),
        )
        .route("/{id}/results", get(classes::class_results));

    let quiz_routes = Router::new()
        .route("/{id}", get(quizzes::get_quiz).put(quizzes::update_quiz))
        .route("/{id}/activate", post(quizzes::activate))
        .route("/{id}/deactivate", post(quizzes::deactivate))
        .route("/{id}/questions", post(quizzes::add_question))
        .route("/{id}/start", post(quizzes::start))
        .route("/{id}/results", get(quizzes::quiz_results));

    let question_routes = Router::new().route("/{id}", delete(quizzes::delete_question));

    let submission_routes = Router::new()
        .route("/", get(submissions::list_own))
        .route("/{id}", get(submissions::get_submission))
        .route(
            "/{id}/answers/{question_id}",
            put(submissions::answer),
        )
        .route("/{id}/complete", post(submissions::complete));

    let protected = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .nest("/classes", class_routes)
        .nest("/quizzes", quiz_routes)
        .nest("/questions", question_routes)
        .nest("/submissions", submission_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .nest("/api", protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, QuizPolicy};
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::in_memory(Config {
            database_url: None,
            jwt_secret: "router-test".to_string(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            password_min_length: 6,
            quiz: QuizPolicy::default(),
        }))
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_token() {
        let response = app()
            .oneshot(Request::get("/api/classes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let response = app()
            .oneshot(
                Request::post("/api/quizzes/1/start")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
