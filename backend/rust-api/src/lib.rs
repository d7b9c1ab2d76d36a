use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1/sessions", sessions_routes(app_state.clone()))
        .nest(
            "/api/v1/question-sets",
            question_set_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::teacher_guard_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/questions",
            question_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::teacher_guard_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/evaluations",
            evaluation_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::teacher_guard_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/analytics",
            analytics_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn sessions_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Anyone holding the join code
    let public = Router::new()
        .route("/code/{code}", get(handlers::sessions::get_session_by_code))
        .route("/code/{code}/events", get(handlers::sse::session_events));

    let participant = Router::new()
        .route("/submit/{code}", post(handlers::student::submit_answer))
        .route("/questions/{code}", get(handlers::student::session_questions))
        .route("/join/{code}", post(handlers::student::join_session))
        .route(
            "/join-status/{code}/{student_id}",
            get(handlers::student::join_status),
        )
        .route("/student/all-active", get(handlers::student::active_sessions))
        .route(
            "/student/done/{session_id}",
            post(handlers::student::mark_session_done),
        )
        .route(
            "/student/activation-sessions",
            get(handlers::student::activation_sessions),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    let teacher = Router::new()
        .route(
            "/",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route(
            "/{id}",
            put(handlers::sessions::edit_session).delete(handlers::sessions::delete_session),
        )
        .route("/{id}/settings", put(handlers::sessions::update_settings))
        .route("/{id}/end", post(handlers::sessions::end_session))
        .route(
            "/{id}/reactivate",
            post(handlers::sessions::reactivate_session),
        )
        .route("/{id}/invite", post(handlers::sessions::invite_students))
        .route(
            "/review/{submission_id}",
            post(handlers::sessions::review_submission),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::teacher_guard_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public.merge(participant).merge(teacher)
}

fn question_set_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::question_sets::list_question_sets)
                .post(handlers::question_sets::create_question_set),
        )
        .route(
            "/{id}",
            put(handlers::question_sets::rename_question_set)
                .delete(handlers::question_sets::delete_question_set),
        )
        .route(
            "/{id}/questions",
            get(handlers::question_sets::list_questions)
                .post(handlers::question_sets::create_question),
        )
        .route(
            "/{id}/import/{source_id}",
            post(handlers::question_sets::import_questions),
        )
}

fn question_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{id}",
            get(handlers::question_sets::get_question)
                .put(handlers::question_sets::edit_question)
                .delete(handlers::question_sets::delete_question),
        )
        .route(
            "/{id}/complementary",
            delete(handlers::question_sets::remove_complementary_question),
        )
}

fn evaluation_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/{session_id}/{question_id}",
        get(handlers::evaluations::get_analysis).post(handlers::evaluations::evaluate_answer),
    )
}

fn analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/screen-time",
            post(handlers::analytics::record_screen_time),
        )
        .route("/weekly/{user_id}", get(handlers::analytics::weekly_study_days))
        .route(
            "/monthly-time/{user_id}",
            get(handlers::analytics::monthly_time_spent),
        )
        .route(
            "/evaluation/{student_id}",
            get(handlers::analytics::student_evaluation),
        )
}
