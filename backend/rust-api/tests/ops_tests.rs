use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tower::ServiceExt;

use classroom_api::{
    config::Config,
    create_router,
    services::{
        evaluation_service::ScriptedModel, notifier::BroadcastNotifier, store::MemoryStore,
        AppState,
    },
};

mod common;

#[tokio::test]
async fn test_health_reports_store_status() {
    let app = common::create_test_app();

    let (status, body) = app.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "classroom-api");
    assert_eq!(body["dependencies"]["store"]["status"], "healthy");
    assert!(body["dependencies"].get("redis").is_none());
}

#[tokio::test]
async fn test_metrics_closed_without_configured_credentials() {
    let app = common::create_test_app();

    let (status, _) = app.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_require_matching_basic_auth() {
    let config = Config {
        metrics_auth: Some("scraper:s3cret".to_string()),
        ..Config::for_tests()
    };
    let state = AppState::from_parts(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(BroadcastNotifier::default()),
        Arc::new(ScriptedModel::new(
            common::conceptual(0.9),
            common::evaluation(4.0),
        )),
    );
    let router = create_router(Arc::new(state));

    let request = |credentials: &str| {
        Request::builder()
            .uri("/metrics")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
            )
            .body(Body::empty())
            .unwrap()
    };

    let response = router
        .clone()
        .oneshot(request("scraper:wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router.oneshot(request("scraper:s3cret")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_event_stream_requires_existing_session() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let (_, code) = app.create_session(&teacher, &[&set_id]).await;

    let (status, _) = app
        .send("GET", "/api/v1/sessions/code/NOPE00/events", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The body never ends, so only the head is inspected.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/sessions/code/{}/events", code))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_responses_carry_trace_id() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-trace-id"));
    assert!(response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = common::create_test_app();
    let expired = classroom_api::middlewares::auth::JwtService::new(&app.config.jwt_secret)
        .generate_token(&classroom_api::middlewares::auth::JwtClaims::new(
            "student-1",
            "student",
            -3600,
        ))
        .unwrap();

    let (status, _) = app
        .send(
            "GET",
            "/api/v1/sessions/student/all-active",
            Some(&expired),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
