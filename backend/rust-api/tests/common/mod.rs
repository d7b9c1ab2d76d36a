#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use classroom_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService, ROLE_STUDENT, ROLE_TEACHER},
    models::evaluation::{AnswerEvaluation, AnswerKind, Classification},
    services::{
        evaluation_service::ScriptedModel, notifier::BroadcastNotifier, store::MemoryStore,
        AppState,
    },
};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub events: Arc<BroadcastNotifier>,
    pub model: Arc<ScriptedModel>,
    pub config: Config,
}

pub fn conceptual(confidence: f64) -> Classification {
    Classification {
        kind: AnswerKind::Conceptual,
        confidence,
    }
}

pub fn evaluation(score: f64) -> AnswerEvaluation {
    AnswerEvaluation {
        kind: AnswerKind::Conceptual,
        evaluation: "Covers the main idea but skips the mechanism.".to_string(),
        incorrect_answers: vec![],
        score,
        confidence: 0.85,
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with_model(ScriptedModel::new(conceptual(0.9), evaluation(4.0)))
}

pub fn create_test_app_with_model(model: ScriptedModel) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config::for_tests();
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(BroadcastNotifier::default());
    let model = Arc::new(model);

    let state = AppState::from_parts(
        config.clone(),
        store.clone(),
        events.clone(),
        model.clone(),
    );

    TestApp {
        router: create_router(Arc::new(state)),
        store,
        events,
        model,
        config,
    }
}

impl TestApp {
    pub fn token(&self, user_id: &str, role: &str) -> String {
        JwtService::new(&self.config.jwt_secret)
            .generate_token(&JwtClaims::new(user_id, role, 3600))
            .unwrap()
    }

    pub fn teacher_token(&self, teacher_id: &str) -> String {
        self.token(teacher_id, ROLE_TEACHER)
    }

    pub fn student_token(&self, student_id: &str) -> String {
        self.token(student_id, ROLE_STUDENT)
    }

    /// Sends one request and returns the status with the parsed JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn create_question_set(&self, teacher: &str, name: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/question-sets",
                Some(teacher),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["_id"].as_str().unwrap().to_string()
    }

    pub async fn add_question(&self, teacher: &str, set_id: &str, question: Value) -> String {
        let (status, body) = self
            .send(
                "POST",
                &format!("/api/v1/question-sets/{}/questions", set_id),
                Some(teacher),
                Some(question),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["_id"].as_str().unwrap().to_string()
    }

    /// Creates a session over `set_ids` and returns `(session_id, code)`.
    pub async fn create_session(&self, teacher: &str, set_ids: &[&str]) -> (String, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/sessions",
                Some(teacher),
                Some(json!({ "questionSets": set_ids })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["_id"].as_str().unwrap().to_string(),
            body["code"].as_str().unwrap().to_string(),
        )
    }

    pub async fn join(&self, student_token: &str, student_id: &str, code: &str) -> StatusCode {
        let (status, _) = self
            .send(
                "POST",
                &format!("/api/v1/sessions/join/{}", code),
                Some(student_token),
                Some(json!({ "studentId": student_id })),
            )
            .await;
        status
    }

    pub async fn submit(
        &self,
        student_token: &str,
        code: &str,
        student_id: &str,
        question_id: &str,
        answers: &[&str],
        is_activation: bool,
    ) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/api/v1/sessions/submit/{}", code),
            Some(student_token),
            Some(json!({
                "studentId": student_id,
                "questionId": question_id,
                "answers": answers,
                "isActivation": is_activation,
            })),
        )
        .await
    }
}

pub fn mcq(answer: &str, score: f64) -> Value {
    json!({
        "type": "MCQ",
        "question": "Pick one",
        "options": ["A", "B", "C", "D"],
        "answers": [answer],
        "score": score,
    })
}

/// MCQ whose complementary variant is a TRUE-OR-FALSE with answer "True".
pub fn mcq_with_recall(answer: &str, score: f64, repeat_limit: u32) -> Value {
    json!({
        "type": "MCQ",
        "question": "Which planet is largest?",
        "options": ["A", "B", "C", "D"],
        "answers": [answer],
        "score": score,
        "activateImmediately": true,
        "activationRepeatCountLimit": repeat_limit,
        "hasComplementaryQuestion": true,
        "complementaryQuestion": {
            "type": "TRUE-OR-FALSE",
            "question": "Jupiter is the largest planet.",
            "options": ["True", "False"],
            "answers": ["True"],
            "score": 2,
        },
    })
}

pub fn free_text(score: f64) -> Value {
    json!({
        "type": "FREE-TEXT",
        "question": "Explain why the sky is blue.",
        "answers": ["Rayleigh scattering"],
        "score": score,
    })
}
