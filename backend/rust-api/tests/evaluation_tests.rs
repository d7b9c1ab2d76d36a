use axum::http::StatusCode;
use serde_json::json;

use classroom_api::services::evaluation_service::ScriptedModel;

mod common;

/// Teacher, one free-text question answered by `student-1`.
/// Returns `(app, teacher_token, session_id, question_id)`.
async fn answered_free_text(model: ScriptedModel) -> (common::TestApp, String, String, String) {
    let app = common::create_test_app_with_model(model);
    let teacher = app.teacher_token("teacher-1");
    let student = app.student_token("student-1");

    let set_id = app.create_question_set(&teacher, "Physics").await;
    let question_id = app.add_question(&teacher, &set_id, common::free_text(6.0)).await;
    let (session_id, code) = app.create_session(&teacher, &[&set_id]).await;
    app.join(&student, "student-1", &code).await;
    app.submit(
        &student,
        &code,
        "student-1",
        &question_id,
        &["Blue light scatters more off air molecules"],
        false,
    )
    .await;

    (app, teacher, session_id, question_id)
}

#[tokio::test]
async fn test_evaluation_is_stored_with_suggested_verdict() {
    let model = ScriptedModel::new(common::conceptual(0.92), common::evaluation(4.0));
    let (app, teacher, session_id, question_id) = answered_free_text(model).await;
    let uri = format!("/api/v1/evaluations/{}/{}", session_id, question_id);

    let (status, body) = app
        .send(
            "POST",
            &uri,
            Some(&teacher),
            Some(json!({ "studentId": "student-1" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["evaluation"]["type"], "conceptual");
    assert_eq!(body["evaluation"]["score"], 4.0);
    assert_eq!(body["suggestedVerdict"]["status"], "CORRECT");
    assert_eq!(body["suggestedVerdict"]["score"], "4.8");
    assert_eq!(
        app.model.evaluated_answers(),
        vec!["Blue light scatters more off air molecules".to_string()]
    );

    let (status, analysis) = app
        .send(
            "GET",
            &format!("{}?studentId=student-1", uri),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analysis["_id"], body["analysisId"]);
    assert_eq!(
        analysis["originalText"],
        "Blue light scatters more off air molecules"
    );
    assert_eq!(analysis["answerAnalysis"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_re_evaluation_replaces_the_stored_analysis() {
    let model = ScriptedModel::new(common::conceptual(0.9), common::evaluation(2.0));
    let (app, teacher, session_id, question_id) = answered_free_text(model).await;
    let uri = format!("/api/v1/evaluations/{}/{}", session_id, question_id);
    let body = json!({ "studentId": "student-1" });

    let (_, first) = app.send("POST", &uri, Some(&teacher), Some(body.clone())).await;
    let (_, second) = app.send("POST", &uri, Some(&teacher), Some(body)).await;

    assert_eq!(first["analysisId"], second["analysisId"]);
    assert_eq!(second["suggestedVerdict"]["status"], "WRONG");
}

#[tokio::test]
async fn test_low_classification_confidence_is_refused() {
    let model = ScriptedModel::new(common::conceptual(0.55), common::evaluation(5.0));
    let (app, teacher, session_id, question_id) = answered_free_text(model).await;
    let uri = format!("/api/v1/evaluations/{}/{}", session_id, question_id);

    let (status, body) = app
        .send(
            "POST",
            &uri,
            Some(&teacher),
            Some(json!({ "studentId": "student-1" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Question classification confidence too low");
    assert!(app.model.evaluated_answers().is_empty());

    let (status, _) = app
        .send(
            "GET",
            &format!("{}?studentId=student-1", uri),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_out_of_range_model_score_is_upstream_failure() {
    let model = ScriptedModel::new(common::conceptual(0.9), common::evaluation(7.0));
    let (app, teacher, session_id, question_id) = answered_free_text(model).await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/evaluations/{}/{}", session_id, question_id),
            Some(&teacher),
            Some(json!({ "studentId": "student-1" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn test_evaluation_requires_an_existing_submission() {
    let model = ScriptedModel::new(common::conceptual(0.9), common::evaluation(4.0));
    let (app, teacher, session_id, question_id) = answered_free_text(model).await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/evaluations/{}/{}", session_id, question_id),
            Some(&teacher),
            Some(json!({ "studentId": "student-2" })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "submission-not-found");
}

#[tokio::test]
async fn test_evaluation_is_owner_only() {
    let model = ScriptedModel::new(common::conceptual(0.9), common::evaluation(4.0));
    let (app, _, session_id, question_id) = answered_free_text(model).await;
    let other = app.teacher_token("teacher-2");

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/evaluations/{}/{}", session_id, question_id),
            Some(&other),
            Some(json!({ "studentId": "student-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let student = app.student_token("student-1");
    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/evaluations/{}/{}", session_id, question_id),
            Some(&student),
            Some(json!({ "studentId": "student-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
