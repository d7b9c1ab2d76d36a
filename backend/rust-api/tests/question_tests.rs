use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_question_set_can_be_renamed_by_owner_only() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let other = app.teacher_token("teacher-2");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let uri = format!("/api/v1/question-sets/{}", set_id);

    let (status, body) = app
        .send("PUT", &uri, Some(&teacher), Some(json!({ "name": "Planets" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Planets");

    let (status, _) = app
        .send("PUT", &uri, Some(&other), Some(json!({ "name": "Mine now" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("PUT", &uri, Some(&teacher), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_a_set_removes_its_questions() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let question_id = app.add_question(&teacher, &set_id, common::mcq("B", 4.0)).await;

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/v1/question-sets/{}", set_id),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, sets) = app
        .send("GET", "/api/v1/question-sets", Some(&teacher), None)
        .await;
    assert!(sets.as_array().unwrap().is_empty());

    let (status, _) = app
        .send(
            "GET",
            &format!("/api/v1/questions/{}", question_id),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_question_edit_replaces_content_and_keeps_identity() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let question_id = app.add_question(&teacher, &set_id, common::mcq("B", 4.0)).await;
    let uri = format!("/api/v1/questions/{}", question_id);

    let (_, original) = app.send("GET", &uri, Some(&teacher), None).await;

    let (status, edited) = app
        .send(
            "PUT",
            &uri,
            Some(&teacher),
            Some(common::mcq_with_recall("C", 6.0, 1)),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", edited);
    assert_eq!(edited["_id"], question_id.as_str());
    assert_eq!(edited["questionSetId"], set_id.as_str());
    assert_eq!(edited["createdAt"], original["createdAt"]);
    assert_eq!(edited["answers"], json!(["C"]));
    assert_eq!(edited["score"], 6.0);
    assert_eq!(edited["complementaryQuestion"]["type"], "TRUE-OR-FALSE");

    let (_, fetched) = app.send("GET", &uri, Some(&teacher), None).await;
    assert_eq!(fetched, edited);

    // Edits go through the same validation as creation.
    let (status, _) = app
        .send(
            "PUT",
            &uri,
            Some(&teacher),
            Some(json!({ "type": "MCQ", "answers": [], "score": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edited_answer_key_grades_new_submissions() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let student = app.student_token("student-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let question_id = app.add_question(&teacher, &set_id, common::mcq("B", 4.0)).await;
    let (_, code) = app.create_session(&teacher, &[&set_id]).await;
    app.join(&student, "student-1", &code).await;

    app.send(
        "PUT",
        &format!("/api/v1/questions/{}", question_id),
        Some(&teacher),
        Some(common::mcq("C", 4.0)),
    )
    .await;

    let (_, body) = app
        .submit(&student, &code, "student-1", &question_id, &["C"], false)
        .await;
    assert_eq!(body["status"], "CORRECT");
}

#[tokio::test]
async fn test_questions_are_private_to_their_owner() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let other = app.teacher_token("teacher-2");
    let student = app.student_token("student-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let question_id = app.add_question(&teacher, &set_id, common::mcq("B", 4.0)).await;
    let uri = format!("/api/v1/questions/{}", question_id);

    let (status, body) = app.send("GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "not-question-owner");

    let (status, _) = app.send("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", &uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_question_delete() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let set_id = app.create_question_set(&teacher, "Astronomy").await;
    let kept = app.add_question(&teacher, &set_id, common::mcq("A", 1.0)).await;
    let removed = app.add_question(&teacher, &set_id, common::mcq("B", 4.0)).await;
    let uri = format!("/api/v1/questions/{}", removed);

    let (status, _) = app.send("DELETE", &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.send("DELETE", &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "question-not-found");

    let (_, questions) = app
        .send(
            "GET",
            &format!("/api/v1/question-sets/{}/questions", set_id),
            Some(&teacher),
            None,
        )
        .await;
    let questions = questions.as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["_id"], kept.as_str());
}

#[tokio::test]
async fn test_import_copies_questions_under_new_ids() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let source = app.create_question_set(&teacher, "Astronomy").await;
    let target = app.create_question_set(&teacher, "Revision").await;
    let original = app
        .add_question(&teacher, &source, common::mcq_with_recall("B", 4.0, 1))
        .await;
    app.add_question(&teacher, &source, common::free_text(3.0))
        .await;

    let (status, imported) = app
        .send(
            "POST",
            &format!("/api/v1/question-sets/{}/import/{}", target, source),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", imported);
    let imported = imported.as_array().unwrap();
    assert_eq!(imported.len(), 2);
    assert!(imported.iter().all(|q| q["questionSetId"] == target.as_str()));
    assert!(imported.iter().all(|q| q["_id"] != original.as_str()));
    assert_eq!(imported[0]["complementaryQuestion"]["type"], "TRUE-OR-FALSE");

    let list = |set: &str| format!("/api/v1/question-sets/{}/questions", set);
    let (_, in_source) = app.send("GET", &list(&source), Some(&teacher), None).await;
    let (_, in_target) = app.send("GET", &list(&target), Some(&teacher), None).await;
    assert_eq!(in_source.as_array().unwrap().len(), 2);
    assert_eq!(in_target.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_requires_owning_both_sets() {
    let app = common::create_test_app();
    let teacher = app.teacher_token("teacher-1");
    let other = app.teacher_token("teacher-2");
    let foreign = app.create_question_set(&other, "Not yours").await;
    let target = app.create_question_set(&teacher, "Revision").await;

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/question-sets/{}/import/{}", target, foreign),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/question-sets/{}/import/{}", target, target),
            Some(&teacher),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "cannot-import-set-into-itself");
}
