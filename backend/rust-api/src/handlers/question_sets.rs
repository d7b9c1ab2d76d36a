use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::question::{CreateQuestionRequest, CreateQuestionSetRequest},
    services::{question_service::QuestionService, AppState},
};

/// POST /api/v1/question-sets
pub async fn create_question_set(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateQuestionSetRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let service = QuestionService::new(state.store.clone());
    let set = service.create_set(&claims.sub, req).await?;

    Ok((StatusCode::CREATED, Json(set)))
}

/// GET /api/v1/question-sets
pub async fn list_question_sets(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    Ok(Json(service.list_sets(&claims.sub).await?))
}

/// POST /api/v1/question-sets/{id}/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(set_id): Path<String>,
    AppJson(req): AppJson<CreateQuestionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let service = QuestionService::new(state.store.clone());
    let question = service.add_question(&claims.sub, &set_id, req).await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/v1/question-sets/{id}/questions
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(set_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    Ok(Json(service.list_questions(&claims.sub, &set_id).await?))
}

/// PUT /api/v1/question-sets/{id}
pub async fn rename_question_set(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(set_id): Path<String>,
    AppJson(req): AppJson<CreateQuestionSetRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let service = QuestionService::new(state.store.clone());
    Ok(Json(service.rename_set(&claims.sub, &set_id, req).await?))
}

/// DELETE /api/v1/question-sets/{id}
pub async fn delete_question_set(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(set_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    service.delete_set(&claims.sub, &set_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/question-sets/{id}/import/{sourceId}
pub async fn import_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((set_id, source_set_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    let imported = service
        .import_questions(&claims.sub, &set_id, &source_set_id)
        .await?;

    Ok((StatusCode::CREATED, Json(imported)))
}

/// GET /api/v1/questions/{id}
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    Ok(Json(service.get_question(&claims.sub, &question_id).await?))
}

/// PUT /api/v1/questions/{id}
pub async fn edit_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
    AppJson(req): AppJson<CreateQuestionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let service = QuestionService::new(state.store.clone());
    Ok(Json(service.edit_question(&claims.sub, &question_id, req).await?))
}

/// DELETE /api/v1/questions/{id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    service.delete_question(&claims.sub, &question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/questions/{id}/complementary
pub async fn remove_complementary_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(question_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = QuestionService::new(state.store.clone());
    Ok(Json(
        service
            .remove_complementary(&claims.sub, &question_id)
            .await?,
    ))
}
