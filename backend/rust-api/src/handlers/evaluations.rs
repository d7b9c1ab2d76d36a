use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::evaluation::{AnalysisQuery, EvaluateAnswerRequest},
    services::{evaluation_service::EvaluationService, AppState},
};

/// POST /api/v1/evaluations/{sessionId}/{questionId}
pub async fn evaluate_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((session_id, question_id)): Path<(String, String)>,
    AppJson(req): AppJson<EvaluateAnswerRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    tracing::info!(
        "Evaluating answer: session={}, question={}, student={}",
        session_id,
        question_id,
        req.student_id
    );

    let service = EvaluationService::new(state.store.clone(), state.model.clone());
    let response = service
        .evaluate(&claims.sub, &session_id, &question_id, &req.student_id)
        .await?;

    Ok(Json(response))
}

/// GET /api/v1/evaluations/{sessionId}/{questionId}?studentId=
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((session_id, question_id)): Path<(String, String)>,
    Query(query): Query<AnalysisQuery>,
) -> AppResult<impl IntoResponse> {
    let service = EvaluationService::new(state.store.clone(), state.model.clone());
    let analysis = service
        .analysis(&claims.sub, &session_id, &question_id, &query.student_id)
        .await?;

    Ok(Json(analysis))
}
