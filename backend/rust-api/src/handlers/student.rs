use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use super::ensure_acting_as;
use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::session::{JoinSessionRequest, QuestionsQuery, SessionSummary, SubmitAnswerRequest},
    services::{
        activation_service::ActivationService, session_service::SessionService,
        submission_service::SubmissionService, AppState,
    },
};

/// POST /api/v1/sessions/submit/{code}
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(code): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    ensure_acting_as(&claims, &req.student_id)?;

    let service = SubmissionService::new(state.store.clone(), state.notifier.clone());
    let verdict = service.submit(&code, req, Utc::now()).await?;

    Ok(Json(verdict))
}

/// GET /api/v1/sessions/questions/{code}?activation=
pub async fn session_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(code): Path<String>,
    Query(query): Query<QuestionsQuery>,
) -> AppResult<impl IntoResponse> {
    let service = SessionService::new(state.store.clone(), state.notifier.clone());
    let response = service
        .questions(&code, &claims.sub, query.activation, Utc::now())
        .await?;

    Ok(Json(response))
}

/// POST /api/v1/sessions/join/{code}
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(code): Path<String>,
    AppJson(req): AppJson<JoinSessionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    ensure_acting_as(&claims, &req.student_id)?;

    let service = SessionService::new(state.store.clone(), state.notifier.clone());
    Ok(Json(service.join(&code, &req.student_id).await?))
}

/// GET /api/v1/sessions/join-status/{code}/{studentId}
pub async fn join_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((code, student_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    ensure_acting_as(&claims, &student_id)?;

    let service = SessionService::new(state.store.clone(), state.notifier.clone());
    Ok(Json(service.join_status(&code, &student_id).await?))
}

/// GET /api/v1/sessions/student/all-active
pub async fn active_sessions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let service = SessionService::new(state.store.clone(), state.notifier.clone());
    let sessions = service.active_for_student(&claims.sub).await?;

    Ok(Json(
        sessions
            .iter()
            .map(SessionSummary::from)
            .collect::<Vec<_>>(),
    ))
}

/// POST /api/v1/sessions/student/done/{sessionId}
pub async fn mark_session_done(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = SessionService::new(state.store.clone(), state.notifier.clone());
    service.mark_done(&session_id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/student/activation-sessions
pub async fn activation_sessions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let service = ActivationService::new(state.store.clone());
    Ok(Json(service.pending_recalls(&claims.sub, Utc::now()).await?))
}
