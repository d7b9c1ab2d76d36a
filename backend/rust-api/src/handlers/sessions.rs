use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::session::{
        CreateSessionRequest, EditSessionRequest, InviteStudentsRequest, ReviewSubmissionRequest,
        SessionSummary,
    },
    models::SessionSettings,
    services::{session_service::SessionService, AppState},
};

/// What anyone holding a join code may see.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSession {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub settings: SessionSettings,
    pub question_count: usize,
}

fn session_service(state: &AppState) -> SessionService {
    SessionService::new(state.store.clone(), state.notifier.clone())
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateSessionRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!(
        "Creating session for owner={} from {} question set(s)",
        claims.sub,
        req.question_sets.len()
    );

    let session = session_service(&state).create(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(session_service(&state).list(&claims.sub).await?))
}

/// GET /api/v1/sessions/code/{code}
pub async fn get_session_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = session_service(&state).by_code(&code).await?;

    Ok(Json(PublicSession {
        summary: SessionSummary::from(&session),
        question_count: session.questions.len(),
        settings: session.settings,
    }))
}

/// PUT /api/v1/sessions/{id}/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(settings): AppJson<SessionSettings>,
) -> AppResult<impl IntoResponse> {
    let settings = session_service(&state)
        .update_settings(&claims.sub, &session_id, settings)
        .await?;
    Ok(Json(settings))
}

/// PUT /api/v1/sessions/{id}
pub async fn edit_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<EditSessionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let session = session_service(&state)
        .edit(&claims.sub, &session_id, req)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/{id}/end
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = session_service(&state)
        .set_ended(&claims.sub, &session_id, true)
        .await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// POST /api/v1/sessions/{id}/reactivate
pub async fn reactivate_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = session_service(&state)
        .set_ended(&claims.sub, &session_id, false)
        .await?;
    Ok(Json(SessionSummary::from(&session)))
}

/// DELETE /api/v1/sessions/{id}
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    session_service(&state)
        .delete(&claims.sub, &session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/{id}/invite
pub async fn invite_students(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<InviteStudentsRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let session = session_service(&state)
        .invite(&claims.sub, &session_id, &req.student_ids)
        .await?;
    Ok(Json(session))
}

/// POST /api/v1/sessions/review/{submissionId}
pub async fn review_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(submission_id): Path<String>,
    AppJson(req): AppJson<ReviewSubmissionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    session_service(&state)
        .review(&claims.sub, &submission_id, req)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
