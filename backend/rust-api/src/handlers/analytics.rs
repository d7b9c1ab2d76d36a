use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ensure_acting_as;
use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::analytics::ScreenTimeRequest,
    services::{analytics_service::AnalyticsService, AppState},
};

/// POST /api/v1/analytics/screen-time
pub async fn record_screen_time(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ScreenTimeRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    ensure_acting_as(&claims, &req.user_id)?;

    let service = AnalyticsService::new(state.store.clone());
    let bucket = service.add_screen_time(&req.user_id, req.screen_time).await?;

    Ok(Json(bucket))
}

/// GET /api/v1/analytics/weekly/{userId}
pub async fn weekly_study_days(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    ensure_acting_as(&claims, &user_id)?;

    let service = AnalyticsService::new(state.store.clone());
    let days = service.days_studied_this_week(&user_id).await?;

    Ok(Json(json!({ "days": days })))
}

/// GET /api/v1/analytics/monthly-time/{userId}
pub async fn monthly_time_spent(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    ensure_acting_as(&claims, &user_id)?;

    let service = AnalyticsService::new(state.store.clone());
    Ok(Json(service.monthly_time_spent(&user_id).await?))
}

/// GET /api/v1/analytics/evaluation/{studentId}
///
/// Teachers only see the sessions they own.
pub async fn student_evaluation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(student_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    ensure_acting_as(&claims, &student_id)?;

    let owner_id = (claims.sub != student_id && claims.can_teach()).then_some(claims.sub.as_str());
    let service = AnalyticsService::new(state.store.clone());
    let results = service.student_evaluation(&student_id, owner_id).await?;

    Ok(Json(json!({ "results": results })))
}
