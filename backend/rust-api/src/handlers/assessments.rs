use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::extractors::AppJson;
use crate::middlewares::JwtClaims;
use crate::models::{RecentResultsQuery, StartAssessmentRequest, SubmitAnswerRequest};
use crate::services::{assessment_service::AssessmentService, AppState};

fn validate<T: Validate>(req: &T) -> Result<(), ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

pub async fn start_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartAssessmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;
    let service = AssessmentService::from_state(&state);
    let response = service
        .start_or_resume(&claims.client_id, &claims.sub, claims.name.clone(), req)
        .await?;
    let status = if response.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

pub async fn next_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let response = service
        .get_next_question(&claims.client_id, &claims.sub, &session_id)
        .await?;
    Ok(Json(response))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&req)?;
    let service = AssessmentService::from_state(&state);
    let response = service
        .submit_answer(&claims.client_id, &claims.sub, &session_id, req)
        .await?;
    Ok(Json(response))
}

pub async fn complete_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let result = service
        .complete(&claims.client_id, &claims.sub, &session_id)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn abandon_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let session = service
        .abandon(&claims.client_id, &claims.sub, &session_id)
        .await?;
    Ok(Json(session))
}

pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let result = service
        .get_result(&claims.client_id, &claims.sub, &session_id)
        .await?;
    Ok(Json(result))
}

pub async fn regenerate_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let result = service
        .regenerate_artifacts(&claims.client_id, &claims.sub, &session_id)
        .await?;
    Ok(Json(result))
}

pub async fn recent_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<RecentResultsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AssessmentService::from_state(&state);
    let results = service
        .list_recent_results(&claims.client_id, &claims.sub, query.limit)
        .await?;
    Ok(Json(results))
}
