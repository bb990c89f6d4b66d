//! Financial aid handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::{AcademicPeriod, Clock, FinancialAidId};
use domain_billing::FinancialAid;

use crate::dto::financial_aid::{AidListParams, ApplyAidRequest, CreateAidRequest};
use crate::dto::ReasonRequest;
use crate::{error::ApiError, AppState};

pub async fn create_aid(
    State(state): State<AppState>,
    Json(request): Json<CreateAidRequest>,
) -> Result<(StatusCode, Json<FinancialAid>), ApiError> {
    let aid = state.billing.aid.create(request.into_domain(state.clock.now())?).await?;
    Ok((StatusCode::CREATED, Json(aid)))
}

/// Lists awards for a student, for a term, or for a student within a term
pub async fn list_aid(
    State(state): State<AppState>,
    Query(params): Query<AidListParams>,
) -> Result<Json<Vec<FinancialAid>>, ApiError> {
    let period = params.period()?;
    let awards = match (params.student_id, period) {
        (Some(student_id), period) => {
            let mut awards = state.billing.aid.list_for_student(&student_id).await?;
            if let Some(period) = period {
                awards.retain(|aid| aid.period == period);
            }
            awards
        }
        (None, Some(period)) => state.billing.aid.list_for_period(&period).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "student_id or term and year are required".to_string(),
            ))
        }
    };
    Ok(Json(awards))
}

pub async fn get_aid(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<FinancialAid>, ApiError> {
    Ok(Json(state.billing.aid.get(FinancialAidId::from_uuid(id)).await?))
}

/// Applies the student's oldest pending award for the term
pub async fn apply_aid(
    State(state): State<AppState>,
    Json(request): Json<ApplyAidRequest>,
) -> Result<Json<FinancialAid>, ApiError> {
    let period = AcademicPeriod::new(request.term, request.academic_year)?;
    Ok(Json(state.billing.aid.apply_to_student(&request.student_id, &period).await?))
}

/// Runs the allocation sweep over every pending award
pub async fn allocate_aid(State(state): State<AppState>) -> Result<Json<Vec<FinancialAid>>, ApiError> {
    Ok(Json(state.billing.aid.allocate().await?))
}

pub async fn revoke_aid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<FinancialAid>, ApiError> {
    let aid = state
        .billing
        .aid
        .revoke(FinancialAidId::from_uuid(id), &request.reason)
        .await?;
    Ok(Json(aid))
}
