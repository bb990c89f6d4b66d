//! Fee catalog handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::FeeStructureId;
use domain_billing::FeeStructure;

use crate::dto::fee_structures::{FeeLookupParams, SaveFeeStructureRequest};
use crate::{error::ApiError, AppState};

/// Creates a fee structure or replaces the one with the same key
pub async fn save_fee_structure(
    State(state): State<AppState>,
    Json(request): Json<SaveFeeStructureRequest>,
) -> Result<Json<FeeStructure>, ApiError> {
    let structure = request.into_domain()?;
    Ok(Json(state.billing.fees.save(structure).await?))
}

pub async fn list_fee_structures(State(state): State<AppState>) -> Result<Json<Vec<FeeStructure>>, ApiError> {
    Ok(Json(state.billing.fees.list().await?))
}

pub async fn lookup_fee_structure(
    State(state): State<AppState>,
    Query(params): Query<FeeLookupParams>,
) -> Result<Json<FeeStructure>, ApiError> {
    let key = params.key()?;
    Ok(Json(state.billing.fees.lookup(&key).await?))
}

pub async fn get_fee_structure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeeStructure>, ApiError> {
    Ok(Json(state.billing.fees.get(FeeStructureId::from_uuid(id)).await?))
}

pub async fn delete_fee_structure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.billing.fees.delete(FeeStructureId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
