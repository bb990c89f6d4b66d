//! Refund handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::RefundId;
use domain_billing::{Refund, RefundRequest};

use crate::dto::refunds::{ApproveRefundRequest, CompleteRefundRequest};
use crate::dto::ReasonRequest;
use crate::{error::ApiError, AppState};

pub async fn process_refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<(StatusCode, Json<Refund>), ApiError> {
    let refund = state.billing.refunds.process_refund(request).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

pub async fn get_refund(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Refund>, ApiError> {
    Ok(Json(state.billing.refunds.get(RefundId::from_uuid(id)).await?))
}

pub async fn approve_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveRefundRequest>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state
        .billing
        .refunds
        .approve(RefundId::from_uuid(id), &request.approved_by)
        .await?;
    Ok(Json(refund))
}

pub async fn complete_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteRefundRequest>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state
        .billing
        .refunds
        .complete(RefundId::from_uuid(id), &request.processed_by, request.bank_reference)
        .await?;
    Ok(Json(refund))
}

pub async fn reject_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state
        .billing
        .refunds
        .reject(RefundId::from_uuid(id), &request.reason)
        .await?;
    Ok(Json(refund))
}

pub async fn cancel_refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Refund>, ApiError> {
    let refund = state
        .billing
        .refunds
        .cancel(RefundId::from_uuid(id), &request.reason)
        .await?;
    Ok(Json(refund))
}
