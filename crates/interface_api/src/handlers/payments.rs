//! Payment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::PaymentId;
use domain_billing::{Payment, PaymentFilter, RecordPayment};

use crate::dto::payments::PaymentListParams;
use crate::dto::ReasonRequest;
use crate::{error::ApiError, AppState};

pub async fn record_payment(
    State(state): State<AppState>,
    Json(request): Json<RecordPayment>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let payment = state.billing.payments.record(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.billing.payments.get(PaymentId::from_uuid(id)).await?))
}

pub async fn get_payment_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.billing.payments.find_by_reference(&reference).await?))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PaymentListParams>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let filter = PaymentFilter::try_from(params)?;
    Ok(Json(state.billing.payments.list(&filter).await?))
}

pub async fn reverse_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state
        .billing
        .payments
        .reverse(PaymentId::from_uuid(id), &request.reason)
        .await?;
    Ok(Json(payment))
}
