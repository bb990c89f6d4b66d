//! Invoice handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::{InvoiceId, Rate};
use domain_billing::{GenerateInvoice, Invoice, LateFeeAssessment, TuitionQuote};

use crate::dto::invoices::{CalculateTuitionRequest, InvoiceListParams, LateFeeRequest, LateFeeResponse};
use crate::dto::ReasonRequest;
use crate::{error::ApiError, AppState};

/// Prices a credit load without issuing an invoice
pub async fn calculate_tuition(
    State(state): State<AppState>,
    Json(request): Json<CalculateTuitionRequest>,
) -> Result<Json<TuitionQuote>, ApiError> {
    let key = request.key()?;
    Ok(Json(state.billing.invoices.calculate_tuition(&key, request.credits).await?))
}

pub async fn generate_invoice(
    State(state): State<AppState>,
    Json(request): Json<GenerateInvoice>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let invoice = state.billing.invoices.generate_invoice(request).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.billing.invoices.get(InvoiceId::from_uuid(id)).await?))
}

pub async fn get_invoice_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.billing.invoices.get_by_number(&number).await?))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    Ok(Json(state.billing.invoices.list(&params.into()).await?))
}

pub async fn apply_late_fee(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LateFeeRequest>,
) -> Result<Json<LateFeeResponse>, ApiError> {
    let id = InvoiceId::from_uuid(id);
    let rate = Rate::from_percentage(request.rate_percentage);
    let increase = state.billing.invoices.apply_late_fee(id, rate).await?;
    let invoice = state.billing.invoices.get(id).await?;
    Ok(Json(LateFeeResponse { increase, invoice }))
}

/// Runs the late-fee job over every overdue invoice
pub async fn apply_late_fees(
    State(state): State<AppState>,
    Json(request): Json<LateFeeRequest>,
) -> Result<Json<Vec<LateFeeAssessment>>, ApiError> {
    let rate = Rate::from_percentage(request.rate_percentage);
    Ok(Json(state.billing.invoices.apply_late_fees(rate).await?))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = state
        .billing
        .invoices
        .cancel_invoice(InvoiceId::from_uuid(id), &request.reason)
        .await?;
    Ok(Json(invoice))
}
