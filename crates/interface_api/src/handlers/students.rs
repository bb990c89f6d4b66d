//! Per-student ledger, statement and balance handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use core_kernel::StudentId;
use domain_billing::{LedgerQuery, Refund, StatementEntry, TaxStatement};

use crate::dto::students::{BalanceResponse, CreditBalanceResponse, LedgerParams};
use crate::{error::ApiError, AppState};

fn student(raw: String) -> Result<StudentId, ApiError> {
    Ok(StudentId::new(raw)?)
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<StatementEntry>>, ApiError> {
    let student_id = student(student_id)?;
    let query = LedgerQuery::try_from(params)?;
    Ok(Json(state.billing.ledger.entries(&student_id, &query).await?))
}

pub async fn get_tax_statement(
    State(state): State<AppState>,
    Path((student_id, year)): Path<(String, i32)>,
) -> Result<Json<TaxStatement>, ApiError> {
    let student_id = student(student_id)?;
    Ok(Json(state.billing.ledger.tax_statement(&student_id, year).await?))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let student_id = student(student_id)?;
    let balance = state.billing.ledger.current_balance(&student_id).await?;
    Ok(Json(BalanceResponse { student_id, balance }))
}

pub async fn get_credit_balance(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<CreditBalanceResponse>, ApiError> {
    let student_id = student(student_id)?;
    let credit_balance = state.billing.refunds.credit_balance(&student_id).await?;
    Ok(Json(CreditBalanceResponse {
        student_id,
        credit_balance,
    }))
}

pub async fn list_refunds(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<Refund>>, ApiError> {
    let student_id = student(student_id)?;
    Ok(Json(state.billing.refunds.list_for_student(&student_id).await?))
}
