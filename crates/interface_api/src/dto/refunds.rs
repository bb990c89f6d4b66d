//! Refund DTOs

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApproveRefundRequest {
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRefundRequest {
    pub processed_by: String,
    #[serde(default)]
    pub bank_reference: Option<String>,
}
