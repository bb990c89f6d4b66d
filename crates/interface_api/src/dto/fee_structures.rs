//! Fee structure DTOs

use serde::Deserialize;

use core_kernel::Money;
use domain_billing::{FeeItem, FeeItemKind, FeeStructure, FeeStructureKey, FeeStructureStatus};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SaveFeeStructureRequest {
    /// Academic-year label the structure prices, e.g. "2024-2025"
    pub academic_term: String,
    pub department: String,
    pub student_category: String,
    pub per_credit_rate: Money,
    #[serde(default)]
    pub status: Option<FeeStructureStatus>,
    #[serde(default)]
    pub items: Vec<FeeItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct FeeItemRequest {
    pub name: String,
    pub amount: Money,
    pub kind: FeeItemKind,
    #[serde(default = "mandatory_by_default")]
    pub mandatory: bool,
    #[serde(default)]
    pub refundable: bool,
}

fn mandatory_by_default() -> bool {
    true
}

impl SaveFeeStructureRequest {
    pub fn into_domain(self) -> Result<FeeStructure, ApiError> {
        let key = FeeStructureKey::new(self.academic_term, self.department, self.student_category)?;
        let mut structure = FeeStructure::new(key, Money::new(self.per_credit_rate.amount()));
        if let Some(status) = self.status {
            structure = structure.with_status(status);
        }
        for item in self.items {
            structure = structure.with_item(FeeItem {
                name: item.name,
                amount: Money::new(item.amount.amount()),
                kind: item.kind,
                mandatory: item.mandatory,
                refundable: item.refundable,
            });
        }
        Ok(structure)
    }
}

/// `GET /fee-structures/lookup?term&department&category`
#[derive(Debug, Deserialize)]
pub struct FeeLookupParams {
    pub term: String,
    pub department: String,
    pub category: String,
}

impl FeeLookupParams {
    pub fn key(self) -> Result<FeeStructureKey, ApiError> {
        Ok(FeeStructureKey::new(self.term, self.department, self.category)?)
    }
}
