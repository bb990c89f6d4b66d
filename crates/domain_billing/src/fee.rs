//! Fee catalog definitions
//!
//! A fee structure prices tuition for one (academic year, department, student
//! category) key: a per-credit rate plus an ordered list of fee items. The
//! structure owns its items outright; saving a structure replaces the whole
//! item list rather than merging it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{FeeStructureId, Money};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};

code_enum! {
    /// Lifecycle of a fee structure
    pub enum FeeStructureStatus ("fee structure status") {
        /// Used to price new invoices
        Active => "ACTIVE",
        /// Temporarily withdrawn
        Inactive => "INACTIVE",
        /// Kept for history only
        Archived => "ARCHIVED",
    }
}

code_enum! {
    /// How a fee item is charged
    pub enum FeeItemKind ("fee item kind") {
        /// Charged once per invoice, included in tuition
        Fixed => "FIXED",
        /// Depends on usage; not part of the tuition total
        Variable => "VARIABLE",
        /// Charged once per enrollment; not part of the tuition total
        OneTime => "ONE_TIME",
    }
}

/// Identity of a fee structure in the catalog
///
/// `academic_term` holds the academic-year label ("2024-2025"); invoices look
/// structures up with the academic year they are billed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeStructureKey {
    pub academic_term: String,
    pub department: String,
    pub student_category: String,
}

impl FeeStructureKey {
    pub fn new(
        academic_term: impl Into<String>,
        department: impl Into<String>,
        student_category: impl Into<String>,
    ) -> BillingResult<Self> {
        let key = Self {
            academic_term: academic_term.into(),
            department: department.into(),
            student_category: student_category.into(),
        };
        key.validate()?;
        Ok(key)
    }

    fn validate(&self) -> BillingResult<()> {
        for (field, value) in [
            ("academic term", &self.academic_term),
            ("department", &self.department),
            ("student category", &self.student_category),
        ] {
            if value.trim().is_empty() {
                return Err(BillingError::invalid(format!("{field} must not be blank")));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for FeeStructureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.academic_term, self.department, self.student_category)
    }
}

/// A single fee line in a fee structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeItem {
    pub name: String,
    pub amount: Money,
    pub kind: FeeItemKind,
    pub mandatory: bool,
    pub refundable: bool,
}

impl FeeItem {
    /// Creates a mandatory, non-refundable item
    pub fn new(name: impl Into<String>, amount: Money, kind: FeeItemKind) -> Self {
        Self {
            name: name.into(),
            amount,
            kind,
            mandatory: true,
            refundable: false,
        }
    }

    /// Creates a mandatory fixed fee
    pub fn fixed(name: impl Into<String>, amount: Money) -> Self {
        Self::new(name, amount, FeeItemKind::Fixed)
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    pub fn refundable(mut self) -> Self {
        self.refundable = true;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.kind == FeeItemKind::Fixed
    }
}

/// A priced fee structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub id: FeeStructureId,
    #[serde(flatten)]
    pub key: FeeStructureKey,
    pub per_credit_rate: Money,
    pub status: FeeStructureStatus,
    pub items: Vec<FeeItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeeStructure {
    /// Creates an active structure with no items
    pub fn new(key: FeeStructureKey, per_credit_rate: Money) -> Self {
        let now = Utc::now();
        Self {
            id: FeeStructureId::new(),
            key,
            per_credit_rate,
            status: FeeStructureStatus::Active,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_item(mut self, item: FeeItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_status(mut self, status: FeeStructureStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == FeeStructureStatus::Active
    }

    /// Sum of all FIXED item amounts
    pub fn total_fixed_fees(&self) -> Money {
        self.fixed_items().map(|item| item.amount).sum()
    }

    /// FIXED items in catalog order
    pub fn fixed_items(&self) -> impl Iterator<Item = &FeeItem> {
        self.items.iter().filter(|item| item.is_fixed())
    }

    /// Checks the structure can be persisted
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for blank key parts, a negative rate, or an item with
    /// a blank name or negative amount.
    pub fn validate(&self) -> BillingResult<()> {
        self.key.validate()?;
        if self.per_credit_rate.is_negative() {
            return Err(BillingError::invalid("per-credit rate must not be negative"));
        }
        for item in &self.items {
            if item.name.trim().is_empty() {
                return Err(BillingError::invalid("fee item name must not be blank"));
            }
            if item.amount.is_negative() {
                return Err(BillingError::invalid(format!(
                    "fee item '{}' must not have a negative amount",
                    item.name
                )));
            }
        }
        Ok(())
    }

    /// Takes over rate, status and items from `incoming`, keeping this identity
    pub fn replace_with(&mut self, incoming: FeeStructure, at: DateTime<Utc>) {
        self.per_credit_rate = incoming.per_credit_rate;
        self.status = incoming.status;
        self.items = incoming.items;
        self.updated_at = at;
    }

    /// Stamps both timestamps, for a structure about to be first saved
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }
}
