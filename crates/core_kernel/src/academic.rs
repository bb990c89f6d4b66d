//! Academic calendar labels
//!
//! Terms and academic years come from the course catalog as free-form labels
//! ("Fall", "2024-2025"). They are compared by exact string equality, so
//! "Fall" and "FALL" are different terms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A billing period: a term label within an academic-year label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcademicPeriod {
    /// Term label, e.g. "Fall"
    pub term: String,
    /// Academic year label, e.g. "2024-2025"
    pub academic_year: String,
}

impl AcademicPeriod {
    /// Creates a period, rejecting blank labels
    pub fn new(term: impl Into<String>, academic_year: impl Into<String>) -> Result<Self, CoreError> {
        let term = term.into();
        let academic_year = academic_year.into();
        if term.trim().is_empty() {
            return Err(CoreError::validation("term must not be blank"));
        }
        if academic_year.trim().is_empty() {
            return Err(CoreError::validation("academic year must not be blank"));
        }
        Ok(Self { term, academic_year })
    }

    /// Returns true if both labels match exactly
    pub fn matches(&self, term: &str, academic_year: &str) -> bool {
        self.term == term && self.academic_year == academic_year
    }

    /// Returns true if the academic-year label begins with the given calendar year
    ///
    /// "2024-2025" belongs to tax year 2024 under this rule.
    pub fn starts_in_year(&self, year: i32) -> bool {
        self.academic_year.starts_with(&year.to_string())
    }
}

impl fmt::Display for AcademicPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term, self.academic_year)
    }
}
