//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common billing entities. The numbers
//! match the reference scenario: Computer Science undergraduates in
//! 2024-2025 pay $200 per credit plus a $50 lab fee.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{AcademicPeriod, Money, StudentId};
use domain_billing::{FeeItem, FeeItemKind, FeeStructure, FeeStructureKey};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Builds a Money value from a decimal literal
pub fn money(amount: Decimal) -> Money {
    Money::new(amount)
}

/// Builds a calendar date, panicking on invalid input
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Fixture for calendar dates
pub struct DateFixtures;

impl DateFixtures {
    /// First day of the fall term, used as the issue date
    pub fn term_start() -> NaiveDate {
        date(2024, 9, 1)
    }

    /// Noon UTC on `term_start`, for record timestamps
    pub fn recorded_at() -> DateTime<Utc> {
        Self::term_start().and_hms_opt(12, 0, 0).expect("valid fixture time").and_utc()
    }

    /// Due date of an invoice issued on `term_start` with the default 30 days
    pub fn due_date() -> NaiveDate {
        date(2024, 10, 1)
    }

    /// Ten days past `due_date`
    pub fn ten_days_overdue() -> NaiveDate {
        date(2024, 10, 11)
    }
}

/// Fixture for students and billing periods
pub struct StudentFixtures;

impl StudentFixtures {
    pub fn student() -> StudentId {
        StudentId::new("S-1001").expect("valid student id")
    }

    pub fn other_student() -> StudentId {
        StudentId::new("S-2002").expect("valid student id")
    }

    pub fn fall_2024() -> AcademicPeriod {
        AcademicPeriod::new("Fall", "2024-2025").expect("valid period")
    }

    pub fn spring_2025() -> AcademicPeriod {
        AcademicPeriod::new("Spring", "2024-2025").expect("valid period")
    }
}

/// Fixture for fee catalog data
pub struct FeeFixtures;

impl FeeFixtures {
    pub const DEPARTMENT: &'static str = "CS";
    pub const CATEGORY: &'static str = "Undergraduate";

    pub fn cs_undergraduate_key() -> FeeStructureKey {
        FeeStructureKey::new("2024-2025", Self::DEPARTMENT, Self::CATEGORY).expect("valid key")
    }

    /// $200 per credit with a $50 fixed lab fee
    pub fn cs_undergraduate() -> FeeStructure {
        FeeStructure::new(Self::cs_undergraduate_key(), money(dec!(200)))
            .with_item(FeeItem::fixed("Lab Fee", money(dec!(50))))
    }

    /// The CS structure plus items that do not count towards tuition
    pub fn cs_undergraduate_with_extras() -> FeeStructure {
        Self::cs_undergraduate()
            .with_item(FeeItem::new("Printing", money(dec!(15)), FeeItemKind::Variable).optional())
            .with_item(FeeItem::new("Orientation", money(dec!(75)), FeeItemKind::OneTime).refundable())
    }

    /// A structure that prices everything at zero
    pub fn fully_funded(department: &str) -> FeeStructure {
        FeeStructure::new(
            FeeStructureKey::new("2024-2025", department, Self::CATEGORY).expect("valid key"),
            Money::zero(),
        )
    }
}
