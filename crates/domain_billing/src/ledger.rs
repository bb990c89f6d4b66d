//! Student account ledger
//!
//! Each student has an append-only sequence of statement entries. Every entry
//! carries a running balance computed from its immediate predecessor at the
//! moment it is appended:
//!
//! ```text
//! balance(n) = balance(n-1) + debit(n) - credit(n)
//! ```
//!
//! A positive balance means the student holds credit; negative means the
//! student owes. The per-student [`LedgerHead`] tracks the last sequence number
//! and balance; stores lock it for the duration of the transaction so appends
//! for one student are strictly ordered.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{AcademicPeriod, DateRange, LedgerEntryId, Money, StudentId};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};

/// Name recorded on entries produced by the engine itself
pub const SYSTEM_ACTOR: &str = "system";

code_enum! {
    /// Kind of ledger event
    pub enum TransactionType ("transaction type") {
        /// Invoice issued
        Charge => "CHARGE",
        /// Money received
        Payment => "PAYMENT",
        /// Aid applied to an invoice
        FinancialAid => "FINANCIAL_AID",
        /// Money returned to the student
        Refund => "REFUND",
        /// Manual or compensating correction, either direction
        Adjustment => "ADJUSTMENT",
        /// Late fee assessed
        LateFee => "LATE_FEE",
        /// Earlier aid or payment taken back
        Reversal => "REVERSAL",
    }
}

code_enum! {
    /// What a ledger entry points back to
    pub enum ReferenceType ("reference type") {
        Invoice => "INVOICE",
        Payment => "PAYMENT",
        FinancialAid => "FINANCIAL_AID",
        Refund => "REFUND",
    }
}

/// Column an amount is booked in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Increases the balance
    Debit,
    /// Decreases the balance
    Credit,
}

impl TransactionType {
    /// Books a signed amount into (debit, credit)
    ///
    /// Every type but ADJUSTMENT has a fixed column and takes a positive
    /// amount. ADJUSTMENT books positive amounts as debits and negative
    /// amounts as credits.
    pub fn book(&self, amount: Money) -> BillingResult<(Money, Money)> {
        let column = match self {
            TransactionType::Charge
            | TransactionType::Refund
            | TransactionType::Reversal
            | TransactionType::LateFee => Column::Credit,
            TransactionType::Payment | TransactionType::FinancialAid => Column::Debit,
            TransactionType::Adjustment => {
                if amount.is_zero() {
                    return Err(BillingError::invalid("adjustment amount must not be zero"));
                }
                return Ok(if amount.is_negative() {
                    (Money::zero(), amount.abs())
                } else {
                    (amount, Money::zero())
                });
            }
        };

        if !amount.is_positive() {
            return Err(BillingError::invalid(format!(
                "{self} amount must be positive, got {amount}"
            )));
        }

        Ok(match column {
            Column::Debit => (amount, Money::zero()),
            Column::Credit => (Money::zero(), amount),
        })
    }
}

/// A ledger entry before it has been sequenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub student_id: StudentId,
    pub period: AcademicPeriod,
    pub transaction_type: TransactionType,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub description: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub transaction_date: NaiveDate,
    pub recorded_by: String,
}

impl EntryDraft {
    /// Creates a draft, booking `amount` into the column its type dictates
    pub fn new(
        student_id: StudentId,
        period: AcademicPeriod,
        transaction_type: TransactionType,
        amount: Money,
        reference: (ReferenceType, Uuid),
        description: impl Into<String>,
        transaction_date: NaiveDate,
    ) -> BillingResult<Self> {
        let (debit_amount, credit_amount) = transaction_type.book(amount)?;
        Ok(Self {
            student_id,
            period,
            transaction_type,
            reference_type: reference.0,
            reference_id: reference.1,
            description: description.into(),
            debit_amount,
            credit_amount,
            transaction_date,
            recorded_by: SYSTEM_ACTOR.to_string(),
        })
    }

    pub fn recorded_by(mut self, actor: impl Into<String>) -> Self {
        self.recorded_by = actor.into();
        self
    }

    /// Signed effect on the running balance
    pub fn balance_effect(&self) -> Money {
        self.debit_amount - self.credit_amount
    }
}

/// An immutable, sequenced ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEntry {
    pub id: LedgerEntryId,
    pub student_id: StudentId,
    pub sequence: i64,
    pub transaction_type: TransactionType,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub description: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub running_balance: Money,
    pub transaction_date: NaiveDate,
    #[serde(flatten)]
    pub period: AcademicPeriod,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

impl StatementEntry {
    /// Signed effect on the running balance
    pub fn balance_effect(&self) -> Money {
        self.debit_amount - self.credit_amount
    }

    /// Running balance before this entry was appended
    pub fn opening_balance(&self) -> Money {
        self.running_balance - self.balance_effect()
    }
}

/// Tail of one student's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHead {
    pub student_id: StudentId,
    pub last_sequence: i64,
    pub balance: Money,
}

impl LedgerHead {
    /// Head of a ledger with no entries
    pub fn empty(student_id: StudentId) -> Self {
        Self {
            student_id,
            last_sequence: 0,
            balance: Money::zero(),
        }
    }

    /// Sequences a draft after the current tail and advances the head
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the draft belongs to another student.
    pub fn append(&mut self, draft: EntryDraft, recorded_at: DateTime<Utc>) -> BillingResult<StatementEntry> {
        if draft.student_id != self.student_id {
            return Err(BillingError::invalid(format!(
                "entry for student {} cannot be appended to the ledger of {}",
                draft.student_id, self.student_id
            )));
        }

        let running_balance = self.balance + draft.balance_effect();
        let sequence = self.last_sequence + 1;

        let entry = StatementEntry {
            id: LedgerEntryId::new(),
            student_id: draft.student_id,
            sequence,
            transaction_type: draft.transaction_type,
            reference_type: draft.reference_type,
            reference_id: draft.reference_id,
            description: draft.description,
            debit_amount: draft.debit_amount,
            credit_amount: draft.credit_amount,
            running_balance,
            transaction_date: draft.transaction_date,
            period: draft.period,
            recorded_by: draft.recorded_by,
            recorded_at,
        };

        self.last_sequence = sequence;
        self.balance = running_balance;
        Ok(entry)
    }
}

/// Which of a student's entries to return; results are always in sequence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerQuery {
    /// Full history
    All,
    /// Entries for one term of one academic year
    Period(AcademicPeriod),
    /// Entries whose transaction date is in the inclusive range
    Between(DateRange),
    /// Entries dated in the calendar year whose academic year starts in it
    TaxYear(i32),
}

impl LedgerQuery {
    pub fn matches(&self, entry: &StatementEntry) -> bool {
        match self {
            LedgerQuery::All => true,
            LedgerQuery::Period(period) => entry.period == *period,
            LedgerQuery::Between(range) => range.contains(entry.transaction_date),
            LedgerQuery::TaxYear(year) => {
                entry.transaction_date.year() == *year && entry.period.starts_in_year(*year)
            }
        }
    }
}

/// Per-type totals for a calendar year, the basis of a tuition tax form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxStatement {
    pub student_id: StudentId,
    pub tax_year: i32,
    /// Balance after the last entry dated before the year
    pub opening_balance: Money,
    /// Balance after the last entry dated within the year
    pub closing_balance: Money,
    /// Amount booked per transaction type over the year's entries
    pub totals: BTreeMap<TransactionType, Money>,
    pub entries: Vec<StatementEntry>,
}

impl TaxStatement {
    /// Builds a statement from a student's full history in sequence order
    pub fn compile(student_id: StudentId, tax_year: i32, history: &[StatementEntry]) -> Self {
        let opening_balance = history
            .iter()
            .filter(|e| e.transaction_date.year() < tax_year)
            .last()
            .map(|e| e.running_balance)
            .unwrap_or_default();
        let closing_balance = history
            .iter()
            .filter(|e| e.transaction_date.year() <= tax_year)
            .last()
            .map(|e| e.running_balance)
            .unwrap_or(opening_balance);

        let query = LedgerQuery::TaxYear(tax_year);
        let entries: Vec<StatementEntry> = history.iter().filter(|e| query.matches(e)).cloned().collect();

        let mut totals = BTreeMap::new();
        for entry in &entries {
            *totals.entry(entry.transaction_type).or_insert_with(Money::zero) +=
                entry.debit_amount + entry.credit_amount;
        }

        Self {
            student_id,
            tax_year,
            opening_balance,
            closing_balance,
            totals,
            entries,
        }
    }

    pub fn total_for(&self, transaction_type: TransactionType) -> Money {
        self.totals.get(&transaction_type).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn student() -> StudentId {
        StudentId::new("S-1001").unwrap()
    }

    fn fall() -> AcademicPeriod {
        AcademicPeriod::new("Fall", "2024-2025").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(tx: TransactionType, amount: Money, on: NaiveDate) -> EntryDraft {
        EntryDraft::new(
            student(),
            fall(),
            tx,
            amount,
            (ReferenceType::Invoice, Uuid::new_v4()),
            tx.as_str(),
            on,
        )
        .unwrap()
    }

    #[test]
    fn test_sign_table() {
        let amount = Money::new(dec!(10));
        let cases = [
            (TransactionType::Charge, dec!(-10)),
            (TransactionType::Payment, dec!(10)),
            (TransactionType::FinancialAid, dec!(10)),
            (TransactionType::Refund, dec!(-10)),
            (TransactionType::LateFee, dec!(-10)),
            (TransactionType::Reversal, dec!(-10)),
            (TransactionType::Adjustment, dec!(10)),
        ];
        for (tx, effect) in cases {
            let d = draft(tx, amount, date(2024, 9, 1));
            assert_eq!(d.balance_effect(), Money::new(effect), "{tx}");
        }

        let negative = draft(TransactionType::Adjustment, Money::new(dec!(-4)), date(2024, 9, 1));
        assert_eq!(negative.credit_amount, Money::new(dec!(4)));
        assert!(negative.debit_amount.is_zero());
    }

    #[test]
    fn test_fixed_column_types_reject_non_positive_amounts() {
        assert!(TransactionType::Charge.book(Money::zero()).is_err());
        assert!(TransactionType::Refund.book(Money::new(dec!(-1))).is_err());
        assert!(TransactionType::Adjustment.book(Money::zero()).is_err());
    }

    #[test]
    fn test_charge_then_aid() {
        let mut head = LedgerHead::empty(student());
        let charge = head
            .append(draft(TransactionType::Charge, Money::new(dec!(3050)), date(2024, 9, 1)), Utc::now())
            .unwrap();
        assert_eq!(charge.sequence, 1);
        assert_eq!(charge.running_balance, Money::new(dec!(-3050)));

        let aid = head
            .append(draft(TransactionType::FinancialAid, Money::new(dec!(3050)), date(2024, 9, 2)), Utc::now())
            .unwrap();
        assert_eq!(aid.sequence, 2);
        assert!(aid.running_balance.is_zero());
        assert_eq!(aid.opening_balance(), charge.running_balance);
    }

    #[test]
    fn test_append_rejects_other_students() {
        let mut head = LedgerHead::empty(StudentId::new("S-2").unwrap());
        let result = head.append(draft(TransactionType::Charge, Money::new(dec!(1)), date(2024, 9, 1)), Utc::now());
        assert!(result.is_err());
        assert_eq!(head.last_sequence, 0);
    }

    #[test]
    fn test_tax_year_query_needs_both_date_and_label() {
        let mut head = LedgerHead::empty(student());
        let in_year = head
            .append(draft(TransactionType::Charge, Money::new(dec!(1)), date(2024, 9, 1)), Utc::now())
            .unwrap();
        let next_year_date = head
            .append(draft(TransactionType::Charge, Money::new(dec!(1)), date(2025, 2, 1)), Utc::now())
            .unwrap();

        let query = LedgerQuery::TaxYear(2024);
        assert!(query.matches(&in_year));
        assert!(!query.matches(&next_year_date));
        // dated 2025 but the academic year starts in 2024
        assert!(!LedgerQuery::TaxYear(2025).matches(&next_year_date));
    }

    #[test]
    fn test_tax_statement_totals_and_balances() {
        let mut head = LedgerHead::empty(student());
        let mut history = Vec::new();
        let old_period = AcademicPeriod::new("Spring", "2023-2024").unwrap();
        let mut earlier = draft(TransactionType::Charge, Money::new(dec!(500)), date(2023, 12, 1));
        earlier.period = old_period;
        history.push(head.append(earlier, Utc::now()).unwrap());
        history.push(head.append(draft(TransactionType::Charge, Money::new(dec!(3050)), date(2024, 9, 1)), Utc::now()).unwrap());
        history.push(head.append(draft(TransactionType::FinancialAid, Money::new(dec!(1000)), date(2024, 9, 15)), Utc::now()).unwrap());
        history.push(head.append(draft(TransactionType::LateFee, Money::new(dec!(20)), date(2024, 11, 1)), Utc::now()).unwrap());

        let statement = TaxStatement::compile(student(), 2024, &history);
        assert_eq!(statement.opening_balance, Money::new(dec!(-500)));
        assert_eq!(statement.closing_balance, Money::new(dec!(-2570)));
        assert_eq!(statement.total_for(TransactionType::Charge), Money::new(dec!(3050)));
        assert_eq!(statement.total_for(TransactionType::FinancialAid), Money::new(dec!(1000)));
        assert!(statement.total_for(TransactionType::Refund).is_zero());
        assert_eq!(statement.entries.len(), 3);
    }
}
