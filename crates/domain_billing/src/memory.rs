//! In-memory billing store
//!
//! The whole store sits behind one async mutex. A transaction holds the lock
//! from `begin` until it is committed or dropped and works on a private copy
//! of the state, so a dropped transaction leaves nothing behind and writers are
//! fully serialized.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    DomainPort, FeeStructureId, FinancialAidId, HealthCheckResult, HealthCheckable, InvoiceId, PaymentId,
    PortError, RefundId, StudentId,
};

use crate::aid::FinancialAid;
use crate::fee::{FeeStructure, FeeStructureKey};
use crate::invoice::Invoice;
use crate::ledger::{LedgerHead, LedgerQuery, StatementEntry};
use crate::payment::Payment;
use crate::ports::{AidFilter, BillingStore, BillingTransaction, InvoiceFilter, PaymentFilter};
use crate::refund::Refund;

#[derive(Debug, Clone, Default)]
struct BillingState {
    fee_structures: Vec<FeeStructure>,
    invoices: Vec<Invoice>,
    entries: Vec<StatementEntry>,
    heads: HashMap<StudentId, LedgerHead>,
    aid: Vec<FinancialAid>,
    payments: Vec<Payment>,
    refunds: Vec<Refund>,
}

/// Billing store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingStore {
    state: Arc<Mutex<BillingState>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryBillingStore {}

#[async_trait]
impl HealthCheckable for InMemoryBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-billing-store")
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<BillingState>,
    working: BillingState,
}

fn replace<T>(items: &mut [T], entity: &str, id: impl std::fmt::Display, same: impl Fn(&T) -> bool, value: &T) -> Result<(), PortError>
where
    T: Clone,
{
    match items.iter_mut().find(|existing| same(existing)) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(PortError::not_found(entity, id)),
    }
}

#[async_trait]
impl BillingTransaction for InMemoryTransaction {
    async fn find_fee_structure(&mut self, key: &FeeStructureKey) -> Result<Option<FeeStructure>, PortError> {
        Ok(self.working.fee_structures.iter().find(|s| s.key == *key).cloned())
    }

    async fn get_fee_structure(&mut self, id: FeeStructureId) -> Result<Option<FeeStructure>, PortError> {
        Ok(self.working.fee_structures.iter().find(|s| s.id == id).cloned())
    }

    async fn list_fee_structures(&mut self) -> Result<Vec<FeeStructure>, PortError> {
        Ok(self.working.fee_structures.clone())
    }

    async fn insert_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError> {
        if self.working.fee_structures.iter().any(|s| s.key == structure.key) {
            return Err(PortError::conflict(format!("fee structure already exists for {}", structure.key)));
        }
        self.working.fee_structures.push(structure.clone());
        Ok(())
    }

    async fn replace_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError> {
        let id = structure.id;
        replace(&mut self.working.fee_structures, "FeeStructure", id, |s| s.id == id, structure)
    }

    async fn delete_fee_structure(&mut self, id: FeeStructureId) -> Result<bool, PortError> {
        let before = self.working.fee_structures.len();
        self.working.fee_structures.retain(|s| s.id != id);
        Ok(self.working.fee_structures.len() != before)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        if self.working.invoices.iter().any(|i| i.invoice_number == invoice.invoice_number) {
            return Err(PortError::conflict(format!("invoice number {} already exists", invoice.invoice_number)));
        }
        self.working.invoices.push(invoice.clone());
        Ok(())
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        let id = invoice.id;
        replace(&mut self.working.invoices, "Invoice", id, |i| i.id == id, invoice)
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.working.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn get_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, PortError> {
        Ok(self
            .working
            .invoices
            .iter()
            .find(|i| i.invoice_number == invoice_number)
            .cloned())
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, PortError> {
        Ok(self.working.invoices.iter().filter(|i| filter.matches(i)).cloned().collect())
    }

    async fn ledger_head(&mut self, student_id: &StudentId) -> Result<LedgerHead, PortError> {
        Ok(self
            .working
            .heads
            .get(student_id)
            .cloned()
            .unwrap_or_else(|| LedgerHead::empty(student_id.clone())))
    }

    async fn insert_entry(&mut self, entry: &StatementEntry) -> Result<(), PortError> {
        let head = self
            .working
            .heads
            .entry(entry.student_id.clone())
            .or_insert_with(|| LedgerHead::empty(entry.student_id.clone()));
        if entry.sequence != head.last_sequence + 1 {
            return Err(PortError::conflict(format!(
                "ledger for {} is at sequence {}, cannot append {}",
                entry.student_id, head.last_sequence, entry.sequence
            )));
        }
        head.last_sequence = entry.sequence;
        head.balance = entry.running_balance;
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn list_entries(&mut self, student_id: &StudentId, query: &LedgerQuery) -> Result<Vec<StatementEntry>, PortError> {
        let mut entries: Vec<StatementEntry> = self
            .working
            .entries
            .iter()
            .filter(|e| e.student_id == *student_id && query.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn insert_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError> {
        self.working.aid.push(aid.clone());
        Ok(())
    }

    async fn update_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError> {
        let id = aid.id;
        replace(&mut self.working.aid, "FinancialAid", id, |a| a.id == id, aid)
    }

    async fn get_aid(&mut self, id: FinancialAidId) -> Result<Option<FinancialAid>, PortError> {
        Ok(self.working.aid.iter().find(|a| a.id == id).cloned())
    }

    async fn list_aid(&mut self, filter: &AidFilter) -> Result<Vec<FinancialAid>, PortError> {
        Ok(self.working.aid.iter().filter(|a| filter.matches(a)).cloned().collect())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        if self
            .working
            .payments
            .iter()
            .any(|p| p.reference_number == payment.reference_number)
        {
            return Err(PortError::conflict(format!(
                "payment reference {} already exists",
                payment.reference_number
            )));
        }
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        let id = payment.id;
        replace(&mut self.working.payments, "Payment", id, |p| p.id == id, payment)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.working.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn get_payment_by_reference(&mut self, reference_number: &str) -> Result<Option<Payment>, PortError> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| p.reference_number == reference_number)
            .cloned())
    }

    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, PortError> {
        let mut payments: Vec<Payment> = self.working.payments.iter().filter(|p| filter.matches(p)).cloned().collect();
        payments.sort_by_key(|p| p.payment_date);
        Ok(payments)
    }

    async fn insert_refund(&mut self, refund: &Refund) -> Result<(), PortError> {
        self.working.refunds.push(refund.clone());
        Ok(())
    }

    async fn update_refund(&mut self, refund: &Refund) -> Result<(), PortError> {
        let id = refund.id;
        replace(&mut self.working.refunds, "Refund", id, |r| r.id == id, refund)
    }

    async fn get_refund(&mut self, id: RefundId) -> Result<Option<Refund>, PortError> {
        Ok(self.working.refunds.iter().find(|r| r.id == id).cloned())
    }

    async fn list_refunds(&mut self, student_id: &StudentId) -> Result<Vec<Refund>, PortError> {
        Ok(self
            .working
            .refunds
            .iter()
            .filter(|r| r.student_id == *student_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
