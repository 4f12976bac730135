//! The `Invoice` aggregate.
//!
//! Invariant: `balance == max(0, total - paid_total)` after every mutation, and
//! `status` is re-derived from the status calculator whenever money moves.
//! Items are fixed at creation; payments are append-only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use backoffice_core::{
    AggregateRoot, Audited, CustomerId, DomainError, DomainResult, InvoiceId, InvoiceItemId, PaymentId,
    ProductId, Stampable, TenantId, TenantScoped,
};

use backoffice_tenancy::{AuditStamper, RequestScope};

use crate::status::{CreditDays, InvoiceStatus, PaymentType, resolve_due_date, resolve_status};

pub const CASH_METHOD: &str = "CASH";
pub const MANUAL_MARK_METHOD: &str = "MANUAL_MARK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    #[serde(skip)]
    pub tenant: TenantScoped,
    pub invoice_id: InvoiceId,
    pub amount: i64,
    pub method: String,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
    #[serde(skip)]
    pub audit: Audited,
}

impl Stampable for Payment {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }

    fn audit_mut(&mut self) -> Option<&mut Audited> {
        Some(&mut self.audit)
    }
}

/// A line whose price has already been resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub number: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub payment_type: PaymentType,
    pub credit_days: CreditDays,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<PricedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub amount: i64,
    pub method: String,
    pub reference: Option<String>,
}

/// Flat representation used by stores to rebuild an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceParts {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub number: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub credit_days_applied: CreditDays,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub total: i64,
    pub paid_total: i64,
    pub balance: i64,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub version: u64,
    pub audit: Audited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant: TenantScoped,
    number: String,
    customer_id: Option<CustomerId>,
    customer_name: Option<String>,
    issued_at: DateTime<Utc>,
    payment_type: PaymentType,
    credit_days_applied: CreditDays,
    due_date: DateTime<Utc>,
    status: InvoiceStatus,
    total: i64,
    paid_total: i64,
    balance: i64,
    items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
    version: u64,
    audit: Audited,
}

impl Invoice {
    /// Create a new invoice from priced lines.
    ///
    /// Cash invoices are settled immediately by an implicit `CASH` payment.
    pub fn open(draft: InvoiceDraft, now: DateTime<Utc>, threshold_days: u32) -> DomainResult<Self> {
        if draft.lines.is_empty() {
            return Err(DomainError::validation("invoice items required"));
        }
        if draft.payment_type == PaymentType::Credit && draft.customer_id.is_none() {
            return Err(DomainError::validation("customer is required for credit invoices"));
        }
        let credit_days = match draft.payment_type {
            PaymentType::Cash => CreditDays::ZERO,
            PaymentType::Credit => draft.credit_days,
        };

        let mut items = Vec::with_capacity(draft.lines.len());
        let mut total: i64 = 0;
        for (idx, line) in draft.lines.into_iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation("item quantity must be greater than zero"));
            }
            if line.unit_price < 0 {
                return Err(DomainError::validation("unit price must not be negative"));
            }
            let line_total = line
                .quantity
                .checked_mul(line.unit_price)
                .ok_or_else(|| DomainError::validation("line total overflow"))?;
            total = total
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("invoice total overflow"))?;
            items.push(InvoiceItem {
                id: InvoiceItemId::new(),
                line_no: idx as u32 + 1,
                product_id: line.product_id,
                description: line.description,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total,
            });
        }

        let due_date = resolve_due_date(draft.issued_at, draft.payment_type, credit_days);
        let id = InvoiceId::new();
        let mut invoice = Self {
            id,
            tenant: TenantScoped::unassigned(),
            number: draft.number,
            customer_id: draft.customer_id,
            customer_name: draft.customer_name,
            issued_at: draft.issued_at,
            payment_type: draft.payment_type,
            credit_days_applied: credit_days,
            due_date,
            status: resolve_status(total, due_date, now, threshold_days),
            total,
            paid_total: 0,
            balance: total,
            items,
            payments: Vec::new(),
            version: 0,
            audit: Audited::default(),
        };

        if invoice.payment_type == PaymentType::Cash && invoice.balance > 0 {
            let settle = invoice.new_payment(invoice.balance, CASH_METHOD, None, draft.issued_at);
            invoice.apply_payment(settle, now, threshold_days);
        }

        Ok(invoice)
    }

    /// Rebuild from storage. Rejects rows that break the balance invariant.
    pub fn from_parts(parts: InvoiceParts) -> DomainResult<Self> {
        if parts.balance != (parts.total - parts.paid_total).max(0) || parts.balance < 0 {
            return Err(DomainError::internal(format!(
                "invoice {} violates the balance invariant",
                parts.id
            )));
        }
        Ok(Self {
            id: parts.id,
            tenant: TenantScoped::assigned(parts.tenant_id),
            number: parts.number,
            customer_id: parts.customer_id,
            customer_name: parts.customer_name,
            issued_at: parts.issued_at,
            payment_type: parts.payment_type,
            credit_days_applied: parts.credit_days_applied,
            due_date: parts.due_date,
            status: parts.status,
            total: parts.total,
            paid_total: parts.paid_total,
            balance: parts.balance,
            items: parts.items,
            payments: parts.payments,
            version: parts.version,
            audit: parts.audit,
        })
    }

    /// Apply a payment. Overpayment is rejected, never clamped.
    pub fn register_payment(
        &mut self,
        payment: NewPayment,
        now: DateTime<Utc>,
        threshold_days: u32,
    ) -> DomainResult<Payment> {
        if payment.amount <= 0 {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        let method = payment.method.trim();
        if method.is_empty() {
            return Err(DomainError::validation("payment method is required"));
        }
        if payment.amount > self.balance {
            return Err(DomainError::validation(format!(
                "payment of {} exceeds current balance {}",
                payment.amount, self.balance
            )));
        }

        let reference = payment
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let recorded = self.new_payment(payment.amount, &method.to_uppercase(), reference, now);
        self.apply_payment(recorded.clone(), now, threshold_days);
        Ok(recorded)
    }

    /// Settle whatever is left with a `MANUAL_MARK` payment. `None` when the
    /// invoice was already settled.
    pub fn mark_paid(&mut self, now: DateTime<Utc>, threshold_days: u32) -> Option<Payment> {
        if self.balance <= 0 {
            self.status = InvoiceStatus::Paid;
            return None;
        }
        let recorded = self.new_payment(self.balance, MANUAL_MARK_METHOD, None, now);
        self.apply_payment(recorded.clone(), now, threshold_days);
        Some(recorded)
    }

    /// Status against `now`, ignoring the stored snapshot.
    pub fn status_at(&self, now: DateTime<Utc>, threshold_days: u32) -> InvoiceStatus {
        resolve_status(self.balance, self.due_date, now, threshold_days)
    }

    /// Mark the aggregate as persisted at `version`.
    pub fn persisted_at(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    fn new_payment(
        &self,
        amount: i64,
        method: &str,
        reference: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Payment {
        Payment {
            id: PaymentId::new(),
            tenant: self.tenant,
            invoice_id: self.id,
            amount,
            method: method.to_string(),
            reference,
            paid_at,
            audit: Audited::default(),
        }
    }

    fn apply_payment(&mut self, payment: Payment, now: DateTime<Utc>, threshold_days: u32) {
        self.paid_total += payment.amount;
        self.balance = (self.total - self.paid_total).max(0);
        self.status = resolve_status(self.balance, self.due_date, now, threshold_days);
        self.payments.push(payment);
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.tenant_id()
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn payment_type(&self) -> PaymentType {
        self.payment_type
    }

    pub fn credit_days_applied(&self) -> CreditDays {
        self.credit_days_applied
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    /// Snapshot taken at the last mutation.
    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn paid_total(&self) -> i64 {
        self.paid_total
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn audit(&self) -> &Audited {
        &self.audit
    }

    /// Insert-stamp the payments about to be persisted: every payment, or only
    /// `only` when set. Amounts and balances are never touched.
    pub fn stamp_payments(
        &mut self,
        stamper: &AuditStamper,
        scope: &RequestScope,
        only: Option<PaymentId>,
    ) -> DomainResult<()> {
        for payment in self
            .payments
            .iter_mut()
            .filter(|p| only.is_none_or(|id| p.id == id))
        {
            stamper.on_insert(scope, payment)?;
        }
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Stampable for Invoice {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }

    fn audit_mut(&mut self) -> Option<&mut Audited> {
        Some(&mut self.audit)
    }
}
