use async_trait::async_trait;
use chrono::{DateTime, Utc};

use backoffice_core::{CustomerId, DomainResult, ExpectedVersion, InvoiceId, Page, PageRequest};
use backoffice_tenancy::{RequestScope, TenantContext};

use crate::collaborators::OutboundMovement;
use crate::invoice::InvoiceDraft;
use crate::numbering::format_invoice_number;
use crate::{Invoice, InvoiceStatus, Payment, PaymentType};

/// A validated invoice still waiting for its number.
///
/// [`InvoiceStore::insert_invoice`] draws the tenant's next sequence value,
/// calls [`PendingInvoice::numbered`] and persists the invoice together with
/// its outbound stock movements as one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvoice {
    pub numbering_format: String,
    /// `number` is ignored and overwritten.
    pub draft: InvoiceDraft,
    pub opened_at: DateTime<Utc>,
    pub due_soon_threshold: u32,
}

impl PendingInvoice {
    pub fn numbered(&self, sequence: u64) -> DomainResult<(Invoice, Vec<OutboundMovement>)> {
        let mut draft = self.draft.clone();
        draft.number = format_invoice_number(&self.numbering_format, sequence);
        let invoice = Invoice::open(draft, self.opened_at, self.due_soon_threshold)?;

        let reason = format!("Invoice {}", invoice.number());
        let movements = invoice
            .items()
            .iter()
            .map(|item| OutboundMovement {
                invoice_id: invoice.id(),
                product_id: item.product_id,
                quantity: item.quantity,
                reason: reason.clone(),
            })
            .collect();
        Ok((invoice, movements))
    }
}

/// Filters for the plain invoice listing (uses the stored status snapshot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub payment_type: Option<PaymentType>,
    pub customer_id: Option<CustomerId>,
    pub issued_from: Option<DateTime<Utc>>,
    pub issued_to: Option<DateTime<Utc>>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.status.is_none_or(|s| invoice.status() == s)
            && self.payment_type.is_none_or(|p| invoice.payment_type() == p)
            && self.customer_id.is_none_or(|c| invoice.customer_id() == Some(c))
            && self.issued_from.is_none_or(|from| invoice.issued_at() >= from)
            && self.issued_to.is_none_or(|to| invoice.issued_at() <= to)
            && matches_search(self.search.as_deref(), invoice)
    }
}

/// Candidate rows for AR aggregation. Status is not filtered here: it depends
/// on the caller's clock and is derived afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivableFilter {
    pub include_paid: bool,
    pub customer_id: Option<CustomerId>,
    pub search: Option<String>,
    pub issued_from: Option<DateTime<Utc>>,
    pub issued_to: Option<DateTime<Utc>>,
}

impl ReceivableFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        invoice.payment_type() == PaymentType::Credit
            && (self.include_paid || invoice.balance() > 0)
            && self.customer_id.is_none_or(|c| invoice.customer_id() == Some(c))
            && self.issued_from.is_none_or(|from| invoice.issued_at() >= from)
            && self.issued_to.is_none_or(|to| invoice.issued_at() <= to)
            && matches_search(self.search.as_deref(), invoice)
    }
}

/// Case-insensitive substring match on number or customer name.
fn matches_search(search: Option<&str>, invoice: &Invoice) -> bool {
    let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return true;
    };
    let term = term.to_lowercase();
    invoice.number().to_lowercase().contains(&term)
        || invoice
            .customer_name()
            .is_some_and(|name| name.to_lowercase().contains(&term))
}

/// Tenant-scoped invoice persistence.
///
/// Reads take the resolved [`TenantContext`]; writes take a [`RequestScope`] and
/// stamp tenant and audit metadata before persisting. An id that belongs to
/// another tenant behaves exactly like an unknown id.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Number and persist a new invoice with its items, any creation-time
    /// payments and its stock movements. Fails `conflict` if the number is
    /// already used in the tenant. On any failure nothing is written and the
    /// tenant's sequence does not advance.
    async fn insert_invoice(&self, scope: &RequestScope, pending: PendingInvoice) -> DomainResult<Invoice>;

    async fn find_invoice(&self, tenant: &TenantContext, id: InvoiceId) -> DomainResult<Option<Invoice>>;

    /// Persist `invoice` and its newly appended `payment`, only if the stored version
    /// still matches `expected`. Returns the stored aggregate with its new
    /// version; a stale version fails with `DomainError::Concurrency`.
    async fn save_payment(
        &self,
        scope: &RequestScope,
        invoice: Invoice,
        payment: Payment,
        expected: ExpectedVersion,
    ) -> DomainResult<Invoice>;

    /// Ordered by issue date, newest first.
    async fn list_invoices(
        &self,
        tenant: &TenantContext,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> DomainResult<Page<Invoice>>;

    async fn list_receivables(
        &self,
        tenant: &TenantContext,
        filter: &ReceivableFilter,
    ) -> DomainResult<Vec<Invoice>>;
}
