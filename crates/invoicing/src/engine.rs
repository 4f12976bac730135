//! Invoice operations against tenant-scoped storage.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use backoffice_core::{
    AggregateRoot, Clock, CustomerId, DomainError, DomainResult, ExpectedVersion, InvoiceId, Page,
    PageRequest, ProductId,
};
use backoffice_tenancy::{RequestScope, TenantContext, TenantSettingsSource};

use crate::collaborators::{CustomerDirectory, CustomerRef, ProductCatalog};
use crate::invoice::{Invoice, InvoiceDraft, NewPayment, Payment, PricedLine};
use crate::status::{CreditDays, PaymentType};
use crate::store::{InvoiceFilter, InvoiceStore, PendingInvoice};

/// Attempts for a payment write that keeps losing the version race.
const MAX_WRITE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoiceItem {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Defaults to the catalog price.
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoice {
    pub customer_id: Option<CustomerId>,
    /// Raw client value, e.g. `"CASH"` or `"CREDITO"`.
    pub payment_type: String,
    pub credit_days: Option<i64>,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPayment {
    pub amount: i64,
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub invoice: Invoice,
    pub payment: Payment,
}

#[derive(Clone)]
pub struct InvoiceEngine {
    store: Arc<dyn InvoiceStore>,
    products: Arc<dyn ProductCatalog>,
    customers: Arc<dyn CustomerDirectory>,
    settings: Arc<dyn TenantSettingsSource>,
    clock: Arc<dyn Clock>,
}

impl InvoiceEngine {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        products: Arc<dyn ProductCatalog>,
        customers: Arc<dyn CustomerDirectory>,
            settings: Arc<dyn TenantSettingsSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            products,
            customers,
            settings,
            clock,
        }
    }

    pub async fn create_invoice(&self, scope: &RequestScope, cmd: CreateInvoice) -> DomainResult<Invoice> {
        if cmd.items.is_empty() {
            return Err(DomainError::validation("invoice items required"));
        }
        let payment_type: PaymentType = cmd.payment_type.parse()?;
        for item in &cmd.items {
            if item.quantity <= 0 {
                return Err(DomainError::validation("item quantity must be greater than zero"));
            }
            if item.unit_price.is_some_and(|p| p < 0) {
                return Err(DomainError::validation("unit price must not be negative"));
            }
        }
        if payment_type == PaymentType::Credit && cmd.customer_id.is_none() {
            return Err(DomainError::validation("customer is required for credit invoices"));
        }

        let tenant = scope.tenant();
        let customer = match cmd.customer_id {
            Some(id) => Some(
                self.customers
                    .find_customer(tenant, id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("customer not found"))?,
            ),
            None => None,
        };

        let wanted: Vec<ProductId> = cmd
            .items
            .iter()
            .map(|i| i.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog: HashMap<ProductId, _> = self
            .products
            .find_products(tenant, &wanted)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| (p.id, p))
            .collect();
        if wanted.iter().any(|id| !catalog.contains_key(id)) {
            return Err(DomainError::validation("one or more products are invalid"));
        }

        let settings = self.settings.tenant_settings(tenant).await?;
        let credit_days = resolve_credit_days(payment_type, cmd.credit_days, customer.as_ref(), settings.default_credit_days)?;

        let lines = cmd
            .items
            .iter()
            .map(|item| {
                let product = &catalog[&item.product_id];
                PricedLine {
                    product_id: item.product_id,
                    description: product.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price.unwrap_or(product.price),
                }
            })
            .collect();

        let now = self.clock.now();
        let pending = PendingInvoice {
            numbering_format: settings.invoice_numbering_format.clone(),
            draft: InvoiceDraft {
                number: String::new(),
                customer_id: customer.as_ref().map(|c| c.id),
                customer_name: customer.map(|c| c.name),
                payment_type,
                credit_days,
                issued_at: now,
                lines,
            },
            opened_at: now,
            due_soon_threshold: settings.due_soon_threshold(),
        };
        let invoice = self.store.insert_invoice(scope, pending).await?;

        tracing::info!(
            tenant_id = %scope.tenant_id(),
            invoice_id = %invoice.id(),
            number = invoice.number(),
            total = invoice.total(),
            payment_type = payment_type.as_str(),
            "invoice created"
        );
        Ok(invoice)
    }

    /// Apply a payment. The overpayment check holds at commit time: a write
    /// against a stale version is retried from a fresh read.
    pub async fn register_payment(
        &self,
        scope: &RequestScope,
        invoice_id: InvoiceId,
        cmd: RegisterPayment,
    ) -> DomainResult<PaymentReceipt> {
        let threshold = self.threshold(scope.tenant()).await?;
        let written = self.write_payment(scope, invoice_id, |invoice, now| {
            invoice
                .register_payment(
                    NewPayment {
                        amount: cmd.amount,
                        method: cmd.method.clone(),
                        reference: cmd.reference.clone(),
                    },
                    now,
                    threshold,
                )
                .map(Some)
        })
        .await?;
        match written {
            (invoice, Some(payment)) => Ok(PaymentReceipt { invoice, payment }),
            (_, None) => Err(DomainError::internal("payment was not recorded")),
        }
    }

    /// Settle the remaining balance. Idempotent once the balance is zero.
    pub async fn mark_paid(&self, scope: &RequestScope, invoice_id: InvoiceId) -> DomainResult<Invoice> {
        let threshold = self.threshold(scope.tenant()).await?;
        self.write_payment(scope, invoice_id, |invoice, now| Ok(invoice.mark_paid(now, threshold)))
            .await
            .map(|(invoice, _)| invoice)
    }

    pub async fn get_invoice(&self, tenant: &TenantContext, invoice_id: InvoiceId) -> DomainResult<Invoice> {
        self.store
            .find_invoice(tenant, invoice_id)
            .await?
            .ok_or_else(|| DomainError::not_found("invoice not found"))
    }

    pub async fn list_invoices(
        &self,
        tenant: &TenantContext,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> DomainResult<Page<Invoice>> {
        self.store.list_invoices(tenant, filter, page).await
    }

    async fn threshold(&self, tenant: &TenantContext) -> DomainResult<u32> {
        Ok(self.settings.tenant_settings(tenant).await?.due_soon_threshold())
    }

    /// Read, mutate, compare-and-save; retried on version conflicts only.
    async fn write_payment<F>(
        &self,
        scope: &RequestScope,
        invoice_id: InvoiceId,
        mut decide: F,
    ) -> DomainResult<(Invoice, Option<Payment>)>
    where
        F: FnMut(&mut Invoice, DateTime<Utc>) -> DomainResult<Option<Payment>> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut invoice = self.get_invoice(scope.tenant(), invoice_id).await?;
            let expected = ExpectedVersion::Exact(invoice.version());

            let Some(payment) = decide(&mut invoice, self.clock.now())? else {
                return Ok((invoice, None));
            };

            match self
                .store
                .save_payment(scope, invoice, payment.clone(), expected)
                .await
            {
                Ok(saved) => {
                    let stored_payment = saved
                        .payments()
                        .iter()
                        .find(|p| p.id == payment.id)
                        .cloned()
                        .unwrap_or(payment);
                    tracing::info!(
                        tenant_id = %scope.tenant_id(),
                        invoice_id = %invoice_id,
                        amount = stored_payment.amount,
                        method = %stored_payment.method,
                        balance = saved.balance(),
                        "payment registered"
                    );
                    return Ok((saved, Some(stored_payment)));
                }
                Err(e) if e.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(invoice_id = %invoice_id, attempt, "invoice version moved; retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn resolve_credit_days(
    payment_type: PaymentType,
    explicit: Option<i64>,
    customer: Option<&CustomerRef>,
    tenant_default: u16,
) -> DomainResult<CreditDays> {
    match payment_type {
        PaymentType::Cash => Ok(CreditDays::ZERO),
        PaymentType::Credit => {
            let days = explicit
                .or_else(|| customer.and_then(|c| c.default_credit_days).map(i64::from))
                .unwrap_or(i64::from(tenant_default));
            CreditDays::new(days)
        }
    }
}
