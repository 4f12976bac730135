use async_trait::async_trait;

use backoffice_core::{
    AggregateRoot, CustomerId, DomainError, DomainResult, ExpectedVersion, InvoiceId, Page,
    PageRequest, ProductId,
};
use backoffice_invoicing::{
    CustomerDirectory, CustomerRef, Invoice, InvoiceFilter, InvoiceStore, Payment, PendingInvoice,
    ProductCatalog, ProductRef, ReceivableFilter,
};
use backoffice_tenancy::{RequestScope, TenantContext};

use super::InMemoryStore;
use crate::StockMovement;

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn insert_invoice(&self, scope: &RequestScope, pending: PendingInvoice) -> DomainResult<Invoice> {
        let tenant_id = scope.tenant_id();
        let mut state = self.write()?;

        // The sequence is only written back once every row below is ready.
        let sequence = state.invoice_sequences.get(&tenant_id).copied().unwrap_or(0) + 1;
        let (mut invoice, movements) = pending.numbered(sequence)?;
        if state
            .invoices
            .rows(tenant_id)
            .any(|existing| existing.number() == invoice.number())
        {
            return Err(DomainError::conflict(format!(
                "invoice number {} already exists",
                invoice.number()
            )));
        }

        self.stamper.on_insert(scope, &mut invoice)?;
        invoice.stamp_payments(&self.stamper, scope, None)?;
        let invoice = invoice.persisted_at(1);
        let mut rows = Vec::with_capacity(movements.len());
        for movement in movements {
            let mut row = StockMovement::outbound(movement);
            self.stamper.on_insert(scope, &mut row)?;
            rows.push(row);
        }

        state.invoice_sequences.insert(tenant_id, sequence);
        state.invoices.insert(tenant_id, invoice.id(), invoice.clone());
        for row in rows {
            state.movements.insert(tenant_id, row.id, row);
        }
        Ok(invoice)
    }

    async fn find_invoice(&self, tenant: &TenantContext, id: InvoiceId) -> DomainResult<Option<Invoice>> {
        let state = self.read()?;
        Ok(state.invoices.get(tenant.tenant_id(), &id).cloned())
    }

    async fn save_payment(
        &self,
        scope: &RequestScope,
        mut invoice: Invoice,
        payment: Payment,
        expected: ExpectedVersion,
    ) -> DomainResult<Invoice> {
        self.stamper.on_update(scope, &mut invoice)?;
        invoice.stamp_payments(&self.stamper, scope, Some(payment.id))?;

        let mut state = self.write()?;
        let tenant_id = scope.tenant_id();
        let current = state
            .invoices
            .get(tenant_id, &invoice.id())
            .ok_or_else(|| DomainError::not_found("invoice not found"))?
            .version();
        expected.check(current)?;

        let invoice = invoice.persisted_at(current + 1);
        state.invoices.insert(tenant_id, invoice.id(), invoice.clone());
        Ok(invoice)
    }

    async fn list_invoices(
        &self,
        tenant: &TenantContext,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> DomainResult<Page<Invoice>> {
        let state = self.read()?;
        let mut rows: Vec<_> = state
            .invoices
            .rows(tenant.tenant_id())
            .filter(|invoice| filter.matches(invoice))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.issued_at()
                .cmp(&a.issued_at())
                .then_with(|| b.number().cmp(a.number()))
        });
        Ok(Page::from_vec(rows, page))
    }

    async fn list_receivables(
        &self,
        tenant: &TenantContext,
        filter: &ReceivableFilter,
    ) -> DomainResult<Vec<Invoice>> {
        let state = self.read()?;
        let mut rows: Vec<_> = state
            .invoices
            .rows(tenant.tenant_id())
            .filter(|invoice| filter.matches(invoice))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.number().cmp(b.number()));
        Ok(rows)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_products(&self, tenant: &TenantContext, ids: &[ProductId]) -> DomainResult<Vec<ProductRef>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(tenant.tenant_id(), id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_customer(&self, tenant: &TenantContext, id: CustomerId) -> DomainResult<Option<CustomerRef>> {
        let state = self.read()?;
        Ok(state.customers.get(tenant.tenant_id(), &id).cloned())
    }
}
