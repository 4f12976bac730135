use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use backoffice_core::{
    AggregateRoot, CustomerId, DomainError, DomainResult, ExpectedVersion, InvoiceId, Page, PageRequest, ProductId,
    TenantId,
};
use backoffice_invoicing::{
    CustomerDirectory, CustomerRef, Invoice, InvoiceFilter, InvoiceStore, Payment, PendingInvoice,
    ProductCatalog, ProductRef, ReceivableFilter,
};
use backoffice_tenancy::{RequestScope, TenantContext};

use super::rows::{CustomerRow, INVOICE_COLUMNS, InvoiceRow, ItemRow, PaymentRow, ProductRow, decode};
use super::{PgStore, map_sqlx_error};
use crate::StockMovement;

/// Shared predicate for invoice listings. `$1` is always the tenant.
const LIST_FILTER: &str = r#"
    tenant_id = $1
    AND ($2::text IS NULL OR status = $2)
    AND ($3::text IS NULL OR payment_type = $3)
    AND ($4::uuid IS NULL OR customer_id = $4)
    AND ($5::timestamptz IS NULL OR issued_at >= $5)
    AND ($6::timestamptz IS NULL OR issued_at <= $6)
    AND ($7::text IS NULL OR number ILIKE '%' || $7 || '%' OR customer_name ILIKE '%' || $7 || '%')
"#;

const RECEIVABLE_FILTER: &str = r#"
    tenant_id = $1
    AND payment_type = 'CREDIT'
    AND ($2::boolean OR balance > 0)
    AND ($3::uuid IS NULL OR customer_id = $3)
    AND ($4::timestamptz IS NULL OR issued_at >= $4)
    AND ($5::timestamptz IS NULL OR issued_at <= $5)
    AND ($6::text IS NULL OR number ILIKE '%' || $6 || '%' OR customer_name ILIKE '%' || $6 || '%')
"#;

fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PgStore {
    /// Attach items and payments to invoice header rows, preserving row order.
    async fn hydrate(&self, tenant_id: TenantId, rows: Vec<PgRow>) -> DomainResult<Vec<Invoice>> {
        let headers = rows
            .iter()
            .map(decode::<InvoiceRow>)
            .collect::<DomainResult<Vec<_>>>()?;
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = headers.iter().map(InvoiceRow::id).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT id, invoice_id, line_no, product_id, description, quantity, unit_price, line_total
            FROM invoice_items
            WHERE tenant_id = $1 AND invoice_id = ANY($2)
            ORDER BY line_no ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_invoice_items", e))?;

        let payment_rows = sqlx::query(
            r#"
            SELECT id, tenant_id, invoice_id, amount, method, reference, paid_at, created_at, created_by
            FROM payments
            WHERE tenant_id = $1 AND invoice_id = ANY($2)
            ORDER BY paid_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_payments", e))?;

        let mut items: HashMap<Uuid, Vec<_>> = HashMap::new();
        for row in &item_rows {
            let item = decode::<ItemRow>(row)?;
            items.entry(item.invoice_id).or_default().push(item.into_domain());
        }
        let mut payments: HashMap<Uuid, Vec<Payment>> = HashMap::new();
        for row in &payment_rows {
            let payment = decode::<PaymentRow>(row)?.into_domain();
            payments
                .entry(*payment.invoice_id.as_uuid())
                .or_default()
                .push(payment);
        }

        headers
            .into_iter()
            .map(|header| {
                let id = header.id();
                header.into_domain(
                    items.remove(&id).unwrap_or_default(),
                    payments.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn insert_payment_row<'e, E>(&self, executor: E, payment: &Payment) -> DomainResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let tenant_id = payment
            .tenant
            .tenant_id()
            .ok_or_else(|| DomainError::internal("payment was not stamped with a tenant"))?;
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, tenant_id, invoice_id, amount, method, reference, paid_at, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(payment.invoice_id.as_uuid())
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(&payment.reference)
        .bind(payment.paid_at)
        .bind(payment.audit.created_at)
        .bind(payment.audit.created_by.map(|u| *u.as_uuid()))
        .execute(executor)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for PgStore {
    async fn insert_invoice(&self, scope: &RequestScope, pending: PendingInvoice) -> DomainResult<Invoice> {
        let tenant_id = scope.tenant_id();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock on the tenant's settings until commit; a rollback gives the
        // number back.
        let row = sqlx::query(
            r#"
            INSERT INTO tenant_settings (tenant_id, invoice_sequence)
            VALUES ($1, 1)
            ON CONFLICT (tenant_id)
            DO UPDATE SET invoice_sequence = tenant_settings.invoice_sequence + 1
            RETURNING invoice_sequence
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("next_invoice_sequence", e))?;
        let sequence: i64 = row
            .try_get("invoice_sequence")
            .map_err(|e| map_sqlx_error("next_invoice_sequence", e))?;
        let sequence =
            u64::try_from(sequence).map_err(|e| DomainError::internal(format!("invalid invoice sequence: {e}")))?;

        let (mut invoice, movements) = pending.numbered(sequence)?;
        self.stamper.on_insert(scope, &mut invoice)?;
        invoice.stamp_payments(&self.stamper, scope, None)?;
        let invoice = invoice.persisted_at(1);

        sqlx::query(
            r#"
            INSERT INTO invoices
                (id, tenant_id, number, customer_id, customer_name, issued_at, payment_type,
                 credit_days_applied, due_date, status, total, paid_total, balance, version,
                 created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(invoice.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(invoice.number())
        .bind(invoice.customer_id().map(|c| *c.as_uuid()))
        .bind(invoice.customer_name())
        .bind(invoice.issued_at())
        .bind(invoice.payment_type().as_str())
        .bind(i32::from(invoice.credit_days_applied().get()))
        .bind(invoice.due_date())
        .bind(invoice.status().as_str())
        .bind(invoice.total())
        .bind(invoice.paid_total())
        .bind(invoice.balance())
        .bind(1_i64)
        .bind(invoice.audit().created_at)
        .bind(invoice.audit().created_by.map(|u| *u.as_uuid()))
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error("insert_invoice", e) {
            DomainError::Conflict(_) => {
                DomainError::conflict(format!("invoice number {} already exists", invoice.number()))
            }
            other => other,
        })?;

        for item in invoice.items() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items
                    (id, tenant_id, invoice_id, line_no, product_id, description, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(invoice.id().as_uuid())
            .bind(i32::try_from(item.line_no).unwrap_or(i32::MAX))
            .bind(item.product_id.as_uuid())
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_item", e))?;
        }

        for payment in invoice.payments() {
            self.insert_payment_row(&mut *tx, payment).await?;
        }

        for movement in movements {
            let mut row = StockMovement::outbound(movement);
            self.stamper.on_insert(scope, &mut row)?;
            sqlx::query(
                r#"
                INSERT INTO inventory_movements
                    (id, tenant_id, product_id, quantity, reason, invoice_id, created_at, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(row.id.as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(row.product_id.as_uuid())
            .bind(row.quantity)
            .bind(&row.reason)
            .bind(row.invoice_id.map(|i| *i.as_uuid()))
            .bind(row.audit.created_at)
            .bind(row.audit.created_by.map(|u| *u.as_uuid()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_inventory_movement", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(invoice)
    }

    async fn find_invoice(&self, tenant: &TenantContext, id: InvoiceId) -> DomainResult<Option<Invoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant.tenant_id().as_uuid())
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_invoice", e))?;
        Ok(self.hydrate(tenant.tenant_id(), rows).await?.into_iter().next())
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
        let expected_version = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(i64::try_from(v).unwrap_or(i64::MAX)),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE invoices
            SET paid_total = $3, balance = $4, status = $5, version = version + 1,
                updated_at = $6, updated_by = $7
            WHERE tenant_id = $1 AND id = $2 AND ($8::bigint IS NULL OR version = $8)
            RETURNING version
            "#,
        )
        .bind(scope.tenant_id().as_uuid())
        .bind(invoice.id().as_uuid())
        .bind(invoice.paid_total())
        .bind(invoice.balance())
        .bind(invoice.status().as_str())
        .bind(invoice.audit().updated_at)
        .bind(invoice.audit().updated_by.map(|u| *u.as_uuid()))
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_invoice_balance", e))?;

        let Some(updated) = updated else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            let exists = self.find_invoice(scope.tenant(), invoice.id()).await?;
            return Err(match exists {
                Some(current) => DomainError::concurrency(format!(
                    "invoice {} changed concurrently (expected: {:?}, actual: {})",
                    invoice.id(),
                    expected,
                    current.version()
                )),
                None => DomainError::not_found("invoice not found"),
            });
        };
        let version: i64 = updated
            .try_get("version")
            .map_err(|e| map_sqlx_error("update_invoice_balance", e))?;

        let recorded = invoice
            .payments()
            .iter()
            .find(|p| p.id == payment.id)
            .ok_or_else(|| DomainError::internal("payment missing from invoice"))?;
        self.insert_payment_row(&mut *tx, recorded).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(invoice.persisted_at(u64::try_from(version).unwrap_or_default()))
    }

    async fn list_invoices(
        &self,
        tenant: &TenantContext,
        filter: &InvoiceFilter,
        page: PageRequest,
    ) -> DomainResult<Page<Invoice>> {
        let search = search_term(&filter.search);
        let status = filter.status.map(|s| s.as_str());
        let payment_type = filter.payment_type.map(|p| p.as_str());
        let customer = filter.customer_id.map(|c| *c.as_uuid());

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM invoices WHERE {LIST_FILTER}"))
            .bind(tenant.tenant_id().as_uuid())
            .bind(status)
            .bind(payment_type)
            .bind(customer)
            .bind(filter.issued_from)
            .bind(filter.issued_to)
            .bind(&search)
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_invoices", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {LIST_FILTER} \
             ORDER BY issued_at DESC, number DESC LIMIT $8 OFFSET $9"
        ))
        .bind(tenant.tenant_id().as_uuid())
        .bind(status)
        .bind(payment_type)
        .bind(customer)
        .bind(filter.issued_from)
        .bind(filter.issued_to)
        .bind(&search)
        .bind(i64::from(page.page_size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;

        Ok(Page {
            items: self.hydrate(tenant.tenant_id(), rows).await?,
            page: page.page,
            page_size: page.page_size,
            total_items: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn list_receivables(
        &self,
        tenant: &TenantContext,
        filter: &ReceivableFilter,
    ) -> DomainResult<Vec<Invoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE {RECEIVABLE_FILTER} ORDER BY number ASC"
        ))
        .bind(tenant.tenant_id().as_uuid())
        .bind(filter.include_paid)
        .bind(filter.customer_id.map(|c| *c.as_uuid()))
        .bind(filter.issued_from)
        .bind(filter.issued_to)
        .bind(search_term(&filter.search))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_receivables", e))?;
        self.hydrate(tenant.tenant_id(), rows).await
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn find_products(&self, tenant: &TenantContext, ids: &[ProductId]) -> DomainResult<Vec<ProductRef>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, name, price, is_active FROM products WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant.tenant_id().as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_products", e))?;
        rows.iter()
            .map(|r| decode::<ProductRow>(r).map(ProductRow::into_domain))
            .collect()
    }
}

#[async_trait]
impl CustomerDirectory for PgStore {
    async fn find_customer(&self, tenant: &TenantContext, id: CustomerId) -> DomainResult<Option<CustomerRef>> {
        let row = sqlx::query(
            "SELECT id, name, default_credit_days FROM customers WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant.tenant_id().as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_customer", e))?;
        row.map(|r| decode::<CustomerRow>(&r).map(CustomerRow::into_domain))
            .transpose()
    }
}
