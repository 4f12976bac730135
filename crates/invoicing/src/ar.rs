//! Accounts-receivable aging.
//!
//! Every figure here is derived from balances and due dates against the
//! caller's clock. The persisted status snapshot is never consulted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use backoffice_core::{Clock, CustomerId, DomainResult, InvoiceId, Page, PageRequest};
use backoffice_tenancy::{TenantContext, TenantSettingsSource};

use crate::status::days_until_due;
use crate::store::{InvoiceStore, ReceivableFilter};
use crate::{Invoice, InvoiceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArItem {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub days_to_due: i64,
    pub days_overdue: i64,
    pub total: i64,
    pub balance: i64,
    pub status: InvoiceStatus,
}

impl ArItem {
    pub fn age(invoice: &Invoice, now: DateTime<Utc>, threshold_days: u32) -> Self {
        let days = days_until_due(invoice.due_date(), now);
        Self {
            invoice_id: invoice.id(),
            invoice_number: invoice.number().to_string(),
            customer_id: invoice.customer_id(),
            customer_name: invoice.customer_name().map(str::to_string),
            issued_at: invoice.issued_at(),
            due_date: invoice.due_date(),
            days_to_due: days.max(0),
            days_overdue: (-days).max(0),
            total: invoice.total(),
            balance: invoice.balance(),
            status: invoice.status_at(now, threshold_days),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArSummary {
    pub total_pending: i64,
    pub overdue_count: u64,
    pub due_soon_count: u64,
    pub overdue_amount: i64,
    pub due_soon_amount: i64,
}

impl ArSummary {
    /// Paid rows contribute nothing.
    pub fn collect<'a>(items: impl IntoIterator<Item = &'a ArItem>) -> Self {
        items
            .into_iter()
            .filter(|item| item.status != InvoiceStatus::Paid)
            .fold(Self::default(), |mut acc, item| {
                acc.total_pending += item.balance;
                match item.status {
                    InvoiceStatus::Overdue => {
                        acc.overdue_count += 1;
                        acc.overdue_amount += item.balance;
                    }
                    InvoiceStatus::DueSoon => {
                        acc.due_soon_count += 1;
                        acc.due_soon_amount += item.balance;
                    }
                    _ => {}
                }
                acc
            })
    }
}

/// Shared AR query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArQuery {
    pub include_paid: bool,
    pub customer_id: Option<CustomerId>,
    pub search: Option<String>,
    /// Overrides the tenant's due-soon threshold.
    pub threshold_days: Option<u32>,
    /// Only invoices issued within the last N days.
    pub range_days: Option<u32>,
    pub issued_from: Option<DateTime<Utc>>,
    pub issued_to: Option<DateTime<Utc>>,
}

impl ArQuery {
    fn filter(&self, now: DateTime<Utc>) -> ReceivableFilter {
        let range_start = self
            .range_days
            .map(|days| now - Duration::days(i64::from(days)));
        // Both bounds apply; keep the later start.
        let issued_from = match (self.issued_from, range_start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        ReceivableFilter {
            include_paid: self.include_paid,
            customer_id: self.customer_id,
            search: self.search.clone(),
            issued_from,
            issued_to: self.issued_to,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenItemsQuery {
    pub query: ArQuery,
    pub status: Option<InvoiceStatus>,
    pub page: PageRequest,
}

/// Age every candidate invoice against `now`.
pub fn age_receivables(invoices: &[Invoice], now: DateTime<Utc>, threshold_days: u32) -> Vec<ArItem> {
    invoices
        .iter()
        .map(|invoice| ArItem::age(invoice, now, threshold_days))
        .collect()
}

pub fn due_soon_items(items: Vec<ArItem>) -> Vec<ArItem> {
    let mut out: Vec<_> = items
        .into_iter()
        .filter(|i| i.status == InvoiceStatus::DueSoon)
        .collect();
    out.sort_by(|a, b| {
        a.days_to_due
            .cmp(&b.days_to_due)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
    });
    out
}

pub fn overdue_items(items: Vec<ArItem>) -> Vec<ArItem> {
    let mut out: Vec<_> = items
        .into_iter()
        .filter(|i| i.status == InvoiceStatus::Overdue)
        .collect();
    out.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
    });
    out
}

pub fn open_items_page(items: Vec<ArItem>, status: Option<InvoiceStatus>, page: PageRequest) -> Page<ArItem> {
    let mut out: Vec<_> = items
        .into_iter()
        .filter(|i| status.is_none_or(|s| i.status == s))
        .collect();
    out.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
    });
    Page::from_vec(out, page)
}

#[derive(Clone)]
pub struct ReceivablesService {
    store: Arc<dyn InvoiceStore>,
    settings: Arc<dyn TenantSettingsSource>,
    clock: Arc<dyn Clock>,
}

impl ReceivablesService {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        settings: Arc<dyn TenantSettingsSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, settings, clock }
    }

    pub async fn summary(&self, tenant: &TenantContext, query: &ArQuery) -> DomainResult<ArSummary> {
        let items = self.aged(tenant, query).await?;
        Ok(ArSummary::collect(&items))
    }

    pub async fn due_soon(&self, tenant: &TenantContext, query: &ArQuery) -> DomainResult<Vec<ArItem>> {
        Ok(due_soon_items(self.aged(tenant, query).await?))
    }

    pub async fn overdue(&self, tenant: &TenantContext, query: &ArQuery) -> DomainResult<Vec<ArItem>> {
        Ok(overdue_items(self.aged(tenant, query).await?))
    }

    pub async fn open_items(&self, tenant: &TenantContext, query: &OpenItemsQuery) -> DomainResult<Page<ArItem>> {
        let items = self.aged(tenant, &query.query).await?;
        Ok(open_items_page(items, query.status, query.page))
    }

    async fn aged(&self, tenant: &TenantContext, query: &ArQuery) -> DomainResult<Vec<ArItem>> {
        let now = self.clock.now();
        let threshold = match query.threshold_days {
            Some(days) => days.clamp(1, 30),
            None => self.settings.tenant_settings(tenant).await?.due_soon_threshold(),
        };
        let invoices = self.store.list_receivables(tenant, &query.filter(now)).await?;
        tracing::debug!(
            tenant_id = %tenant.tenant_id(),
            candidates = invoices.len(),
            threshold,
            "aging receivables"
        );
        Ok(age_receivables(&invoices, now, threshold))
    }
}
