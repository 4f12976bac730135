use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_auth::{SessionTokens, UserSummary};
use backoffice_core::{AggregateRoot, CustomerId, DomainError, DomainResult, InvoiceId, Page, PageRequest, ProductId};
use backoffice_invoicing::{
    ArQuery, CreateInvoice, Invoice, InvoiceFilter, InvoiceItem, InvoiceStatus, NewInvoiceItem,
    OpenItemsQuery, Payment, PaymentReceipt, PaymentType, RegisterPayment,
};

// -------------------------
// Envelope
// -------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self { data, meta: None }
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        let meta = PageMeta {
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages(),
        };
        Self {
            data: page.items,
            meta: Some(meta),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub payment_type: String,
    #[serde(default, alias = "creditDays")]
    pub credit_days_applied: Option<i64>,
    #[serde(default)]
    pub items: Vec<InvoiceItemRequest>,
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(body: CreateInvoiceRequest) -> Self {
        CreateInvoice {
            customer_id: body.customer_id,
            payment_type: body.payment_type,
            credit_days: body.credit_days_applied,
            items: body
                .items
                .into_iter()
                .map(|i| NewInvoiceItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPaymentRequest {
    pub amount: i64,
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl From<RegisterPaymentRequest> for RegisterPayment {
    fn from(body: RegisterPaymentRequest) -> Self {
        RegisterPayment {
            amount: body.amount,
            method: body.method,
            reference: body.reference,
        }
    }
}

/// `GET /invoices` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub payment_type: Option<String>,
    pub customer_id: Option<CustomerId>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl InvoiceListParams {
    pub fn into_filter(self) -> DomainResult<(InvoiceFilter, PageRequest)> {
        let filter = InvoiceFilter {
            search: non_blank(self.search),
            status: non_blank(self.status)
                .map(|s| s.parse::<InvoiceStatus>())
                .transpose()?,
            payment_type: non_blank(self.payment_type)
                .map(|s| s.parse::<PaymentType>())
                .transpose()?,
            customer_id: self.customer_id,
            issued_from: parse_bound(self.from.as_deref(), Bound::Start)?,
            issued_to: parse_bound(self.to.as_deref(), Bound::End)?,
        };
        Ok((filter, PageRequest::new(self.page, self.page_size)))
    }
}

/// Query string shared by the `/ar/*` endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArParams {
    pub range_days: Option<u32>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub include_paid: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub threshold_days: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub customer_id: Option<CustomerId>,
}

impl ArParams {
    pub fn ar_query(&self) -> DomainResult<ArQuery> {
        Ok(ArQuery {
            include_paid: self.include_paid,
            customer_id: self.customer_id,
            search: non_blank(self.search.clone()),
            threshold_days: self.threshold_days,
            range_days: self.range_days,
            issued_from: parse_bound(self.from.as_deref(), Bound::Start)?,
            issued_to: parse_bound(self.to.as_deref(), Bound::End)?,
        })
    }

    pub fn open_items_query(&self) -> DomainResult<OpenItemsQuery> {
        Ok(OpenItemsQuery {
            query: self.ar_query()?,
            status: non_blank(self.status.clone())
                .map(|s| s.parse::<InvoiceStatus>())
                .transpose()?,
            page: PageRequest::new(self.page, self.page_size),
        })
    }
}

#[derive(Debug, Copy, Clone)]
enum Bound {
    Start,
    End,
}

/// RFC 3339 timestamp, or a plain `YYYY-MM-DD` date covering that whole day.
fn parse_bound(raw: Option<&str>, bound: Bound) -> DomainResult<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("invalid date '{raw}'")))?;
    let at = match bound {
        Bound::Start => date.and_time(NaiveTime::MIN),
        Bound::End => date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DomainError::validation(format!("invalid date '{raw}'")))?
            .and_time(NaiveTime::MIN)
            - chrono::Duration::nanoseconds(1),
    };
    Ok(Some(at.and_utc()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Refresh-token expiry.
    pub expires_at: DateTime<Utc>,
    pub access_token_expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl TokensResponse {
    pub fn new(tokens: SessionTokens, user: Option<UserSummary>) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.refresh_token_expires_at,
            access_token_expires_at: tokens.access_token_expires_at,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub number: String,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub credit_days_applied: u16,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub total: i64,
    pub paid_total: i64,
    pub balance: i64,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payments: Option<Vec<Payment>>,
}

impl InvoiceResponse {
    /// Header only, for listings.
    pub fn summary(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id(),
            number: invoice.number().to_string(),
            customer_id: invoice.customer_id(),
            customer_name: invoice.customer_name().map(str::to_string),
            issued_at: invoice.issued_at(),
            payment_type: invoice.payment_type(),
            credit_days_applied: invoice.credit_days_applied().get(),
            due_date: invoice.due_date(),
            status: invoice.status(),
            total: invoice.total(),
            paid_total: invoice.paid_total(),
            balance: invoice.balance(),
            version: invoice.version(),
            items: None,
            payments: None,
        }
    }

    pub fn detail(invoice: &Invoice) -> Self {
        Self {
            items: Some(invoice.items().to_vec()),
            payments: Some(invoice.payments().to_vec()),
            ..Self::summary(invoice)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub invoice: InvoiceResponse,
    pub payment: Payment,
}

impl From<PaymentReceipt> for PaymentResponse {
    fn from(receipt: PaymentReceipt) -> Self {
        Self {
            invoice: InvoiceResponse::summary(&receipt.invoice),
            payment: receipt.payment,
        }
    }
}
