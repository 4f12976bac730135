//! SQLx row types and their conversion into domain values.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use backoffice_auth::{RefreshToken, UserAccount};
use backoffice_core::{
    Audited, CustomerId, DomainError, DomainResult, InvoiceId, InvoiceItemId, PaymentId, ProductId,
    RefreshTokenId, TenantId, TenantScoped, UserId,
};
use backoffice_invoicing::{CreditDays, CustomerRef, Invoice, InvoiceItem, InvoiceParts, Payment, ProductRef};
use backoffice_tenancy::{Tenant, TenantSettings};

use super::map_sqlx_error;

pub(super) fn decode<T>(row: &PgRow) -> DomainResult<T>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| map_sqlx_error("decode_row", e))
}

fn corrupt(what: &str, err: impl core::fmt::Display) -> DomainError {
    DomainError::internal(format!("corrupt {what} row: {err}"))
}

fn audit(row: &PgRow) -> Result<Audited, sqlx::Error> {
    Ok(Audited {
        created_at: row.try_get("created_at")?,
        created_by: row.try_get::<Option<Uuid>, _>("created_by")?.map(UserId::from_uuid),
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get::<Option<Uuid>, _>("updated_by")?.map(UserId::from_uuid),
    })
}

#[derive(Debug)]
pub(super) struct TenantRow {
    id: Uuid,
    name: String,
    slug: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TenantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TenantRow {
    pub(super) fn into_domain(self) -> DomainResult<Tenant> {
        Ok(Tenant {
            id: TenantId::from_uuid(self.id),
            name: self.name,
            slug: self.slug,
            status: self.status.parse().map_err(|e| corrupt("tenant", e))?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug)]
pub(super) struct SettingsRow {
    currency: String,
    timezone: String,
    default_credit_days: i32,
    due_soon_threshold_days: i32,
    low_stock_threshold: i32,
    invoice_numbering_format: String,
}

impl<'r> FromRow<'r, PgRow> for SettingsRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            currency: row.try_get("currency")?,
            timezone: row.try_get("timezone")?,
            default_credit_days: row.try_get("default_credit_days")?,
            due_soon_threshold_days: row.try_get("due_soon_threshold_days")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            invoice_numbering_format: row.try_get("invoice_numbering_format")?,
        })
    }
}

impl SettingsRow {
    pub(super) fn into_domain(self) -> DomainResult<TenantSettings> {
        Ok(TenantSettings {
            currency: self.currency,
            timezone: self.timezone,
            default_credit_days: u16::try_from(self.default_credit_days).map_err(|e| corrupt("tenant_settings", e))?,
            due_soon_threshold_days: u32::try_from(self.due_soon_threshold_days)
                .map_err(|e| corrupt("tenant_settings", e))?,
            low_stock_threshold: u32::try_from(self.low_stock_threshold).map_err(|e| corrupt("tenant_settings", e))?,
            invoice_numbering_format: self.invoice_numbering_format,
        })
    }
}

pub(super) const USER_COLUMNS: &str = "id, tenant_id, name, email, password_hash, is_active, last_login_at, \
     created_at, created_by, updated_at, updated_by";

#[derive(Debug)]
pub(super) struct UserRow(UserAccount);

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(UserAccount {
            id: UserId::from_uuid(row.try_get("id")?),
            tenant: TenantScoped::assigned(TenantId::from_uuid(row.try_get("tenant_id")?)),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_active: row.try_get("is_active")?,
            last_login_at: row.try_get("last_login_at")?,
            audit: audit(row)?,
        }))
    }
}

impl UserRow {
    pub(super) fn into_domain(self) -> UserAccount {
        self.0
    }
}

pub(super) const REFRESH_COLUMNS: &str =
    "id, tenant_id, user_id, token_hash, expires_at, revoked_at, replaced_by_hash, created_at";

#[derive(Debug)]
pub(super) struct RefreshTokenRow(RefreshToken);

impl<'r> FromRow<'r, PgRow> for RefreshTokenRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(RefreshToken {
            id: RefreshTokenId::from_uuid(row.try_get("id")?),
            tenant: TenantScoped::assigned(TenantId::from_uuid(row.try_get("tenant_id")?)),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            token_hash: row.try_get("token_hash")?,
            expires_at: row.try_get("expires_at")?,
            revoked_at: row.try_get("revoked_at")?,
            replaced_by_hash: row.try_get("replaced_by_hash")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

impl RefreshTokenRow {
    pub(super) fn into_domain(self) -> RefreshToken {
        self.0
    }
}

pub(super) const INVOICE_COLUMNS: &str = "id, tenant_id, number, customer_id, customer_name, issued_at, \
     payment_type, credit_days_applied, due_date, status, total, paid_total, balance, version, \
     created_at, created_by, updated_at, updated_by";

#[derive(Debug)]
pub(super) struct InvoiceRow {
    id: Uuid,
    tenant_id: Uuid,
    number: String,
    customer_id: Option<Uuid>,
    customer_name: Option<String>,
    issued_at: DateTime<Utc>,
    payment_type: String,
    credit_days_applied: i32,
    due_date: DateTime<Utc>,
    status: String,
    total: i64,
    paid_total: i64,
    balance: i64,
    version: i64,
    audit: Audited,
}

impl<'r> FromRow<'r, PgRow> for InvoiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            number: row.try_get("number")?,
            customer_id: row.try_get("customer_id")?,
            customer_name: row.try_get("customer_name")?,
            issued_at: row.try_get("issued_at")?,
            payment_type: row.try_get("payment_type")?,
            credit_days_applied: row.try_get("credit_days_applied")?,
            due_date: row.try_get("due_date")?,
            status: row.try_get("status")?,
            total: row.try_get("total")?,
            paid_total: row.try_get("paid_total")?,
            balance: row.try_get("balance")?,
            version: row.try_get("version")?,
            audit: audit(row)?,
        })
    }
}

impl InvoiceRow {
    pub(super) fn id(&self) -> Uuid {
        self.id
    }

    pub(super) fn into_domain(self, items: Vec<InvoiceItem>, payments: Vec<Payment>) -> DomainResult<Invoice> {
        Invoice::from_parts(InvoiceParts {
            id: InvoiceId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            number: self.number,
            customer_id: self.customer_id.map(CustomerId::from_uuid),
            customer_name: self.customer_name,
            issued_at: self.issued_at,
            payment_type: self.payment_type.parse().map_err(|e| corrupt("invoice", e))?,
            credit_days_applied: CreditDays::new(i64::from(self.credit_days_applied))
                .map_err(|e| corrupt("invoice", e))?,
            due_date: self.due_date,
            status: self.status.parse().map_err(|e| corrupt("invoice", e))?,
            total: self.total,
            paid_total: self.paid_total,
            balance: self.balance,
            items,
            payments,
            version: u64::try_from(self.version).map_err(|e| corrupt("invoice", e))?,
            audit: self.audit,
        })
    }
}

#[derive(Debug)]
pub(super) struct ItemRow {
    pub(super) invoice_id: Uuid,
    item: InvoiceItem,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let line_no: i32 = row.try_get("line_no")?;
        Ok(Self {
            invoice_id: row.try_get("invoice_id")?,
            item: InvoiceItem {
                id: InvoiceItemId::from_uuid(row.try_get("id")?),
                line_no: u32::try_from(line_no).unwrap_or_default(),
                product_id: ProductId::from_uuid(row.try_get("product_id")?),
                description: row.try_get("description")?,
                quantity: row.try_get("quantity")?,
                unit_price: row.try_get("unit_price")?,
                line_total: row.try_get("line_total")?,
            },
        })
    }
}

impl ItemRow {
    pub(super) fn into_domain(self) -> InvoiceItem {
        self.item
    }
}

#[derive(Debug)]
pub(super) struct PaymentRow(Payment);

impl<'r> FromRow<'r, PgRow> for PaymentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Payment {
            id: PaymentId::from_uuid(row.try_get("id")?),
            tenant: TenantScoped::assigned(TenantId::from_uuid(row.try_get("tenant_id")?)),
            invoice_id: InvoiceId::from_uuid(row.try_get("invoice_id")?),
            amount: row.try_get("amount")?,
            method: row.try_get("method")?,
            reference: row.try_get("reference")?,
            paid_at: row.try_get("paid_at")?,
            audit: Audited {
                created_at: row.try_get("created_at")?,
                created_by: row.try_get::<Option<Uuid>, _>("created_by")?.map(UserId::from_uuid),
                updated_at: None,
                updated_by: None,
            },
        }))
    }
}

impl PaymentRow {
    pub(super) fn into_domain(self) -> Payment {
        self.0
    }
}

#[derive(Debug)]
pub(super) struct ProductRow(ProductRef);

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(ProductRef {
            id: ProductId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            is_active: row.try_get("is_active")?,
        }))
    }
}

impl ProductRow {
    pub(super) fn into_domain(self) -> ProductRef {
        self.0
    }
}

#[derive(Debug)]
pub(super) struct CustomerRow(CustomerRef);

impl<'r> FromRow<'r, PgRow> for CustomerRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let days: Option<i32> = row.try_get("default_credit_days")?;
        Ok(Self(CustomerRef {
            id: CustomerId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            default_credit_days: days.and_then(|d| u16::try_from(d).ok()),
        }))
    }
}

impl CustomerRow {
    pub(super) fn into_domain(self) -> CustomerRef {
        self.0
    }
}
