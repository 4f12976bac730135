//! Catalog and customer seams consumed by the invoice engine, and the stock
//! movements an issued invoice produces.

use async_trait::async_trait;

use backoffice_core::{CustomerId, DomainResult, InvoiceId, ProductId};
use backoffice_tenancy::TenantContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    /// Catalog price in minor units.
    pub price: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
    pub default_credit_days: Option<u16>,
}

/// Stock leaving the warehouse because an invoice was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMovement {
    pub invoice_id: InvoiceId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products of the current tenant among `ids`. Unknown ids are simply absent.
    async fn find_products(&self, tenant: &TenantContext, ids: &[ProductId]) -> DomainResult<Vec<ProductRef>>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, tenant: &TenantContext, id: CustomerId) -> DomainResult<Option<CustomerRef>>;
}
