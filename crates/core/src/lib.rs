//! `backoffice-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the error taxonomy, the injectable clock, the
//! tenant/audit capability structs and pagination.

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::{Audited, Stampable, TenantScoped};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{
    CustomerId, InvoiceId, InvoiceItemId, MovementId, PaymentId, PermissionId, ProductId,
    RefreshTokenId, RoleId, TenantId, UserId,
};
pub use page::{Page, PageRequest};
