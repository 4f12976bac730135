//! Invoicing and accounts-receivable domain.
//!
//! - [`status`]: the pure status calculator and due-date rules
//! - [`invoice`]: the `Invoice` aggregate (balance invariant, payments)
//! - [`engine`]: create / pay / mark-paid against tenant-scoped storage
//! - [`ar`]: aging aggregation, always recomputed against the caller's clock

pub mod ar;
pub mod collaborators;
pub mod engine;
pub mod invoice;
pub mod numbering;
pub mod status;
pub mod store;

pub use ar::{ArItem, ArQuery, ArSummary, OpenItemsQuery, ReceivablesService};
pub use collaborators::{CustomerDirectory, CustomerRef, OutboundMovement, ProductCatalog, ProductRef};
pub use engine::{CreateInvoice, InvoiceEngine, NewInvoiceItem, PaymentReceipt, RegisterPayment};
pub use invoice::{Invoice, InvoiceDraft, InvoiceItem, InvoiceParts, NewPayment, Payment, PricedLine};
pub use numbering::format_invoice_number;
pub use status::{CreditDays, InvoiceStatus, PaymentType, resolve_due_date, resolve_status};
pub use store::{InvoiceFilter, InvoiceStore, PendingInvoice, ReceivableFilter};
