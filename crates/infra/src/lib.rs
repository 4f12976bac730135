//! Storage adapters for the tenant-scoped seams.
//!
//! - [`memory`]: single-process store used by tests and local development
//! - [`postgres`]: `sqlx`-backed store
//!
//! Both key every tenant-owned row by `tenant_id` first and stamp writes with
//! [`AuditStamper`](backoffice_tenancy::AuditStamper).

pub mod memory;
pub mod movement;
pub mod postgres;
pub mod tenant_table;

pub use memory::InMemoryStore;
pub use movement::StockMovement;
pub use postgres::PgStore;
pub use tenant_table::TenantTable;
