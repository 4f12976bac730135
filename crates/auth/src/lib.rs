//! `backoffice-auth`: identity, access tokens and the refresh-token session
//! lifecycle.
//!
//! This crate is decoupled from HTTP and from any concrete database: storage is
//! reached through [`IdentityStore`], tenants through
//! [`backoffice_tenancy::TenantLookup`].

pub mod authorize;
pub mod claims;
pub mod config;
pub mod password;
pub mod permissions;
pub mod refresh_token;
pub mod roles;
pub mod session;
pub mod store;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize, ensure_tenant_access};
pub use claims::{AccessClaims, TokenValidationError, validate_claims};
pub use config::JwtConfig;
pub use password::{Argon2Passwords, PasswordVerifier};
pub use permissions::{Permission, PermissionSpec};
pub use refresh_token::RefreshToken;
pub use roles::{Role, RoleGrant, RolePermission, RoleRecord, UserGrants, UserRole};
pub use session::{LoginOutcome, LoginRequest, SessionManager, SessionTokens};
pub use store::IdentityStore;
pub use token::{AccessToken, TokenService};
pub use user::{UserAccount, UserSummary, normalize_email};
