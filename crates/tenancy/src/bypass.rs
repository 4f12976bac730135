//! The single escape hatch out of tenant filtering.
//!
//! Store methods that read or write across tenants take `&PlatformBypass`.
//! Constructing one requires naming a [`BypassReason`] and emits a tracing
//! event, so every bypass site is both greppable and visible in logs.

/// Every sanctioned reason to bypass tenant filtering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BypassReason {
    /// Refresh tokens are presented before any tenant is known.
    RefreshTokenLookup,
    /// Platform administrators provisioning tenants, users and roles.
    PlatformAdministration,
}

impl BypassReason {
    pub const ALL: [BypassReason; 2] = [
        BypassReason::RefreshTokenLookup,
        BypassReason::PlatformAdministration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BypassReason::RefreshTokenLookup => "refresh_token_lookup",
            BypassReason::PlatformAdministration => "platform_administration",
        }
    }
}

/// Proof that the caller deliberately left the tenant filter.
///
/// Not `Clone`: each bypass site constructs (and logs) its own.
#[derive(Debug)]
pub struct PlatformBypass {
    reason: BypassReason,
}

impl PlatformBypass {
    pub fn new(reason: BypassReason) -> Self {
        tracing::info!(
            target: "backoffice::tenant_bypass",
            reason = reason.as_str(),
            "tenant filter bypassed"
        );
        Self { reason }
    }

    pub fn reason(&self) -> BypassReason {
        self.reason
    }
}
