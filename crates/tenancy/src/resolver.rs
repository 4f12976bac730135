//! Tenant resolution: first match wins.
//!
//! 1. tenant-id header, when it parses as an id
//! 2. tenant-slug header, otherwise the host's subdomain label, looked up by slug
//! 3. tenant-id claim from an already validated access token
//!
//! The mode decides which of those sources are consulted at all.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use backoffice_core::{DomainError, DomainResult, TenantId};

use crate::{Tenant, TenantContext, TenantSource};

/// Platform-level tenant catalog lookups (tenants are not tenant-scoped).
#[async_trait]
pub trait TenantLookup: Send + Sync {
    async fn find_tenant_by_slug(&self, slug: &str) -> DomainResult<Option<Tenant>>;

    async fn find_tenant(&self, id: TenantId) -> DomainResult<Option<Tenant>>;
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum TenantResolutionMode {
    Header,
    Claim,
    Subdomain,
    #[default]
    Mixed,
}

impl TenantResolutionMode {
    pub fn allows_headers(self) -> bool {
        matches!(self, Self::Header | Self::Mixed)
    }

    pub fn allows_subdomain(self) -> bool {
        matches!(self, Self::Subdomain | Self::Mixed)
    }

    pub fn allows_claim(self) -> bool {
        matches!(self, Self::Claim | Self::Mixed)
    }
}

impl FromStr for TenantResolutionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "claim" => Ok(Self::Claim),
            "subdomain" => Ok(Self::Subdomain),
            "mixed" => Ok(Self::Mixed),
            other => Err(DomainError::validation(format!(
                "unknown tenant resolution mode '{other}' (expected header, claim, subdomain or mixed)"
            ))),
        }
    }
}

impl TryFrom<String> for TenantResolutionMode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TenantResolverConfig {
    pub mode: TenantResolutionMode,
    pub tenant_id_header: String,
    pub tenant_slug_header: String,
}

impl Default for TenantResolverConfig {
    fn default() -> Self {
        Self {
            mode: TenantResolutionMode::Mixed,
            tenant_id_header: "X-Tenant-Id".to_string(),
            tenant_slug_header: "X-Tenant-Slug".to_string(),
        }
    }
}

/// Raw, transport-agnostic inputs for one request.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolutionRequest<'a> {
    pub tenant_id_header: Option<&'a str>,
    pub tenant_slug_header: Option<&'a str>,
    pub host: Option<&'a str>,
    pub claim_tenant_id: Option<TenantId>,
}

#[derive(Clone)]
pub struct TenantResolver {
    config: TenantResolverConfig,
    lookup: Arc<dyn TenantLookup>,
}

impl TenantResolver {
    pub fn new(config: TenantResolverConfig, lookup: Arc<dyn TenantLookup>) -> Self {
        Self { config, lookup }
    }

    pub fn config(&self) -> &TenantResolverConfig {
        &self.config
    }

    /// Resolve at most one tenant. `Ok(None)` means "no tenant", which only
    /// becomes an error on tenant-required routes.
    pub async fn resolve(&self, request: ResolutionRequest<'_>) -> DomainResult<Option<TenantContext>> {
        let mode = self.config.mode;

        if mode.allows_headers() {
            if let Some(id) = request
                .tenant_id_header
                .and_then(|raw| raw.trim().parse::<TenantId>().ok())
            {
                return Ok(Some(TenantContext::new(id, TenantSource::IdHeader)));
            }
        }

        let slug_candidate = request
            .tenant_slug_header
            .map(str::trim)
            .filter(|s| !s.is_empty() && mode.allows_headers())
            .map(|s| (s.to_ascii_lowercase(), TenantSource::SlugHeader))
            .or_else(|| {
                request
                    .host
                    .filter(|_| mode.allows_subdomain())
                    .and_then(subdomain_label)
                    .map(|s| (s, TenantSource::Subdomain))
            });

        if let Some((slug, source)) = slug_candidate {
            if let Some(tenant) = self.lookup.find_tenant_by_slug(&slug).await? {
                return Ok(Some(TenantContext::with_slug(tenant.id, tenant.slug, source)));
            }
            tracing::debug!(slug = %slug, "tenant slug did not resolve");
        }

        if mode.allows_claim() {
            if let Some(id) = request.claim_tenant_id {
                return Ok(Some(TenantContext::new(id, TenantSource::Claim)));
            }
        }

        Ok(None)
    }
}

/// First label of a host with at least three labels, ignoring localhost.
pub(crate) fn subdomain_label(host: &str) -> Option<String> {
    let host = host.split(':').next()?.trim().to_ascii_lowercase();
    if host.is_empty() || host == "localhost" || host.ends_with(".localhost") {
        return None;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 || labels[0].is_empty() {
        return None;
    }
    Some(labels[0].to_string())
}
