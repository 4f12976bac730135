//! Service wiring: one storage backend behind every seam the handlers use.

use std::sync::Arc;

use anyhow::Context;

use backoffice_auth::{Argon2Passwords, IdentityStore, JwtConfig, SessionManager, TokenService};
use backoffice_core::{Clock, DomainResult, SystemClock};
use backoffice_infra::{InMemoryStore, PgStore};
use backoffice_invoicing::{
    CustomerDirectory, InvoiceEngine, InvoiceStore, ProductCatalog, ReceivablesService,
};
use backoffice_tenancy::{TenantLookup, TenantResolver, TenantResolverConfig, TenantSettingsSource};

use crate::config::AppConfig;

pub struct AppServices {
    pub tokens: Arc<TokenService>,
    pub sessions: SessionManager,
    pub resolver: TenantResolver,
    pub invoices: InvoiceEngine,
    pub receivables: ReceivablesService,
}

impl AppServices {
    /// Wire every service against a single store implementing all seams.
    pub fn from_store<S>(
        store: Arc<S>,
        jwt: JwtConfig,
        tenancy: TenantResolverConfig,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<Self>
    where
        S: IdentityStore
            + TenantLookup
            + TenantSettingsSource
            + InvoiceStore
            + ProductCatalog
            + CustomerDirectory
            + 'static,
    {
        let tokens = Arc::new(TokenService::new(jwt, clock.clone())?);
        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            Arc::new(Argon2Passwords),
            tokens.clone(),
            clock.clone(),
        );
        let resolver = TenantResolver::new(tenancy, store.clone());
        let invoices = InvoiceEngine::new(store.clone(), store.clone(), store.clone(), store.clone(), clock.clone());
        let receivables = ReceivablesService::new(store.clone(), store, clock);

        Ok(Self {
            tokens,
            sessions,
            resolver,
            invoices,
            receivables,
        })
    }

    /// In-memory wiring (dev/test). The store is returned for seeding.
    pub fn in_memory(
        jwt: JwtConfig,
        tenancy: TenantResolverConfig,
        clock: Arc<dyn Clock>,
    ) -> DomainResult<(Self, Arc<InMemoryStore>)> {
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        let services = Self::from_store(store.clone(), jwt, tenancy, clock)?;
        Ok((services, store))
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let jwt = config.jwt.clone();
    let tenancy = config.tenancy.clone();

    let services = match config.database.url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, config.database.max_connections, clock.clone())
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply schema")?;
            tracing::info!(max_connections = config.database.max_connections, "using postgres store");
            AppServices::from_store(Arc::new(store), jwt, tenancy, clock)
        }
        None => {
            tracing::warn!("database.url not set; using the in-memory store");
            AppServices::in_memory(jwt, tenancy, clock).map(|(services, _)| services)
        }
    };
    services.context("invalid service configuration")
}
