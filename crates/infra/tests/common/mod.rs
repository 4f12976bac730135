#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, TimeZone, Utc};

use backoffice_auth::{Argon2Passwords, JwtConfig, Role, RoleRecord, SessionManager, TokenService, UserAccount};
use backoffice_core::{Clock, CustomerId, FixedClock, ProductId};
use backoffice_infra::InMemoryStore;
use backoffice_invoicing::{
    CreateInvoice, CustomerRef, Invoice, InvoiceEngine, NewInvoiceItem, ProductRef, ReceivablesService,
};
use backoffice_tenancy::{RequestScope, Tenant, TenantContext, TenantSettings, TenantSource};

pub const PASSWORD: &str = "s3cret-passw0rd";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| Argon2Passwords.hash(PASSWORD).unwrap())
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub tokens: Arc<TokenService>,
    pub sessions: SessionManager,
    pub invoices: InvoiceEngine,
    pub receivables: ReceivablesService,
}

pub struct SeededTenant {
    pub tenant: Tenant,
    pub owner: UserAccount,
    pub clerk: UserAccount,
    pub clerk_role: RoleRecord,
    pub customer: CustomerRef,
    pub widget: ProductRef,
    pub gadget: ProductRef,
}

impl SeededTenant {
    pub fn context(&self) -> TenantContext {
        TenantContext::with_slug(self.tenant.id, self.tenant.slug.clone(), TenantSource::IdHeader)
    }

    pub fn scope(&self) -> RequestScope {
        RequestScope::new(self.context(), Some(self.owner.id))
    }

    pub fn credit(&self, quantity: i64, credit_days: Option<i64>) -> CreateInvoice {
        CreateInvoice {
            customer_id: Some(self.customer.id),
            payment_type: "CREDIT".into(),
            credit_days,
            items: vec![NewInvoiceItem {
                product_id: self.widget.id,
                quantity,
                unit_price: None,
            }],
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let store = Arc::new(InMemoryStore::new(dyn_clock.clone()));
        let tokens = Arc::new(TokenService::new(JwtConfig::default(), dyn_clock.clone()).unwrap());

        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            Arc::new(Argon2Passwords),
            tokens.clone(),
            dyn_clock.clone(),
        );
        let invoices = InvoiceEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            dyn_clock.clone(),
        );
        let receivables = ReceivablesService::new(store.clone(), store.clone(), dyn_clock);

        Self {
            store,
            clock,
            tokens,
            sessions,
            invoices,
            receivables,
        }
    }

    pub fn seed_tenant(&self, slug: &str) -> SeededTenant {
        self.seed_tenant_with(slug, TenantSettings::default())
    }

    pub fn seed_tenant_with(&self, slug: &str, settings: TenantSettings) -> SeededTenant {
        let tenant = self
            .store
            .insert_tenant(Tenant::new(format!("{slug} Ltd"), slug, start()).unwrap(), settings)
            .unwrap();

        let owner = self
            .store
            .insert_user(
                tenant.id,
                UserAccount::new("Owner", &format!("owner@{slug}.test"), password_hash()).unwrap(),
            )
            .unwrap();
        let owner_role = self
            .store
            .insert_role(tenant.id, RoleRecord::new(Role::TENANT_OWNER, true))
            .unwrap();
        self.store.grant_permission(tenant.id, owner_role.id, "*").unwrap();
        self.store.assign_role(tenant.id, owner.id, owner_role.id).unwrap();

        let clerk = self
            .store
            .insert_user(
                tenant.id,
                UserAccount::new("Clerk", &format!("clerk@{slug}.test"), password_hash()).unwrap(),
            )
            .unwrap();
        let clerk_role = self
            .store
            .insert_role(tenant.id, RoleRecord::new("Clerk", false))
            .unwrap();
        self.store
            .grant_permission(tenant.id, clerk_role.id, "invoices.read")
            .unwrap();
        self.store.assign_role(tenant.id, clerk.id, clerk_role.id).unwrap();

        let customer = CustomerRef {
            id: CustomerId::new(),
            name: format!("{slug} customer"),
            default_credit_days: None,
        };
        self.store.insert_customer(tenant.id, customer.clone()).unwrap();

        let widget = ProductRef {
            id: ProductId::new(),
            name: "Widget".into(),
            price: 10_000,
            is_active: true,
        };
        let gadget = ProductRef {
            id: ProductId::new(),
            name: "Gadget".into(),
            price: 2_500,
            is_active: true,
        };
        self.store.insert_product(tenant.id, widget.clone()).unwrap();
        self.store.insert_product(tenant.id, gadget.clone()).unwrap();

        SeededTenant {
            tenant,
            owner,
            clerk,
            clerk_role,
            customer,
            widget,
            gadget,
        }
    }

    pub async fn credit_invoice(&self, seeded: &SeededTenant, quantity: i64, credit_days: i64) -> Invoice {
        self.invoices
            .create_invoice(&seeded.scope(), seeded.credit(quantity, Some(credit_days)))
            .await
            .unwrap()
    }
}
