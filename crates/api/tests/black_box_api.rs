use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use backoffice_api::app::{AppServices, build_app};
use backoffice_auth::{AccessClaims, Argon2Passwords, JwtConfig, Role, RoleRecord, UserAccount};
use backoffice_core::{Clock, CustomerId, FixedClock, ProductId, TenantId, UserId};
use backoffice_infra::InMemoryStore;
use backoffice_invoicing::{CustomerRef, ProductRef};
use backoffice_tenancy::{Tenant, TenantResolutionMode, TenantResolverConfig, TenantSettings};

const PASSWORD: &str = "s3cret-passw0rd";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| Argon2Passwords.hash(PASSWORD).unwrap())
}

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    clock: Arc<FixedClock>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(TenantResolverConfig::default()).await
    }

    async fn spawn_with(tenancy: TenantResolverConfig) -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let (services, store) = AppServices::in_memory(JwtConfig::default(), tenancy, dyn_clock).unwrap();

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            clock,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn seed(&self, slug: &str) -> Seeded {
        let tenant = self
            .store
            .insert_tenant(
                Tenant::new(format!("{slug} Ltd"), slug, start()).unwrap(),
                TenantSettings::default(),
            )
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
        let reader = self
            .store
            .insert_role(tenant.id, RoleRecord::new("Reader", false))
            .unwrap();
        let collector = self
            .store
            .insert_role(tenant.id, RoleRecord::new("Collector", false))
            .unwrap();
        for (role, code) in [
            (reader.id, "invoices.read"),
            (collector.id, "invoices.read"),
            (collector.id, "ar.read"),
        ] {
            self.store.grant_permission(tenant.id, role, code).unwrap();
        }
        self.store.assign_role(tenant.id, clerk.id, reader.id).unwrap();
        self.store.assign_role(tenant.id, clerk.id, collector.id).unwrap();

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
        self.store.insert_product(tenant.id, widget.clone()).unwrap();

        Seeded {
            tenant,
            customer,
            widget,
        }
    }

    async fn login(&self, slug: &str, who: &str) -> Value {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({
                "email": format!("{who}@{slug}.test"),
                "password": PASSWORD,
                "tenantSlug": slug,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json::<Value>().await.unwrap()["data"].clone()
    }

    async fn access_token(&self, slug: &str, who: &str) -> String {
        self.login(slug, who).await["accessToken"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn create_credit_invoice(&self, token: &str, seeded: &Seeded, quantity: i64, credit_days: i64) -> Value {
        let res = self
            .client
            .post(self.url("/invoices"))
            .bearer_auth(token)
            .json(&json!({
                "customerId": seeded.customer.id,
                "paymentType": "credito",
                "creditDaysApplied": credit_days,
                "items": [{ "productId": seeded.widget.id, "quantity": quantity }],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json::<Value>().await.unwrap()["data"].clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Seeded {
    tenant: Tenant,
    customer: CustomerRef,
    widget: ProductRef,
}

async fn error_code(res: reqwest::Response) -> (StatusCode, String, String) {
    let status = res.status();
    let body: Value = res.json().await.unwrap();
    assert!(body["data"].is_null());
    (
        status,
        body["errors"][0]["code"].as_str().unwrap().to_string(),
        body["errors"][0]["message"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_is_public_and_echoes_correlation_id() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/health"))
        .header("X-Correlation-Id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-correlation-id"], "abc-123");

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert!(!res.headers()["x-correlation-id"].is_empty());
}

#[tokio::test]
async fn auth_required_for_tenant_routes() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");

    let res = srv
        .client
        .get(srv.url("/ar/summary"))
        .header("X-Tenant-Id", acme.tenant.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.1, "unauthorized");

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");

    let claims = AccessClaims {
        sub: UserId::new(),
        tenant_id: acme.tenant.id,
        email: "mallory@acme.test".into(),
        roles: vec![Role::TENANT_OWNER.into()],
        perms: vec!["*".into()],
        iss: "backoffice".into(),
        aud: "backoffice".into(),
        iat: start().timestamp(),
        nbf: start().timestamp(),
        exp: (start() + Duration::minutes(10)).timestamp(),
        jti: "forged".into(),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();

    let res = srv.client.get(srv.url("/whoami")).bearer_auth(token).send().await.unwrap();
    assert_eq!(error_code(res).await.1, "unauthorized");
}

#[tokio::test]
async fn login_returns_tokens_and_merged_permissions() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");

    let data = srv.login("acme", "clerk").await;
    assert!(!data["accessToken"].as_str().unwrap().is_empty());
    assert!(!data["refreshToken"].as_str().unwrap().is_empty());
    assert!(data["expiresAt"].is_string());
    let perms: Vec<&str> = data["user"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(perms, ["ar.read", "invoices.read"]);

    let token = data["accessToken"].as_str().unwrap();
    let res = srv.client.get(srv.url("/whoami")).bearer_auth(token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["data"]["tenantId"], acme.tenant.id.to_string());
    assert_eq!(me["data"]["email"], "clerk@acme.test");

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "clerk@acme.test", "password": "wrong", "tenantSlug": "acme" }))
        .send()
        .await
        .unwrap();
    let (status, code, message) = error_code(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "unauthorized");
    assert_eq!(message, "invalid credentials");
}

#[tokio::test]
async fn header_mode_without_tenant_is_tenant_missing() {
    let srv = TestServer::spawn_with(TenantResolverConfig {
        mode: TenantResolutionMode::Header,
        ..TenantResolverConfig::default()
    })
    .await;
    let acme = srv.seed("acme");
    let token = srv.access_token("acme", "owner").await;

    let res = srv.client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
    let (status, code, _) = error_code(res).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code, "tenant_missing");

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .header("X-Tenant-Slug", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["data"]["tenantId"], acme.tenant.id.to_string());
    assert_eq!(me["data"]["tenantSlug"], "acme");
}

#[tokio::test]
async fn token_cannot_be_used_against_another_tenant() {
    let srv = TestServer::spawn().await;
    srv.seed("acme");
    let globex = srv.seed("globex");
    let token = srv.access_token("acme", "owner").await;

    let res = srv
        .client
        .get(srv.url("/invoices"))
        .bearer_auth(&token)
        .header("X-Tenant-Id", globex.tenant.id.to_string())
        .send()
        .await
        .unwrap();
    let (status, code, _) = error_code(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code, "forbidden");
}

#[tokio::test]
async fn invoice_lifecycle_create_pay_overpay_mark_paid() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");
    let token = srv.access_token("acme", "owner").await;

    let invoice = srv.create_credit_invoice(&token, &acme, 2, 10).await;
    assert_eq!(invoice["number"], "FAC-0001");
    assert_eq!(invoice["total"], 20_000);
    assert_eq!(invoice["balance"], 20_000);
    assert_eq!(invoice["creditDaysApplied"], 10);
    assert_eq!(invoice["items"][0]["description"], "Widget");
    let id = invoice["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url(&format!("/invoices/{id}/payments")))
        .bearer_auth(&token)
        .json(&json!({ "amount": 5_000, "method": "TRANSFER" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["data"]["invoice"]["balance"], 15_000);
    assert_eq!(receipt["data"]["payment"]["amount"], 5_000);

    let res = srv
        .client
        .post(srv.url(&format!("/invoices/{id}/payments")))
        .bearer_auth(&token)
        .json(&json!({ "amount": 16_000, "method": "TRANSFER" }))
        .send()
        .await
        .unwrap();
    let (status, code, message) = error_code(res).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code, "validation_error");
    assert!(message.contains("exceeds"));

    let res = srv
        .client
        .post(srv.url(&format!("/invoices/{id}/mark-paid")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url(&format!("/invoices/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let detail: Value = res.json().await.unwrap();
    assert_eq!(detail["data"]["status"], "PAID");
    assert_eq!(detail["data"]["balance"], 0);
    assert_eq!(detail["data"]["paidTotal"], 20_000);
    assert_eq!(detail["data"]["payments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invoice_validation_errors_use_the_envelope() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");
    let token = srv.access_token("acme", "owner").await;

    let res = srv
        .client
        .post(srv.url("/invoices"))
        .bearer_auth(&token)
        .json(&json!({
            "paymentType": "CREDIT",
            "items": [{ "productId": acme.widget.id, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.1, "validation_error");

    let res = srv
        .client
        .post(srv.url("/invoices"))
        .bearer_auth(&token)
        .json(&json!({ "paymentType": "BARTER", "items": [{ "productId": acme.widget.id, "quantity": 1 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.2, "invalid payment type");

    let res = srv
        .client
        .post(srv.url("/invoices"))
        .bearer_auth(&token)
        .json(&json!({
            "customerId": acme.customer.id,
            "paymentType": "CREDIT",
            "creditDaysApplied": 400,
            "items": [{ "productId": acme.widget.id, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    let (status, code, _) = error_code(res).await;
    assert_eq!((status, code.as_str()), (StatusCode::BAD_REQUEST, "validation_error"));

    let invoice = srv.create_credit_invoice(&token, &acme, 1, 60).await;
    assert_eq!(invoice["creditDaysApplied"], 60);

    let res = srv
        .client
        .get(srv.url("/invoices/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_tenants_invoices_are_not_found() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");
    srv.seed("globex");
    let acme_token = srv.access_token("acme", "owner").await;
    let globex_token = srv.access_token("globex", "owner").await;

    let invoice = srv.create_credit_invoice(&acme_token, &acme, 1, 5).await;
    let id = invoice["id"].as_str().unwrap();

    let res = srv
        .client
        .get(srv.url(&format!("/invoices/{id}")))
        .bearer_auth(&globex_token)
        .send()
        .await
        .unwrap();
    let (status, code, _) = error_code(res).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code, "not_found");

    let res = srv
        .client
        .post(srv.url(&format!("/invoices/{id}/payments")))
        .bearer_auth(&globex_token)
        .json(&json!({ "amount": 1, "method": "CASH" }))
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.0, StatusCode::NOT_FOUND);

    let res = srv.client.get(srv.url("/invoices")).bearer_auth(&globex_token).send().await.unwrap();
    let listed: Value = res.json().await.unwrap();
    assert!(listed["data"].as_array().unwrap().is_empty());
    assert_eq!(listed["meta"]["totalItems"], 0);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");
    let token = srv.access_token("acme", "clerk").await;

    let res = srv
        .client
        .post(srv.url("/invoices"))
        .bearer_auth(&token)
        .json(&json!({
            "customerId": acme.customer.id,
            "paymentType": "CREDIT",
            "items": [{ "productId": acme.widget.id, "quantity": 1 }],
        }))
        .send()
        .await
        .unwrap();
    let (status, code, message) = error_code(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code, "forbidden");
    assert_eq!(message, "missing permission invoices.write");

    let res = srv.client.get(srv.url("/ar/summary")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotates_and_logout_never_reveals_validity() {
    let srv = TestServer::spawn().await;
    srv.seed("acme");
    let login = srv.login("acme", "owner").await;
    let first = login["refreshToken"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": first }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await.unwrap();
    let second = rotated["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert!(rotated["data"].get("user").is_none());

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": first }))
        .send()
        .await
        .unwrap();
    assert_eq!(error_code(res).await.1, "unauthorized");

    // Replaying the rotated token revoked its descendants too.
    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refreshToken": second }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    for token in [second.as_str(), "never-issued"] {
        let res = srv
            .client
            .post(srv.url("/auth/logout"))
            .json(&json!({ "refreshToken": token }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["data"]["loggedOut"], true);
    }
}

#[tokio::test]
async fn stale_bearer_does_not_block_refresh_or_logout() {
    let srv = TestServer::spawn().await;
    srv.seed("acme");
    let login = srv.login("acme", "owner").await;
    let stale = login["accessToken"].as_str().unwrap().to_string();
    let refresh = login["refreshToken"].as_str().unwrap().to_string();

    srv.clock.set(start() + Duration::minutes(31));

    let res = srv.client.get(srv.url("/health")).bearer_auth(&stale).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .bearer_auth(&stale)
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await.unwrap();
    let fresh = rotated["data"]["accessToken"].as_str().unwrap().to_string();
    let next_refresh = rotated["data"]["refreshToken"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url("/auth/logout"))
        .header("Authorization", "Basic not-a-bearer")
        .json(&json!({ "refreshToken": next_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["loggedOut"], true);

    // Protected routes still reject the stale token and keep its reason.
    let res = srv.client.get(srv.url("/whoami")).bearer_auth(&stale).send().await.unwrap();
    let (status, code, _) = error_code(res).await;
    assert_eq!((status, code.as_str()), (StatusCode::UNAUTHORIZED, "unauthorized"));

    let res = srv.client.get(srv.url("/whoami")).bearer_auth(&fresh).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn receivables_age_with_the_clock() {
    let srv = TestServer::spawn().await;
    let acme = srv.seed("acme");
    let token = srv.access_token("acme", "owner").await;

    srv.create_credit_invoice(&token, &acme, 1, 3).await;
    srv.create_credit_invoice(&token, &acme, 2, 10).await;
    srv.create_credit_invoice(&token, &acme, 1, 30).await;

    let res = srv.client.get(srv.url("/ar/summary")).bearer_auth(&token).send().await.unwrap();
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["data"]["totalPending"], 40_000);
    assert_eq!(summary["data"]["dueSoonCount"], 1);
    assert_eq!(summary["data"]["overdueCount"], 0);

    srv.clock.set(start() + Duration::days(7));
    let token = srv.access_token("acme", "owner").await;

    let res = srv.client.get(srv.url("/ar/overdue")).bearer_auth(&token).send().await.unwrap();
    let overdue: Value = res.json().await.unwrap();
    let overdue = overdue["data"].as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["invoiceNumber"], "FAC-0001");
    assert_eq!(overdue[0]["daysOverdue"], 4);

    let res = srv.client.get(srv.url("/ar/due-soon")).bearer_auth(&token).send().await.unwrap();
    let due_soon: Value = res.json().await.unwrap();
    assert_eq!(due_soon["data"][0]["invoiceNumber"], "FAC-0002");
    assert_eq!(due_soon["data"][0]["daysToDue"], 3);

    let res = srv
        .client
        .get(srv.url("/ar/open-items?pageSize=2&page=2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let open: Value = res.json().await.unwrap();
    assert_eq!(open["meta"]["totalItems"], 3);
    assert_eq!(open["meta"]["totalPages"], 2);
    assert_eq!(open["data"][0]["invoiceNumber"], "FAC-0003");

    let res = srv
        .client
        .get(srv.url("/ar/open-items?status=OVERDUE"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let open: Value = res.json().await.unwrap();
    assert_eq!(open["meta"]["totalItems"], 1);

    let res = srv
        .client
        .get(srv.url("/ar/summary?thresholdDays=30"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["data"]["dueSoonCount"], 2);
}
