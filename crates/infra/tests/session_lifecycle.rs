mod common;

use chrono::Duration;

use backoffice_auth::{IdentityStore, LoginRequest, Principal};
use backoffice_core::{ErrorKind, TenantScoped};
use backoffice_tenancy::{BypassReason, PlatformBypass, TenantContext, TenantSource, TenantStatus};

use common::{Fixture, PASSWORD, start};

fn login(email: &str, password: &str, slug: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
        tenant_slug: Some(slug.into()),
    }
}

#[tokio::test]
async fn login_issues_a_tenant_bound_session() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");

    let outcome = fx
        .sessions
        .login(login("  OWNER@acme.test ", PASSWORD, "ACME"), None)
        .await
        .unwrap();

    assert_eq!(outcome.user.email, "owner@acme.test");
    assert_eq!(outcome.user.roles, vec!["TenantOwner"]);
    assert_eq!(outcome.tokens.access_token_expires_at, start() + Duration::minutes(30));
    assert_eq!(outcome.tokens.refresh_token_expires_at, start() + Duration::days(7));

    let claims = fx.tokens.validate_access_token(&outcome.tokens.access_token).unwrap();
    assert_eq!(claims.tenant_id, acme.tenant.id);
    assert_eq!(claims.sub, acme.owner.id);
    assert!(Principal::from_claims(&claims).is_owner());

    let user = fx
        .store
        .find_user(&acme.context(), acme.owner.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_login_at, Some(start()));
}

#[tokio::test]
async fn resolved_tenant_takes_precedence_over_slug() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    fx.seed_tenant("globex");

    // The owner exists only in acme; a resolved acme context wins over the body slug.
    let ctx = TenantContext::new(acme.tenant.id, TenantSource::IdHeader);
    let outcome = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "globex"), Some(&ctx))
        .await
        .unwrap();
    let claims = fx.tokens.validate_access_token(&outcome.tokens.access_token).unwrap();
    assert_eq!(claims.tenant_id, acme.tenant.id);
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let fx = Fixture::new();
    fx.seed_tenant("acme");

    let wrong_password = fx
        .sessions
        .login(login("owner@acme.test", "nope", "acme"), None)
        .await
        .unwrap_err();
    let unknown_user = fx
        .sessions
        .login(login("ghost@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap_err();

    assert_eq!(wrong_password.kind(), ErrorKind::Unauthorized);
    assert_eq!(wrong_password, unknown_user);

    let no_tenant = fx
        .sessions
        .login(
            LoginRequest {
                email: "owner@acme.test".into(),
                password: PASSWORD.into(),
                tenant_slug: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(no_tenant.kind(), ErrorKind::Unauthorized);

    let unknown_tenant = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "initech"), None)
        .await
        .unwrap_err();
    assert_eq!(unknown_tenant.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn suspended_tenants_and_inactive_users_are_forbidden() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");

    fx.store.set_user_active(acme.tenant.id, acme.clerk.id, false).unwrap();
    let err = fx
        .sessions
        .login(login("clerk@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    fx.store
        .set_tenant_status(acme.tenant.id, TenantStatus::Suspended)
        .unwrap();
    let err = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn refresh_rotates_and_each_token_is_single_use() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let first = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;

    fx.clock.advance(Duration::minutes(10));
    let second = fx.sessions.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(second.refresh_token_expires_at, start() + Duration::minutes(10) + Duration::days(7));

    let claims = fx.tokens.validate_access_token(&second.access_token).unwrap();
    assert_eq!(claims.tenant_id, acme.tenant.id);

    // Replaying the consumed token fails, and takes its descendants down with it.
    let replay = fx.sessions.refresh(&first.refresh_token).await.unwrap_err();
    assert_eq!(replay.kind(), ErrorKind::Unauthorized);
    let descendant = fx.sessions.refresh(&second.refresh_token).await.unwrap_err();
    assert_eq!(descendant.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn rotated_record_keeps_its_tenant_and_successor() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let first = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;
    fx.sessions.refresh(&first.refresh_token).await.unwrap();

    let bypass = PlatformBypass::new(BypassReason::RefreshTokenLookup);
    let stored = fx
        .store
        .find_refresh_token(&bypass, &backoffice_auth::token::hash_refresh_token(&first.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.was_rotated());
    assert_eq!(stored.tenant, TenantScoped::assigned(acme.tenant.id));
    assert_ne!(stored.token_hash, first.refresh_token);
}

#[tokio::test]
async fn expired_refresh_tokens_are_rejected() {
    let fx = Fixture::new();
    fx.seed_tenant("acme");
    let tokens = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;

    fx.clock.advance(Duration::days(7));
    let err = fx.sessions.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn access_tokens_expire_with_the_clock() {
    let fx = Fixture::new();
    fx.seed_tenant("acme");
    let tokens = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;

    fx.clock.advance(Duration::minutes(31));
    let err = fx.tokens.validate_access_token(&tokens.access_token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn logout_revokes_and_ignores_unknown_tokens() {
    let fx = Fixture::new();
    fx.seed_tenant("acme");
    let tokens = fx
        .sessions
        .login(login("owner@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;

    fx.sessions.logout(&tokens.refresh_token).await.unwrap();
    fx.sessions.logout(&tokens.refresh_token).await.unwrap();
    fx.sessions.logout("never-issued").await.unwrap();

    let err = fx.sessions.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn refresh_picks_up_current_grants() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let tokens = fx
        .sessions
        .login(login("clerk@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;
    let before = fx.tokens.validate_access_token(&tokens.access_token).unwrap();
    assert_eq!(before.perms, vec!["invoices.read"]);

    fx.store
        .grant_permission(acme.tenant.id, acme.clerk_role.id, "ar.read")
        .unwrap();
    let refreshed = fx.sessions.refresh(&tokens.refresh_token).await.unwrap();
    let after = fx.tokens.validate_access_token(&refreshed.access_token).unwrap();
    assert_eq!(after.perms, vec!["ar.read", "invoices.read"]);
}

#[tokio::test]
async fn refresh_for_a_deactivated_user_is_forbidden() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let tokens = fx
        .sessions
        .login(login("clerk@acme.test", PASSWORD, "acme"), None)
        .await
        .unwrap()
        .tokens;

    fx.store.set_user_active(acme.tenant.id, acme.clerk.id, false).unwrap();
    let err = fx.sessions.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
