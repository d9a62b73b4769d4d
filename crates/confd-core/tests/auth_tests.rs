//! Caller identity resolution against stored IPBXes and carrier trunks

mod common;

use common::create_test_db;
use confd_core::auth::{AuthRequest, AuthResolver, AuthResult};
use confd_core::store::{NewCarrierTrunk, NewIpbx};
use pretty_assertions::assert_eq;

fn request(source_ip: Option<&str>, domain: Option<&str>, username: Option<&str>, password: Option<&str>) -> AuthRequest {
    AuthRequest {
        source_ip: source_ip.map(String::from),
        source_port: Some(5060),
        domain: domain.map(String::from),
        username: username.map(String::from),
        password: password.map(String::from),
    }
}

#[tokio::test]
async fn test_ipbx_by_username_and_domain() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let mut new_ipbx = NewIpbx::new(&tenant.uuid, domain.id, "mypbx.com");
    new_ipbx.username = Some("user".into());
    new_ipbx.password = Some("password".into());
    let ipbx = db.ipbx_with(new_ipbx).await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver
        .resolve(&request(Some("10.0.0.1"), Some("testdomain.com"), Some("user"), None))
        .await
        .unwrap();

    assert_eq!(
        result,
        AuthResult {
            success: true,
            tenant_uuid: Some(tenant.uuid),
            carrier_trunk_id: None,
            ipbx_id: Some(ipbx.id),
            domain: Some("testdomain.com".into()),
            username: Some("user".into()),
            password_ha1: Some("1da0f07f75bf1119f305921d1a7f00e3".into()),
        }
    );
}

#[tokio::test]
async fn test_password_is_verified() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let mut new_ipbx = NewIpbx::new(&tenant.uuid, domain.id, "mypbx.com");
    new_ipbx.username = Some("user".into());
    new_ipbx.password = Some("password".into());
    let ipbx = db.ipbx_with(new_ipbx).await;

    let resolver = AuthResolver::new(db.store.clone());

    let ok = resolver
        .resolve(&request(None, Some("testdomain.com"), Some("user"), Some("password")))
        .await
        .unwrap();
    assert!(ok.success);
    assert_eq!(ok.ipbx_id, Some(ipbx.id));

    let wrong = resolver
        .resolve(&request(None, Some("testdomain.com"), Some("user"), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(wrong, AuthResult::failure());
}

#[tokio::test]
async fn test_ipbx_wins_over_carrier_trunk() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let mut new_ipbx = NewIpbx::new(&tenant.uuid, domain.id, "mypbx.com");
    new_ipbx.username = Some("user".into());
    let ipbx = db.ipbx_with(new_ipbx).await;

    let carrier = db.carrier(&tenant, "carrier1").await;
    let mut trunk = NewCarrierTrunk::new(&tenant.uuid, carrier.id, "trunk1", "proxy.carrier.com");
    trunk.ip_address = Some("10.0.0.1".into());
    db.trunk_with(trunk).await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver
        .resolve(&request(Some("10.0.0.1"), None, Some("user"), None))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.ipbx_id, Some(ipbx.id));
    assert_eq!(result.carrier_trunk_id, None);
}

#[tokio::test]
async fn test_carrier_trunk_by_source_ip() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let mut new_ipbx = NewIpbx::new(&tenant.uuid, domain.id, "mypbx.com");
    new_ipbx.ip_address = Some("10.0.0.9".into());
    db.ipbx_with(new_ipbx).await;

    let carrier = db.carrier(&tenant, "carrier1").await;
    let mut new_trunk = NewCarrierTrunk::new(&tenant.uuid, carrier.id, "trunk1", "proxy.carrier.com");
    new_trunk.ip_address = Some("10.0.0.1".into());
    let trunk = db.trunk_with(new_trunk).await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver
        .resolve(&request(Some("10.0.0.1"), None, None, None))
        .await
        .unwrap();

    assert_eq!(
        result,
        AuthResult {
            success: true,
            tenant_uuid: Some(tenant.uuid),
            carrier_trunk_id: Some(trunk.id),
            ..AuthResult::default()
        }
    );
}

#[tokio::test]
async fn test_anonymous_ipbx_matches_any_username() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let ipbx = db.ipbx(&tenant, &domain, "mypbx.com").await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver
        .resolve(&request(Some("10.0.0.1"), Some("testdomain.com"), Some("someone"), None))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.ipbx_id, Some(ipbx.id));
    assert_eq!(result.username, None);
    assert_eq!(result.password_ha1, None);
}

#[tokio::test]
async fn test_first_ipbx_by_id_wins() {
    let db = create_test_db().await;
    let (tenant, domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let first = db.ipbx(&tenant, &domain, "first.com").await;
    let mut second = NewIpbx::new(&tenant.uuid, domain.id, "second.com");
    second.username = Some("other".into());
    db.ipbx_with(second).await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver
        .resolve(&request(Some("10.0.0.1"), None, None, None))
        .await
        .unwrap();

    assert_eq!(result.ipbx_id, Some(first.id));
}

#[tokio::test]
async fn test_no_identity_is_failure() {
    let db = create_test_db().await;
    let (tenant, _domain) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let carrier = db.carrier(&tenant, "carrier1").await;
    db.trunk(&tenant, &carrier, "trunk1", "proxy.carrier.com").await;

    let resolver = AuthResolver::new(db.store.clone());
    let result = resolver.resolve(&request(None, None, None, None)).await.unwrap();
    assert_eq!(result, AuthResult::failure());

    let unknown_domain = resolver
        .resolve(&request(None, Some("other.com"), Some("user"), None))
        .await
        .unwrap();
    assert_eq!(unknown_domain, AuthResult::failure());
}
