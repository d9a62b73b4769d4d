//! CDR recording and the uacreg export

mod common;

use chrono::{TimeZone, Utc};
use common::create_test_db;
use confd_core::cdr::{CdrRecorder, CdrRequest};
use confd_core::store::NewCarrierTrunk;
use confd_core::uacreg::{uacreg_content, UACREG_HEADER};

fn cdr_request(from_uri: &str, to_uri: &str) -> CdrRequest {
    CdrRequest {
        tenant_uuid: None,
        source_ip: Some("10.0.0.1".into()),
        source_port: Some(5060),
        call_id: Some("call-id".into()),
        from_uri: from_uri.into(),
        to_uri: to_uri.into(),
        call_start: Utc.with_ymd_and_hms(2019, 9, 1, 9, 0, 0).single(),
        duration: Some(60),
    }
}

#[tokio::test]
async fn test_cdr_tenant_from_domains() {
    let db = create_test_db().await;
    let (tenant, _) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let recorder = CdrRecorder::new(db.store.clone(), db.store.clone());

    let response = recorder
        .record(cdr_request("sip:100@sourcedomain.com", "sip:200@testdomain.com"))
        .await
        .unwrap();

    assert!(response.success);
    let cdr = response.cdr.unwrap();
    assert_eq!(cdr.tenant_uuid, tenant.uuid);
    assert_eq!(cdr.call_id.as_deref(), Some("call-id"));
    assert_eq!(cdr.duration, Some(60));
    assert_eq!(cdr.call_start, Utc.with_ymd_and_hms(2019, 9, 1, 9, 0, 0).single());

    let json = serde_json::to_value(&cdr).unwrap();
    assert_eq!(json["call_start"], "2019-09-01T09:00:00+00:00");
}

#[tokio::test]
async fn test_cdr_explicit_tenant() {
    let db = create_test_db().await;
    let (tenant, _) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let recorder = CdrRecorder::new(db.store.clone(), db.store.clone());

    let mut request = cdr_request("sip:100@a.com", "sip:200@b.com");
    request.tenant_uuid = Some(tenant.uuid.clone());
    let response = recorder.record(request).await.unwrap();
    assert_eq!(response.cdr.unwrap().tenant_uuid, tenant.uuid);

    let mut unknown = cdr_request("sip:100@testdomain.com", "sip:200@testdomain.com");
    unknown.tenant_uuid = Some("00000000-0000-0000-0000-000000000000".into());
    let response = recorder.record(unknown).await.unwrap();
    assert!(!response.success);
    assert!(response.cdr.is_none());
}

#[tokio::test]
async fn test_cdr_unknown_tenant_is_not_persisted() {
    let db = create_test_db().await;
    db.tenant_with_domain("fabio", "testdomain.com").await;
    let recorder = CdrRecorder::new(db.store.clone(), db.store.clone());

    let response = recorder
        .record(cdr_request("sip:100@a.com", "not a uri"))
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.cdr.is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cdrs")
        .fetch_one(db.store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_uacreg_lists_registered_trunks() {
    let db = create_test_db().await;
    let (tenant, _) = db.tenant_with_domain("fabio", "testdomain.com").await;
    let carrier = db.carrier(&tenant, "carrier1").await;

    let mut registered = NewCarrierTrunk::new(&tenant.uuid, carrier.id, "trunk1", "192.168.1.1");
    registered.registered = true;
    registered.auth_username = Some("username".into());
    registered.auth_password = Some("password".into());
    registered.realm = Some("realm".into());
    registered.registrar_proxy = Some("registrar".into());
    registered.from_domain = Some("domain.com".into());
    registered.expire_seconds = 300;
    registered.retry_seconds = 10;
    let trunk = db.trunk_with(registered).await;
    db.trunk(&tenant, &carrier, "trunk2", "192.168.1.2").await;

    let content = uacreg_content(&*db.store).await.unwrap();
    assert_eq!(
        content,
        format!(
            "{}{}:username:domain.com:username:domain.com:realm:username:password:sip\\:registrar:300:16:0:\n",
            UACREG_HEADER, trunk.id
        )
    );
}
