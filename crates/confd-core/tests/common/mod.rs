//! Shared fixtures for the store-backed tests

#![allow(dead_code)]

use std::sync::Arc;

use confd_core::store::{ConfigWriter, NewCarrierTrunk, NewIpbx, SqliteConfigStore};
use confd_core::types::{Carrier, CarrierTrunk, Domain, Ipbx, Tenant};
use tempfile::TempDir;

pub struct TestDb {
    pub store: Arc<SqliteConfigStore>,
    pub writer: ConfigWriter,
    _dir: TempDir,
}

/// Helper to create a migrated on-disk test database
pub async fn create_test_db() -> TestDb {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteConfigStore::new(&db_url)
        .await
        .expect("Failed to create test database");
    let writer = ConfigWriter::new(store.pool().clone());

    TestDb {
        store: Arc::new(store),
        writer,
        _dir: temp_dir,
    }
}

impl TestDb {
    pub async fn tenant_with_domain(&self, name: &str, domain: &str) -> (Tenant, Domain) {
        let tenant = self.writer.create_tenant(name).await.unwrap();
        let domain = self.writer.create_domain(&tenant.uuid, domain).await.unwrap();
        (tenant, domain)
    }

    pub async fn ipbx(&self, tenant: &Tenant, domain: &Domain, ip_fqdn: &str) -> Ipbx {
        self.writer
            .create_ipbx(NewIpbx::new(&tenant.uuid, domain.id, ip_fqdn))
            .await
            .unwrap()
    }

    pub async fn ipbx_with(&self, ipbx: NewIpbx) -> Ipbx {
        self.writer.create_ipbx(ipbx).await.unwrap()
    }

    pub async fn carrier(&self, tenant: &Tenant, name: &str) -> Carrier {
        self.writer.create_carrier(&tenant.uuid, name).await.unwrap()
    }

    pub async fn trunk(&self, tenant: &Tenant, carrier: &Carrier, name: &str, sip_proxy: &str) -> CarrierTrunk {
        self.writer
            .create_carrier_trunk(NewCarrierTrunk::new(&tenant.uuid, carrier.id, name, sip_proxy))
            .await
            .unwrap()
    }

    pub async fn trunk_with(&self, trunk: NewCarrierTrunk) -> CarrierTrunk {
        self.writer.create_carrier_trunk(trunk).await.unwrap()
    }
}
