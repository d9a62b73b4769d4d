//! SQLite-backed configuration accessor

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use super::{CdrStore, ConfigAccessor, IpbxAuthFilter, IpbxWithDomain, NewCdr};
use crate::types::{
    CarrierTrunk, Cdr, Did, Ipbx, NormalizationProfile, NormalizationRule, RuleType, Tenant,
};
use crate::Result;

/// Pool size used by [`SqliteConfigStore::new`]
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration store over a bounded SQLite connection pool
#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    /// Connect with [`DEFAULT_MAX_CONNECTIONS`] and bring the schema up to
    /// date. Meant for tests and embedding; the service sizes its pool from
    /// configuration.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with a pool of at most `max_connections` and bring the schema
    /// up to date
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an already configured pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Cheap liveness probe used by startup retries
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ConfigAccessor for SqliteConfigStore {
    async fn tenant(&self, uuid: &str) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT uuid, name FROM tenants WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn tenant_by_domains(&self, domains: &[String]) -> Result<Option<Tenant>> {
        if domains.is_empty() {
            return Ok(None);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT t.uuid, t.name FROM tenants t \
             JOIN domains d ON d.tenant_uuid = t.uuid \
             WHERE d.domain IN (",
        );
        let mut separated = query.separated(", ");
        for domain in domains {
            separated.push_bind(domain.clone());
        }
        separated.push_unseparated(") ORDER BY d.id LIMIT 1");

        let tenant = query
            .build_query_as::<Tenant>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn ipbx(&self, id: i64) -> Result<Option<Ipbx>> {
        let ipbx = sqlx::query_as::<_, Ipbx>("SELECT * FROM ipbx WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ipbx)
    }

    async fn carrier_trunk(&self, id: i64) -> Result<Option<CarrierTrunk>> {
        let trunk = sqlx::query_as::<_, CarrierTrunk>("SELECT * FROM carrier_trunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trunk)
    }

    async fn normalization_profile(&self, id: i64) -> Result<Option<NormalizationProfile>> {
        let profile = sqlx::query_as::<_, NormalizationProfile>(
            "SELECT * FROM normalization_profiles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn normalization_rules(
        &self,
        profile_id: i64,
        rule_type: RuleType,
        prefixes: &[String],
    ) -> Result<Vec<NormalizationRule>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM normalization_rules WHERE profile_id = ");
        query.push_bind(profile_id);
        query.push(" AND rule_type = ");
        query.push_bind(rule_type.as_i64());
        query.push(" AND match_prefix IN (");
        let mut separated = query.separated(", ");
        for prefix in prefixes {
            separated.push_bind(prefix.clone());
        }
        separated.push_unseparated(") ORDER BY priority, id");

        let rules = query
            .build_query_as::<NormalizationRule>()
            .fetch_all(&self.pool)
            .await?;
        debug!(profile_id, ?rule_type, count = rules.len(), "Loaded normalization rules");
        Ok(rules)
    }

    async fn ipbx_candidates_for_auth(&self, filter: &IpbxAuthFilter) -> Result<Vec<IpbxWithDomain>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT i.*, d.domain AS domain FROM ipbx i \
             JOIN domains d ON d.id = i.domain_id WHERE 1 = 1",
        );
        if let Some(source_ip) = &filter.source_ip {
            query.push(" AND (i.ip_address IS NULL OR i.ip_address = ");
            query.push_bind(source_ip.clone());
            query.push(")");
        }
        if let Some(domain) = &filter.domain {
            query.push(" AND d.domain = ");
            query.push_bind(domain.clone());
        }
        if let Some(username) = &filter.username {
            query.push(" AND (i.username = ");
            query.push_bind(username.clone());
            query.push(" OR (i.password IS NULL AND i.username IS NULL))");
        }
        query.push(" ORDER BY i.id");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ");
            query.push_bind(i64::from(limit));
        }

        let rows = query
            .build_query_as::<IpbxWithDomain>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn first_carrier_trunk_by_source_ip(&self, source_ip: &str) -> Result<Option<CarrierTrunk>> {
        let trunk = sqlx::query_as::<_, CarrierTrunk>(
            "SELECT ct.* FROM carrier_trunks ct \
             JOIN carriers c ON c.id = ct.carrier_id \
             WHERE ct.ip_address IS NULL OR ct.ip_address = ? \
             ORDER BY ct.id LIMIT 1",
        )
        .bind(source_ip)
        .fetch_optional(&self.pool)
        .await?;
        Ok(trunk)
    }

    async fn newest_ipbx_by_domain(&self, domain: &str, tenant_uuid: Option<&str>) -> Result<Option<Ipbx>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT i.* FROM ipbx i JOIN domains d ON d.id = i.domain_id WHERE d.domain = ",
        );
        query.push_bind(domain.to_string());
        if let Some(tenant_uuid) = tenant_uuid {
            query.push(" AND i.tenant_uuid = ");
            query.push_bind(tenant_uuid.to_string());
        }
        query.push(" ORDER BY i.id DESC LIMIT 1");

        let ipbx = query
            .build_query_as::<Ipbx>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(ipbx)
    }

    async fn dids_by_prefixes(&self, prefixes: &[String]) -> Result<Vec<Did>> {
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM dids WHERE did_prefix IN (");
        let mut separated = query.separated(", ");
        for prefix in prefixes {
            separated.push_bind(prefix.clone());
        }
        separated.push_unseparated(") ORDER BY LENGTH(did_prefix) DESC, id");

        let dids = query.build_query_as::<Did>().fetch_all(&self.pool).await?;
        Ok(dids)
    }

    async fn fallback_carrier_trunk(
        &self,
        source_ip: Option<&str>,
        tenant_uuid: Option<&str>,
    ) -> Result<Option<CarrierTrunk>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT ct.* FROM carrier_trunks ct \
             JOIN carriers c ON c.id = ct.carrier_id \
             JOIN ipbx i ON i.tenant_uuid = c.tenant_uuid WHERE ",
        );
        match (tenant_uuid, source_ip) {
            (Some(tenant_uuid), source_ip) => {
                query.push("c.tenant_uuid = ");
                query.push_bind(tenant_uuid.to_string());
                query.push(" AND (i.ip_address IS NULL OR i.ip_address = ");
                query.push_bind(source_ip.map(str::to_string));
                query.push(")");
            }
            (None, Some(source_ip)) => {
                query.push("i.ip_address = ");
                query.push_bind(source_ip.to_string());
            }
            (None, None) => return Ok(None),
        }
        query.push(" ORDER BY ct.id LIMIT 1");

        let trunk = query
            .build_query_as::<CarrierTrunk>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(trunk)
    }

    async fn registered_carrier_trunks(&self) -> Result<Vec<CarrierTrunk>> {
        let trunks = sqlx::query_as::<_, CarrierTrunk>(
            "SELECT * FROM carrier_trunks WHERE registered = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(trunks)
    }
}

#[async_trait]
impl CdrStore for SqliteConfigStore {
    async fn insert_cdr(&self, cdr: NewCdr) -> Result<Cdr> {
        let cdr = sqlx::query_as::<_, Cdr>(
            "INSERT INTO cdrs (tenant_uuid, source_ip, source_port, from_uri, to_uri, call_id, call_start, duration) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(cdr.tenant_uuid)
        .bind(cdr.source_ip)
        .bind(cdr.source_port)
        .bind(cdr.from_uri)
        .bind(cdr.to_uri)
        .bind(cdr.call_id)
        .bind(cdr.call_start)
        .bind(cdr.duration)
        .fetch_one(&self.pool)
        .await?;
        debug!(cdr_id = cdr.id, tenant = %cdr.tenant_uuid, "CDR recorded");
        Ok(cdr)
    }
}
