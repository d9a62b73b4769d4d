//! Create path for tenant configuration
//!
//! This is the only place derived columns are produced: DID and rule prefixes
//! come from their regexes, IPBX passwords are hashed and their HA1 computed.
//! The administrative surface must go through it rather than writing rows
//! directly.

use regex::Regex;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::credentials;
use crate::prefix::prefix_from_regex;
use crate::types::{
    Carrier, CarrierTrunk, Did, Domain, Ipbx, NormalizationProfile, NormalizationRule, RuleType,
    Tenant,
};
use crate::{Error, Result};

/// New IPBX; `password` is given in clear and hashed on insert
#[derive(Debug, Clone)]
pub struct NewIpbx {
    pub tenant_uuid: String,
    pub domain_id: i64,
    pub normalization_profile_id: Option<i64>,
    pub customer: Option<i64>,
    pub ip_fqdn: String,
    pub port: i64,
    pub ip_address: Option<String>,
    pub registered: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub realm: Option<String>,
}

impl NewIpbx {
    pub fn new(tenant_uuid: impl Into<String>, domain_id: i64, ip_fqdn: impl Into<String>) -> Self {
        Self {
            tenant_uuid: tenant_uuid.into(),
            domain_id,
            normalization_profile_id: None,
            customer: None,
            ip_fqdn: ip_fqdn.into(),
            port: 5060,
            ip_address: None,
            registered: false,
            username: None,
            password: None,
            realm: None,
        }
    }
}

/// New carrier trunk
#[derive(Debug, Clone)]
pub struct NewCarrierTrunk {
    pub tenant_uuid: String,
    pub carrier_id: i64,
    pub normalization_profile_id: Option<i64>,
    pub name: String,
    pub sip_proxy: String,
    pub sip_proxy_port: i64,
    pub ip_address: Option<String>,
    pub registered: bool,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub realm: Option<String>,
    pub registrar_proxy: Option<String>,
    pub from_domain: Option<String>,
    pub expire_seconds: i64,
    pub retry_seconds: i64,
}

impl NewCarrierTrunk {
    pub fn new(
        tenant_uuid: impl Into<String>,
        carrier_id: i64,
        name: impl Into<String>,
        sip_proxy: impl Into<String>,
    ) -> Self {
        Self {
            tenant_uuid: tenant_uuid.into(),
            carrier_id,
            normalization_profile_id: None,
            name: name.into(),
            sip_proxy: sip_proxy.into(),
            sip_proxy_port: 5060,
            ip_address: None,
            registered: false,
            auth_username: None,
            auth_password: None,
            realm: None,
            registrar_proxy: None,
            from_domain: None,
            expire_seconds: 3600,
            retry_seconds: 30,
        }
    }
}

/// New DID; the prefix is derived from `did_regex`
#[derive(Debug, Clone)]
pub struct NewDid {
    pub tenant_uuid: String,
    pub ipbx_id: i64,
    pub carrier_trunk_id: i64,
    pub did_regex: String,
}

/// New normalization profile
#[derive(Debug, Clone, Default)]
pub struct NewNormalizationProfile {
    pub tenant_uuid: String,
    pub name: String,
    pub country_code: Option<String>,
    pub area_code: Option<String>,
    pub intl_prefix: Option<String>,
    pub ld_prefix: Option<String>,
    pub always_ld: bool,
    pub always_intl_prefix_plus: bool,
}

/// New normalization rule; the prefix is derived from `match_regex`
#[derive(Debug, Clone)]
pub struct NewNormalizationRule {
    pub profile_id: i64,
    pub rule_type: RuleType,
    pub priority: i64,
    pub match_regex: String,
    pub replace_regex: String,
}

fn check_regex(regex: &str) -> Result<()> {
    Regex::new(regex)
        .map(|_| ())
        .map_err(|e| Error::InvalidInput(format!("invalid regex {:?}: {}", regex, e)))
}

/// Writes configuration rows
#[derive(Clone)]
pub struct ConfigWriter {
    pool: SqlitePool,
}

impl ConfigWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_tenant(&self, name: &str) -> Result<Tenant> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (uuid, name) VALUES (?, ?) RETURNING uuid, name",
        )
        .bind(Tenant::new_uuid())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn create_domain(&self, tenant_uuid: &str, domain: &str) -> Result<Domain> {
        let domain = sqlx::query_as::<_, Domain>(
            "INSERT INTO domains (tenant_uuid, domain) VALUES (?, ?) RETURNING *",
        )
        .bind(tenant_uuid)
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;
        Ok(domain)
    }

    pub async fn create_normalization_profile(
        &self,
        profile: NewNormalizationProfile,
    ) -> Result<NormalizationProfile> {
        let profile = sqlx::query_as::<_, NormalizationProfile>(
            "INSERT INTO normalization_profiles \
             (tenant_uuid, name, country_code, area_code, intl_prefix, ld_prefix, always_ld, always_intl_prefix_plus) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(profile.tenant_uuid)
        .bind(profile.name)
        .bind(profile.country_code)
        .bind(profile.area_code)
        .bind(profile.intl_prefix)
        .bind(profile.ld_prefix)
        .bind(profile.always_ld)
        .bind(profile.always_intl_prefix_plus)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn create_normalization_rule(&self, rule: NewNormalizationRule) -> Result<NormalizationRule> {
        check_regex(&rule.match_regex)?;
        let match_prefix = prefix_from_regex(&rule.match_regex);

        let rule = sqlx::query_as::<_, NormalizationRule>(
            "INSERT INTO normalization_rules \
             (profile_id, rule_type, priority, match_regex, match_prefix, replace_regex) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(rule.profile_id)
        .bind(rule.rule_type.as_i64())
        .bind(rule.priority)
        .bind(rule.match_regex)
        .bind(match_prefix)
        .bind(rule.replace_regex)
        .fetch_one(&self.pool)
        .await?;
        debug!(rule_id = rule.id, prefix = %rule.match_prefix, "Normalization rule created");
        Ok(rule)
    }

    pub async fn create_carrier(&self, tenant_uuid: &str, name: &str) -> Result<Carrier> {
        let carrier = sqlx::query_as::<_, Carrier>(
            "INSERT INTO carriers (tenant_uuid, name) VALUES (?, ?) RETURNING *",
        )
        .bind(tenant_uuid)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(carrier)
    }

    pub async fn create_carrier_trunk(&self, trunk: NewCarrierTrunk) -> Result<CarrierTrunk> {
        let trunk = sqlx::query_as::<_, CarrierTrunk>(
            "INSERT INTO carrier_trunks \
             (tenant_uuid, carrier_id, normalization_profile_id, name, sip_proxy, sip_proxy_port, \
              ip_address, registered, auth_username, auth_password, realm, registrar_proxy, \
              from_domain, expire_seconds, retry_seconds) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(trunk.tenant_uuid)
        .bind(trunk.carrier_id)
        .bind(trunk.normalization_profile_id)
        .bind(trunk.name)
        .bind(trunk.sip_proxy)
        .bind(trunk.sip_proxy_port)
        .bind(trunk.ip_address)
        .bind(trunk.registered)
        .bind(trunk.auth_username)
        .bind(trunk.auth_password)
        .bind(trunk.realm)
        .bind(trunk.registrar_proxy)
        .bind(trunk.from_domain)
        .bind(trunk.expire_seconds)
        .bind(trunk.retry_seconds)
        .fetch_one(&self.pool)
        .await?;
        Ok(trunk)
    }

    pub async fn create_ipbx(&self, ipbx: NewIpbx) -> Result<Ipbx> {
        let domain = sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE id = ?")
            .bind(ipbx.domain_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("domain {}", ipbx.domain_id)))?;

        let password = credentials::hash(ipbx.password.as_deref());
        let ha1_realm = ipbx.realm.as_deref().unwrap_or(&domain.domain);
        let password_ha1 = credentials::hash_ha1(
            ipbx.username.as_deref(),
            Some(ha1_realm),
            ipbx.password.as_deref(),
        );

        let ipbx = sqlx::query_as::<_, Ipbx>(
            "INSERT INTO ipbx \
             (tenant_uuid, domain_id, normalization_profile_id, customer, ip_fqdn, port, ip_address, \
              registered, username, password, password_ha1, realm) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(ipbx.tenant_uuid)
        .bind(ipbx.domain_id)
        .bind(ipbx.normalization_profile_id)
        .bind(ipbx.customer)
        .bind(ipbx.ip_fqdn)
        .bind(ipbx.port)
        .bind(ipbx.ip_address)
        .bind(ipbx.registered)
        .bind(ipbx.username)
        .bind(password)
        .bind(password_ha1)
        .bind(ipbx.realm)
        .fetch_one(&self.pool)
        .await?;
        Ok(ipbx)
    }

    pub async fn create_did(&self, did: NewDid) -> Result<Did> {
        check_regex(&did.did_regex)?;
        let did_prefix = prefix_from_regex(&did.did_regex);

        let did = sqlx::query_as::<_, Did>(
            "INSERT INTO dids (tenant_uuid, ipbx_id, carrier_trunk_id, did_regex, did_prefix) \
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(did.tenant_uuid)
        .bind(did.ipbx_id)
        .bind(did.carrier_trunk_id)
        .bind(did.did_regex)
        .bind(did_prefix)
        .fetch_one(&self.pool)
        .await?;
        Ok(did)
    }

    /// Change a DID's regex, recomputing its prefix
    pub async fn update_did_regex(&self, did_id: i64, did_regex: &str) -> Result<Did> {
        check_regex(did_regex)?;
        sqlx::query_as::<_, Did>(
            "UPDATE dids SET did_regex = ?, did_prefix = ? WHERE id = ? RETURNING *",
        )
        .bind(did_regex)
        .bind(prefix_from_regex(did_regex))
        .bind(did_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("did {}", did_id)))
    }
}
