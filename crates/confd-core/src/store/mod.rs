//! Read access to tenant configuration and the CDR write path
//!
//! Resolvers only depend on the traits here; [`SqliteConfigStore`] is the
//! relational implementation and [`ConfigWriter`] the create path used by the
//! administrative surface and fixtures.

mod sqlite;
mod writer;

pub use sqlite::{SqliteConfigStore, DEFAULT_MAX_CONNECTIONS};
pub use writer::{
    ConfigWriter, NewCarrierTrunk, NewDid, NewIpbx, NewNormalizationProfile, NewNormalizationRule,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{
    CarrierTrunk, Cdr, Did, Ipbx, NormalizationProfile, NormalizationRule, RuleType, Tenant,
};
use crate::Result;

/// Predicates applied to IPBX rows when resolving a caller identity
#[derive(Debug, Clone, Default)]
pub struct IpbxAuthFilter {
    /// Matches rows bound to this address or to no address
    pub source_ip: Option<String>,
    /// Exact domain name of the IPBX
    pub domain: Option<String>,
    /// Matches this username, or anonymous rows without credentials
    pub username: Option<String>,
    pub limit: Option<u32>,
}

/// IPBX joined with the name of its domain
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IpbxWithDomain {
    #[sqlx(flatten)]
    pub ipbx: Ipbx,
    pub domain: String,
}

/// Call record to persist
#[derive(Debug, Clone, Default)]
pub struct NewCdr {
    pub tenant_uuid: String,
    pub source_ip: Option<String>,
    pub source_port: Option<i64>,
    pub from_uri: String,
    pub to_uri: String,
    pub call_id: Option<String>,
    pub call_start: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
}

/// Read-only queries the decision engine runs against tenant configuration.
///
/// Every lookup returning a single row has a deterministic order ending in
/// the row id.
#[async_trait]
pub trait ConfigAccessor: Send + Sync {
    async fn tenant(&self, uuid: &str) -> Result<Option<Tenant>>;

    /// Tenant owning the first (by domain id) of the given domains
    async fn tenant_by_domains(&self, domains: &[String]) -> Result<Option<Tenant>>;

    async fn ipbx(&self, id: i64) -> Result<Option<Ipbx>>;

    async fn carrier_trunk(&self, id: i64) -> Result<Option<CarrierTrunk>>;

    async fn normalization_profile(&self, id: i64) -> Result<Option<NormalizationProfile>>;

    /// Rules of a profile for one direction whose `match_prefix` is in
    /// `prefixes`, ordered by `(priority, id)`
    async fn normalization_rules(
        &self,
        profile_id: i64,
        rule_type: RuleType,
        prefixes: &[String],
    ) -> Result<Vec<NormalizationRule>>;

    /// IPBX rows matching `filter`, ordered by id
    async fn ipbx_candidates_for_auth(&self, filter: &IpbxAuthFilter) -> Result<Vec<IpbxWithDomain>>;

    /// First trunk (by id) bound to `source_ip` or accepting any source
    async fn first_carrier_trunk_by_source_ip(&self, source_ip: &str) -> Result<Option<CarrierTrunk>>;

    /// Newest IPBX attached to `domain`, optionally within one tenant
    async fn newest_ipbx_by_domain(&self, domain: &str, tenant_uuid: Option<&str>) -> Result<Option<Ipbx>>;

    /// DIDs indexed under any of `prefixes`, longest prefix first then by id
    async fn dids_by_prefixes(&self, prefixes: &[String]) -> Result<Vec<Did>>;

    /// First trunk (by id) of a tenant that has an IPBX sending from `source_ip`.
    ///
    /// With a known caller tenant, IPBXes without a static address count as
    /// matching; without one, the IPBX address must equal `source_ip`.
    async fn fallback_carrier_trunk(
        &self,
        source_ip: Option<&str>,
        tenant_uuid: Option<&str>,
    ) -> Result<Option<CarrierTrunk>>;

    /// Trunks that register against their carrier, ordered by id
    async fn registered_carrier_trunks(&self) -> Result<Vec<CarrierTrunk>>;
}

/// Persistence of completed calls
#[async_trait]
pub trait CdrStore: Send + Sync {
    async fn insert_cdr(&self, cdr: NewCdr) -> Result<Cdr>;
}
