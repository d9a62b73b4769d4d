//! Tenant configuration entities as read from the relational store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root of isolation; every other entity is scoped to one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub uuid: String,
    pub name: String,
}

impl Tenant {
    /// Create a new tenant UUID
    pub fn new_uuid() -> String {
        Uuid::new_v4().to_string()
    }
}

/// SIP domain owned by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Domain {
    pub id: i64,
    pub tenant_uuid: String,
    pub domain: String,
}

/// Customer premise PBX reachable at `ip_fqdn:port`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ipbx {
    pub id: i64,
    pub tenant_uuid: String,
    pub domain_id: i64,
    pub normalization_profile_id: Option<i64>,
    pub customer: Option<i64>,
    pub ip_fqdn: String,
    pub port: i64,
    /// Static source address; `None` accepts any source
    pub ip_address: Option<String>,
    pub registered: bool,
    pub username: Option<String>,
    /// Salted PBKDF2 hash, see [`crate::credentials`]
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing)]
    pub password_ha1: Option<String>,
    pub realm: Option<String>,
}

/// Carrier owning one or more trunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Carrier {
    pub id: i64,
    pub tenant_uuid: String,
    pub name: String,
}

/// Peering leg towards a carrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CarrierTrunk {
    pub id: i64,
    pub tenant_uuid: String,
    pub carrier_id: i64,
    pub normalization_profile_id: Option<i64>,
    pub name: String,
    pub sip_proxy: String,
    pub sip_proxy_port: i64,
    pub ip_address: Option<String>,
    pub registered: bool,
    pub auth_username: Option<String>,
    #[serde(skip_serializing)]
    pub auth_password: Option<String>,
    pub realm: Option<String>,
    pub registrar_proxy: Option<String>,
    pub from_domain: Option<String>,
    pub expire_seconds: i64,
    pub retry_seconds: i64,
}

/// Destination-number rule binding a trunk to the IPBX receiving the call.
///
/// `did_prefix` is derived from `did_regex` by the writer and only serves as
/// an index accelerant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Did {
    pub id: i64,
    pub tenant_uuid: String,
    pub ipbx_id: i64,
    pub carrier_trunk_id: i64,
    pub did_regex: String,
    pub did_prefix: String,
}

/// Per-tenant number formatting context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NormalizationProfile {
    pub id: i64,
    pub tenant_uuid: String,
    pub name: String,
    pub country_code: Option<String>,
    pub area_code: Option<String>,
    pub intl_prefix: Option<String>,
    pub ld_prefix: Option<String>,
    pub always_ld: bool,
    pub always_intl_prefix_plus: bool,
}

/// Direction a normalization rule rewrites in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum RuleType {
    LocalToE164,
    E164ToLocal,
}

impl RuleType {
    pub fn as_i64(self) -> i64 {
        match self {
            RuleType::LocalToE164 => 1,
            RuleType::E164ToLocal => 2,
        }
    }
}

impl From<RuleType> for i64 {
    fn from(rule_type: RuleType) -> Self {
        rule_type.as_i64()
    }
}

impl TryFrom<i64> for RuleType {
    type Error = crate::Error;

    fn try_from(value: i64) -> crate::Result<Self> {
        match value {
            1 => Ok(RuleType::LocalToE164),
            2 => Ok(RuleType::E164ToLocal),
            other => Err(crate::Error::InvalidInput(format!("unknown rule type {}", other))),
        }
    }
}

/// One ordered rewrite step of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NormalizationRule {
    pub id: i64,
    pub profile_id: i64,
    pub rule_type: i64,
    pub priority: i64,
    pub match_regex: String,
    pub match_prefix: String,
    pub replace_regex: String,
}

/// Immutable record of a completed call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cdr {
    pub id: i64,
    pub tenant_uuid: String,
    pub source_ip: Option<String>,
    pub source_port: Option<i64>,
    pub from_uri: String,
    pub to_uri: String,
    pub call_id: Option<String>,
    #[serde(serialize_with = "crate::cdr::serialize_call_start")]
    pub call_start: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
}
