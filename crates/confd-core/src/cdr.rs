//! Call detail records posted by the proxy at call end

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, instrument};

use crate::store::{CdrStore, ConfigAccessor, NewCdr};
use crate::types::{Cdr, Tenant};
use crate::uri::SipAddress;
use crate::Result;

/// Call record as sent by the proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CdrRequest {
    /// Owning tenant; resolved from the URI domains when absent
    #[serde(default)]
    pub tenant_uuid: Option<String>,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub source_port: Option<i64>,
    #[serde(default)]
    pub call_id: Option<String>,
    pub from_uri: String,
    pub to_uri: String,
    #[serde(default, deserialize_with = "deserialize_call_start")]
    pub call_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdrResponse {
    pub success: bool,
    pub cdr: Option<Cdr>,
}

/// RFC 3339 with an explicit `+00:00` offset
pub fn serialize_call_start<S>(call_start: &Option<DateTime<Utc>>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match call_start {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

fn parse_timestamp(raw: RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Seconds(secs) => DateTime::from_timestamp(secs, 0),
        RawTimestamp::Fractional(secs) => {
            let nanos = (secs.fract() * 1e9).round() as u32;
            DateTime::from_timestamp(secs.trunc() as i64, nanos.min(999_999_999))
        }
        RawTimestamp::Text(text) => {
            let text = text.trim();
            if let Ok(secs) = text.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
            DateTime::parse_from_rfc3339(text)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
                        .map(|naive| naive.and_utc())
                        .ok()
                })
        }
    }
}

/// Accepts epoch seconds or an RFC 3339 timestamp; naive times are UTC
pub fn deserialize_call_start<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("call_start is neither epoch seconds nor RFC 3339")),
    }
}

/// Persists call records against the tenant they belong to
#[derive(Clone)]
pub struct CdrRecorder {
    config: Arc<dyn ConfigAccessor>,
    cdrs: Arc<dyn CdrStore>,
}

impl CdrRecorder {
    pub fn new(config: Arc<dyn ConfigAccessor>, cdrs: Arc<dyn CdrStore>) -> Self {
        Self { config, cdrs }
    }

    async fn resolve_tenant(&self, request: &CdrRequest) -> Result<Option<Tenant>> {
        if let Some(uuid) = &request.tenant_uuid {
            return self.config.tenant(uuid).await;
        }

        let domains: Vec<String> = [&request.from_uri, &request.to_uri]
            .into_iter()
            .map(|uri| SipAddress::parse(uri).domain)
            .filter(|domain| !domain.is_empty())
            .collect();
        self.config.tenant_by_domains(&domains).await
    }

    /// Store the record; an unknown tenant is a negative result, not an error
    #[instrument(skip(self, request), fields(call_id = ?request.call_id))]
    pub async fn record(&self, request: CdrRequest) -> Result<CdrResponse> {
        let Some(tenant) = self.resolve_tenant(&request).await? else {
            debug!("No tenant for CDR, dropping it");
            return Ok(CdrResponse {
                success: false,
                cdr: None,
            });
        };

        let cdr = self
            .cdrs
            .insert_cdr(NewCdr {
                tenant_uuid: tenant.uuid,
                source_ip: request.source_ip,
                source_port: request.source_port,
                from_uri: request.from_uri,
                to_uri: request.to_uri,
                call_id: request.call_id,
                call_start: request.call_start,
                duration: request.duration,
            })
            .await?;

        Ok(CdrResponse {
            success: true,
            cdr: Some(cdr),
        })
    }
}
