//! Caller identity resolution
//!
//! An IPBX match always wins over a carrier trunk match. Within each class
//! the lowest id wins; several rows may match and nothing assumes otherwise.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::credentials;
use crate::store::{ConfigAccessor, IpbxAuthFilter, IpbxWithDomain};
use crate::Result;

/// Identity claims sent by the proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub source_port: Option<i64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Outcome of an identity resolution; a failure has every field empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    pub tenant_uuid: Option<String>,
    pub carrier_trunk_id: Option<i64>,
    pub ipbx_id: Option<i64>,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub password_ha1: Option<String>,
}

impl AuthResult {
    pub fn failure() -> Self {
        Self::default()
    }

    fn from_ipbx(row: IpbxWithDomain) -> Self {
        Self {
            success: true,
            tenant_uuid: Some(row.ipbx.tenant_uuid),
            carrier_trunk_id: None,
            ipbx_id: Some(row.ipbx.id),
            domain: Some(row.domain),
            username: row.ipbx.username,
            password_ha1: row.ipbx.password_ha1,
        }
    }

    /// Whether the caller is bound to a tenant
    pub fn is_authenticated(&self) -> bool {
        self.success && self.tenant_uuid.is_some()
    }
}

/// Resolves the tenant and IPBX or carrier trunk a request comes from
#[derive(Clone)]
pub struct AuthResolver {
    store: Arc<dyn ConfigAccessor>,
}

impl AuthResolver {
    pub fn new(store: Arc<dyn ConfigAccessor>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(source_ip = ?request.source_ip, domain = ?request.domain, username = ?request.username))]
    pub async fn resolve(&self, request: &AuthRequest) -> Result<AuthResult> {
        if request.source_ip.is_some() || request.username.is_some() {
            if let Some(result) = self.resolve_ipbx(request).await? {
                return Ok(result);
            }
        }

        if let Some(source_ip) = &request.source_ip {
            if let Some(trunk) = self.store.first_carrier_trunk_by_source_ip(source_ip).await? {
                debug!(carrier_trunk_id = trunk.id, "Caller identified by carrier trunk");
                return Ok(AuthResult {
                    success: true,
                    tenant_uuid: Some(trunk.tenant_uuid),
                    carrier_trunk_id: Some(trunk.id),
                    ..AuthResult::default()
                });
            }
        }

        debug!("Caller not identified");
        Ok(AuthResult::failure())
    }

    async fn resolve_ipbx(&self, request: &AuthRequest) -> Result<Option<AuthResult>> {
        let password = request.password.as_deref();
        let filter = IpbxAuthFilter {
            source_ip: request.source_ip.clone(),
            domain: request.domain.clone(),
            username: request.username.clone(),
            // without a password the first row is the answer
            limit: password.is_none().then_some(1),
        };

        let candidates = self.store.ipbx_candidates_for_auth(&filter).await?;
        let matched = candidates.into_iter().find(|row| match password {
            None => true,
            Some(provided) => row
                .ipbx
                .password
                .as_deref()
                .is_some_and(|stored| credentials::verify(stored, provided)),
        });

        Ok(matched.map(|row| {
            debug!(ipbx_id = row.ipbx.id, "Caller identified by IPBX");
            AuthResult::from_ipbx(row)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_nulls() {
        let value = serde_json::to_value(AuthResult::failure()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "success": false,
                "tenant_uuid": null,
                "carrier_trunk_id": null,
                "ipbx_id": null,
                "domain": null,
                "username": null,
                "password_ha1": null,
            })
        );
    }

    #[test]
    fn test_request_fields_are_optional() {
        let request: AuthRequest = serde_json::from_str(r#"{"source_ip": "10.0.0.1"}"#).unwrap();
        assert_eq!(request.source_ip.as_deref(), Some("10.0.0.1"));
        assert!(request.username.is_none());
        assert!(request.password.is_none());
    }
}
