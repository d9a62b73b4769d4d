//! Routing decisions in the proxy's rtjson format
//!
//! At most one route is emitted towards an IPBX (domain match first, DID
//! match otherwise) and at most one towards a carrier trunk.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::auth::{AuthRequest, AuthResolver, AuthResult};
use crate::normalization::Normalizer;
use crate::prefix::lookup_prefixes;
use crate::store::ConfigAccessor;
use crate::types::{CarrierTrunk, Ipbx, NormalizationProfile};
use crate::uri::SipAddress;
use crate::Result;

pub const RTJSON_VERSION: &str = "1.0";
pub const ROUTING_SERIAL: &str = "serial";
pub const BRANCH_FLAGS: u32 = 8;
pub const FR_TIMER: u32 = 5000;
pub const FR_INV_TIMER: u32 = 30000;

/// Routing query for one call leg
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRequest {
    #[serde(default)]
    pub event: Option<String>,
    /// Resolve the caller identity before routing
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub source_port: Option<i64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    pub from_uri: String,
    #[serde(default)]
    pub from_tag: Option<String>,
    pub to_uri: String,
    #[serde(default)]
    pub to_name: Option<String>,
    #[serde(default)]
    pub to_tag: Option<String>,
}

impl RoutingRequest {
    fn auth_request(&self) -> AuthRequest {
        AuthRequest {
            source_ip: self.source_ip.clone(),
            source_port: self.source_port,
            domain: self.domain.clone(),
            username: self.username.clone(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderValue {
    pub display: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHeaders {
    pub from: HeaderValue,
    pub to: HeaderValue,
    pub extra: String,
}

/// One branch of an rtjson route set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub dst_uri: String,
    pub path: String,
    pub socket: String,
    pub headers: RouteHeaders,
    pub branch_flags: u32,
    pub fr_timer: u32,
    pub fr_inv_timer: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtJson {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl RtJson {
    pub fn failure() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResponse {
    pub auth: Option<AuthResult>,
    pub rtjson: RtJson,
}

/// Credentials the proxy presents to the next hop
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutboundAuth {
    username: String,
    password: String,
    realm: Option<String>,
}

impl OutboundAuth {
    /// `password` is the stored column, i.e. the salted hash written on
    /// creation, not a clear-text secret.
    fn for_ipbx(ipbx: &Ipbx) -> Option<Self> {
        match (&ipbx.username, &ipbx.password, &ipbx.realm) {
            (Some(username), Some(password), Some(realm)) => Some(Self {
                username: username.clone(),
                password: password.clone(),
                realm: Some(realm.clone()),
            }),
            _ => None,
        }
    }

    fn for_trunk(trunk: &CarrierTrunk) -> Option<Self> {
        if !trunk.registered {
            return None;
        }
        match (&trunk.auth_username, &trunk.auth_password) {
            (Some(username), Some(password)) => Some(Self {
                username: username.clone(),
                password: password.clone(),
                realm: trunk.realm.clone(),
            }),
            _ => None,
        }
    }
}

/// Calling and called parties of a leg, in E.164
struct Parties<'a> {
    request: &'a RoutingRequest,
    from: SipAddress,
    to: SipAddress,
    from_e164: String,
    to_e164: String,
}

/// Computes rtjson route sets from tenant configuration
#[derive(Clone)]
pub struct RoutingEngine {
    store: Arc<dyn ConfigAccessor>,
    normalizer: Normalizer,
    auth: AuthResolver,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn ConfigAccessor>) -> Self {
        Self {
            normalizer: Normalizer::new(store.clone()),
            auth: AuthResolver::new(store.clone()),
            store,
        }
    }

    /// Resolve the caller when asked to, then route the leg
    #[instrument(skip(self, request), fields(to_uri = %request.to_uri, source_ip = ?request.source_ip))]
    pub async fn decide(&self, request: &RoutingRequest) -> Result<RoutingResponse> {
        let auth = if request.auth {
            Some(self.auth.resolve(&request.auth_request()).await?)
        } else {
            None
        };
        let rtjson = self.route(request, auth.as_ref()).await?;
        Ok(RoutingResponse { auth, rtjson })
    }

    pub async fn route(&self, request: &RoutingRequest, auth: Option<&AuthResult>) -> Result<RtJson> {
        let tenant_uuid = auth
            .filter(|auth| auth.is_authenticated())
            .and_then(|auth| auth.tenant_uuid.as_deref());

        let caller_profile = self.caller_profile(auth).await?;
        let from = SipAddress::parse(&request.from_uri);
        let to = SipAddress::parse(&request.to_uri);
        let parties = Parties {
            from_e164: self.normalizer.to_e164(&from.local_part, caller_profile.as_ref()).await?,
            to_e164: self.normalizer.to_e164(&to.local_part, caller_profile.as_ref()).await?,
            request,
            from,
            to,
        };

        let mut routes = Vec::new();
        let mut outbound = None;

        if let Some(ipbx) = self.ipbx_candidate(&parties, tenant_uuid).await? {
            let profile = self.normalizer.profile(ipbx.normalization_profile_id).await?;
            let dst_uri = format!("sip:{}:{}", ipbx.ip_fqdn, ipbx.port);
            routes.push(self.build_route(&parties, dst_uri, profile.as_ref()).await?);
            outbound = OutboundAuth::for_ipbx(&ipbx);
        }

        let trunk = self
            .store
            .fallback_carrier_trunk(request.source_ip.as_deref(), tenant_uuid)
            .await?;
        if let Some(trunk) = trunk {
            debug!(carrier_trunk_id = trunk.id, "Adding carrier trunk route");
            let profile = self.normalizer.profile(trunk.normalization_profile_id).await?;
            let dst_uri = format!("sip:{}:{}", trunk.sip_proxy, trunk.sip_proxy_port);
            routes.push(self.build_route(&parties, dst_uri, profile.as_ref()).await?);
            if let Some(trunk_auth) = OutboundAuth::for_trunk(&trunk) {
                outbound = Some(trunk_auth);
            }
        }

        if routes.is_empty() {
            debug!("No route found");
            return Ok(RtJson::failure());
        }

        let (auth_username, auth_password, realm) = match outbound {
            Some(auth) => (Some(auth.username), Some(auth.password), auth.realm),
            None => (None, None, None),
        };
        Ok(RtJson {
            success: true,
            version: Some(RTJSON_VERSION.to_string()),
            routing: Some(ROUTING_SERIAL.to_string()),
            routes: Some(routes),
            auth_username,
            auth_password,
            realm,
        })
    }

    async fn caller_profile(&self, auth: Option<&AuthResult>) -> Result<Option<NormalizationProfile>> {
        let Some(auth) = auth.filter(|auth| auth.success) else {
            return Ok(None);
        };

        let profile_id = if let Some(ipbx_id) = auth.ipbx_id {
            self.store.ipbx(ipbx_id).await?.and_then(|ipbx| ipbx.normalization_profile_id)
        } else if let Some(trunk_id) = auth.carrier_trunk_id {
            self.store
                .carrier_trunk(trunk_id)
                .await?
                .and_then(|trunk| trunk.normalization_profile_id)
        } else {
            None
        };
        self.normalizer.profile(profile_id).await
    }

    /// Domain match first, DID match otherwise
    async fn ipbx_candidate(&self, parties: &Parties<'_>, tenant_uuid: Option<&str>) -> Result<Option<Ipbx>> {
        if !parties.to.domain.is_empty() {
            if let Some(ipbx) = self.store.newest_ipbx_by_domain(&parties.to.domain, tenant_uuid).await? {
                debug!(ipbx_id = ipbx.id, domain = %parties.to.domain, "Matched IPBX by domain");
                return Ok(Some(ipbx));
            }
        }

        let number = &parties.to_e164;
        let dids = self.store.dids_by_prefixes(&lookup_prefixes(number)).await?;
        for did in dids {
            let regex = match Regex::new(&format!("^(?:{})$", did.did_regex)) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(did_id = did.id, regex = %did.did_regex, error = %e, "Skipping invalid DID regex");
                    continue;
                }
            };
            if regex.is_match(number) {
                debug!(did_id = did.id, ipbx_id = did.ipbx_id, "Matched IPBX by DID");
                return self.store.ipbx(did.ipbx_id).await;
            }
        }

        Ok(None)
    }

    async fn build_route(
        &self,
        parties: &Parties<'_>,
        dst_uri: String,
        profile: Option<&NormalizationProfile>,
    ) -> Result<Route> {
        let from_local = self.normalizer.to_local(&parties.from_e164, profile).await?;
        let to_local = self.normalizer.to_local(&parties.to_e164, profile).await?;

        Ok(Route {
            dst_uri,
            path: String::new(),
            socket: String::new(),
            headers: RouteHeaders {
                from: HeaderValue {
                    display: parties.request.from_name.clone(),
                    uri: header_uri(&parties.from, &from_local, &parties.request.from_uri),
                },
                to: HeaderValue {
                    display: parties.request.to_name.clone(),
                    uri: header_uri(&parties.to, &to_local, &parties.request.to_uri),
                },
                extra: String::new(),
            },
            branch_flags: BRANCH_FLAGS,
            fr_timer: FR_TIMER,
            fr_inv_timer: FR_INV_TIMER,
        })
    }
}

/// Rewritten header URI, or the original one when there is nothing to rewrite
fn header_uri(address: &SipAddress, local_part: &str, original: &str) -> String {
    if address.is_empty() || local_part.is_empty() {
        original.to_string()
    } else {
        address.with_local_part(local_part)
    }
}
