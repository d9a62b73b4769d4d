//! dbtext `uacreg` table for the proxy's outbound registration module
//!
//! One row per registered carrier trunk. Values have `:` and `\` escaped
//! with a backslash, missing values are empty.

use crate::store::ConfigAccessor;
use crate::types::CarrierTrunk;
use crate::Result;

pub const UACREG_HEADER: &str = "id(init) l_uuid(string) l_username(string) l_domain(string) \
r_username(string) r_domain(string) realm(string) auth_username(string) auth_password(string) \
auth_proxy(string) expires(int) flags(int) reg_delay(int)\n";

/// Registration flag set on every row
const UACREG_FLAGS: i64 = 16;
const UACREG_REG_DELAY: i64 = 0;

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ':' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row(trunk: &CarrierTrunk) -> String {
    let username = escape(trunk.auth_username.as_deref().unwrap_or_default());
    let domain = escape(trunk.from_domain.as_deref().unwrap_or_default());
    let realm = escape(trunk.realm.as_deref().unwrap_or_default());
    let password = escape(trunk.auth_password.as_deref().unwrap_or_default());
    let proxy = trunk
        .registrar_proxy
        .as_deref()
        .map(|proxy| escape(&format!("sip:{}", proxy)))
        .unwrap_or_default();

    format!(
        "{id}:{user}:{domain}:{user}:{domain}:{realm}:{user}:{password}:{proxy}:{expires}:{flags}:{delay}:\n",
        id = trunk.id,
        user = username,
        domain = domain,
        realm = realm,
        password = password,
        proxy = proxy,
        expires = trunk.expire_seconds,
        flags = UACREG_FLAGS,
        delay = UACREG_REG_DELAY,
    )
}

/// Render the table for `trunks`, header included
pub fn render(trunks: &[CarrierTrunk]) -> String {
    let mut content = String::from(UACREG_HEADER);
    for trunk in trunks.iter().filter(|trunk| trunk.registered) {
        content.push_str(&row(trunk));
    }
    content
}

/// Current table built from every registered trunk
pub async fn uacreg_content(store: &dyn ConfigAccessor) -> Result<String> {
    let trunks = store.registered_carrier_trunks().await?;
    Ok(render(&trunks))
}
