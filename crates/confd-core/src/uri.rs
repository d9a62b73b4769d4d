//! Lenient SIP address parsing
//!
//! Unparseable input degrades to empty fields instead of failing the request.

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<protocol>[A-Za-z][A-Za-z0-9+.\-]*):)?(?P<local>[^@:;<>\s]+)@(?P<domain>[^:;<>\s]+)(?::(?P<port>[0-9]+))?",
    )
    .expect("address regex is valid")
});

/// `protocol:local_part@domain:port`, every part possibly empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SipAddress {
    pub protocol: String,
    pub local_part: String,
    pub domain: String,
    pub port: String,
}

impl SipAddress {
    /// Parse a URI or a `"Display" <uri>` name-addr.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let addr = match (input.find('<'), input.rfind('>')) {
            (Some(start), Some(end)) if start < end => &input[start + 1..end],
            _ => input,
        };

        let Some(caps) = ADDRESS_REGEX.captures(addr.trim()) else {
            return Self::default();
        };
        let part = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Self {
            protocol: part("protocol"),
            local_part: part("local"),
            domain: part("domain"),
            port: part("port"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local_part.is_empty() && self.domain.is_empty()
    }

    /// Rebuild the address with a different user part
    pub fn with_local_part(&self, local_part: &str) -> String {
        let mut uri = String::new();
        if !self.protocol.is_empty() {
            uri.push_str(&self.protocol);
            uri.push(':');
        }
        uri.push_str(local_part);
        uri.push('@');
        uri.push_str(&self.domain);
        if !self.port.is_empty() {
            uri.push(':');
            uri.push_str(&self.port);
        }
        uri
    }
}
