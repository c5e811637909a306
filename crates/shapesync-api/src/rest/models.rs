// RouterOS REST response types
//
// RouterOS serializes every value as a string (including booleans and
// numbers) and uses hyphenated keys. Only the fields the sync consumes are
// modelled; everything else is ignored by serde.

use serde::{Deserialize, Serialize};

/// Deserialize RouterOS `"true"` / `"false"` strings.
fn routeros_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(matches!(raw.as_deref(), Some("true" | "yes")))
}

/// `/ppp/secret`: a configured PPP account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PppSecret {
    #[serde(rename = ".id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(rename = "caller-id", default)]
    pub caller_id: Option<String>,
    #[serde(rename = "remote-address", default)]
    pub remote_address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "routeros_bool")]
    pub disabled: bool,
}

/// `/ppp/active`: a live PPP session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PppActive {
    #[serde(rename = ".id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "caller-id", default)]
    pub caller_id: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
}

/// `/ppp/profile`: a service plan. The comment often carries a
/// human-maintained `"20M/20M"` plan rate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PppProfile {
    #[serde(rename = ".id", default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `/ip/hotspot/active`: an authenticated captive-portal session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HotspotActive {
    #[serde(rename = ".id", default)]
    pub id: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "mac-address", default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

/// `/ip/dhcp-server/lease`: an address lease.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DhcpLease {
    #[serde(rename = ".id", default)]
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "mac-address", default)]
    pub mac_address: Option<String>,
    #[serde(rename = "host-name", default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `/system/identity`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SystemIdentity {
    pub name: String,
}
