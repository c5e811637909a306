// ── Router-reported records ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// A router service that contributes subscribers.
///
/// Variant order is the collision precedence: when two services report the
/// same identity in one cycle, the earlier variant wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Service {
    Pppoe,
    Hotspot,
    Dhcp,
}

/// One subscriber/session/lease as reported by a source adapter.
///
/// Carries identity hints and raw rate fields only; the resolver decides
/// the circuit id, bandwidth and parent node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub service: Service,
    /// Name of the reporting router.
    pub router: String,
    /// PPP account name or hotspot login.
    pub username: Option<String>,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub ipv4: Option<String>,
    /// PPP profile (service plan) name.
    pub profile: Option<String>,
    /// The profile's router-enforced `rate-limit`, e.g. `"25M/25M"`.
    pub rate_limit: Option<String>,
    /// The profile's comment, possibly holding a `"20m/20m"` plan token.
    pub profile_comment: Option<String>,
    pub comment: Option<String>,
}

impl RawRecord {
    pub fn new(service: Service, router: impl Into<String>) -> Self {
        Self {
            service,
            router: router.into(),
            username: None,
            mac: None,
            hostname: None,
            ipv4: None,
            profile: None,
            rate_limit: None,
            profile_comment: None,
            comment: None,
        }
    }
}
