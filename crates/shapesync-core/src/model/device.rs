// ── Canonical device record ──

use serde::{Deserialize, Serialize};
use strum::Display;

use super::raw::Service;

/// Where a merged record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
    Pppoe,
    Hotspot,
    Dhcp,
    Static,
}

impl From<Service> for Origin {
    fn from(service: Service) -> Self {
        match service {
            Service::Pppoe => Self::Pppoe,
            Service::Hotspot => Self::Hotspot,
            Service::Dhcp => Self::Dhcp,
        }
    }
}

/// A download/upload pair in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

impl Bandwidth {
    pub const fn new(download_mbps: f64, upload_mbps: f64) -> Self {
        Self {
            download_mbps,
            upload_mbps,
        }
    }
}

/// The canonical unit of output: one shaped circuit.
///
/// Exactly one record exists per `circuit_id` after a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub circuit_id: String,
    pub display_name: String,
    pub parent_node: String,
    pub mac: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub download_limit_mbps: f64,
    pub upload_limit_mbps: f64,
    /// Explicit guaranteed rate. Only static entries carry one; the shaping
    /// table derives it from the limit otherwise.
    pub download_min_mbps: Option<f64>,
    pub upload_min_mbps: Option<f64>,
    pub comment: String,
    pub origin: Origin,
    /// Reporting router, `None` for static entries.
    pub router: Option<String>,
}

impl DeviceRecord {
    pub fn limits(&self) -> Bandwidth {
        Bandwidth::new(self.download_limit_mbps, self.upload_limit_mbps)
    }

    pub fn is_static(&self) -> bool {
        self.origin == Origin::Static
    }
}
