// ── Runtime sync configuration ──
//
// These types describe *what* to poll and *where* to write. They carry
// credentials and tuning but never touch disk; `shapesync-config` builds
// them from the config file and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::model::{Bandwidth, Service};

/// TLS verification strategy for `https` routers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. RouterOS ships a self-signed certificate.
    #[default]
    DangerAcceptInvalid,
}

/// PPPoE subscriber settings for one router.
#[derive(Debug, Clone, PartialEq)]
pub struct PppoeSettings {
    pub enabled: bool,
    pub default_limits: Bandwidth,
    /// Group subscribers under one node per service plan.
    pub per_plan_node: bool,
}

impl Default for PppoeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            default_limits: Bandwidth::new(50.0, 50.0),
            per_plan_node: false,
        }
    }
}

/// Hotspot session settings for one router.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotSettings {
    pub enabled: bool,
    pub default_limits: Bandwidth,
    /// Key sessions by MAC address instead of login name.
    pub include_mac: bool,
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            default_limits: Bandwidth::new(10.0, 10.0),
            include_mac: true,
        }
    }
}

/// DHCP lease settings for one router.
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpSettings {
    pub enabled: bool,
    pub default_limits: Bandwidth,
    /// DHCP server names whose leases are included. `"*"` matches all.
    pub servers: Vec<String>,
}

impl Default for DhcpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            default_limits: Bandwidth::new(1000.0, 1000.0),
            servers: vec!["dhcp1".into()],
        }
    }
}

impl DhcpSettings {
    pub fn includes_server(&self, server: Option<&str>) -> bool {
        self.servers
            .iter()
            .any(|s| s == "*" || Some(s.as_str()) == server)
    }
}

/// Connection parameters and per-service settings for one router.
#[derive(Debug, Clone)]
pub struct RouterDescriptor {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    pub password: SecretString,
    /// Bandwidth ceiling for the router's own node in the topology.
    pub download_ceiling_mbps: Option<u64>,
    pub upload_ceiling_mbps: Option<u64>,
    pub pppoe: PppoeSettings,
    pub hotspot: HotspotSettings,
    pub dhcp: DhcpSettings,
}

impl RouterDescriptor {
    /// A descriptor with every service disabled. Mostly useful in tests.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: 443,
            tls: true,
            username: "admin".into(),
            password: SecretString::from(String::new()),
            download_ceiling_mbps: None,
            upload_ceiling_mbps: None,
            pppoe: PppoeSettings::default(),
            hotspot: HotspotSettings::default(),
            dhcp: DhcpSettings::default(),
        }
    }

    pub fn is_enabled(&self, service: Service) -> bool {
        match service {
            Service::Pppoe => self.pppoe.enabled,
            Service::Hotspot => self.hotspot.enabled,
            Service::Dhcp => self.dhcp.enabled,
        }
    }

    pub fn default_limits(&self, service: Service) -> Bandwidth {
        match service {
            Service::Pppoe => self.pppoe.default_limits,
            Service::Hotspot => self.hotspot.default_limits,
            Service::Dhcp => self.dhcp.default_limits,
        }
    }

    pub fn has_enabled_service(&self) -> bool {
        self.pppoe.enabled || self.hotspot.enabled || self.dhcp.enabled
    }
}

/// Output artifact locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub shaped_devices: PathBuf,
    pub network: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            shaped_devices: PathBuf::from("ShapedDevices.csv"),
            network: PathBuf::from("network.json"),
        }
    }
}

/// Everything the scheduler needs to run.
///
/// Built by the config crate; core never reads the router config file.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub routers: Vec<RouterDescriptor>,
    pub static_devices: PathBuf,
    /// Circuit-name prefix expected on every static entry.
    pub static_prefix: String,
    pub artifacts: ArtifactPaths,
    /// Multiplier applied to router-derived limits for the Max columns.
    pub rate_overhead: f64,
    /// Min columns as a share of Max when no explicit minimum exists.
    pub min_rate_ratio: f64,
    pub tls: TlsVerification,
    pub scan_interval: Duration,
    pub error_retry_interval: Duration,
    pub max_backoff: Duration,
    pub fetch_timeout: Duration,
    pub connect_retries: u32,
    pub connect_retry_delay: Duration,
    /// Command run after artifacts change, e.g. the shaper's update-only mode.
    pub reload_command: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            routers: Vec::new(),
            static_devices: PathBuf::from("jesync_static_device.json"),
            static_prefix: "Mikrotik-Static-".into(),
            artifacts: ArtifactPaths::default(),
            rate_overhead: 1.0,
            min_rate_ratio: 0.5,
            tls: TlsVerification::default(),
            scan_interval: Duration::from_secs(120),
            error_retry_interval: Duration::from_secs(30),
            max_backoff: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(30),
            connect_retries: 3,
            connect_retry_delay: Duration::from_secs(5),
            reload_command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dhcp_wildcard_matches_any_server() {
        let dhcp = DhcpSettings {
            servers: vec!["*".into()],
            ..DhcpSettings::default()
        };
        assert!(dhcp.includes_server(Some("lan-pool")));
        assert!(dhcp.includes_server(None));
    }

    #[test]
    fn dhcp_named_pools_filter_leases() {
        let dhcp = DhcpSettings::default();
        assert!(dhcp.includes_server(Some("dhcp1")));
        assert!(!dhcp.includes_server(Some("guest")));
        assert!(!dhcp.includes_server(None));
    }

    #[test]
    fn new_descriptor_has_no_enabled_services() {
        let router = RouterDescriptor::new("A", "10.0.0.1");
        assert!(!router.has_enabled_service());
        assert_eq!(router.default_limits(Service::Hotspot), Bandwidth::new(10.0, 10.0));
    }
}
