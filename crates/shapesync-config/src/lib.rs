//! Configuration for the shapesync daemon.
//!
//! JSON router file + `SHAPESYNC_` environment overrides, password
//! resolution (env var, then plaintext), validation, and translation to
//! `shapesync_core::SyncConfig`. Core never reads the config file itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use shapesync_core::{
    ArtifactPaths, Bandwidth, DhcpSettings, HotspotSettings, PppoeSettings, RouterDescriptor,
    SyncConfig, TlsVerification,
};

/// Default router configuration file name.
pub const CONFIG_FILE: &str = "config.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── File structs ────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub routers: Vec<RouterEntry>,

    /// Static device file. Relative paths resolve against the config file.
    #[serde(default = "default_static_devices")]
    pub static_devices: PathBuf,

    /// Circuit-name prefix reserved for static devices.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    #[serde(default)]
    pub output: OutputPaths,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    #[serde(default = "default_error_retry")]
    pub error_retry_secs: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    #[serde(default = "default_connect_retry_delay")]
    pub connect_retry_delay_secs: u64,

    /// Multiplier applied to router-derived limits.
    #[serde(default = "default_rate_overhead")]
    pub rate_overhead: f64,

    /// Guaranteed rate as a share of the maximum.
    #[serde(default = "default_min_rate_ratio")]
    pub min_rate_ratio: f64,

    /// Verify router certificates against the system store.
    #[serde(default)]
    pub verify_tls: bool,

    /// Custom CA certificate; implies verification.
    pub ca_cert: Option<PathBuf>,

    /// Command run after artifacts change, e.g.
    /// `["python3", "/opt/libreqos/src/LibreQoS.py", "--updateonly"]`.
    pub reload_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routers: Vec::new(),
            static_devices: default_static_devices(),
            static_prefix: default_static_prefix(),
            output: OutputPaths::default(),
            scan_interval_secs: default_scan_interval(),
            error_retry_secs: default_error_retry(),
            max_backoff_secs: default_max_backoff(),
            fetch_timeout_secs: default_fetch_timeout(),
            connect_retries: default_connect_retries(),
            connect_retry_delay_secs: default_connect_retry_delay(),
            rate_overhead: default_rate_overhead(),
            min_rate_ratio: default_min_rate_ratio(),
            verify_tls: false,
            ca_cert: None,
            reload_command: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputPaths {
    #[serde(default = "default_shaped_devices")]
    pub shaped_devices: PathBuf,
    #[serde(default = "default_network")]
    pub network: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            shaped_devices: default_shaped_devices(),
            network: default_network(),
        }
    }
}

/// One router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterEntry {
    pub name: String,
    pub address: String,

    /// REST port. Defaults to 443 with TLS, 80 without.
    pub port: Option<u16>,

    #[serde(default = "default_true")]
    pub tls: bool,

    #[serde(default = "default_username")]
    pub username: String,

    /// Plaintext password (prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Ceiling for the router's node in `network.json`.
    pub download_bandwidth_mbps: Option<u64>,
    pub upload_bandwidth_mbps: Option<u64>,

    #[serde(default)]
    pub pppoe: PppoeEntry,

    #[serde(default)]
    pub hotspot: HotspotEntry,

    #[serde(default)]
    pub dhcp: DhcpEntry,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PppoeEntry {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pppoe_rate")]
    pub download_limit_mbps: f64,
    #[serde(default = "default_pppoe_rate")]
    pub upload_limit_mbps: f64,
    #[serde(default)]
    pub per_plan_node: bool,
}

impl Default for PppoeEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            download_limit_mbps: default_pppoe_rate(),
            upload_limit_mbps: default_pppoe_rate(),
            per_plan_node: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotspotEntry {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_hotspot_rate")]
    pub download_limit_mbps: f64,
    #[serde(default = "default_hotspot_rate")]
    pub upload_limit_mbps: f64,
    #[serde(default = "default_true")]
    pub include_mac: bool,
}

impl Default for HotspotEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            download_limit_mbps: default_hotspot_rate(),
            upload_limit_mbps: default_hotspot_rate(),
            include_mac: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DhcpEntry {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dhcp_rate")]
    pub download_limit_mbps: f64,
    #[serde(default = "default_dhcp_rate")]
    pub upload_limit_mbps: f64,
    /// Server pools to include; `"*"` for all.
    #[serde(default = "default_dhcp_servers")]
    pub dhcp_server: Vec<String>,
}

impl Default for DhcpEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            download_limit_mbps: default_dhcp_rate(),
            upload_limit_mbps: default_dhcp_rate(),
            dhcp_server: default_dhcp_servers(),
        }
    }
}

fn default_static_devices() -> PathBuf {
    "jesync_static_device.json".into()
}
fn default_static_prefix() -> String {
    "Mikrotik-Static-".into()
}
fn default_shaped_devices() -> PathBuf {
    "ShapedDevices.csv".into()
}
fn default_network() -> PathBuf {
    "network.json".into()
}
fn default_scan_interval() -> u64 {
    120
}
fn default_error_retry() -> u64 {
    30
}
fn default_max_backoff() -> u64 {
    600
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_connect_retries() -> u32 {
    3
}
fn default_connect_retry_delay() -> u64 {
    5
}
fn default_rate_overhead() -> f64 {
    1.0
}
fn default_min_rate_ratio() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_username() -> String {
    "admin".into()
}
fn default_pppoe_rate() -> f64 {
    50.0
}
fn default_hotspot_rate() -> f64 {
    10.0
}
fn default_dhcp_rate() -> f64 {
    1000.0
}
fn default_dhcp_servers() -> Vec<String> {
    vec!["dhcp1".into()]
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config location, e.g. `~/.config/shapesync/config.json`.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "shapesync", "shapesync").map_or_else(
        || PathBuf::from(CONFIG_FILE),
        |dirs| dirs.config_dir().join(CONFIG_FILE),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load defaults, then the JSON file, then `SHAPESYNC_*` overrides.
///
/// Nested keys use a double underscore: `SHAPESYNC_OUTPUT__NETWORK`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed("SHAPESYNC_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), routers = config.routers.len(), "config loaded");
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and build the core configuration.
    ///
    /// `base_dir` anchors relative file paths, normally the directory the
    /// config file lives in.
    pub fn to_sync_config(&self, base_dir: &Path) -> Result<SyncConfig, ConfigError> {
        if self.scan_interval_secs == 0 {
            return Err(invalid("scan_interval_secs", "must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs", "must be at least 1"));
        }
        if self.error_retry_secs == 0 {
            return Err(invalid("error_retry_secs", "must be at least 1"));
        }
        if self.max_backoff_secs < self.error_retry_secs {
            return Err(invalid(
                "max_backoff_secs",
                "must not be shorter than error_retry_secs",
            ));
        }
        if !(self.rate_overhead.is_finite() && self.rate_overhead > 0.0) {
            return Err(invalid("rate_overhead", "must be a positive number"));
        }
        if !(self.min_rate_ratio > 0.0 && self.min_rate_ratio <= 1.0) {
            return Err(invalid("min_rate_ratio", "must be in (0, 1]"));
        }
        if self.static_prefix.trim().is_empty() {
            return Err(invalid("static_prefix", "must not be empty"));
        }
        if let Some(argv) = &self.reload_command {
            if argv.first().is_none_or(|p| p.trim().is_empty()) {
                return Err(invalid("reload_command", "must name a program"));
            }
        }

        let mut seen = HashSet::new();
        let mut routers = Vec::with_capacity(self.routers.len());
        for entry in &self.routers {
            if !seen.insert(entry.name.as_str()) {
                return Err(invalid(
                    format!("routers.{}", entry.name),
                    "duplicate router name",
                ));
            }
            routers.push(entry.to_descriptor()?);
        }

        let tls = match &self.ca_cert {
            Some(path) => TlsVerification::CustomCa(resolve(base_dir, path)),
            None if self.verify_tls => TlsVerification::SystemDefaults,
            None => TlsVerification::DangerAcceptInvalid,
        };

        Ok(SyncConfig {
            routers,
            static_devices: resolve(base_dir, &self.static_devices),
            static_prefix: self.static_prefix.clone(),
            artifacts: ArtifactPaths {
                shaped_devices: resolve(base_dir, &self.output.shaped_devices),
                network: resolve(base_dir, &self.output.network),
            },
            rate_overhead: self.rate_overhead,
            min_rate_ratio: self.min_rate_ratio,
            tls,
            scan_interval: Duration::from_secs(self.scan_interval_secs),
            error_retry_interval: Duration::from_secs(self.error_retry_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            connect_retries: self.connect_retries,
            connect_retry_delay: Duration::from_secs(self.connect_retry_delay_secs),
            reload_command: self.reload_command.clone(),
        })
    }
}

impl RouterEntry {
    fn field(&self, name: &str) -> String {
        format!("routers.{}.{name}", self.name)
    }

    /// Validate one router and resolve its password.
    pub fn to_descriptor(&self) -> Result<RouterDescriptor, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("routers.name", "must not be empty"));
        }
        if self.address.trim().is_empty() {
            return Err(invalid(self.field("address"), "must not be empty"));
        }

        let limits = [
            ("pppoe", self.pppoe.download_limit_mbps, self.pppoe.upload_limit_mbps),
            ("hotspot", self.hotspot.download_limit_mbps, self.hotspot.upload_limit_mbps),
            ("dhcp", self.dhcp.download_limit_mbps, self.dhcp.upload_limit_mbps),
        ];
        for (service, down, up) in limits {
            if !(down.is_finite() && down > 0.0 && up.is_finite() && up > 0.0) {
                return Err(invalid(
                    self.field(service),
                    "download/upload limits must be positive",
                ));
            }
        }
        if self.dhcp.enabled && self.dhcp.dhcp_server.is_empty() {
            return Err(invalid(self.field("dhcp.dhcp_server"), "list at least one server or \"*\""));
        }

        Ok(RouterDescriptor {
            name: self.name.clone(),
            address: self.address.trim().to_owned(),
            port: self.port.unwrap_or(if self.tls { 443 } else { 80 }),
            tls: self.tls,
            username: self.username.clone(),
            password: self.resolve_password()?,
            download_ceiling_mbps: self.download_bandwidth_mbps,
            upload_ceiling_mbps: self.upload_bandwidth_mbps,
            pppoe: PppoeSettings {
                enabled: self.pppoe.enabled,
                default_limits: Bandwidth::new(
                    self.pppoe.download_limit_mbps,
                    self.pppoe.upload_limit_mbps,
                ),
                per_plan_node: self.pppoe.per_plan_node,
            },
            hotspot: HotspotSettings {
                enabled: self.hotspot.enabled,
                default_limits: Bandwidth::new(
                    self.hotspot.download_limit_mbps,
                    self.hotspot.upload_limit_mbps,
                ),
                include_mac: self.hotspot.include_mac,
            },
            dhcp: DhcpSettings {
                enabled: self.dhcp.enabled,
                default_limits: Bandwidth::new(
                    self.dhcp.download_limit_mbps,
                    self.dhcp.upload_limit_mbps,
                ),
                servers: self.dhcp.dhcp_server.clone(),
            },
        })
    }

    /// `password_env` first, then the plaintext `password`.
    fn resolve_password(&self) -> Result<SecretString, ConfigError> {
        if let Some(env_name) = &self.password_env {
            if let Ok(value) = std::env::var(env_name) {
                return Ok(SecretString::from(value));
            }
            debug!(router = %self.name, var = %env_name, "password variable unset");
        }
        if let Some(password) = &self.password {
            return Ok(SecretString::from(password.clone()));
        }
        Err(invalid(
            self.field("password"),
            "no password (set password_env or password)",
        ))
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Directory relative paths in `config_file` are resolved against.
pub fn base_dir(config_file: &Path) -> PathBuf {
    match config_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
