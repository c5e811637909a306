// ── Static device registry ──
//
// Loads the hand-maintained device list. Two file shapes are accepted:
//
//   { "UseProfileBandwidth": true, "StaticDevices": [ {...}, ... ] }
//   [ {...}, ... ]                       (flag defaults to false)
//
// Entries are validated one at a time so a single bad entry never takes
// the rest of the file down with it.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::bandwidth::round2;
use crate::error::CoreError;
use crate::model::{DeviceRecord, Origin};

/// Parent node assigned when an entry does not name one.
pub const DEFAULT_STATIC_PARENT: &str = "Static";

/// A validated static device.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDeviceEntry {
    pub record: DeviceRecord,
    /// The circuit name lacks the static namespace prefix and may collide
    /// with a router-derived identity.
    pub outside_namespace: bool,
}

/// The curated device list plus the global override flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticRegistry {
    pub use_profile_bandwidth: bool,
    entries: BTreeMap<String, StaticDeviceEntry>,
    /// Entries dropped for missing identity, with the reason.
    pub rejected: Vec<String>,
}

impl StaticRegistry {
    /// Load the registry from `path`.
    ///
    /// A missing file is an empty registry. A file that is not JSON, or whose
    /// top level is neither an object nor a list, is an error: the caller
    /// decides whether that is fatal.
    pub fn load(path: &Path, static_prefix: &str) -> Result<Self, CoreError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no static device file, continuing without static devices");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| CoreError::ConfigValidation {
                field: path.display().to_string(),
                reason: format!("not valid JSON: {e}"),
            })?;

        let registry = Self::from_value(value, static_prefix)?;
        info!(
            path = %path.display(),
            entries = registry.len(),
            use_profile_bandwidth = registry.use_profile_bandwidth,
            "loaded static devices"
        );
        Ok(registry)
    }

    /// Build a registry from an already-parsed JSON document.
    pub fn from_value(value: Value, static_prefix: &str) -> Result<Self, CoreError> {
        let (use_profile_bandwidth, devices) = match value {
            Value::Object(mut root) => {
                let flag = profile_flag(root.get("UseProfileBandwidth"));
                let devices = match root.remove("StaticDevices") {
                    Some(Value::Array(list)) => list,
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => {
                        return Err(CoreError::ConfigValidation {
                            field: "StaticDevices".into(),
                            reason: "expected a list of devices".into(),
                        });
                    }
                };
                (flag, devices)
            }
            Value::Array(list) => (false, list),
            _ => {
                return Err(CoreError::ConfigValidation {
                    field: "static devices".into(),
                    reason: "expected an object or a list".into(),
                });
            }
        };

        let mut registry = Self {
            use_profile_bandwidth,
            ..Self::default()
        };

        for (index, device) in devices.into_iter().enumerate() {
            match parse_entry(&device, static_prefix) {
                Ok(entry) => {
                    if entry.outside_namespace {
                        warn!(
                            circuit = %entry.record.circuit_id,
                            prefix = static_prefix,
                            "static device is outside the static namespace and may shadow a router subscriber"
                        );
                    }
                    let circuit = entry.record.circuit_id.clone();
                    if registry.entries.insert(circuit.clone(), entry).is_some() {
                        warn!(circuit = %circuit, "duplicate static device, later entry wins");
                    }
                }
                Err(e) => {
                    warn!(index, error = %e, "skipping static device entry");
                    registry.rejected.push(format!("entry {index}: {e}"));
                }
            }
        }

        Ok(registry)
    }

    pub fn get(&self, circuit_id: &str) -> Option<&StaticDeviceEntry> {
        self.entries.get(circuit_id)
    }

    /// Entries ordered by circuit id.
    pub fn entries(&self) -> impl Iterator<Item = &StaticDeviceEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Circuit ids flagged as outside the static namespace.
    pub fn flagged(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter(|e| e.outside_namespace)
            .map(|e| e.record.circuit_id.as_str())
            .collect()
    }
}

fn parse_entry(device: &Value, static_prefix: &str) -> Result<StaticDeviceEntry, CoreError> {
    let Value::Object(fields) = device else {
        return Err(CoreError::ConfigValidation {
            field: "static device".into(),
            reason: "expected an object".into(),
        });
    };

    let circuit_id =
        text_field(fields, "Circuit Name").ok_or_else(|| CoreError::ConfigValidation {
            field: "Circuit Name".into(),
            reason: "missing or empty".into(),
        })?;

    let parent_node =
        text_field(fields, "Parent Node").unwrap_or_else(|| DEFAULT_STATIC_PARENT.to_owned());
    let display_name = text_field(fields, "Device Name").unwrap_or_else(|| circuit_id.clone());

    let record = DeviceRecord {
        display_name,
        parent_node,
        mac: text_field(fields, "MAC"),
        ipv4: text_field(fields, "IPv4"),
        ipv6: text_field(fields, "IPv6"),
        download_limit_mbps: max_rate_field(fields, &circuit_id, "Download Max Mbps"),
        upload_limit_mbps: max_rate_field(fields, &circuit_id, "Upload Max Mbps"),
        download_min_mbps: rate_field(fields, &circuit_id, "Download Min Mbps"),
        upload_min_mbps: rate_field(fields, &circuit_id, "Upload Min Mbps"),
        comment: text_field(fields, "Comment").unwrap_or_default(),
        origin: Origin::Static,
        router: None,
        circuit_id,
    };

    Ok(StaticDeviceEntry {
        outside_namespace: !record.circuit_id.starts_with(static_prefix),
        record,
    })
}

/// `UseProfileBandwidth` as a JSON bool or a `"true"`/`"false"` string.
fn profile_flag(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => false,
        Some(other) => {
            warn!(value = %other, "UseProfileBandwidth is not a boolean, using false");
            false
        }
    }
}

/// A maximum rate; a device without one is written with `0`.
fn max_rate_field(fields: &Map<String, Value>, circuit: &str, key: &str) -> f64 {
    rate_field(fields, circuit, key).unwrap_or_else(|| {
        warn!(circuit, field = key, "static device has no maximum rate, using 0");
        0.0
    })
}

/// A trimmed, non-empty string field.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A rate given as a JSON number or a numeric string. Unparsable values
/// are logged and treated as absent.
fn rate_field(fields: &Map<String, Value>, circuit: &str, key: &str) -> Option<f64> {
    let parsed = match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => Some(round2(v)),
        _ => {
            warn!(circuit, field = key, "unparsable rate in static device, using 0");
            debug!(value = ?fields.get(key), "rejected static rate value");
            Some(0.0)
        }
    }
}
