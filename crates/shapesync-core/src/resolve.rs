// ── Identity & merge resolver ──
//
// Folds every adapter batch plus the static registry into one record per
// circuit id. The output is rebuilt from scratch each cycle; nothing from
// a previous cycle survives except through the static registry.
//
// Precedence:
//   1. static entry (replaces any router candidate outright)
//   2. first router candidate in (service, router config) order

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::bandwidth::{parse_plan_token, parse_rate_limit};
use crate::config::RouterDescriptor;
use crate::model::{Bandwidth, DeviceRecord, Origin, RawRecord, Service};
use crate::registry::StaticRegistry;

/// All records one router reported for one service.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub service: Service,
    /// Position of the router in the configuration.
    pub router_index: usize,
    pub records: Vec<RawRecord>,
}

/// Two router candidates claimed the same circuit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub circuit_id: String,
    pub kept: (Service, String),
    pub dropped: (Service, String),
}

/// Result of one merge.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Final records, ordered by circuit id.
    pub records: Vec<DeviceRecord>,
    pub collisions: Vec<Collision>,
    /// Circuit ids where a static entry replaced a router candidate.
    pub overridden: Vec<String>,
    /// Raw records that yielded no identity.
    pub skipped: usize,
}

/// Derive the circuit id for a raw record. `None` when the record carries
/// nothing to key on.
pub fn identity_key(raw: &RawRecord, include_mac: bool) -> Option<String> {
    match raw.service {
        Service::Pppoe => raw.username.clone(),
        Service::Hotspot => match (&raw.mac, &raw.username) {
            (Some(mac), _) if include_mac => Some(format!("HS-{}", strip_mac(mac))),
            (_, Some(user)) => Some(format!("HS-{user}")),
            _ => None,
        },
        Service::Dhcp => match (&raw.hostname, &raw.mac) {
            (Some(host), _) => Some(format!("DHCP-{host}")),
            (None, Some(mac)) => Some(format!("DHCP-{}", strip_mac(mac))),
            (None, None) => None,
        },
    }
}

fn strip_mac(mac: &str) -> String {
    mac.chars().filter(|c| *c != ':' && *c != '-').collect()
}

/// Limits for a router candidate: service default, then the profile
/// `rate-limit`, then the plan token when the override flag is set.
pub fn candidate_bandwidth(
    raw: &RawRecord,
    router: &RouterDescriptor,
    use_profile_bandwidth: bool,
) -> Bandwidth {
    let mut limits = router.default_limits(raw.service);

    if let Some(rate) = raw.rate_limit.as_deref() {
        match parse_rate_limit(rate) {
            Some(parsed) => limits = parsed,
            None => debug!(router = %router.name, rate, "unusable rate-limit, keeping default"),
        }
    }

    if use_profile_bandwidth {
        if let Some(comment) = raw.profile_comment.as_deref() {
            match parse_plan_token(comment) {
                Ok(parsed) => limits = parsed,
                Err(e) => debug!(router = %router.name, error = %e, "profile comment is not a plan rate"),
            }
        }
    }

    limits
}

/// Parent node for a router candidate.
pub fn parent_node(raw: &RawRecord, router: &RouterDescriptor) -> String {
    match (&raw.service, &raw.profile) {
        (Service::Pppoe, Some(profile)) if router.pppoe.per_plan_node => {
            plan_node_name(profile, &router.name)
        }
        _ => router.name.clone(),
    }
}

pub fn plan_node_name(profile: &str, router: &str) -> String {
    format!("PLAN-{profile}-{router}")
}

fn display_name(raw: &RawRecord, circuit_id: &str) -> String {
    let hint = match raw.service {
        Service::Pppoe => raw.username.as_ref(),
        Service::Hotspot => raw.username.as_ref().or(raw.mac.as_ref()),
        Service::Dhcp => raw.hostname.as_ref().or(raw.mac.as_ref()),
    };
    hint.cloned().unwrap_or_else(|| circuit_id.to_owned())
}

fn to_device(
    raw: RawRecord,
    circuit_id: String,
    router: &RouterDescriptor,
    use_profile_bandwidth: bool,
) -> DeviceRecord {
    let limits = candidate_bandwidth(&raw, router, use_profile_bandwidth);
    DeviceRecord {
        display_name: display_name(&raw, &circuit_id),
        parent_node: parent_node(&raw, router),
        mac: raw.mac,
        ipv4: raw.ipv4,
        ipv6: None,
        download_limit_mbps: limits.download_mbps,
        upload_limit_mbps: limits.upload_mbps,
        download_min_mbps: None,
        upload_min_mbps: None,
        comment: raw.comment.unwrap_or_default(),
        origin: Origin::from(raw.service),
        router: Some(router.name.clone()),
        circuit_id,
    }
}

/// Merge adapter batches and static entries into the final record set.
///
/// Batches may arrive in any order; they are sorted by
/// `(service, router_index)` first so precedence never depends on fetch
/// completion order.
pub fn merge(
    routers: &[RouterDescriptor],
    mut batches: Vec<SourceBatch>,
    registry: &StaticRegistry,
) -> MergeOutcome {
    batches.sort_by_key(|b| (b.service, b.router_index));

    let mut outcome = MergeOutcome::default();
    let mut merged: BTreeMap<String, DeviceRecord> = BTreeMap::new();

    for batch in batches {
        let Some(router) = routers.get(batch.router_index) else {
            warn!(index = batch.router_index, "batch for unknown router dropped");
            continue;
        };
        for raw in batch.records {
            let Some(circuit_id) = identity_key(&raw, router.hotspot.include_mac) else {
                debug!(router = %router.name, service = %raw.service, "record without identity skipped");
                outcome.skipped += 1;
                continue;
            };

            if let Some(existing) = merged.get(&circuit_id) {
                let kept = (
                    service_of(existing.origin).unwrap_or(batch.service),
                    existing.router.clone().unwrap_or_default(),
                );
                warn!(
                    circuit = %circuit_id,
                    kept_service = %kept.0,
                    kept_router = %kept.1,
                    dropped_service = %batch.service,
                    dropped_router = %router.name,
                    "identity collision, keeping first"
                );
                outcome.collisions.push(Collision {
                    circuit_id,
                    kept,
                    dropped: (batch.service, router.name.clone()),
                });
                continue;
            }

            let record = to_device(raw, circuit_id.clone(), router, registry.use_profile_bandwidth);
            merged.insert(circuit_id, record);
        }
    }

    for entry in registry.entries() {
        let record = entry.record.clone();
        if merged.insert(record.circuit_id.clone(), record).is_some() {
            debug!(circuit = %entry.record.circuit_id, "static entry overrides router record");
            outcome.overridden.push(entry.record.circuit_id.clone());
        }
    }

    outcome.records = merged.into_values().collect();
    outcome
}

fn service_of(origin: Origin) -> Option<Service> {
    match origin {
        Origin::Pppoe => Some(Service::Pppoe),
        Origin::Hotspot => Some(Service::Hotspot),
        Origin::Dhcp => Some(Service::Dhcp),
        Origin::Static => None,
    }
}
