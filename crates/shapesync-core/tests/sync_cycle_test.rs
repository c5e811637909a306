#![allow(clippy::unwrap_used)]
// End-to-end sync cycles against in-memory routers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use shapesync_api::{DhcpLease, HotspotActive, PppActive, PppProfile, PppSecret};
use shapesync_core::{
    ArtifactPaths, Bandwidth, Connector, CoreError, CycleState, RouterApi, RouterDescriptor,
    Scheduler, Service, StaticRegistry, SyncConfig,
};

// ── Fake transport ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct FakeApi {
    secrets: Vec<PppSecret>,
    active: Vec<PppActive>,
    profiles: Vec<PppProfile>,
    leases: Vec<DhcpLease>,
    /// Hotspot requests never answer.
    stall_hotspot: bool,
}

impl RouterApi for FakeApi {
    async fn ppp_secrets(&self) -> Result<Vec<PppSecret>, shapesync_api::Error> {
        Ok(self.secrets.clone())
    }
    async fn ppp_active(&self) -> Result<Vec<PppActive>, shapesync_api::Error> {
        Ok(self.active.clone())
    }
    async fn ppp_profiles(&self) -> Result<Vec<PppProfile>, shapesync_api::Error> {
        Ok(self.profiles.clone())
    }
    async fn hotspot_active(&self) -> Result<Vec<HotspotActive>, shapesync_api::Error> {
        if self.stall_hotspot {
            std::future::pending::<()>().await;
        }
        Ok(Vec::new())
    }
    async fn dhcp_leases(&self) -> Result<Vec<DhcpLease>, shapesync_api::Error> {
        Ok(self.leases.clone())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Up(FakeApi),
    Down,
    BadPassword,
}

#[derive(Debug, Clone, Default)]
struct FakeConnector {
    routers: HashMap<String, Reply>,
    calls: Arc<AtomicUsize>,
}

impl FakeConnector {
    fn with(mut self, name: &str, reply: Reply) -> Self {
        self.routers.insert(name.into(), reply);
        self
    }
}

impl Connector for FakeConnector {
    type Api = FakeApi;

    async fn connect(&self, router: &RouterDescriptor) -> Result<FakeApi, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.routers.get(&router.name) {
            Some(Reply::Up(api)) => Ok(api.clone()),
            Some(Reply::BadPassword) => Err(CoreError::AuthenticationFailed {
                router: router.name.clone(),
                message: "invalid user name or password".into(),
            }),
            Some(Reply::Down) | None => Err(CoreError::Connectivity {
                router: router.name.clone(),
                reason: "connection refused".into(),
            }),
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn subscriber(user: &str, profile: &str, address: &str) -> (PppSecret, PppActive) {
    (
        PppSecret {
            id: format!("*{user}"),
            name: user.into(),
            profile: Some(profile.into()),
            service: Some("pppoe".into()),
            caller_id: None,
            remote_address: None,
            comment: None,
            disabled: false,
        },
        PppActive {
            id: format!("*a{user}"),
            name: user.into(),
            address: Some(address.into()),
            caller_id: None,
            service: Some("pppoe".into()),
            uptime: None,
        },
    )
}

fn api_with(users: &[(&str, &str)], profile_comment: Option<&str>) -> FakeApi {
    let mut api = FakeApi::default();
    for (i, (user, profile)) in users.iter().enumerate() {
        let (secret, session) = subscriber(user, profile, &format!("100.64.0.{}", i + 10));
        api.secrets.push(secret);
        api.active.push(session);
    }
    api.profiles.push(PppProfile {
        id: "*1".into(),
        name: "gold".into(),
        rate_limit: None,
        comment: profile_comment.map(Into::into),
    });
    api
}

fn pppoe_router(name: &str) -> RouterDescriptor {
    let mut router = RouterDescriptor::new(name, "10.0.0.1");
    router.pppoe.enabled = true;
    router.pppoe.default_limits = Bandwidth::new(25.0, 25.0);
    router
}

fn config(dir: &Path, routers: Vec<RouterDescriptor>) -> SyncConfig {
    SyncConfig {
        routers,
        static_devices: dir.join("jesync_static_device.json"),
        artifacts: ArtifactPaths {
            shaped_devices: dir.join("ShapedDevices.csv"),
            network: dir.join("network.json"),
        },
        connect_retries: 0,
        connect_retry_delay: Duration::from_millis(1),
        fetch_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    }
}

fn write_static(dir: &Path, doc: &Value) {
    std::fs::write(
        dir.join("jesync_static_device.json"),
        serde_json::to_vec_pretty(doc).unwrap(),
    )
    .unwrap();
}

fn scheduler(config: SyncConfig, connector: FakeConnector) -> Scheduler<FakeConnector> {
    let registry = StaticRegistry::load(&config.static_devices, &config.static_prefix).unwrap();
    Scheduler::new(config, connector, registry)
}

/// Shaping-table rows keyed by circuit name.
fn shaped_rows(dir: &Path) -> HashMap<String, HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(dir.join("ShapedDevices.csv")).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|row| {
            let row = row.unwrap();
            let fields: HashMap<String, String> = headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_owned(), v.to_owned()))
                .collect();
            (fields["Circuit Name"].clone(), fields)
        })
        .collect()
}

fn network(dir: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(dir.join("network.json")).unwrap()).unwrap()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn plan_comment_sets_subscriber_rate_when_override_enabled() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), &json!({ "UseProfileBandwidth": true, "StaticDevices": [] }));
    let connector =
        FakeConnector::default().with("A", Reply::Up(api_with(&[("user1", "gold")], Some("10m/10m"))));
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(report.records, 1);
    assert!(report.failures.is_empty());

    let rows = shaped_rows(dir.path());
    let user1 = &rows["user1"];
    assert_eq!(user1["Parent Node"], "A");
    assert_eq!(user1["Download Max Mbps"], "10");
    assert_eq!(user1["Upload Max Mbps"], "10");
    assert_eq!(user1["IPv4"], "100.64.0.10");
    assert_eq!(network(dir.path())["A"]["circuits"], json!(["user1"]));
}

#[tokio::test]
async fn plan_comment_ignored_when_override_disabled() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), &json!({ "UseProfileBandwidth": false, "StaticDevices": [] }));
    let connector =
        FakeConnector::default().with("A", Reply::Up(api_with(&[("user1", "gold")], Some("10m/10m"))));
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    sched.run_cycle().await.unwrap();
    assert_eq!(shaped_rows(dir.path())["user1"]["Download Max Mbps"], "25");
}

#[tokio::test]
async fn static_device_retained_while_router_down() {
    let dir = tempfile::tempdir().unwrap();
    write_static(
        dir.path(),
        &json!([{
            "Circuit Name": "Mikrotik-Static-Device-1",
            "Parent Node": "CoreDevices",
            "Download Max Mbps": 100,
            "Upload Max Mbps": 100
        }]),
    );
    let connector = FakeConnector::default().with("A", Reply::Down);
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].router, "A");
    assert_eq!(report.failures[0].service, None);

    let rows = shaped_rows(dir.path());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows["Mikrotik-Static-Device-1"]["Parent Node"], "CoreDevices");

    let net = network(dir.path());
    assert_eq!(net["CoreDevices"]["type"], "static");
    assert_eq!(net["CoreDevices"]["circuits"], json!(["Mikrotik-Static-Device-1"]));
    assert_eq!(net["A"]["circuits"], json!([]));
}

#[tokio::test]
async fn static_entry_replaces_router_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    write_static(
        dir.path(),
        &json!([{
            "Circuit Name": "user1",
            "Parent Node": "VIP",
            "Download Max Mbps": 300,
            "Upload Max Mbps": 100
        }]),
    );
    let connector =
        FakeConnector::default().with("A", Reply::Up(api_with(&[("user1", "gold")], None)));
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(report.overridden, 1);
    let rows = shaped_rows(dir.path());
    assert_eq!(rows["user1"]["Parent Node"], "VIP");
    assert_eq!(rows["user1"]["Download Max Mbps"], "300");
}

#[tokio::test]
async fn one_router_down_does_not_affect_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default()
        .with("A", Reply::Down)
        .with("B", Reply::Up(api_with(&[("user7", "gold")], None)));
    let mut sched = scheduler(
        config(dir.path(), vec![pppoe_router("A"), pppoe_router("B")]),
        connector,
    );

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(shaped_rows(dir.path())["user7"]["Parent Node"], "B");
}

#[tokio::test]
async fn rerun_produces_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default()
        .with("A", Reply::Up(api_with(&[("user1", "gold"), ("user2", "gold")], None)));
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    let first = sched.run_cycle().await.unwrap();
    assert!(first.write.changed());
    let csv = std::fs::read(dir.path().join("ShapedDevices.csv")).unwrap();
    let net = std::fs::read(dir.path().join("network.json")).unwrap();

    let second = sched.run_cycle().await.unwrap();
    assert!(!second.write.changed());
    assert!(second.topology_diff.is_empty());
    assert_eq!(std::fs::read(dir.path().join("ShapedDevices.csv")).unwrap(), csv);
    assert_eq!(std::fs::read(dir.path().join("network.json")).unwrap(), net);
}

#[tokio::test]
async fn failed_write_keeps_previous_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ShapedDevices.csv"), "previous").unwrap();
    std::fs::create_dir(dir.path().join("network.json")).unwrap();
    let connector =
        FakeConnector::default().with("A", Reply::Up(api_with(&[("user1", "gold")], None)));
    let mut sched = scheduler(config(dir.path(), vec![pppoe_router("A")]), connector);

    let err = sched.run_cycle().await.unwrap_err();
    assert!(matches!(err, CoreError::Io { .. }), "{err}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("ShapedDevices.csv")).unwrap(),
        "previous"
    );
    let stray = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().starts_with(".tmp"));
    assert!(!stray);
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default().with("A", Reply::BadPassword);
    let calls = Arc::clone(&connector.calls);
    let mut cfg = config(dir.path(), vec![pppoe_router("A")]);
    cfg.connect_retries = 3;
    let mut sched = scheduler(cfg, connector);

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.failures[0].error.contains("Authentication failed"));
}

#[tokio::test]
async fn unreachable_router_is_retried_up_to_limit() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default().with("A", Reply::Down);
    let calls = Arc::clone(&connector.calls);
    let mut cfg = config(dir.path(), vec![pppoe_router("A")]);
    cfg.connect_retries = 2;
    let mut sched = scheduler(cfg, connector);

    sched.run_cycle().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn routers_without_services_are_never_contacted() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default();
    let calls = Arc::clone(&connector.calls);
    let idle = RouterDescriptor::new("quiet", "10.0.0.9");
    let mut sched = scheduler(config(dir.path(), vec![idle]), connector);

    let report = sched.run_cycle().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(report.failures.is_empty());
    assert_eq!(network(dir.path())["quiet"]["type"], "site");
}

#[tokio::test]
async fn dhcp_and_pppoe_records_share_one_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = api_with(&[("user1", "gold")], None);
    api.leases.push(DhcpLease {
        id: "*9".into(),
        address: Some("192.168.88.20".into()),
        mac_address: Some("AA:BB:CC:DD:EE:20".into()),
        host_name: Some("printer".into()),
        server: Some("dhcp1".into()),
        status: Some("bound".into()),
        comment: None,
    });
    let mut router = pppoe_router("A");
    router.dhcp.enabled = true;
    let connector = FakeConnector::default().with("A", Reply::Up(api));
    let mut sched = scheduler(config(dir.path(), vec![router]), connector);

    sched.run_cycle().await.unwrap();
    let rows = shaped_rows(dir.path());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows["DHCP-printer"]["Download Max Mbps"], "1000");
    assert_eq!(rows["DHCP-printer"]["Comment"], "printer");
}

#[tokio::test]
async fn malformed_static_file_keeps_last_good_copy() {
    let dir = tempfile::tempdir().unwrap();
    write_static(dir.path(), &json!([{ "Circuit Name": "Mikrotik-Static-AP" }]));
    let connector = FakeConnector::default();
    let mut sched = scheduler(config(dir.path(), Vec::new()), connector);

    std::fs::write(dir.path().join("jesync_static_device.json"), "{ broken").unwrap();
    let report = sched.run_cycle().await.unwrap();
    assert_eq!(report.static_records, 1);
    assert!(sched.registry().get("Mikrotik-Static-AP").is_some());
}

#[tokio::test]
async fn shutdown_interrupts_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::default();
    let mut cfg = config(dir.path(), Vec::new());
    cfg.scan_interval = Duration::from_secs(3600);
    let mut sched = scheduler(cfg, connector);
    let cancel = sched.cancel_token();
    let mut state = sched.state();

    let stopper = async move {
        state
            .wait_for(|s| *s == CycleState::Sleeping)
            .await
            .unwrap();
        cancel.cancel();
        state
    };

    let ((), mut state) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(sched.run(), stopper)
    })
    .await
    .unwrap();
    assert_eq!(*state.borrow_and_update(), CycleState::Stopped);
}

#[cfg(unix)]
#[tokio::test]
async fn reload_command_runs_only_when_artifacts_change() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("reloads");
    let connector =
        FakeConnector::default().with("A", Reply::Up(api_with(&[("user1", "gold")], None)));
    let mut cfg = config(dir.path(), vec![pppoe_router("A")]);
    cfg.reload_command = Some(vec![
        "sh".into(),
        "-c".into(),
        format!("echo reload >> '{}'", marker.display()),
    ]);
    let mut sched = scheduler(cfg, connector);

    assert!(sched.run_cycle().await.unwrap().reloaded);
    assert!(!sched.run_cycle().await.unwrap().reloaded);
    assert_eq!(std::fs::read_to_string(&marker).unwrap().lines().count(), 1);
}

#[test]
fn services_follow_collision_precedence() {
    assert!(Service::Pppoe < Service::Hotspot);
    assert!(Service::Hotspot < Service::Dhcp);
}

#[tokio::test(start_paused = true)]
async fn stalled_fetch_times_out_without_blocking_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write_static(
        dir.path(),
        &json!([{ "Circuit Name": "Mikrotik-Static-Device-1", "Parent Node": "CoreDevices" }]),
    );
    let mut stalled = api_with(&[("user1", "gold")], None);
    stalled.stall_hotspot = true;
    let connector = FakeConnector::default()
        .with("A", Reply::Up(stalled))
        .with("B", Reply::Up(api_with(&[("user2", "gold")], None)));
    let mut router_a = pppoe_router("A");
    router_a.hotspot.enabled = true;
    let mut sched = scheduler(
        config(dir.path(), vec![router_a, pppoe_router("B")]),
        connector,
    );

    let report = sched.run_cycle().await.unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.router, "A");
    assert_eq!(failure.service, Some(Service::Hotspot));

    let rows = shaped_rows(dir.path());
    assert!(rows.contains_key("user1"));
    assert!(rows.contains_key("user2"));
    assert!(rows.contains_key("Mikrotik-Static-Device-1"));
}

#[tokio::test(start_paused = true)]
async fn write_failures_back_off_and_success_resets_the_delay() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mut cfg = config(dir.path(), Vec::new());
    cfg.artifacts = ArtifactPaths {
        shaped_devices: out.join("ShapedDevices.csv"),
        network: out.join("network.json"),
    };
    let mut sched = scheduler(cfg, FakeConnector::default());
    let cancel = sched.cancel_token();
    let mut state = sched.state();

    // fail, fail, succeed, fail
    let observer = async {
        let mut sleeps = Vec::new();
        while sleeps.len() < 5 {
            state.changed().await.unwrap();
            if *state.borrow_and_update() != CycleState::Sleeping {
                continue;
            }
            sleeps.push(tokio::time::Instant::now());
            match sleeps.len() {
                2 => std::fs::create_dir(&out).unwrap(),
                3 => std::fs::remove_dir_all(&out).unwrap(),
                _ => {}
            }
        }
        cancel.cancel();
        sleeps
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect::<Vec<_>>()
    };
    let ((), gaps) = tokio::join!(sched.run(), observer);

    let expected = [30, 60, 120, 30].map(Duration::from_secs);
    assert_eq!(gaps.len(), expected.len());
    for (gap, want) in gaps.iter().zip(expected) {
        assert!(
            *gap >= want && *gap < want + Duration::from_millis(10),
            "slept {gap:?}, expected {want:?}"
        );
    }
}
