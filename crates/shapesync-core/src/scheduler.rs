// ── Polling scheduler ──
//
// One cycle at a time:
//
//   Idle → Connecting → Fetching → Merging → Writing → Sleeping → Idle
//
// Router and service failures are isolated and only shrink that cycle's
// record set. A cycle as a whole fails only when the artifacts cannot be
// written; consecutive failures back off exponentially. Shutdown cancels
// the sleep immediately and abandons any in-flight fetches without
// writing.

use std::time::Duration;

use futures_util::future::join_all;
use strum::{Display, IntoEnumIterator};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RouterDescriptor, SyncConfig};
use crate::error::CoreError;
use crate::hook::ReloadHook;
use crate::model::Service;
use crate::registry::StaticRegistry;
use crate::resolve::{self, SourceBatch};
use crate::source::{self, Connector};
use crate::topology::{Topology, TopologyDiff};
use crate::writer::{ArtifactWriter, WriteOutcome};

const RELOAD_TIMEOUT: Duration = Duration::from_secs(300);

// ── CycleState ───────────────────────────────────────────────────

/// Scheduler phase, observable through [`Scheduler::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CycleState {
    Idle,
    Connecting,
    Fetching,
    Merging,
    Writing,
    Sleeping,
    Stopped,
}

// ── Reports ──────────────────────────────────────────────────────

/// A router (or one of its services) that contributed nothing this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub router: String,
    /// `None` when the router could not be reached at all.
    pub service: Option<Service>,
    pub error: String,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub records: usize,
    pub static_records: usize,
    pub failures: Vec<SourceFailure>,
    pub collisions: usize,
    pub overridden: usize,
    pub topology_diff: TopologyDiff,
    pub write: WriteOutcome,
    pub reloaded: bool,
}

/// Delay before the next attempt after `consecutive_failures` whole-cycle
/// failures: `base * 2^(n-1)`, capped at `max`.
pub fn backoff_delay(base: Duration, max: Duration, consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(16);
    base.saturating_mul(1_u32 << exponent).min(max)
}

// ── Scheduler ────────────────────────────────────────────────────

/// Drives sync cycles for a fixed router set.
pub struct Scheduler<C: Connector> {
    config: SyncConfig,
    connector: C,
    writer: ArtifactWriter,
    hook: Option<ReloadHook>,
    /// Last successfully loaded static registry.
    registry: StaticRegistry,
    state: watch::Sender<CycleState>,
    cancel: CancellationToken,
}

impl<C: Connector> Scheduler<C> {
    /// `registry` is the static file as loaded at startup; it is re-read at
    /// the start of every cycle.
    pub fn new(config: SyncConfig, connector: C, registry: StaticRegistry) -> Self {
        let writer = ArtifactWriter::new(
            config.artifacts.clone(),
            config.rate_overhead,
            config.min_rate_ratio,
        );
        let hook = config
            .reload_command
            .as_deref()
            .and_then(|argv| ReloadHook::from_argv(argv, RELOAD_TIMEOUT));
        let (state, _) = watch::channel(CycleState::Idle);

        Self {
            config,
            connector,
            writer,
            hook,
            registry,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to phase changes.
    pub fn state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    /// Token that stops [`run`](Self::run) and aborts an in-flight cycle.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &StaticRegistry {
        &self.registry
    }

    fn set_state(&self, state: CycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "scheduler state");
        }
    }

    /// Loop until cancelled.
    pub async fn run(&mut self) {
        let mut consecutive_failures = 0_u32;
        info!(
            routers = self.config.routers.len(),
            interval_secs = self.config.scan_interval.as_secs(),
            "sync loop started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let delay = match self.run_cycle().await {
                Ok(_) => {
                    consecutive_failures = 0;
                    self.config.scan_interval
                }
                Err(CoreError::Cancelled) => break,
                Err(e) => {
                    consecutive_failures += 1;
                    let delay = backoff_delay(
                        self.config.error_retry_interval,
                        self.config.max_backoff,
                        consecutive_failures,
                    );
                    error!(
                        error = %e,
                        consecutive_failures,
                        retry_in_secs = delay.as_secs(),
                        "sync cycle failed, previous artifacts kept"
                    );
                    delay
                }
            };

            self.set_state(CycleState::Sleeping);
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
            self.set_state(CycleState::Idle);
        }

        self.set_state(CycleState::Stopped);
        info!("sync loop stopped");
    }

    /// Run exactly one cycle.
    ///
    /// Returns `Err` only for artifact failures and cancellation.
    #[allow(clippy::too_many_lines)]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        self.reload_registry();
        let this = &*self;
        let routers = &this.config.routers;
        let mut failures = Vec::new();

        // ── Connect ──
        this.set_state(CycleState::Connecting);
        let attempts = join_all(
            routers
                .iter()
                .enumerate()
                .filter(|(_, r)| r.has_enabled_service())
                .map(|(index, router)| async move { (index, this.connect_with_retry(router).await) }),
        );
        let attempts = tokio::select! {
            biased;
            () = this.cancel.cancelled() => return Err(CoreError::Cancelled),
            attempts = attempts => attempts,
        };

        let mut connected = Vec::new();
        for (index, attempt) in attempts {
            match attempt {
                Ok(api) => connected.push((index, api)),
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    warn!(router = %routers[index].name, error = %e, "router unavailable this cycle");
                    failures.push(SourceFailure {
                        router: routers[index].name.clone(),
                        service: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        // ── Fetch ──
        this.set_state(CycleState::Fetching);
        let timeout = this.config.fetch_timeout;
        let mut jobs = Vec::new();
        for (index, api) in &connected {
            let index = *index;
            let router = &routers[index];
            for service in Service::iter().filter(|s| router.is_enabled(*s)) {
                jobs.push(async move {
                    let result = tokio::time::timeout(timeout, source::fetch(api, router, service))
                        .await
                        .unwrap_or_else(|_| {
                            Err(CoreError::Timeout {
                                router: router.name.clone(),
                                timeout_secs: timeout.as_secs(),
                            })
                        });
                    (index, service, result)
                });
            }
        }
        let results = tokio::select! {
            biased;
            () = this.cancel.cancelled() => return Err(CoreError::Cancelled),
            results = join_all(jobs) => results,
        };

        let mut batches = Vec::new();
        for (router_index, service, result) in results {
            match result {
                Ok(records) => batches.push(SourceBatch {
                    service,
                    router_index,
                    records,
                }),
                Err(e) => {
                    warn!(
                        router = %routers[router_index].name,
                        service = %service,
                        error = %e,
                        "fetch failed, contribution dropped"
                    );
                    failures.push(SourceFailure {
                        router: routers[router_index].name.clone(),
                        service: Some(service),
                        error: e.to_string(),
                    });
                }
            }
        }

        // ── Merge ──
        this.set_state(CycleState::Merging);
        let merged = resolve::merge(routers, batches, &this.registry);
        let topology = Topology::build(routers, &merged.records);

        // ── Write ──
        this.set_state(CycleState::Writing);
        let topology_diff = Topology::load(&this.config.artifacts.network)
            .map(|previous| Topology::diff(&previous, &topology))
            .unwrap_or_else(|| TopologyDiff {
                added: topology.node_paths().into_iter().collect(),
                ..TopologyDiff::default()
            });
        if !topology_diff.is_empty() {
            info!(
                added = ?topology_diff.added,
                removed = ?topology_diff.removed,
                changed = ?topology_diff.changed,
                "topology changed"
            );
        }

        let write = this.writer.write(&merged.records, &topology)?;

        let mut reloaded = false;
        if write.changed() {
            if let Some(hook) = &this.hook {
                match hook.run().await {
                    Ok(()) => reloaded = true,
                    Err(e) => warn!(error = %e, "reload command failed"),
                }
            }
        }

        let report = CycleReport {
            records: merged.records.len(),
            static_records: merged.records.iter().filter(|r| r.is_static()).count(),
            failures,
            collisions: merged.collisions.len(),
            overridden: merged.overridden.len(),
            topology_diff,
            write,
            reloaded,
        };
        info!(
            records = report.records,
            static_records = report.static_records,
            failed_sources = report.failures.len(),
            collisions = report.collisions,
            changed = report.write.changed(),
            "sync cycle complete"
        );
        Ok(report)
    }

    fn reload_registry(&mut self) {
        match StaticRegistry::load(&self.config.static_devices, &self.config.static_prefix) {
            Ok(registry) => self.registry = registry,
            Err(e) => warn!(
                path = %self.config.static_devices.display(),
                error = %e,
                "static device file unreadable, keeping last good copy"
            ),
        }
    }

    async fn connect_with_retry(&self, router: &RouterDescriptor) -> Result<C::Api, CoreError> {
        let attempts = self.config.connect_retries.saturating_add(1);
        let timeout = self.config.fetch_timeout;
        let mut attempt = 1;

        loop {
            let result = tokio::time::timeout(timeout, self.connector.connect(router))
                .await
                .unwrap_or_else(|_| {
                    Err(CoreError::Timeout {
                        router: router.name.clone(),
                        timeout_secs: timeout.as_secs(),
                    })
                });

            match result {
                Ok(api) => return Ok(api),
                Err(e) if e.is_permanent() || attempt >= attempts => return Err(e),
                Err(e) => {
                    debug!(router = %router.name, attempt, error = %e, "connect failed, retrying");
                    attempt += 1;
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(CoreError::Cancelled),
                        () = tokio::time::sleep(self.config.connect_retry_delay) => {}
                    }
                }
            }
        }
    }
}
