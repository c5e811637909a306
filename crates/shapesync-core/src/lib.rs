//! Reconciliation engine that keeps LibreQoS shaping artifacts in sync with
//! the subscribers MikroTik routers report.
//!
//! Each cycle is a pure rebuild:
//!
//! - **Sources** ([`source`]): per-router, per-service adapters (PPPoE,
//!   hotspot, DHCP) behind the [`RouterApi`] / [`Connector`] traits.
//!
//! - **[`StaticRegistry`]**: the hand-curated device list, re-read every
//!   cycle and authoritative over router data.
//!
//! - **Resolver** ([`resolve`]): identity keys, bandwidth precedence and
//!   collision handling, yielding exactly one [`DeviceRecord`] per circuit.
//!
//! - **[`Topology`]**: the site / plan / static node tree for
//!   `network.json`.
//!
//! - **[`ArtifactWriter`]**: renders `ShapedDevices.csv` and
//!   `network.json` and replaces them atomically, skipping unchanged files.
//!
//! - **[`Scheduler`]**: the polling loop with bounded connect retries,
//!   per-fetch timeouts, exponential backoff and cancellable shutdown.

pub mod bandwidth;
pub mod config;
pub mod error;
pub mod hook;
pub mod model;
pub mod registry;
pub mod resolve;
pub mod scheduler;
pub mod source;
pub mod topology;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    ArtifactPaths, DhcpSettings, HotspotSettings, PppoeSettings, RouterDescriptor, SyncConfig,
    TlsVerification,
};
pub use error::CoreError;
pub use hook::ReloadHook;
pub use model::{Bandwidth, DeviceRecord, Origin, RawRecord, Service};
pub use registry::{StaticDeviceEntry, StaticRegistry};
pub use resolve::{Collision, MergeOutcome, SourceBatch, merge};
pub use scheduler::{CycleReport, CycleState, Scheduler, SourceFailure, backoff_delay};
pub use source::{Connector, HttpConnector, RouterApi};
pub use topology::{NetworkNode, NodeKind, Topology, TopologyDiff};
pub use writer::{ArtifactWriter, WriteOutcome};
