//! Async client for the MikroTik RouterOS v7 REST API.
//!
//! Covers the handful of resources a shaping sync needs:
//!
//! - **PPP**: `/ppp/secret`, `/ppp/active`, `/ppp/profile`
//! - **Hotspot**: `/ip/hotspot/active`
//! - **DHCP**: `/ip/dhcp-server/lease`
//! - **System**: `/system/identity` (used as a connectivity probe)
//!
//! Every request authenticates with HTTP basic auth; RouterOS keeps no
//! session state on the REST surface, so a [`RouterOsClient`] is cheap to
//! clone and share across concurrent fetches.

pub mod error;
pub mod rest;
pub mod transport;

pub use error::Error;
pub use rest::client::RouterOsClient;
pub use rest::models::{DhcpLease, HotspotActive, PppActive, PppProfile, PppSecret, SystemIdentity};
pub use transport::{TlsMode, TransportConfig};
