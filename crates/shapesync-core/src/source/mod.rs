// ── Source adapters ──
//
// Turn one router service into a list of `RawRecord`s. Adapters never
// merge and never decide identities; they only join the router's own
// tables and report what they saw.
//
// The router transport sits behind `RouterApi` / `Connector` so the
// scheduler can be driven by an in-memory fake in tests.

mod dhcp;
mod hotspot;
mod pppoe;

use std::future::Future;

use tracing::debug;

use shapesync_api::transport::{TlsMode, TransportConfig};
use shapesync_api::{
    DhcpLease, HotspotActive, PppActive, PppProfile, PppSecret, RouterOsClient,
};

use crate::config::{RouterDescriptor, TlsVerification};
use crate::error::CoreError;
use crate::model::{RawRecord, Service};

pub use dhcp::fetch_dhcp;
pub use hotspot::fetch_hotspot;
pub use pppoe::fetch_pppoe;

// ── RouterApi ────────────────────────────────────────────────────

/// The router reads the sync depends on.
pub trait RouterApi: Send + Sync {
    fn ppp_secrets(
        &self,
    ) -> impl Future<Output = Result<Vec<PppSecret>, shapesync_api::Error>> + Send;

    fn ppp_active(
        &self,
    ) -> impl Future<Output = Result<Vec<PppActive>, shapesync_api::Error>> + Send;

    fn ppp_profiles(
        &self,
    ) -> impl Future<Output = Result<Vec<PppProfile>, shapesync_api::Error>> + Send;

    fn hotspot_active(
        &self,
    ) -> impl Future<Output = Result<Vec<HotspotActive>, shapesync_api::Error>> + Send;

    fn dhcp_leases(
        &self,
    ) -> impl Future<Output = Result<Vec<DhcpLease>, shapesync_api::Error>> + Send;
}

impl RouterApi for RouterOsClient {
    async fn ppp_secrets(&self) -> Result<Vec<PppSecret>, shapesync_api::Error> {
        Self::ppp_secrets(self).await
    }

    async fn ppp_active(&self) -> Result<Vec<PppActive>, shapesync_api::Error> {
        Self::ppp_active(self).await
    }

    async fn ppp_profiles(&self) -> Result<Vec<PppProfile>, shapesync_api::Error> {
        Self::ppp_profiles(self).await
    }

    async fn hotspot_active(&self) -> Result<Vec<HotspotActive>, shapesync_api::Error> {
        Self::hotspot_active(self).await
    }

    async fn dhcp_leases(&self) -> Result<Vec<DhcpLease>, shapesync_api::Error> {
        Self::dhcp_leases(self).await
    }
}

// ── Connector ────────────────────────────────────────────────────

/// Opens a session to one router.
pub trait Connector: Send + Sync {
    type Api: RouterApi;

    /// Build a client and verify the router answers with the given
    /// credentials.
    fn connect(
        &self,
        router: &RouterDescriptor,
    ) -> impl Future<Output = Result<Self::Api, CoreError>> + Send;
}

/// Connects over the RouterOS REST API.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    transport: TransportConfig,
}

impl HttpConnector {
    pub fn new(tls: &TlsVerification, timeout: std::time::Duration) -> Self {
        Self {
            transport: TransportConfig {
                tls: tls_mode(tls),
                timeout,
            },
        }
    }
}

impl Connector for HttpConnector {
    type Api = RouterOsClient;

    async fn connect(&self, router: &RouterDescriptor) -> Result<RouterOsClient, CoreError> {
        let base_url = RouterOsClient::base_url_for(router.tls, &router.address, router.port)
            .map_err(|e| CoreError::from_api(&router.name, e))?;
        let client = RouterOsClient::new(
            base_url,
            router.username.clone(),
            router.password.clone(),
            &self.transport,
        )
        .map_err(|e| CoreError::from_api(&router.name, e))?;

        let identity = client
            .identity()
            .await
            .map_err(|e| CoreError::from_api(&router.name, e))?;
        debug!(
            router = %router.name,
            url = %client.base_url(),
            identity = %identity.name,
            "router answered"
        );

        Ok(client)
    }
}

fn tls_mode(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

// ── Dispatch ─────────────────────────────────────────────────────

/// Fetch one service from one router.
///
/// A disabled service yields no records and makes no API calls.
pub async fn fetch<A: RouterApi>(
    api: &A,
    router: &RouterDescriptor,
    service: Service,
) -> Result<Vec<RawRecord>, CoreError> {
    if !router.is_enabled(service) {
        return Ok(Vec::new());
    }
    let records = match service {
        Service::Pppoe => fetch_pppoe(api, router).await?,
        Service::Hotspot => fetch_hotspot(api, router).await?,
        Service::Dhcp => fetch_dhcp(api, router).await?,
    };
    debug!(
        router = %router.name,
        service = %service,
        count = records.len(),
        "fetched records"
    );
    Ok(records)
}

/// Trim a RouterOS string field, mapping blanks to `None`.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
