// IP menu endpoints: hotspot sessions and DHCP leases.

use tracing::debug;

use crate::error::Error;
use crate::rest::client::RouterOsClient;
use crate::rest::models::{DhcpLease, HotspotActive};

impl RouterOsClient {
    /// List authenticated hotspot sessions.
    ///
    /// `GET /rest/ip/hotspot/active`
    pub async fn hotspot_active(&self) -> Result<Vec<HotspotActive>, Error> {
        debug!("listing active hotspot sessions");
        self.get("ip/hotspot/active").await
    }

    /// List DHCP leases across every server on the router.
    ///
    /// `GET /rest/ip/dhcp-server/lease`. Pool filtering is the caller's job.
    pub async fn dhcp_leases(&self) -> Result<Vec<DhcpLease>, Error> {
        debug!("listing dhcp leases");
        self.get("ip/dhcp-server/lease").await
    }
}
