// DHCP: `/ip/dhcp-server/lease`, restricted to the configured pools.

use tracing::trace;

use super::{RouterApi, non_empty};
use crate::config::RouterDescriptor;
use crate::error::CoreError;
use crate::model::{RawRecord, Service};

pub async fn fetch_dhcp<A: RouterApi>(
    api: &A,
    router: &RouterDescriptor,
) -> Result<Vec<RawRecord>, CoreError> {
    let leases = api
        .dhcp_leases()
        .await
        .map_err(|e| CoreError::from_api(&router.name, e))?;

    let mut records = Vec::new();
    for lease in &leases {
        if !router.dhcp.includes_server(lease.server.as_deref()) {
            continue;
        }
        let Some(mac) = non_empty(lease.mac_address.as_deref()) else {
            trace!(router = %router.name, lease = %lease.id, "lease without MAC skipped");
            continue;
        };

        let hostname = non_empty(lease.host_name.as_deref());
        let mut record = RawRecord::new(Service::Dhcp, &router.name);
        record.comment = Some(hostname.clone().unwrap_or_else(|| "DHCP".into()));
        record.hostname = hostname;
        record.mac = Some(mac);
        record.ipv4 = non_empty(lease.address.as_deref());
        records.push(record);
    }
    Ok(records)
}
