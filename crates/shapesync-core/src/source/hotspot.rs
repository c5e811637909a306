// Hotspot: `/ip/hotspot/active` sessions.

use super::{RouterApi, non_empty};
use crate::config::RouterDescriptor;
use crate::error::CoreError;
use crate::model::{RawRecord, Service};

pub async fn fetch_hotspot<A: RouterApi>(
    api: &A,
    router: &RouterDescriptor,
) -> Result<Vec<RawRecord>, CoreError> {
    let sessions = api
        .hotspot_active()
        .await
        .map_err(|e| CoreError::from_api(&router.name, e))?;

    Ok(sessions
        .iter()
        .map(|s| {
            let mut record = RawRecord::new(Service::Hotspot, &router.name);
            record.username = non_empty(s.user.as_deref());
            record.mac = non_empty(s.mac_address.as_deref());
            record.ipv4 = non_empty(s.address.as_deref());
            record.comment = Some(
                non_empty(s.server.as_deref())
                    .map_or_else(|| "Hotspot".to_owned(), |srv| format!("Hotspot {srv}")),
            );
            record
        })
        .collect())
}
