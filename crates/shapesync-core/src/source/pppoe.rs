// PPPoE: `/ppp/secret` joined with `/ppp/active` by account name.

use std::collections::HashMap;

use tracing::trace;

use super::{RouterApi, non_empty};
use crate::config::RouterDescriptor;
use crate::error::CoreError;
use crate::model::{RawRecord, Service};

const DEFAULT_PROFILE: &str = "default";

/// Emit one record per secret with a live session carrying an address.
pub async fn fetch_pppoe<A: RouterApi>(
    api: &A,
    router: &RouterDescriptor,
) -> Result<Vec<RawRecord>, CoreError> {
    let (secrets, active, profiles) =
        tokio::try_join!(api.ppp_secrets(), api.ppp_active(), api.ppp_profiles())
            .map_err(|e| CoreError::from_api(&router.name, e))?;

    let sessions: HashMap<&str, &str> = active
        .iter()
        .filter_map(|s| {
            let address = s.address.as_deref().map(str::trim).filter(|a| !a.is_empty())?;
            Some((s.name.as_str(), address))
        })
        .collect();
    let profiles: HashMap<&str, _> = profiles.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut records = Vec::new();
    for secret in &secrets {
        if secret.disabled {
            continue;
        }
        let Some(address) = sessions.get(secret.name.as_str()) else {
            trace!(router = %router.name, user = %secret.name, "secret has no active session");
            continue;
        };

        let profile_name = non_empty(secret.profile.as_deref())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_owned());
        let profile = profiles.get(profile_name.as_str());

        let mut record = RawRecord::new(Service::Pppoe, &router.name);
        record.username = Some(secret.name.clone());
        record.mac = non_empty(secret.caller_id.as_deref());
        record.ipv4 = Some((*address).to_owned());
        record.rate_limit = profile.and_then(|p| non_empty(p.rate_limit.as_deref()));
        record.profile_comment = profile.and_then(|p| non_empty(p.comment.as_deref()));
        record.profile = Some(profile_name);
        record.comment = Some(non_empty(secret.comment.as_deref()).unwrap_or_else(|| "PPP".into()));
        records.push(record);
    }

    Ok(records)
}
