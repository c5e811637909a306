use tracing::debug;

use crate::error::Error;
use crate::rest::client::RouterOsClient;
use crate::rest::models::SystemIdentity;

impl RouterOsClient {
    /// Fetch the router's system identity.
    ///
    /// `GET /rest/system/identity`. Cheap enough to double as a
    /// connectivity and credential probe.
    pub async fn identity(&self) -> Result<SystemIdentity, Error> {
        debug!("fetching system identity");
        self.get("system/identity").await
    }
}
