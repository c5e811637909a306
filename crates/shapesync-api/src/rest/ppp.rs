// PPP endpoints
//
// Subscribers are split across three menus: configured accounts
// (`secret`), live sessions (`active`), and service plans (`profile`).

use tracing::debug;

use crate::error::Error;
use crate::rest::client::RouterOsClient;
use crate::rest::models::{PppActive, PppProfile, PppSecret};

impl RouterOsClient {
    /// List configured PPP accounts.
    ///
    /// `GET /rest/ppp/secret`
    pub async fn ppp_secrets(&self) -> Result<Vec<PppSecret>, Error> {
        debug!("listing ppp secrets");
        self.get("ppp/secret").await
    }

    /// List live PPP sessions.
    ///
    /// `GET /rest/ppp/active`
    pub async fn ppp_active(&self) -> Result<Vec<PppActive>, Error> {
        debug!("listing active ppp sessions");
        self.get("ppp/active").await
    }

    /// List PPP profiles (service plans).
    ///
    /// `GET /rest/ppp/profile`
    pub async fn ppp_profiles(&self) -> Result<Vec<PppProfile>, Error> {
        debug!("listing ppp profiles");
        self.get("ppp/profile").await
    }
}
