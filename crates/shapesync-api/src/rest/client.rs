// RouterOS REST HTTP client
//
// Wraps `reqwest::Client` with RouterOS URL construction, basic auth, and
// error-body decoding. Resource endpoints (ppp, hotspot, dhcp, system) are
// implemented as inherent methods in sibling files.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// RouterOS reports failures as `{"error": 401, "message": "...", "detail": "..."}`.
#[derive(serde::Deserialize)]
struct RouterOsErrorBody {
    message: Option<String>,
    detail: Option<String>,
}

/// Raw HTTP client for one router's REST API.
///
/// Every request carries basic-auth credentials; there is no login step.
#[derive(Clone)]
pub struct RouterOsClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for RouterOsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterOsClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RouterOsClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the router root, e.g. `https://10.0.0.1/`.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
        }
    }

    /// Build the router root URL from its address parts.
    pub fn base_url_for(tls: bool, address: &str, port: u16) -> Result<Url, Error> {
        let scheme = if tls { "https" } else { "http" };
        Ok(Url::parse(&format!("{scheme}://{address}:{port}/"))?)
    }

    /// The router base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a REST resource path: `{base}/rest/{path}`.
    pub(crate) fn rest_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/rest/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.rest_url(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "router rejected credentials".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<RouterOsErrorBody>(&body)
                .ok()
                .and_then(|e| match (e.message, e.detail) {
                    (Some(m), Some(d)) => Some(format!("{m}: {d}")),
                    (m, d) => m.or(d),
                })
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(Error::RouterOs {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
