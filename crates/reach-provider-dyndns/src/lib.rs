// # dyndns2 DNS Provider
//
// Pushes the public IP to a provider speaking the classic `nic/update`
// protocol (Dynu by default).
//
// ## Request
//
// ```http
// GET /nic/update?hostname=<host>&myip=<ip>&username=<credential>
// ```
//
// ## Response
//
// The provider answers with a plain-text status token. The body is read
// whatever the HTTP status, because some endpoints report `badauth` with a
// 401 and others with a 200:
//
// - `good`: record updated
// - `nochg`: record already had this IP (success, not failure)
// - anything else: failure (`badauth`, `nohost`, `abuse`, `911`, ...)
//
// ## Security Requirements
//
// - The credential NEVER appears in logs, Debug output, or error messages
// - Transport errors are stripped of their URL, which carries the credential

use async_trait::async_trait;
use reach_core::config::DdnsConfig;
use reach_core::traits::{DnsProvider, UpdateResult};
use reach_core::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Provider name used in logs and errors
const PROVIDER_NAME: &str = "dyndns";

/// Default HTTP timeout for update requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response excerpt carried into an error message
const MAX_BODY_EXCERPT: usize = 64;

/// Status tokens that mean the update was refused, with a readable reason
const FAILURE_TOKENS: &[(&str, &str)] = &[
    ("badauth", "authentication failed"),
    ("notfqdn", "hostname is not a fully-qualified domain name"),
    ("nohost", "hostname does not exist in this account"),
    ("numhost", "too many hosts in one request"),
    ("abuse", "hostname blocked for abuse"),
    ("badagent", "user agent rejected"),
    ("dnserr", "provider DNS error"),
    ("911", "provider-side outage"),
];

// Custom Debug implementation that hides the credential
impl std::fmt::Debug for DynDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynDnsProvider")
            .field("update_url", &self.update_url)
            .field("credential", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// dyndns2-style DNS provider
///
/// Single-shot: one GET per update, no retry, no caching. The scheduler's
/// DDNS period is the retry cadence.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the provider logs the request it would send (with
/// the credential redacted) and reports `Updated` without touching the
/// network.
pub struct DynDnsProvider {
    /// Update endpoint, without query string
    update_url: String,

    /// Provider credential
    /// ⚠️ NEVER log this value
    credential: String,

    /// HTTP client for update requests
    client: reqwest::Client,

    /// Dry-run mode: log instead of sending
    dry_run: bool,
}

impl DynDnsProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `update_url`: The `nic/update` endpoint
    /// - `credential`: API key or password, sent as `username`
    /// - `timeout`: Upper bound on each request
    /// - `dry_run`: Log the request instead of sending it
    pub fn new(
        update_url: impl Into<String>,
        credential: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(Error::config("DDNS credential cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            update_url: update_url.into(),
            credential,
            client,
            dry_run,
        })
    }

    /// Create a live provider for `update_url` with the default timeout
    pub fn new_live(update_url: impl Into<String>, credential: impl Into<String>) -> Result<Self> {
        Self::new(update_url, credential, DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create the provider described by the DDNS configuration
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        if config.dry_run {
            tracing::warn!("DDNS provider running in DRY-RUN mode - no updates will be sent");
        }
        Self::new(
            config.update_url.clone(),
            config.credential.clone(),
            config.http_timeout(),
            config.dry_run,
        )
    }

    /// Whether updates are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Map a provider response body to an update result
///
/// Matching is case-insensitive. `good` and `nochg` are success; every other
/// body is a failure described as precisely as the known tokens allow.
pub fn interpret_response(body: &str, ip: IpAddr) -> Result<UpdateResult> {
    let normalized = body.trim().to_ascii_lowercase();

    if normalized.contains("good") {
        return Ok(UpdateResult::Updated { new_ip: ip });
    }
    if normalized.contains("nochg") {
        return Ok(UpdateResult::Unchanged { current_ip: ip });
    }

    let reason = FAILURE_TOKENS
        .iter()
        .find(|(token, _)| normalized.starts_with(token))
        .map(|(token, reason)| format!("{} ({})", token, reason))
        .unwrap_or_else(|| format!("unexpected response: {:?}", excerpt(body.trim())));

    Err(Error::ddns_provider(PROVIDER_NAME, reason))
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl DnsProvider for DynDnsProvider {
    async fn update_record(&self, hostname: &str, ip: IpAddr) -> Result<UpdateResult> {
        let myip = ip.to_string();

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send GET {}?hostname={}&myip={}&username=<REDACTED>",
                self.update_url,
                hostname,
                myip
            );
            return Ok(UpdateResult::Updated { new_ip: ip });
        }

        tracing::debug!("Updating {} -> {} via {}", hostname, ip, self.update_url);

        let response = self
            .client
            .get(&self.update_url)
            .query(&[
                ("hostname", hostname),
                ("myip", myip.as_str()),
                ("username", self.credential.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                Error::ddns_provider(PROVIDER_NAME, format!("HTTP request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::ddns_provider(
                PROVIDER_NAME,
                format!("Failed to read response ({}): {}", status, e.without_url()),
            )
        })?;

        match interpret_response(&body, ip) {
            Ok(result) => Ok(result),
            Err(Error::DdnsProviderFailed { provider, message }) if !status.is_success() => {
                Err(Error::ddns_provider(provider, format!("{} (HTTP {})", message, status)))
            }
            Err(e) => Err(e),
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
