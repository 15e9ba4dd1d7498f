// # HTTP IP Oracle
//
// Resolves the device's public IP by asking a plain-text "what is my IP"
// service (api.ipify.org by default).
//
// ## Contract
//
// - One GET per call, no caching, no retry
// - The body must be a bare IP address (surrounding whitespace allowed)
// - Non-2xx status, transport errors, timeouts and unparseable bodies all
//   map to `Error::IpOracleFailed`

use reach_core::config::DdnsConfig;
use reach_core::traits::IpOracle;
use reach_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default oracle endpoint
pub const DEFAULT_ORACLE_URL: &str = "https://api.ipify.org";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Address family an oracle answer must belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
}

/// Public IP oracle backed by an HTTP endpoint
#[derive(Debug)]
pub struct HttpIpOracle {
    /// URL to fetch the IP from
    url: String,

    /// Required address family (None = either)
    family: Option<IpFamily>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpOracle {
    /// Create an oracle for `url` with the default timeout
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create an oracle for `url` with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            family: None,
            client,
        })
    }

    /// Reject answers outside `family`
    pub fn with_family(mut self, family: IpFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Create the oracle described by the DDNS configuration
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        Self::with_timeout(config.ip_oracle_url.clone(), config.http_timeout())
    }

    /// The endpoint this oracle queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch current IP from the HTTP service
    async fn fetch_ip(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_oracle(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_oracle(format!("HTTP error: {}", response.status())));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::ip_oracle(format!("Failed to read response: {}", e)))?;

        let ip_text = ip_text.trim();

        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| Error::ip_oracle(format!("Invalid IP address: {:?}", ip_text)))?;

        match self.family {
            Some(IpFamily::V4) if !ip.is_ipv4() => {
                Err(Error::ip_oracle(format!("Expected IPv4, got: {}", ip)))
            }
            Some(IpFamily::V6) if !ip.is_ipv6() => {
                Err(Error::ip_oracle(format!("Expected IPv6, got: {}", ip)))
            }
            _ => Ok(ip),
        }
    }
}

#[async_trait::async_trait]
impl IpOracle for HttpIpOracle {
    async fn current_ip(&self) -> Result<IpAddr> {
        let ip = self.fetch_ip().await?;
        tracing::debug!("Public IP reported by {}: {}", self.url, ip);
        Ok(ip)
    }

    fn oracle_name(&self) -> &str {
        &self.url
    }
}
