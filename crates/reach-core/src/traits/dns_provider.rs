// # DNS Provider Trait
//
// Defines the interface for pushing the public IP to a dynamic-DNS provider.
//
// ## Implementations
//
// - dyndns2 protocol (Dynu, No-IP, DynDNS-compatible endpoints):
//   `reach-provider-dyndns` crate
//
// ## Usage
//
// ```rust,ignore
// use reach_core::DnsProvider;
//
// let provider = /* DnsProvider implementation */;
// provider.update_record("home.example.com", "203.0.113.7".parse()?).await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Result of a DNS update operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Provider changed the record
    Updated {
        /// The new IP address
        new_ip: IpAddr,
    },
    /// Record already had this IP (no-op)
    Unchanged {
        /// The current IP address
        current_ip: IpAddr,
    },
}

impl UpdateResult {
    /// The IP the record now points at
    pub fn ip(&self) -> IpAddr {
        match self {
            UpdateResult::Updated { new_ip } => *new_ip,
            UpdateResult::Unchanged { current_ip } => *current_ip,
        }
    }
}

/// Trait for DNS provider implementations
///
/// # Forbidden Capabilities
///
/// - ❌ Retry or back off (owned by the scheduler's period)
/// - ❌ Spawn tasks
/// - ❌ Log credentials
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Point `hostname` at `ip`
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult)`: Provider reported success or no-change
    /// - `Err(Error::DdnsProviderFailed)`: Anything else
    async fn update_record(&self, hostname: &str, ip: IpAddr) -> Result<UpdateResult, crate::Error>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
