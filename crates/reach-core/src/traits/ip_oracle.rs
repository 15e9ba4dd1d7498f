// # IP Oracle Trait
//
// Defines the interface for resolving the device's current public IP.
//
// ## Implementations
//
// - Plain HTTP "what is my IP" services: `reach-ip-http` crate

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for public IP oracle implementations
///
/// Oracles are single-shot: one lookup per call, no caching, no retry.
#[async_trait]
pub trait IpOracle: Send + Sync {
    /// Resolve the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The public IP address
    /// - `Err(Error::IpOracleFailed)`: Transport error, bad status, or unparseable body
    async fn current_ip(&self) -> Result<IpAddr, crate::Error>;

    /// Get the oracle name for logging
    fn oracle_name(&self) -> &str {
        "oracle"
    }
}
