// # Gateway Traits
//
// Defines the interface for talking to the local NAT gateway.
//
// ## Implementations
//
// - UPnP IGD: `reach-gateway-upnp` crate
//
// ## Usage
//
// ```rust,ignore
// use reach_core::GatewaySession;
//
// let session = /* GatewaySession implementation */;
//
// // One handle per renewal cycle
// let handle = session.open().await?;
// handle.add_port_mapping(&request).await?;
// drop(handle);
// ```

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};

use crate::config::{PortSpec, Protocol};

/// Parameters of a single `AddPortMapping` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMappingRequest {
    /// Port opened on the gateway's WAN side
    pub external_port: u16,
    /// Transport protocol
    pub protocol: Protocol,
    /// LAN address traffic is forwarded to
    pub internal_client: IpAddr,
    /// Port on the LAN address
    pub internal_port: u16,
    /// Description shown in the router UI
    pub description: String,
    /// Lease lifetime in seconds
    pub lease_duration_secs: u32,
}

impl PortMappingRequest {
    /// Build the request that forwards `spec` to the same port on `internal_client`
    pub fn for_spec(
        spec: PortSpec,
        internal_client: IpAddr,
        description: impl Into<String>,
        lease_duration_secs: u32,
    ) -> Self {
        Self {
            external_port: spec.port,
            protocol: spec.protocol,
            internal_client,
            internal_port: spec.port,
            description: description.into(),
            lease_duration_secs,
        }
    }

    /// The port spec this request was built from
    pub fn spec(&self) -> PortSpec {
        PortSpec::new(self.external_port, self.protocol)
    }
}

/// Discovers the local gateway and opens a control session to it
///
/// # Contract
///
/// - `open()` performs discovery with a bounded timeout
/// - When several gateways answer, the first responder is used
/// - Every failure maps to [`crate::Error::GatewayUnreachable`]
/// - No retries: the scheduler's period is the retry cadence
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Discover the gateway and open a control handle
    ///
    /// # Returns
    ///
    /// - `Ok(handle)`: A live handle, valid for one renewal cycle
    /// - `Err(Error::GatewayUnreachable)`: No usable gateway this cycle
    async fn open(&self) -> Result<Box<dyn GatewayHandle>, crate::Error>;
}

/// A live control channel to a discovered gateway
///
/// Handles are never cached across cycles: the router may have rebooted or
/// the device may have a new LAN address by the next one.
#[async_trait]
pub trait GatewayHandle: Send + Sync {
    /// This device's address on the gateway's LAN
    fn lan_addr(&self) -> IpAddr;

    /// The gateway's control address
    fn gateway_addr(&self) -> SocketAddr;

    /// Create or refresh one port mapping
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The gateway accepted the mapping
    /// - `Err(Error::PortMappingFailed)`: Rejected, malformed response, or timeout
    async fn add_port_mapping(&self, request: &PortMappingRequest) -> Result<(), crate::Error>;
}
