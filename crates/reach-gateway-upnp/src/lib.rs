// # UPnP Gateway Session
//
// Talks to the local NAT router through UPnP IGD.
//
// ## Lifecycle
//
// Every renewal cycle calls `open()`, which runs SSDP discovery from
// scratch and returns a handle bound to whichever gateway answered first.
// Handles are never cached: the router may have rebooted, or the device may
// have a new LAN address, by the next cycle.
//
// ## Timeouts
//
// - Discovery: `discovery_timeout`, plus an outer bound slightly above it
//   in case the search itself stalls
// - Each `AddPortMapping` call: `request_timeout`

use async_trait::async_trait;
use igd_next::aio::Gateway;
use igd_next::aio::tokio::Tokio;
use igd_next::{PortMappingProtocol, SearchOptions};
use reach_core::config::{Protocol, RenewalConfig};
use reach_core::traits::{GatewayHandle, GatewaySession, PortMappingRequest};
use reach_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Slack added on top of the discovery timeout for the outer bound
const DISCOVERY_MARGIN: Duration = Duration::from_secs(1);

/// Gateway discovery over UPnP IGD
#[derive(Debug, Clone)]
pub struct UpnpGateway {
    /// SSDP search timeout
    discovery_timeout: Duration,

    /// Bound on each mapping request
    request_timeout: Duration,

    /// Local address discovery binds to (None = any interface)
    bind_addr: Option<SocketAddr>,
}

impl UpnpGateway {
    /// Create a session factory with explicit timeouts
    pub fn new(discovery_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            discovery_timeout,
            request_timeout,
            bind_addr: None,
        }
    }

    /// Create a session factory from the renewal configuration
    pub fn from_config(config: &RenewalConfig) -> Self {
        Self::new(
            Duration::from_secs(config.discovery_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Restrict discovery to the interface owning `addr`
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    fn search_options(&self) -> SearchOptions {
        let mut options = SearchOptions {
            timeout: Some(self.discovery_timeout),
            ..Default::default()
        };
        if let Some(bind_addr) = self.bind_addr {
            options.bind_addr = bind_addr;
        }
        options
    }
}

#[async_trait]
impl GatewaySession for UpnpGateway {
    async fn open(&self) -> Result<Box<dyn GatewayHandle>> {
        debug!("Searching for UPnP gateway (timeout {:?})", self.discovery_timeout);

        let search = igd_next::aio::tokio::search_gateway(self.search_options());
        let gateway = match tokio::time::timeout(self.discovery_timeout + DISCOVERY_MARGIN, search)
            .await
        {
            Ok(Ok(gateway)) => gateway,
            Ok(Err(e)) => return Err(Error::gateway_unreachable(e.to_string())),
            Err(_) => {
                return Err(Error::gateway_unreachable(format!(
                    "discovery timed out after {:?}",
                    self.discovery_timeout
                )));
            }
        };

        let lan_addr = lan_addr_towards(gateway.addr).await?;
        info!("Found UPnP gateway at {} (LAN address {})", gateway.addr, lan_addr);

        Ok(Box::new(UpnpHandle {
            gateway,
            lan_addr,
            request_timeout: self.request_timeout,
        }))
    }
}

/// A live control channel to one discovered IGD
struct UpnpHandle {
    gateway: Gateway<Tokio>,
    lan_addr: IpAddr,
    request_timeout: Duration,
}

#[async_trait]
impl GatewayHandle for UpnpHandle {
    fn lan_addr(&self) -> IpAddr {
        self.lan_addr
    }

    fn gateway_addr(&self) -> SocketAddr {
        self.gateway.addr
    }

    async fn add_port_mapping(&self, request: &PortMappingRequest) -> Result<()> {
        let local_addr = SocketAddr::new(request.internal_client, request.internal_port);

        let call = self.gateway.add_port(
            igd_protocol(request.protocol),
            request.external_port,
            local_addr,
            request.lease_duration_secs,
            &request.description,
        );

        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::port_mapping(
                request.external_port,
                request.protocol,
                e.to_string(),
            )),
            Err(_) => Err(Error::port_mapping(
                request.external_port,
                request.protocol,
                format!("no answer within {:?}", self.request_timeout),
            )),
        }
    }
}

/// Map the core protocol onto the IGD wire protocol
pub fn igd_protocol(protocol: Protocol) -> PortMappingProtocol {
    match protocol {
        Protocol::Tcp => PortMappingProtocol::TCP,
        Protocol::Udp => PortMappingProtocol::UDP,
    }
}

/// The local address the OS would use to reach `gateway`
///
/// Connecting a UDP socket only selects a route; no packet is sent.
pub async fn lan_addr_towards(gateway: SocketAddr) -> Result<IpAddr> {
    let unspecified: IpAddr = match gateway {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };

    let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))
        .await
        .map_err(|e| Error::gateway_unreachable(format!("cannot open probe socket: {}", e)))?;
    socket
        .connect(gateway)
        .await
        .map_err(|e| Error::gateway_unreachable(format!("no route to {}: {}", gateway, e)))?;

    let local = socket
        .local_addr()
        .map_err(|e| Error::gateway_unreachable(format!("cannot read local address: {}", e)))?;

    Ok(local.ip())
}
