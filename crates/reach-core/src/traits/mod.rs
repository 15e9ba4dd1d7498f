//! Core traits for the reachability daemon
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`GatewaySession`] / [`GatewayHandle`]: Discover the NAT gateway and add port mappings
//! - [`IpOracle`]: Resolve the device's public IP address
//! - [`DnsProvider`]: Push an IP address to a dynamic-DNS provider
//! - [`ServiceSupervisor`]: Register the daemon with the OS process supervisor

pub mod gateway;
pub mod ip_oracle;
pub mod dns_provider;
pub mod supervisor;

pub use gateway::{GatewaySession, GatewayHandle, PortMappingRequest};
pub use ip_oracle::IpOracle;
pub use dns_provider::{DnsProvider, UpdateResult};
pub use supervisor::ServiceSupervisor;
