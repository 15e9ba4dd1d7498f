// # reach-core
//
// Core library for the reachability daemon.
//
// ## Architecture Overview
//
// The library keeps a device behind a home router reachable from the public
// internet. It owns all decisions; every external collaborator sits behind a
// trait:
// - **GatewaySession**: Discover the local NAT gateway and open a control handle
// - **IpOracle**: Resolve the device's public IP address
// - **DnsProvider**: Push the public IP to a dynamic-DNS provider
// - **ServiceSupervisor**: Register the daemon with the OS process supervisor
//
// On top of those seams:
// - **PortLeaseRenewer**: Re-creates every configured port mapping, isolating failures per port
// - **DdnsUpdater**: One oracle lookup plus one provider update per cycle
// - **DualIntervalScheduler**: Single loop driving both periodic tasks
// - **ServiceInstaller**: Idempotent first-run installation as a supervised service
//
// ## Design Principles
//
// 1. **Library-First**: The daemon is a thin shell around this crate
// 2. **Scheduler-Owned Retries**: Collaborators never retry; failures wait for the next period
// 3. **No Cached Sessions**: A gateway handle lives for exactly one renewal cycle
// 4. **Single Thread of Control**: The two periodic tasks never run concurrently

pub mod traits;
pub mod renewer;
pub mod ddns;
pub mod scheduler;
pub mod installer;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{
    DnsProvider, GatewayHandle, GatewaySession, IpOracle, PortMappingRequest, ServiceSupervisor,
    UpdateResult,
};
pub use renewer::{LeaseRecord, PortLeaseRenewer, RenewalOutcome, RenewalReport};
pub use ddns::{DdnsOutcome, DdnsUpdater};
pub use scheduler::{
    DualIntervalScheduler, PortRenewalOutcome, ScheduleState, SchedulerEvent, TickReport,
};
pub use installer::{InstallOutcome, ServiceDescriptor, ServiceInstaller};
pub use config::{
    DdnsConfig, PortSpec, Protocol, ReachConfig, RenewalConfig, SchedulerConfig, ServiceConfig,
};
pub use error::{Error, Result};
