//! Port lease renewal
//!
//! The renewer takes one freshly opened gateway handle and re-creates every
//! configured mapping with a bounded lease. Each spec is attempted
//! independently: a rejected port is recorded and the loop moves on, so one
//! misbehaving port never blocks forwarding of the others.
//!
//! ## Lease Timing
//!
//! Mappings are requested with `lease_duration_secs` (3600 by default) and the
//! scheduler renews them every `interval_secs` (1800 by default), which the
//! configuration guarantees is strictly shorter than the lease.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{PortSpec, RenewalConfig};
use crate::traits::{GatewayHandle, PortMappingRequest};

/// Result of one mapping attempt
///
/// Created fresh every cycle and never mutated; the next cycle's record for
/// the same spec supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    /// The port spec that was attempted
    pub spec: PortSpec,
    /// Whether the gateway accepted the mapping
    pub success: bool,
    /// Failure detail when `success` is false
    pub error: Option<String>,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

impl LeaseRecord {
    fn succeeded(spec: PortSpec) -> Self {
        Self {
            spec,
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn failed(spec: PortSpec, error: impl Into<String>) -> Self {
        Self {
            spec,
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate outcome of one renewal cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Every spec was mapped
    AllSucceeded,
    /// Some specs were mapped, some failed
    Partial,
    /// No spec was mapped
    AllFailed,
    /// No specs configured
    Empty,
}

/// Per-spec records of one renewal cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalReport {
    /// One record per attempted spec, in configuration order
    pub records: Vec<LeaseRecord>,
}

impl RenewalReport {
    /// Specs the gateway accepted
    pub fn succeeded(&self) -> Vec<PortSpec> {
        self.records.iter().filter(|r| r.success).map(|r| r.spec).collect()
    }

    /// Specs the gateway did not accept
    pub fn failed(&self) -> Vec<PortSpec> {
        self.records.iter().filter(|r| !r.success).map(|r| r.spec).collect()
    }

    /// Classify the cycle
    pub fn outcome(&self) -> RenewalOutcome {
        let ok = self.records.iter().filter(|r| r.success).count();
        match (ok, self.records.len()) {
            (_, 0) => RenewalOutcome::Empty,
            (ok, total) if ok == total => RenewalOutcome::AllSucceeded,
            (0, _) => RenewalOutcome::AllFailed,
            _ => RenewalOutcome::Partial,
        }
    }

    /// Overall success is "any succeeded"
    pub fn is_success(&self) -> bool {
        self.records.iter().any(|r| r.success)
    }
}

/// Re-creates a fixed set of port mappings on a gateway
#[derive(Debug, Clone)]
pub struct PortLeaseRenewer {
    specs: Vec<PortSpec>,
    description: String,
    lease_duration_secs: u32,
}

impl PortLeaseRenewer {
    /// Create a renewer for `specs`
    pub fn new(specs: Vec<PortSpec>, config: &RenewalConfig) -> Self {
        Self {
            specs,
            description: config.description.clone(),
            lease_duration_secs: config.lease_duration_secs,
        }
    }

    /// Configured specs
    pub fn specs(&self) -> &[PortSpec] {
        &self.specs
    }

    /// Renew every spec through `handle`
    ///
    /// The handle is consumed: it is dropped when the cycle ends and never
    /// reused by a later one.
    pub async fn renew(&self, handle: Box<dyn GatewayHandle>) -> RenewalReport {
        let lan_addr = handle.lan_addr();
        debug!(
            "Renewing {} mapping(s) via gateway {} for {}",
            self.specs.len(),
            handle.gateway_addr(),
            lan_addr
        );

        let mut records = Vec::with_capacity(self.specs.len());

        for spec in &self.specs {
            let request = PortMappingRequest::for_spec(
                *spec,
                lan_addr,
                self.description.clone(),
                self.lease_duration_secs,
            );

            match handle.add_port_mapping(&request).await {
                Ok(()) => {
                    info!("Forwarded {} -> {}:{}", spec, lan_addr, spec.port);
                    records.push(LeaseRecord::succeeded(*spec));
                }
                Err(e) => {
                    // Continue with the remaining specs
                    warn!("Port {} error: {}", spec, e);
                    records.push(LeaseRecord::failed(*spec, e.to_string()));
                }
            }
        }

        let report = RenewalReport { records };
        log_report(&report);
        report
    }
}

fn log_report(report: &RenewalReport) {
    let total = report.records.len();
    let ok = report.succeeded().len();

    match report.outcome() {
        RenewalOutcome::AllSucceeded => {
            info!("Port renewal successful ({}/{})", ok, total);
        }
        RenewalOutcome::Partial => {
            let failed: Vec<String> = report.failed().iter().map(ToString::to_string).collect();
            warn!(
                "Partial port renewal failure ({}/{}); failed: {}",
                ok,
                total,
                failed.join(", ")
            );
        }
        RenewalOutcome::AllFailed => {
            error!("Port renewal failed for all {} mapping(s)", total);
        }
        RenewalOutcome::Empty => {
            debug!("No ports configured, nothing renewed");
        }
    }
}
