//! Test doubles and common utilities for contract tests
//!
//! The doubles share their counters through `Arc`s, so a test keeps a clone
//! and the scheduler or installer owns the boxed original.

#![allow(dead_code)]

use reach_core::config::{DdnsConfig, PortSpec, ReachConfig};
use reach_core::error::{Error, Result};
use reach_core::installer::ServiceDescriptor;
use reach_core::traits::{
    DnsProvider, GatewayHandle, GatewaySession, IpOracle, PortMappingRequest, ServiceSupervisor,
    UpdateResult,
};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LAN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
pub const PUBLIC_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

/// A gateway whose behaviour the test can change between ticks
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    unreachable: Arc<AtomicBool>,
    rejected: Arc<Mutex<HashSet<PortSpec>>>,
    open_count: Arc<AtomicUsize>,
    live_handles: Arc<AtomicUsize>,
    max_live_handles: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<PortMappingRequest>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make discovery fail (or succeed again)
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make the gateway reject exactly these specs
    pub fn reject(&self, specs: &[PortSpec]) {
        *self.rejected.lock().unwrap() = specs.iter().copied().collect();
    }

    /// Number of times open() was called
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Highest number of handles alive at the same time
    pub fn max_live_handles(&self) -> usize {
        self.max_live_handles.load(Ordering::SeqCst)
    }

    /// Handles not yet dropped
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Every mapping request received so far
    pub fn requests(&self) -> Vec<PortMappingRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Specs requested so far, in order
    pub fn requested_specs(&self) -> Vec<PortSpec> {
        self.requests().iter().map(PortMappingRequest::spec).collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl GatewaySession for ScriptedGateway {
    async fn open(&self) -> Result<Box<dyn GatewayHandle>> {
        self.open_count.fetch_add(1, Ordering::SeqCst);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::gateway_unreachable("no IGD responded"));
        }

        let live = self.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_handles.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(ScriptedHandle {
            gateway: self.clone(),
        }))
    }
}

struct ScriptedHandle {
    gateway: ScriptedGateway,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.gateway.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl GatewayHandle for ScriptedHandle {
    fn lan_addr(&self) -> IpAddr {
        LAN_ADDR
    }

    fn gateway_addr(&self) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 1], 5000))
    }

    async fn add_port_mapping(&self, request: &PortMappingRequest) -> Result<()> {
        self.gateway.requests.lock().unwrap().push(request.clone());

        if self.gateway.rejected.lock().unwrap().contains(&request.spec()) {
            return Err(Error::port_mapping(
                request.external_port,
                request.protocol,
                "718 ConflictInMappingEntry",
            ));
        }
        Ok(())
    }
}

/// An IP oracle that counts calls and can be made to fail
#[derive(Clone)]
pub struct CountingOracle {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl CountingOracle {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpOracle for CountingOracle {
    async fn current_ip(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ip_oracle("Request failed: connection refused"));
        }
        Ok(PUBLIC_IP)
    }

    fn oracle_name(&self) -> &str {
        "counting"
    }
}

/// A DNS provider that records every update
#[derive(Clone)]
pub struct MockDnsProvider {
    updates: Arc<Mutex<Vec<(String, IpAddr)>>>,
    /// Simulated provider delay
    delay: Duration,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            updates: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn updates(&self) -> Vec<(String, IpAddr)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn update_record(&self, hostname: &str, ip: IpAddr) -> Result<UpdateResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.updates
            .lock()
            .unwrap()
            .push((hostname.to_string(), ip));
        Ok(UpdateResult::Updated { new_ip: ip })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A supervisor backed by an in-memory "filesystem"
#[derive(Clone, Default)]
pub struct RecordingSupervisor {
    descriptors: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    written: Arc<Mutex<Vec<ServiceDescriptor>>>,
    fail_register: Arc<AtomicBool>,
    fail_prepare: Arc<AtomicBool>,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_prepare(&self, fail: bool) {
        self.fail_prepare.store(fail, Ordering::SeqCst);
    }

    /// Names of every supervisor call, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn has_descriptor(&self, name: &str) -> bool {
        self.descriptors.lock().unwrap().contains(name)
    }

    pub fn written(&self) -> Vec<ServiceDescriptor> {
        self.written.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl ServiceSupervisor for RecordingSupervisor {
    async fn is_installed(&self, service_name: &str) -> Result<bool> {
        self.record("is_installed");
        Ok(self.has_descriptor(service_name))
    }

    async fn prepare_environment(&self, _descriptor: &ServiceDescriptor) -> Result<PathBuf> {
        self.record("prepare_environment");
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "cannot write install dir",
            )));
        }
        Ok(PathBuf::from("/usr/local/bin/reachd"))
    }

    async fn write_descriptor(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf> {
        self.record("write_descriptor");
        self.descriptors
            .lock()
            .unwrap()
            .insert(descriptor.name.clone());
        self.written.lock().unwrap().push(descriptor.clone());
        Ok(PathBuf::from(format!(
            "/etc/systemd/system/{}.service",
            descriptor.name
        )))
    }

    async fn register_and_start(&self, _service_name: &str) -> Result<()> {
        self.record("register_and_start");
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Error::installation("systemctl enable exited with status 1"));
        }
        Ok(())
    }

    async fn remove_descriptor(&self, service_name: &str) -> Result<()> {
        self.record("remove_descriptor");
        self.descriptors.lock().unwrap().remove(service_name);
        Ok(())
    }
}

/// The three-port configuration used throughout the contract tests
pub fn three_port_config() -> ReachConfig {
    let mut config = ReachConfig::default();
    config.ports = vec![PortSpec::tcp(8080), PortSpec::tcp(80), PortSpec::udp(53)];
    config.renewal.interval_secs = 1800;
    config.ddns = enabled_ddns_config();
    config
}

pub fn enabled_ddns_config() -> DdnsConfig {
    DdnsConfig {
        enabled: true,
        credential: "test-credential".to_string(),
        hostname: "home.example.com".to_string(),
        interval_secs: 600,
        ..DdnsConfig::default()
    }
}
