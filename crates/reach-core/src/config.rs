//! Configuration types for the reachability daemon
//!
//! All configuration is assembled once at startup and validated before any
//! network activity. There is no hot reload.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Transport protocol of a port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP
    #[serde(alias = "tcp")]
    Tcp,
    /// UDP
    #[serde(alias = "udp")]
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

impl FromStr for Protocol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(crate::Error::config(format!(
                "Unknown protocol '{}'. Supported: tcp, udp",
                other
            ))),
        }
    }
}

/// A port to forward from the gateway to this device
///
/// Identity is the `(port, protocol)` pair. The external and internal port
/// are always the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port number (external and internal)
    pub port: u16,
    /// Transport protocol
    pub protocol: Protocol,
}

impl PortSpec {
    /// Create a new port spec
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }

    /// TCP shorthand
    pub fn tcp(port: u16) -> Self {
        Self::new(port, Protocol::Tcp)
    }

    /// UDP shorthand
    pub fn udp(port: u16) -> Self {
        Self::new(port, Protocol::Udp)
    }

    /// Parse a comma-separated list such as `8080/tcp,80/tcp,53/udp`
    ///
    /// Empty entries are ignored, so an empty string yields an empty list.
    pub fn parse_list(list: &str) -> Result<Vec<PortSpec>, crate::Error> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

impl FromStr for PortSpec {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, protocol) = s.trim().split_once('/').ok_or_else(|| {
            crate::Error::config(format!(
                "Invalid port spec '{}'. Expected <port>/<tcp|udp>",
                s
            ))
        })?;

        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| crate::Error::config(format!("Invalid port number in '{}'", s)))?;

        if port == 0 {
            return Err(crate::Error::config(format!("Port 0 is not forwardable: '{}'", s)));
        }

        Ok(Self::new(port, protocol.parse()?))
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachConfig {
    /// Ports to keep forwarded on the gateway
    #[serde(default = "default_ports")]
    pub ports: Vec<PortSpec>,

    /// Port lease renewal settings
    #[serde(default)]
    pub renewal: RenewalConfig,

    /// Dynamic DNS settings
    #[serde(default)]
    pub ddns: DdnsConfig,

    /// Scheduler loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Service installation settings
    #[serde(default)]
    pub service: ServiceConfig,
}

impl ReachConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            ports: default_ports(),
            renewal: RenewalConfig::default(),
            ddns: DdnsConfig::default(),
            scheduler: SchedulerConfig::default(),
            service: ServiceConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ports.is_empty() && !self.ddns.enabled {
            return Err(crate::Error::config(
                "No ports configured and DDNS disabled: nothing to maintain",
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.ports {
            if spec.port == 0 {
                return Err(crate::Error::config("Port 0 is not forwardable"));
            }
            if !seen.insert(*spec) {
                return Err(crate::Error::config(format!("Duplicate port spec: {}", spec)));
            }
        }

        self.renewal.validate()?;
        self.ddns.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

impl Default for ReachConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Port lease renewal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalConfig {
    /// Seconds between renewal cycles
    ///
    /// Must be strictly shorter than the lease so mappings never lapse.
    #[serde(default = "default_renewal_interval_secs")]
    pub interval_secs: u64,

    /// Lease lifetime requested for every mapping (seconds)
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u32,

    /// Mapping description shown in the router UI
    #[serde(default = "default_mapping_description")]
    pub description: String,

    /// Upper bound on gateway discovery (seconds)
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Upper bound on a single AddPortMapping call (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RenewalConfig {
    /// Renewal period as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the renewal configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.lease_duration_secs == 0 {
            return Err(crate::Error::config("Lease duration must be > 0"));
        }
        if self.interval_secs == 0 || self.interval_secs >= u64::from(self.lease_duration_secs) {
            return Err(crate::Error::config(format!(
                "Port renewal interval ({}s) must be > 0 and shorter than the lease ({}s)",
                self.interval_secs, self.lease_duration_secs
            )));
        }
        if !(1..=10).contains(&self.discovery_timeout_secs) {
            return Err(crate::Error::config(format!(
                "Discovery timeout must be between 1 and 10 seconds. Got: {}",
                self.discovery_timeout_secs
            )));
        }
        if !(1..=10).contains(&self.request_timeout_secs) {
            return Err(crate::Error::config(format!(
                "Mapping request timeout must be between 1 and 10 seconds. Got: {}",
                self.request_timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_renewal_interval_secs(),
            lease_duration_secs: default_lease_duration_secs(),
            description: default_mapping_description(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Dynamic DNS configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Whether the DDNS task does anything at all
    #[serde(default)]
    pub enabled: bool,

    /// Provider credential, sent as the `username` parameter
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub credential: String,

    /// Hostname bound to the public IP
    #[serde(default)]
    pub hostname: String,

    /// Seconds between DDNS updates
    #[serde(default = "default_ddns_interval_secs")]
    pub interval_secs: u64,

    /// Provider update endpoint
    #[serde(default = "default_update_url")]
    pub update_url: String,

    /// Public IP oracle endpoint
    #[serde(default = "default_ip_oracle_url")]
    pub ip_oracle_url: String,

    /// Upper bound on each HTTP call (seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Resolve the IP and log the intended update without sending it
    #[serde(default)]
    pub dry_run: bool,
}

// Custom Debug implementation that hides the credential
impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("enabled", &self.enabled)
            .field("credential", &"<REDACTED>")
            .field("hostname", &self.hostname)
            .field("interval_secs", &self.interval_secs)
            .field("update_url", &self.update_url)
            .field("ip_oracle_url", &self.ip_oracle_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DdnsConfig {
    /// DDNS period as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// HTTP timeout as a duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validate the DDNS configuration
    ///
    /// A disabled configuration is always valid.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.enabled {
            return Ok(());
        }
        if self.hostname.trim().is_empty() {
            return Err(crate::Error::config("DDNS hostname cannot be empty when DDNS is enabled"));
        }
        if self.credential.is_empty() {
            return Err(crate::Error::config("DDNS credential cannot be empty when DDNS is enabled"));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("DDNS interval must be > 0"));
        }
        for (name, url) in [("update URL", &self.update_url), ("IP oracle URL", &self.ip_oracle_url)] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "DDNS {} must use HTTP or HTTPS scheme. Got: {}",
                    name, url
                )));
            }
        }
        if !(1..=10).contains(&self.http_timeout_secs) {
            return Err(crate::Error::config(format!(
                "HTTP timeout must be between 1 and 10 seconds. Got: {}",
                self.http_timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for DdnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credential: String::new(),
            hostname: String::new(),
            interval_secs: default_ddns_interval_secs(),
            update_url: default_update_url(),
            ip_oracle_url: default_ip_oracle_url(),
            http_timeout_secs: default_http_timeout_secs(),
            dry_run: false,
        }
    }
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick granularity (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Tick granularity as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Scheduler poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Service installation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Run the installer at startup
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Service name (descriptor file stem)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Human-readable description
    #[serde(default = "default_service_description")]
    pub description: String,

    /// Directory holding service descriptors
    #[serde(default = "default_unit_dir")]
    pub unit_dir: String,

    /// Directory the executable is installed into
    #[serde(default = "default_install_dir")]
    pub install_dir: String,

    /// Supervisor restart backoff (seconds)
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            name: default_service_name(),
            description: default_service_description(),
            unit_dir: default_unit_dir(),
            install_dir: default_install_dir(),
            restart_delay_secs: default_restart_delay_secs(),
        }
    }
}

fn default_ports() -> Vec<PortSpec> {
    vec![PortSpec::tcp(8080), PortSpec::tcp(80), PortSpec::udp(53)]
}

fn default_renewal_interval_secs() -> u64 {
    1800
}

fn default_lease_duration_secs() -> u32 {
    3600
}

fn default_mapping_description() -> String {
    "Auto-UPnP-Service".to_string()
}

fn default_discovery_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_ddns_interval_secs() -> u64 {
    600
}

fn default_update_url() -> String {
    "https://api.dynu.com/nic/update".to_string()
}

fn default_ip_oracle_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_enabled() -> bool {
    true
}

fn default_service_name() -> String {
    "auto_upnp_ddns_service".to_string()
}

fn default_service_description() -> String {
    "Auto UPnP Port Forwarding + Dynamic DNS".to_string()
}

fn default_unit_dir() -> String {
    "/etc/systemd/system".to_string()
}

fn default_install_dir() -> String {
    "/usr/local/bin".to_string()
}

fn default_restart_delay_secs() -> u64 {
    60
}
