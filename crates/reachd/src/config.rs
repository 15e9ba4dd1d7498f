// Daemon configuration from environment variables

use anyhow::{Context, Result};
use reach_core::config::{PortSpec, ReachConfig};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Every variable the daemon reads
///
/// The ones that are set get copied into the service descriptor, so the
/// supervised instance runs with the configuration that installed it.
pub const ENV_VARS: &[&str] = &[
    "REACH_PORTS",
    "REACH_PORT_RENEWAL_INTERVAL_SECS",
    "REACH_LEASE_DURATION_SECS",
    "REACH_MAPPING_DESCRIPTION",
    "REACH_DISCOVERY_TIMEOUT_SECS",
    "REACH_REQUEST_TIMEOUT_SECS",
    "REACH_DDNS_ENABLED",
    "REACH_DDNS_CREDENTIAL",
    "REACH_DDNS_HOSTNAME",
    "REACH_DDNS_INTERVAL_SECS",
    "REACH_DDNS_UPDATE_URL",
    "REACH_IP_ORACLE_URL",
    "REACH_HTTP_TIMEOUT_SECS",
    "REACH_MODE",
    "REACH_POLL_INTERVAL_SECS",
    "REACH_INSTALL",
    "REACH_SERVICE_NAME",
    "REACH_SERVICE_DIR",
    "REACH_INSTALL_DIR",
    "REACH_RESTART_DELAY_SECS",
    "REACH_LOG_LEVEL",
];

/// Application configuration
pub struct Config {
    /// Core configuration handed to the scheduler and installer
    pub reach: ReachConfig,

    /// Maximum log level
    pub log_level: String,

    /// The `REACH_*` variables that were set, for the service descriptor
    pub environment: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`
    ///
    /// Unset variables keep their defaults; set but unparseable ones are
    /// errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut reach = ReachConfig::default();

        if let Some(ports) = lookup("REACH_PORTS") {
            reach.ports = PortSpec::parse_list(&ports).context("REACH_PORTS")?;
        }

        set(&lookup, "REACH_PORT_RENEWAL_INTERVAL_SECS", &mut reach.renewal.interval_secs)?;
        set(&lookup, "REACH_LEASE_DURATION_SECS", &mut reach.renewal.lease_duration_secs)?;
        if let Some(description) = lookup("REACH_MAPPING_DESCRIPTION") {
            reach.renewal.description = description;
        }
        set(&lookup, "REACH_DISCOVERY_TIMEOUT_SECS", &mut reach.renewal.discovery_timeout_secs)?;
        set(&lookup, "REACH_REQUEST_TIMEOUT_SECS", &mut reach.renewal.request_timeout_secs)?;

        if let Some(enabled) = lookup("REACH_DDNS_ENABLED") {
            reach.ddns.enabled = parse_bool("REACH_DDNS_ENABLED", &enabled)?;
        }
        if let Some(credential) = lookup("REACH_DDNS_CREDENTIAL") {
            reach.ddns.credential = credential;
        }
        if let Some(hostname) = lookup("REACH_DDNS_HOSTNAME") {
            reach.ddns.hostname = hostname.trim().to_string();
        }
        set(&lookup, "REACH_DDNS_INTERVAL_SECS", &mut reach.ddns.interval_secs)?;
        if let Some(url) = lookup("REACH_DDNS_UPDATE_URL") {
            reach.ddns.update_url = url;
        }
        if let Some(url) = lookup("REACH_IP_ORACLE_URL") {
            reach.ddns.ip_oracle_url = url;
        }
        set(&lookup, "REACH_HTTP_TIMEOUT_SECS", &mut reach.ddns.http_timeout_secs)?;

        reach.ddns.dry_run = match lookup("REACH_MODE").as_deref().map(str::to_lowercase) {
            None => false,
            Some(mode) if mode == "live" => false,
            Some(mode) if mode == "dry-run" || mode == "dry_run" => true,
            Some(mode) => anyhow::bail!(
                "REACH_MODE '{}' is not valid. Valid modes: live, dry-run",
                mode
            ),
        };

        set(&lookup, "REACH_POLL_INTERVAL_SECS", &mut reach.scheduler.poll_interval_secs)?;

        if let Some(install) = lookup("REACH_INSTALL") {
            reach.service.enabled = parse_bool("REACH_INSTALL", &install)?;
        }
        if let Some(name) = lookup("REACH_SERVICE_NAME") {
            reach.service.name = name;
        }
        if let Some(dir) = lookup("REACH_SERVICE_DIR") {
            reach.service.unit_dir = dir;
        }
        if let Some(dir) = lookup("REACH_INSTALL_DIR") {
            reach.service.install_dir = dir;
        }
        set(&lookup, "REACH_RESTART_DELAY_SECS", &mut reach.service.restart_delay_secs)?;

        let environment = ENV_VARS
            .iter()
            .filter_map(|name| lookup(name).map(|value| (name.to_string(), value)))
            .collect();

        Ok(Self {
            reach,
            log_level: lookup("REACH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            environment,
        })
    }

    /// Validate the configuration
    ///
    /// Runs the core validation, then the checks only the daemon cares
    /// about: hostname syntax, service name, log level.
    pub fn validate(&self) -> Result<()> {
        self.reach.validate()?;

        let ddns = &self.reach.ddns;
        if ddns.enabled {
            validate_domain_name(&ddns.hostname)?;

            if ddns.update_url.starts_with("http://") {
                // Logging is not up yet
                eprintln!(
                    "WARNING: REACH_DDNS_UPDATE_URL uses HTTP (not HTTPS). \
                    The DDNS credential will be sent in clear text."
                );
            }
        }

        let name = &self.reach.service.name;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
        {
            anyhow::bail!(
                "REACH_SERVICE_NAME '{}' is not a valid unit name. \
                Valid: ASCII alphanumerics and _-.@",
                name
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "REACH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn set<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", name, raw, e))?;
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: '{}'", name, raw),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common mistakes, not every invalid name.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // RFC 1035: 253 chars max
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}
