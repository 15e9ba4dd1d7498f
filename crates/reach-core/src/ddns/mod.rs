//! Dynamic DNS update
//!
//! One update cycle is two dependent calls:
//!
//! 1. Ask the [`IpOracle`] for the current public IP
//! 2. Hand that IP to the [`DnsProvider`] for the configured hostname
//!
//! If step 1 fails there is nothing to push, so the whole cycle fails. A
//! disabled updater makes no calls at all and reports success.

use std::net::IpAddr;
use tracing::{debug, info};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpOracle, UpdateResult};

/// Outcome of a successful update cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdnsOutcome {
    /// DDNS is disabled; nothing was sent
    Disabled,
    /// Provider changed the record
    Updated {
        /// The pushed IP
        ip: IpAddr,
    },
    /// Provider already had this IP
    Unchanged {
        /// The pushed IP
        ip: IpAddr,
    },
}

/// Pushes the public IP to a dynamic-DNS provider
pub struct DdnsUpdater {
    config: DdnsConfig,
    backend: Option<(Box<dyn IpOracle>, Box<dyn DnsProvider>)>,
}

impl DdnsUpdater {
    /// Create an updater backed by `oracle` and `provider`
    pub fn new(config: DdnsConfig, oracle: Box<dyn IpOracle>, provider: Box<dyn DnsProvider>) -> Self {
        Self {
            config,
            backend: Some((oracle, provider)),
        }
    }

    /// Create an updater that never does anything
    pub fn disabled() -> Self {
        Self {
            config: DdnsConfig::default(),
            backend: None,
        }
    }

    /// Whether updates are sent at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.backend.is_some()
    }

    /// Hostname kept up to date
    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    /// Run one update cycle
    ///
    /// # Returns
    ///
    /// - `Ok(DdnsOutcome)`: Disabled, updated, or unchanged
    /// - `Err(Error::IpOracleFailed)`: Public IP could not be resolved
    /// - `Err(Error::DdnsProviderFailed)`: Provider rejected or failed the update
    pub async fn update(&self) -> Result<DdnsOutcome> {
        let (oracle, provider) = match &self.backend {
            Some(backend) if self.config.enabled => backend,
            _ => {
                debug!("DDNS disabled, skipping update");
                return Ok(DdnsOutcome::Disabled);
            }
        };

        let ip = oracle.current_ip().await.map_err(|e| match e {
            Error::IpOracleFailed(_) => e,
            other => Error::ip_oracle(other.to_string()),
        })?;
        debug!("Public IP from {}: {}", oracle.oracle_name(), ip);

        let result = provider
            .update_record(&self.config.hostname, ip)
            .await
            .map_err(|e| match e {
                Error::DdnsProviderFailed { .. } => e,
                other => Error::ddns_provider(provider.provider_name(), other.to_string()),
            })?;

        let outcome = match result {
            UpdateResult::Updated { new_ip } => {
                info!("DDNS {} -> {} (updated)", self.config.hostname, new_ip);
                DdnsOutcome::Updated { ip: new_ip }
            }
            UpdateResult::Unchanged { current_ip } => {
                info!("DDNS {} -> {} (no change)", self.config.hostname, current_ip);
                DdnsOutcome::Unchanged { ip: current_ip }
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct FixedOracle {
        ip: Option<IpAddr>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl IpOracle for FixedOracle {
        async fn current_ip(&self) -> Result<IpAddr> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ip.ok_or_else(|| Error::Other("connection refused".to_string()))
        }
    }

    struct EchoProvider {
        unchanged: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DnsProvider for EchoProvider {
        async fn update_record(&self, _hostname: &str, ip: IpAddr) -> Result<UpdateResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unchanged {
                Ok(UpdateResult::Unchanged { current_ip: ip })
            } else {
                Ok(UpdateResult::Updated { new_ip: ip })
            }
        }

        fn provider_name(&self) -> &'static str {
            "echo"
        }
    }

    fn config(enabled: bool) -> DdnsConfig {
        DdnsConfig {
            enabled,
            credential: "key".to_string(),
            hostname: "home.example.com".to_string(),
            ..DdnsConfig::default()
        }
    }

    fn build_updater(
        enabled: bool,
        ip: Option<IpAddr>,
        unchanged: bool,
    ) -> (DdnsUpdater, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let oracle_calls = Arc::new(AtomicUsize::new(0));
        let provider_calls = Arc::new(AtomicUsize::new(0));
        let updater = DdnsUpdater::new(
            config(enabled),
            Box::new(FixedOracle {
                ip,
                calls: Arc::clone(&oracle_calls),
            }),
            Box::new(EchoProvider {
                unchanged,
                calls: Arc::clone(&provider_calls),
            }),
        );
        (updater, oracle_calls, provider_calls)
    }

    #[tokio::test]
    async fn test_disabled_makes_no_calls() {
        let ip = IpAddr::from([203, 0, 113, 7]);
        let (updater, oracle_calls, provider_calls) = build_updater(false, Some(ip), false);

        let outcome = assert_ok!(updater.update().await);
        assert_eq!(outcome, DdnsOutcome::Disabled);
        assert_eq!(oracle_calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_constructor() {
        let updater = DdnsUpdater::disabled();
        assert!(!updater.is_enabled());
        assert_eq!(assert_ok!(updater.update().await), DdnsOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_updated_and_unchanged() {
        let ip = IpAddr::from([203, 0, 113, 7]);

        let (updater, _, _) = build_updater(true, Some(ip), false);
        assert_eq!(assert_ok!(updater.update().await), DdnsOutcome::Updated { ip });

        let (updater, _, _) = build_updater(true, Some(ip), true);
        assert_eq!(assert_ok!(updater.update().await), DdnsOutcome::Unchanged { ip });
    }

    #[tokio::test]
    async fn test_oracle_failure_skips_provider() {
        let (updater, oracle_calls, provider_calls) = build_updater(true, None, false);

        let err = assert_err!(updater.update().await);
        assert!(matches!(err, Error::IpOracleFailed(_)));
        assert_eq!(oracle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider_calls.load(Ordering::SeqCst), 0);
    }
}
