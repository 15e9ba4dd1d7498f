//! First-run service installation
//!
//! The installer runs once at process start, before the scheduler. The
//! descriptor artifact is the only idempotency flag:
//!
//! - Descriptor exists: no-op, the process is already supervised
//! - Descriptor missing: prepare the environment, write the descriptor,
//!   register and start the service
//!
//! Any failure during a first-time installation is fatal. A descriptor
//! written before registration failed is removed again so the next start
//! retries the installation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::traits::ServiceSupervisor;

/// Everything the supervisor needs to run the daemon
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service name (descriptor file stem)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Executable the supervisor starts
    pub executable: PathBuf,
    /// Delay before the supervisor restarts a crashed process (seconds)
    pub restart_delay_secs: u64,
    /// Environment the supervised process runs with
    ///
    /// Carries the daemon configuration, credentials included.
    pub environment: BTreeMap<String, String>,
}

// Environment values may hold credentials; only list the keys
impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("executable", &self.executable)
            .field("restart_delay_secs", &self.restart_delay_secs)
            .field("environment", &self.environment.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceDescriptor {
    /// Build a descriptor for `executable` from the service configuration
    pub fn new(config: &ServiceConfig, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            executable: executable.into(),
            restart_delay_secs: config.restart_delay_secs,
            environment: BTreeMap::new(),
        }
    }

    /// Attach environment variables for the supervised process
    pub fn with_environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Result of [`ServiceInstaller::ensure_installed()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Descriptor already present; nothing was done
    AlreadyInstalled,
    /// Fresh installation; the supervisor now runs the service
    Installed {
        /// Path of the written descriptor
        descriptor_path: PathBuf,
    },
}

/// Registers the daemon as a supervised OS service, once
pub struct ServiceInstaller {
    supervisor: Box<dyn ServiceSupervisor>,
    descriptor: ServiceDescriptor,
}

impl ServiceInstaller {
    /// Create a new installer
    pub fn new(supervisor: Box<dyn ServiceSupervisor>, descriptor: ServiceDescriptor) -> Self {
        Self {
            supervisor,
            descriptor,
        }
    }

    /// The descriptor that will be installed
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Install the service unless its descriptor already exists
    ///
    /// # Returns
    ///
    /// - `Ok(InstallOutcome::AlreadyInstalled)`: Nothing to do
    /// - `Ok(InstallOutcome::Installed { .. })`: Service registered and started
    /// - `Err(Error::InstallationFailed)`: Fatal; the caller must exit non-zero
    pub async fn ensure_installed(&self) -> Result<InstallOutcome> {
        let name = &self.descriptor.name;

        let installed = self
            .supervisor
            .is_installed(name)
            .await
            .map_err(|e| installation_error("checking for existing descriptor", e))?;

        if installed {
            info!("Service {} already installed", name);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        info!("=== Starting service setup for {} ===", name);

        let executable = self
            .supervisor
            .prepare_environment(&self.descriptor)
            .await
            .map_err(|e| installation_error("preparing environment", e))?;

        let descriptor = ServiceDescriptor {
            executable,
            ..self.descriptor.clone()
        };

        let descriptor_path = self
            .supervisor
            .write_descriptor(&descriptor)
            .await
            .map_err(|e| installation_error("writing descriptor", e))?;
        info!("Created service descriptor at {}", descriptor_path.display());

        if let Err(e) = self.supervisor.register_and_start(name).await {
            // Leave no descriptor behind, or the next start would skip installation
            if let Err(cleanup) = self.supervisor.remove_descriptor(name).await {
                warn!(
                    "Failed to remove descriptor {} after registration failure: {}",
                    descriptor_path.display(),
                    cleanup
                );
            }
            return Err(installation_error("registering service", e));
        }

        info!("Service {} installed and started", name);
        Ok(InstallOutcome::Installed { descriptor_path })
    }
}

fn installation_error(step: &str, err: Error) -> Error {
    error!("Service installation failed while {}: {}", step, err);
    match err {
        Error::InstallationFailed(msg) => Error::installation(format!("{}: {}", step, msg)),
        other => Error::installation(format!("{}: {}", step, other)),
    }
}
