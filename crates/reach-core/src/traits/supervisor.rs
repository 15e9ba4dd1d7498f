// # Service Supervisor Trait
//
// Defines the interface to the OS facility that keeps the daemon running.
//
// ## Implementations
//
// - systemd: `reach-supervisor-systemd` crate

use async_trait::async_trait;
use std::path::PathBuf;

use crate::installer::ServiceDescriptor;

/// Trait for OS service supervisor backends
///
/// The descriptor artifact is the only installation state: if it exists the
/// service counts as installed.
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    /// Whether a descriptor for `service_name` already exists
    async fn is_installed(&self, service_name: &str) -> Result<bool, crate::Error>;

    /// Install whatever the service needs to run
    ///
    /// # Returns
    ///
    /// The executable path the descriptor must reference.
    async fn prepare_environment(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf, crate::Error>;

    /// Write the descriptor artifact
    ///
    /// # Returns
    ///
    /// Path of the written descriptor.
    async fn write_descriptor(&self, descriptor: &ServiceDescriptor) -> Result<PathBuf, crate::Error>;

    /// Register the service for boot and start it now
    async fn register_and_start(&self, service_name: &str) -> Result<(), crate::Error>;

    /// Remove the descriptor artifact
    async fn remove_descriptor(&self, service_name: &str) -> Result<(), crate::Error>;
}
