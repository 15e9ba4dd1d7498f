//! Error types for the reachability daemon
//!
//! Every steady-state failure has its own variant so the scheduler can log
//! which dependency broke. Only [`Error::InstallationFailed`] and
//! [`Error::Config`] are meant to end the process.

use crate::config::Protocol;
use thiserror::Error;

/// Result type alias for reachability operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reachability daemon
#[derive(Error, Debug)]
pub enum Error {
    /// No gateway found, discovery timed out, or the control session failed
    #[error("Gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// The gateway refused or failed a single port mapping
    #[error("Port mapping {port}/{protocol} failed: {message}")]
    PortMappingFailed {
        /// External port of the failed mapping
        port: u16,
        /// Protocol of the failed mapping
        protocol: Protocol,
        /// Error message
        message: String,
    },

    /// The public IP oracle could not be queried
    #[error("IP oracle failed: {0}")]
    IpOracleFailed(String),

    /// The dynamic-DNS provider rejected or failed the update
    #[error("DDNS provider error ({provider}): {message}")]
    DdnsProviderFailed {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// First-time service installation failed
    #[error("Installation failed: {0}")]
    InstallationFailed(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a gateway unreachable error
    pub fn gateway_unreachable(msg: impl Into<String>) -> Self {
        Self::GatewayUnreachable(msg.into())
    }

    /// Create a port mapping error for one spec
    pub fn port_mapping(port: u16, protocol: Protocol, message: impl Into<String>) -> Self {
        Self::PortMappingFailed {
            port,
            protocol,
            message: message.into(),
        }
    }

    /// Create an IP oracle error
    pub fn ip_oracle(msg: impl Into<String>) -> Self {
        Self::IpOracleFailed(msg.into())
    }

    /// Create a DDNS provider error
    pub fn ddns_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DdnsProviderFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an installation error
    pub fn installation(msg: impl Into<String>) -> Self {
        Self::InstallationFailed(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error must end the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InstallationFailed(_) | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
