// # reachd - Reachability Daemon
//
// Keeps a device behind a consumer NAT router reachable from the internet:
// UPnP port leases are renewed on one period, the dynamic-DNS record on
// another, and on first start the daemon installs itself as a systemd
// service.
//
// This is a THIN integration layer: it reads configuration, wires the leaf
// crates into reach-core, and maps outcomes to exit codes. All scheduling,
// renewal, DDNS and installation logic lives in reach-core.
//
// ## Startup
//
// 1. Read and validate configuration (exit 1 on error)
// 2. Initialize logging
// 3. Check for root privilege when installation is enabled (exit 1)
// 4. Ensure the service is installed (exit 3 on failure)
//    - Already installed: continue to step 5
//    - Fresh install: systemd has just started the supervised instance, so
//      this process hands over and exits 0 without running the loop. Exit 0
//      here is success, not a crash; one instance runs per device
// 5. Run the scheduler until SIGTERM or SIGINT (exit 0)
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Ports
// - `REACH_PORTS`: Comma-separated `<port>/<tcp|udp>` list (default `8080/tcp,80/tcp,53/udp`)
// - `REACH_PORT_RENEWAL_INTERVAL_SECS`: Renewal period (default 1800)
// - `REACH_LEASE_DURATION_SECS`: Lease per mapping (default 3600)
// - `REACH_MAPPING_DESCRIPTION`: Description shown by the router
// - `REACH_DISCOVERY_TIMEOUT_SECS`, `REACH_REQUEST_TIMEOUT_SECS`: UPnP bounds
//
// ### Dynamic DNS
// - `REACH_DDNS_ENABLED`: true/false (default false)
// - `REACH_DDNS_CREDENTIAL`: Provider credential
// - `REACH_DDNS_HOSTNAME`: Hostname to keep updated
// - `REACH_DDNS_INTERVAL_SECS`: Update period (default 600)
// - `REACH_DDNS_UPDATE_URL`, `REACH_IP_ORACLE_URL`, `REACH_HTTP_TIMEOUT_SECS`
// - `REACH_MODE`: `live` (default) or `dry-run`
//
// ### Service
// - `REACH_INSTALL`: Install as a systemd service on start (default true)
// - `REACH_SERVICE_NAME`, `REACH_SERVICE_DIR`, `REACH_INSTALL_DIR`, `REACH_RESTART_DELAY_SECS`
//
// ### Daemon
// - `REACH_POLL_INTERVAL_SECS`: Scheduler tick (default 60)
// - `REACH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export REACH_PORTS=8080/tcp,80/tcp,53/udp
// export REACH_DDNS_ENABLED=true
// export REACH_DDNS_CREDENTIAL=your_api_key
// export REACH_DDNS_HOSTNAME=home.example.com
//
// sudo -E reachd
// ```

mod config;

use anyhow::Result;
use config::Config;
use reach_core::{
    DdnsUpdater, DualIntervalScheduler, InstallOutcome, ServiceDescriptor, ServiceInstaller,
};
use reach_gateway_upnp::UpnpGateway;
use reach_ip_http::HttpIpOracle;
use reach_provider_dyndns::DynDnsProvider;
use reach_supervisor_systemd::SystemdSupervisor;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown, or hand-over after a first-time install
/// - 1: Configuration or startup precondition error
/// - 2: Runtime error (unexpected)
/// - 3: Service installation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReachExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// First-time installation failed
    InstallError = 3,
}

impl From<ReachExitCode> for ExitCode {
    fn from(code: ReachExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ReachExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ReachExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&config.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReachExitCode::ConfigError.into();
    }

    info!("Starting reachd daemon");
    info!(
        "Configuration loaded: {} port(s), DDNS {}{}",
        config.reach.ports.len(),
        if config.reach.ddns.enabled { "enabled" } else { "disabled" },
        if config.reach.ddns.dry_run { " (dry-run)" } else { "" }
    );

    if config.reach.service.enabled && !is_root() {
        error!("reachd must run as root to install the service (set REACH_INSTALL=false to skip)");
        return ReachExitCode::ConfigError.into();
    }

    // One thread: the scheduler is the only task
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReachExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> ReachExitCode {
    if config.reach.service.enabled {
        if let Some(code) = install_exit(install_service(&config).await) {
            return code;
        }
    }

    let mut scheduler = match build_scheduler(&config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            return ReachExitCode::ConfigError;
        }
    };

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Failed to install signal handlers: {:#}", e);
            return ReachExitCode::RuntimeError;
        }
    };

    scheduler.run_until(shutdown).await;

    info!("Shutting down daemon");
    ReachExitCode::CleanShutdown
}

async fn install_service(config: &Config) -> Result<InstallOutcome> {
    let executable = std::env::current_exe()?;
    let descriptor = ServiceDescriptor::new(&config.reach.service, executable)
        .with_environment(config.environment.clone());

    let supervisor = SystemdSupervisor::from_config(&config.reach.service);
    let installer = ServiceInstaller::new(Box::new(supervisor), descriptor);

    Ok(installer.ensure_installed().await?)
}

/// Exit code for the install phase, or `None` to go on to the scheduler
fn install_exit(outcome: Result<InstallOutcome>) -> Option<ReachExitCode> {
    match outcome {
        Ok(InstallOutcome::AlreadyInstalled) => None,
        Ok(InstallOutcome::Installed { descriptor_path }) => {
            info!(
                "Installed {}; handing over to the supervised instance (exit 0)",
                descriptor_path.display()
            );
            Some(ReachExitCode::CleanShutdown)
        }
        Err(e) => {
            error!("Service installation failed: {:#}", e);
            Some(ReachExitCode::InstallError)
        }
    }
}

fn build_scheduler(config: &Config) -> Result<DualIntervalScheduler> {
    let reach = &config.reach;

    let gateway = UpnpGateway::from_config(&reach.renewal);

    let ddns = if reach.ddns.enabled {
        info!("DDNS hostname: {}", reach.ddns.hostname);
        DdnsUpdater::new(
            reach.ddns.clone(),
            Box::new(HttpIpOracle::from_config(&reach.ddns)?),
            Box::new(DynDnsProvider::from_config(&reach.ddns)?),
        )
    } else {
        DdnsUpdater::disabled()
    };

    for spec in &reach.ports {
        info!("Maintaining port mapping: {}", spec);
    }

    // Events are only for embedders and tests; the daemon logs instead
    let (scheduler, _events) = DualIntervalScheduler::new(Box::new(gateway), ddns, reach)?;
    Ok(scheduler)
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

/// Resolves on the first SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Resolves on Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
    })
}
