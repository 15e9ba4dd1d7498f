//! Contract Test: Install Idempotency
//!
//! Constraints verified:
//! - First run performs the full installation exactly once
//! - Any later run is a no-op once the descriptor exists
//! - Installation failures are fatal
//! - A failed registration leaves no descriptor, so the next run retries

mod common;

use common::*;
use reach_core::config::ServiceConfig;
use reach_core::{Error, InstallOutcome, ServiceDescriptor, ServiceInstaller};
use std::path::PathBuf;

fn installer(supervisor: &RecordingSupervisor) -> ServiceInstaller {
    let descriptor = ServiceDescriptor::new(&ServiceConfig::default(), "/home/pi/reachd")
        .with_environment([("REACH_PORTS", "8080/tcp,80/tcp,53/udp")]);
    ServiceInstaller::new(Box::new(supervisor.clone()), descriptor)
}

#[tokio::test]
async fn first_run_installs_then_second_run_is_noop() {
    let supervisor = RecordingSupervisor::new();
    let installer = installer(&supervisor);

    let outcome = installer.ensure_installed().await.expect("install succeeds");
    assert_eq!(
        outcome,
        InstallOutcome::Installed {
            descriptor_path: PathBuf::from("/etc/systemd/system/auto_upnp_ddns_service.service"),
        }
    );
    assert_eq!(
        supervisor.calls(),
        vec![
            "is_installed",
            "prepare_environment",
            "write_descriptor",
            "register_and_start",
        ]
    );

    supervisor.clear_calls();
    let outcome = installer.ensure_installed().await.expect("second run succeeds");
    assert_eq!(outcome, InstallOutcome::AlreadyInstalled);
    assert_eq!(supervisor.calls(), vec!["is_installed"]);
}

#[tokio::test]
async fn descriptor_points_at_prepared_executable() {
    let supervisor = RecordingSupervisor::new();
    installer(&supervisor).ensure_installed().await.unwrap();

    let written = supervisor.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].executable, PathBuf::from("/usr/local/bin/reachd"));
    assert_eq!(
        written[0].environment.get("REACH_PORTS").map(String::as_str),
        Some("8080/tcp,80/tcp,53/udp")
    );
}

#[tokio::test]
async fn registration_failure_is_fatal_and_rolled_back() {
    let supervisor = RecordingSupervisor::new();
    supervisor.set_fail_register(true);
    let installer = installer(&supervisor);

    let err = installer.ensure_installed().await.unwrap_err();
    assert!(matches!(err, Error::InstallationFailed(_)));
    assert!(err.is_fatal());
    assert!(!supervisor.has_descriptor("auto_upnp_ddns_service"));
    assert_eq!(supervisor.calls().last().map(String::as_str), Some("remove_descriptor"));

    // Next start retries the whole installation
    supervisor.set_fail_register(false);
    supervisor.clear_calls();
    let outcome = installer.ensure_installed().await.unwrap();
    assert!(matches!(outcome, InstallOutcome::Installed { .. }));
    assert!(supervisor.calls().contains(&"register_and_start".to_string()));
}

#[tokio::test]
async fn environment_failure_writes_no_descriptor() {
    let supervisor = RecordingSupervisor::new();
    supervisor.set_fail_prepare(true);

    let err = installer(&supervisor).ensure_installed().await.unwrap_err();

    assert!(matches!(err, Error::InstallationFailed(_)));
    assert!(err.to_string().contains("preparing environment"));
    assert!(!supervisor.has_descriptor("auto_upnp_ddns_service"));
    assert!(!supervisor.calls().contains(&"write_descriptor".to_string()));
}
