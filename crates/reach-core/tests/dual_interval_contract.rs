//! Contract Test: Dual-Interval Scheduling
//!
//! Constraints verified:
//! - The first tick runs both tasks exactly once
//! - Neither task runs before its full period has elapsed
//! - A failure in one task never delays or suppresses the other
//! - Failed cycles still advance their mark (no immediate retry)

mod common;

use common::*;
use reach_core::scheduler::PortRenewalOutcome;
use reach_core::{DdnsOutcome, DdnsUpdater, DualIntervalScheduler, ReachConfig};
use std::time::Duration;
use tokio::time::Instant;

fn scheduler_with(
    gateway: &ScriptedGateway,
    oracle: &CountingOracle,
    provider: &MockDnsProvider,
    config: &ReachConfig,
) -> DualIntervalScheduler {
    let updater = DdnsUpdater::new(
        config.ddns.clone(),
        Box::new(oracle.clone()),
        Box::new(provider.clone()),
    );
    let (scheduler, _events) =
        DualIntervalScheduler::new(Box::new(gateway.clone()), updater, config)
            .expect("scheduler construction succeeds");
    scheduler
}

#[tokio::test]
async fn first_tick_runs_both_tasks_once() {
    let gateway = ScriptedGateway::new();
    let oracle = CountingOracle::new();
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &three_port_config());

    let report = scheduler.tick(Instant::now()).await;

    assert!(matches!(report.port_renewal, Some(PortRenewalOutcome::Renewed(_))));
    assert_eq!(
        report.ddns_update,
        Some(Ok(DdnsOutcome::Updated { ip: PUBLIC_IP }))
    );
    assert_eq!(gateway.open_count(), 1);
    assert_eq!(oracle.calls(), 1);
    assert_eq!(
        provider.updates(),
        vec![("home.example.com".to_string(), PUBLIC_IP)]
    );
}

#[tokio::test]
async fn tasks_never_run_before_their_period() {
    let gateway = ScriptedGateway::new();
    let oracle = CountingOracle::new();
    let provider = MockDnsProvider::new();
    let config = three_port_config();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &config);

    // One hour of 60 s ticks: ports every 1800 s, DDNS every 600 s
    let t0 = Instant::now();
    for minute in 0..60u64 {
        scheduler.tick(t0 + Duration::from_secs(minute * 60)).await;
    }

    assert_eq!(gateway.open_count(), 2, "port renewals at 0 s and 1800 s only");
    assert_eq!(provider.update_count(), 6, "DDNS updates every 600 s");
}

#[tokio::test]
async fn unreachable_gateway_does_not_block_ddns() {
    let gateway = ScriptedGateway::new();
    gateway.set_unreachable(true);
    let oracle = CountingOracle::new();
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &three_port_config());

    let report = scheduler.tick(Instant::now()).await;

    assert!(matches!(
        report.port_renewal,
        Some(PortRenewalOutcome::GatewayUnreachable(_))
    ));
    assert!(matches!(report.ddns_update, Some(Ok(DdnsOutcome::Updated { .. }))));
    assert_eq!(provider.update_count(), 1);
}

#[tokio::test]
async fn ddns_failure_does_not_block_port_renewal() {
    let gateway = ScriptedGateway::new();
    let oracle = CountingOracle::new();
    oracle.set_failing(true);
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &three_port_config());

    let report = scheduler.tick(Instant::now()).await;

    assert!(matches!(report.port_renewal, Some(PortRenewalOutcome::Renewed(_))));
    assert!(matches!(report.ddns_update, Some(Err(_))));
    assert_eq!(gateway.requests().len(), 3);
    assert_eq!(provider.update_count(), 0, "no IP means nothing to push");
}

#[tokio::test]
async fn failed_cycles_wait_a_full_period() {
    let gateway = ScriptedGateway::new();
    gateway.set_unreachable(true);
    let oracle = CountingOracle::new();
    oracle.set_failing(true);
    let provider = MockDnsProvider::new();
    let config = three_port_config();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &config);

    let t0 = Instant::now();
    scheduler.tick(t0).await;
    assert_eq!(gateway.open_count(), 1);
    assert_eq!(oracle.calls(), 1);

    // Next poll: both failed, but neither is retried yet
    let report = scheduler.tick(t0 + Duration::from_secs(60)).await;
    assert!(report.is_idle());
    assert_eq!(gateway.open_count(), 1);
    assert_eq!(oracle.calls(), 1);

    let state = scheduler.state();
    assert_eq!(state.last_port_renewal, Some(t0));
    assert_eq!(state.last_ddns_update, Some(t0));

    // DDNS period elapses first; only DDNS retries
    let report = scheduler.tick(t0 + config.ddns.interval()).await;
    assert!(report.port_renewal.is_none());
    assert!(report.ddns_update.is_some());
    assert_eq!(oracle.calls(), 2);
    assert_eq!(gateway.open_count(), 1);
}

#[tokio::test]
async fn clock_going_backwards_never_rewinds_schedule() {
    let gateway = ScriptedGateway::new();
    let oracle = CountingOracle::new();
    let provider = MockDnsProvider::new();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &three_port_config());

    let t0 = Instant::now() + Duration::from_secs(3600);
    scheduler.tick(t0).await;

    let report = scheduler.tick(t0 - Duration::from_secs(1200)).await;
    assert!(report.is_idle());
    assert_eq!(scheduler.state().last_port_renewal, Some(t0));
    assert_eq!(scheduler.state().last_ddns_update, Some(t0));
}

#[tokio::test]
async fn ddns_only_configuration_never_contacts_gateway() {
    let gateway = ScriptedGateway::new();
    let oracle = CountingOracle::new();
    let provider = MockDnsProvider::new();
    let mut config = three_port_config();
    config.ports.clear();
    let mut scheduler = scheduler_with(&gateway, &oracle, &provider, &config);

    let report = scheduler.tick(Instant::now()).await;

    assert_eq!(report.port_renewal, Some(PortRenewalOutcome::NothingToRenew));
    assert_eq!(gateway.open_count(), 0);
    assert_eq!(provider.update_count(), 1);
}
