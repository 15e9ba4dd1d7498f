//! Dual-interval scheduler
//!
//! The scheduler owns the only loop in the daemon. Two independent periodic
//! tasks share it:
//!
//! ```text
//!                 ┌────────────────────────┐
//!                 │ DualIntervalScheduler  │── tick every poll_interval
//!                 └────────────────────────┘
//!                    │                  │
//!       port period  │                  │  DDNS period
//!                    ▼                  ▼
//!          ┌──────────────────┐   ┌─────────────┐
//!          │ GatewaySession   │   │ DdnsUpdater │
//!          │   + LeaseRenewer │   └─────────────┘
//!          └──────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. If the port period has elapsed: open a gateway session, renew every
//!    lease, log, and advance `last_port_renewal` whatever happened
//! 2. Independently, if the DDNS period has elapsed: run one DDNS update,
//!    log, and advance `last_ddns_update` whatever happened
//! 3. Sleep for the poll interval
//!
//! Failures are retried on the next full period, never immediately. The two
//! tasks run one after the other on the same task and never overlap.
//!
//! ## Shutdown
//!
//! The shutdown signal is only observed between ticks. Network calls already
//! in flight finish or hit their own timeout first.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ReachConfig;
use crate::ddns::{DdnsOutcome, DdnsUpdater};
use crate::renewer::{PortLeaseRenewer, RenewalReport};
use crate::traits::GatewaySession;

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Loop started
    Started {
        ports_count: usize,
        ddns_enabled: bool,
    },

    /// A renewal cycle reached the gateway
    PortRenewalCompleted { report: RenewalReport },

    /// A renewal cycle could not open a gateway session
    GatewayUnreachable { error: String },

    /// DDNS cycle succeeded (including the disabled no-op)
    DdnsUpdateSucceeded { outcome: DdnsOutcome },

    /// DDNS cycle failed
    DdnsUpdateFailed { error: String },

    /// Loop stopped
    Stopped { reason: String },
}

/// Last run of each periodic task
///
/// `None` means the task has never run in this process, which makes it due
/// on the first tick. Marks never move backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    /// Last port renewal attempt
    pub last_port_renewal: Option<Instant>,
    /// Last DDNS update attempt
    pub last_ddns_update: Option<Instant>,
}

impl ScheduleState {
    /// Whether the port renewal is due at `now`
    pub fn port_renewal_due(&self, now: Instant, period: Duration) -> bool {
        is_due(self.last_port_renewal, now, period)
    }

    /// Whether the DDNS update is due at `now`
    pub fn ddns_update_due(&self, now: Instant, period: Duration) -> bool {
        is_due(self.last_ddns_update, now, period)
    }

    /// Record a port renewal attempt at `now`
    pub fn mark_port_renewal(&mut self, now: Instant) {
        self.last_port_renewal = Some(advance(self.last_port_renewal, now));
    }

    /// Record a DDNS update attempt at `now`
    pub fn mark_ddns_update(&mut self, now: Instant) {
        self.last_ddns_update = Some(advance(self.last_ddns_update, now));
    }
}

fn is_due(last: Option<Instant>, now: Instant, period: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= period,
    }
}

fn advance(last: Option<Instant>, now: Instant) -> Instant {
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

/// What the port task did in one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRenewalOutcome {
    /// Gateway reached; per-spec results inside
    Renewed(RenewalReport),
    /// No gateway session this cycle
    GatewayUnreachable(String),
    /// No ports configured; gateway not contacted
    NothingToRenew,
}

/// What one tick ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Set when the port task ran
    pub port_renewal: Option<PortRenewalOutcome>,
    /// Set when the DDNS task ran
    pub ddns_update: Option<Result<DdnsOutcome, String>>,
}

impl TickReport {
    /// Whether neither task was due
    pub fn is_idle(&self) -> bool {
        self.port_renewal.is_none() && self.ddns_update.is_none()
    }
}

/// Single loop driving port renewal and DDNS updates
///
/// ## Lifecycle
///
/// 1. Create with [`DualIntervalScheduler::new()`]
/// 2. Run with [`DualIntervalScheduler::run_until()`]
/// 3. Loop exits when the shutdown future resolves
pub struct DualIntervalScheduler {
    /// Gateway discovery, opened once per renewal cycle
    gateway: Box<dyn GatewaySession>,

    /// Port lease renewer
    renewer: PortLeaseRenewer,

    /// DDNS updater
    ddns: DdnsUpdater,

    /// Port renewal period
    port_period: Duration,

    /// DDNS update period
    ddns_period: Duration,

    /// Tick granularity
    poll_interval: Duration,

    /// Last run of each task
    state: ScheduleState,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl DualIntervalScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        gateway: Box<dyn GatewaySession>,
        ddns: DdnsUpdater,
        config: &ReachConfig,
    ) -> crate::Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.scheduler.event_channel_capacity);

        let scheduler = Self {
            gateway,
            renewer: PortLeaseRenewer::new(config.ports.clone(), &config.renewal),
            ddns,
            port_period: config.renewal.interval(),
            ddns_period: config.ddns.interval(),
            poll_interval: config.scheduler.poll_interval(),
            state: ScheduleState::default(),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Current schedule state
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Run one tick at `now`
    ///
    /// Runs whichever tasks are due and advances their marks. Never fails:
    /// every steady-state error is logged, emitted, and deferred to the next
    /// period.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        if self.state.port_renewal_due(now, self.port_period) {
            report.port_renewal = Some(self.run_port_renewal().await);
            self.state.mark_port_renewal(now);
        }

        if self.state.ddns_update_due(now, self.ddns_period) {
            report.ddns_update = Some(self.run_ddns_update().await);
            self.state.mark_ddns_update(now);
        }

        if report.is_idle() {
            debug!("Nothing due this tick");
        }

        report
    }

    async fn run_port_renewal(&mut self) -> PortRenewalOutcome {
        if self.renewer.specs().is_empty() {
            return PortRenewalOutcome::NothingToRenew;
        }

        match self.gateway.open().await {
            Ok(handle) => {
                let report = self.renewer.renew(handle).await;
                self.emit_event(SchedulerEvent::PortRenewalCompleted {
                    report: report.clone(),
                });
                PortRenewalOutcome::Renewed(report)
            }
            Err(e) => {
                error!("UPnP gateway not found: {}", e);
                self.emit_event(SchedulerEvent::GatewayUnreachable {
                    error: e.to_string(),
                });
                PortRenewalOutcome::GatewayUnreachable(e.to_string())
            }
        }
    }

    async fn run_ddns_update(&mut self) -> Result<DdnsOutcome, String> {
        match self.ddns.update().await {
            Ok(outcome) => {
                if outcome != DdnsOutcome::Disabled {
                    info!("DDNS update successful");
                }
                self.emit_event(SchedulerEvent::DdnsUpdateSucceeded {
                    outcome: outcome.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!("DDNS update failed: {}", e);
                self.emit_event(SchedulerEvent::DdnsUpdateFailed {
                    error: e.to_string(),
                });
                Err(e.to_string())
            }
        }
    }

    /// Run until `shutdown` resolves
    ///
    /// Ticks immediately, then once per poll interval. `shutdown` is polled
    /// only between ticks.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.emit_event(SchedulerEvent::Started {
            ports_count: self.renewer.specs().len(),
            ddns_enabled: self.ddns.is_enabled(),
        });
        info!(
            "Starting service loop ({} port(s), DDNS {})",
            self.renewer.specs().len(),
            if self.ddns.is_enabled() { "enabled" } else { "disabled" }
        );

        loop {
            self.tick(Instant::now()).await;

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Service loop stopped");
    }

    /// Run with a controlled shutdown signal
    ///
    /// `None` runs until the process receives Ctrl-C.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) {
        match shutdown_rx {
            Some(rx) => {
                self.run_until(async move {
                    let _ = rx.await;
                })
                .await
            }
            None => {
                self.run_until(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
            }
        }
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        // Never block the loop on a slow or absent consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("No event receiver, dropping event");
            }
        }
    }
}
