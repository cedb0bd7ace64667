//! Loop supervision
//!
//! Runs the tachometer monitor and the thermal governor as two blocking
//! tasks, each owning its hardware handle exclusively, and waits until
//! either finishes. Both loops run until told otherwise, so the first
//! completion means trouble: the other loop is told to shut down and the
//! error propagates so the process exits non-zero. SIGINT/SIGTERM take the
//! same path with a clean result.
//!
//! Shutdown is cooperative: each loop checks the shared flag at its
//! suspension points, so teardown can lag by a tick or a sampling burst
//! (about 3 s worst case). The governor's PWM channel guard unexports the
//! channel when the loop winds down, on error and panic paths included.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use fp_core::config::DaemonConfig;
use fp_core::pwm::{self, PwmChip};
use fp_core::{CpuTemperature, GpioLevelInput, MonotonicClock, TachometerMonitor, ThermalGovernor};

enum Finished {
    Governor(anyhow::Result<()>),
    Tachometer(anyhow::Result<()>),
    Signal,
}

/// Run both control loops to completion
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut governor = spawn_governor(&config, &shutdown);
    let mut tachometer = spawn_tachometer(&config, &shutdown);

    let finished = tokio::select! {
        result = &mut governor => Finished::Governor(flatten("thermal governor", result)),
        result = &mut tachometer => Finished::Tachometer(flatten("tachometer monitor", result)),
        _ = wait_for_signal() => Finished::Signal,
    };

    shutdown.store(true, Ordering::SeqCst);

    match finished {
        Finished::Governor(result) => {
            warn!("thermal governor exited; stopping tachometer monitor");
            let other = flatten("tachometer monitor", tachometer.await);
            result.and(other)
        }
        Finished::Tachometer(result) => {
            warn!("tachometer monitor exited; stopping thermal governor");
            let other = flatten("thermal governor", governor.await);
            result.and(other)
        }
        Finished::Signal => {
            let governor = flatten("thermal governor", governor.await);
            let tachometer = flatten("tachometer monitor", tachometer.await);
            governor.and(tachometer)
        }
    }
}

/// Resolve on SIGINT or SIGTERM; if neither listener can be installed,
/// pend forever so supervision falls back to task-exit detection alone
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).ok();
    let sigterm = async {
        match term.as_mut() {
            Some(term) => {
                term.recv().await;
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for SIGINT; relying on task exit only");
                std::future::pending::<()>().await;
            }
        }
        _ = sigterm => {}
    }
    info!("shutdown signal received");
}

fn spawn_governor(
    config: &DaemonConfig,
    shutdown: &Arc<AtomicBool>,
) -> JoinHandle<fp_error::Result<()>> {
    let config = config.clone();
    let shutdown = shutdown.clone();
    tokio::task::spawn_blocking(move || {
        let chip = PwmChip::new(&config.pwm.chip_path, config.pwm.channel)
            .with_export_timeout(Duration::from_millis(config.pwm.export_timeout_ms));
        // Clear a stale export left behind by a crashed run
        chip.unexport()?;
        let channel = pwm::bring_up(chip, config.pwm.period_ns, config.pwm.initial_level)?;

        let sensor = CpuTemperature::new(
            &config.thermal.zone_path,
            config.thermal.min_temp,
            config.thermal.max_temp,
            config.thermal.warn_threshold,
        );

        let mut governor = ThermalGovernor::new(sensor, channel, MonotonicClock::new());
        governor.run(&shutdown)
        // The channel guard drops here and unexports the channel
    })
}

fn spawn_tachometer(
    config: &DaemonConfig,
    shutdown: &Arc<AtomicBool>,
) -> JoinHandle<fp_error::Result<()>> {
    let config = config.clone();
    let shutdown = shutdown.clone();
    tokio::task::spawn_blocking(move || {
        let input = GpioLevelInput::new(
            &config.tachometer.value_path,
            config.tachometer.active_low,
        );
        let mut monitor = TachometerMonitor::new(input, MonotonicClock::new());
        monitor.run(&shutdown)
    })
}

fn flatten(
    name: &str,
    result: Result<fp_error::Result<()>, JoinError>,
) -> anyhow::Result<()> {
    match result {
        Ok(inner) => inner.with_context(|| format!("{} failed", name)),
        Err(e) => Err(anyhow::anyhow!("{} panicked: {}", name, e)),
    }
}
