//! sysfs PWM channel lifecycle
//!
//! A PWM channel lives under a controller directory such as
//! `/sys/class/pwm/pwmchip0`. Writing the channel index to `export` makes
//! the kernel materialize a `pwmN/` directory with `period`, `duty_cycle`
//! and `enable` attributes; writing to `unexport` removes it again. Each
//! attribute holds one newline-terminated decimal value.
//!
//! Export races with udev ownership fixups: the attributes can exist but
//! reject writes with EACCES for a short while. [`PwmChip::export`] retries
//! through that window and only propagates non-permission failures.
//!
//! [`PwmChannel`] is an owning guard: once `export()` succeeds, unexport is
//! guaranteed on every exit path, including panic unwind, via `Drop`.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fp_error::{HardwareError, Result};
use tracing::{debug, trace, warn};

use crate::constants::pwm as pwm_const;

/// Handle to a sysfs PWM controller and one channel index on it
///
/// Unexported by construction; [`export`](Self::export) upgrades it to an
/// owning [`PwmChannel`].
pub struct PwmChip {
    base: PathBuf,
    channel: u32,
    export_timeout: Duration,
}

impl PwmChip {
    pub fn new(base: impl Into<PathBuf>, channel: u32) -> Self {
        Self {
            base: base.into(),
            channel,
            export_timeout: pwm_const::DEFAULT_EXPORT_TIMEOUT,
        }
    }

    /// Bound on export/unexport readiness polling (default 5 s)
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    fn channel_dir(&self) -> PathBuf {
        self.base.join(format!("pwm{}", self.channel))
    }

    /// Request the kernel expose the channel, then wait until its directory
    /// exists and its `enable` attribute accepts writes.
    ///
    /// Permission and not-found errors while opening `enable` are transient
    /// (udev is still handing ownership over, or the attribute trails the
    /// directory by a beat) and are retried until the timeout; any other
    /// open failure propagates immediately.
    pub fn export(self) -> Result<PwmChannel> {
        write_attr(&self.base.join("export"), &self.channel.to_string())?;

        // The kernel may already have materialized the channel by the time
        // a readiness wait fails; release it so the error path leaves
        // nothing exported behind.
        if let Err(e) = self.wait_writable() {
            if let Err(cleanup) = self.unexport() {
                warn!(error = %cleanup, "failed to unexport channel after failed export");
            }
            return Err(e);
        }

        debug!(channel = self.channel, chip = %self.base.display(), "pwm channel exported");
        Ok(PwmChannel {
            chip: self,
            period_ns: 0,
            exported: true,
        })
    }

    /// Wait until the channel directory exists and its `enable` attribute
    /// accepts writes
    fn wait_writable(&self) -> Result<()> {
        let dir = self.channel_dir();
        wait_until(self.export_timeout, "pwm channel directory", || {
            dir.exists()
        })?;

        let enable = dir.join("enable");
        let deadline = Instant::now() + self.export_timeout;
        let mut backoff = pwm_const::POLL_INTERVAL_MIN;
        loop {
            match OpenOptions::new().write(true).open(&enable) {
                Ok(_) => break,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::PermissionDenied | ErrorKind::NotFound
                    ) =>
                {
                    trace!(path = %enable.display(), "enable attribute not writable yet");
                    if Instant::now() >= deadline {
                        return Err(HardwareError::timeout(
                            "writable pwm enable attribute",
                            self.export_timeout,
                        ));
                    }
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(pwm_const::POLL_INTERVAL_MAX);
                }
                Err(e) => {
                    return Err(HardwareError::FileWrite {
                        path: enable,
                        source: e,
                    })
                }
            }
        }

        Ok(())
    }

    /// Release the channel if it is currently exported; no-op otherwise.
    ///
    /// Waits (bounded) for the channel directory to disappear, so a
    /// following `export()` starts from a clean slate.
    pub fn unexport(&self) -> Result<()> {
        let dir = self.channel_dir();
        if !dir.exists() {
            return Ok(());
        }
        write_attr(&self.base.join("unexport"), &self.channel.to_string())?;
        wait_until(self.export_timeout, "pwm channel removal", || !dir.exists())?;
        debug!(channel = self.channel, "pwm channel unexported");
        Ok(())
    }
}

/// Exported PWM channel; unexports itself when dropped
pub struct PwmChannel {
    chip: PwmChip,
    /// Last period written, cached for duty conversions
    period_ns: u64,
    exported: bool,
}

impl PwmChannel {
    /// Set the PWM period in nanoseconds
    pub fn set_period(&mut self, ns: u64) -> Result<()> {
        self.write_channel_attr("period", &ns.to_string())?;
        self.period_ns = ns;
        Ok(())
    }

    /// Set the active time per period, in nanoseconds
    ///
    /// The kernel rejects values above the current period; this layer does
    /// not pre-validate.
    pub fn set_duty_cycle(&mut self, ns: u64) -> Result<()> {
        self.write_channel_attr("duty_cycle", &ns.to_string())
    }

    /// Start or stop the output signal
    pub fn set_enabled(&mut self, on: bool) -> Result<()> {
        self.write_channel_attr("enable", if on { "1" } else { "0" })
    }

    pub fn read_period(&self) -> Result<u64> {
        self.read_channel_attr("period")
    }

    pub fn read_duty_cycle(&self) -> Result<u64> {
        self.read_channel_attr("duty_cycle")
    }

    pub fn read_enabled(&self) -> Result<bool> {
        let path = self.attr_path("enable");
        let content = fs::read_to_string(&path).map_err(|e| HardwareError::PwmRead {
            path: path.clone(),
            reason: format!("Failed to read: {}", e),
        })?;
        Ok(content.trim() == "1")
    }

    /// Explicitly release the channel, surfacing any unexport failure
    /// (`Drop` only logs it)
    pub fn unexport(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.exported {
            return Ok(());
        }
        self.exported = false;
        self.chip.unexport()
    }

    fn attr_path(&self, attr: &str) -> PathBuf {
        self.chip.channel_dir().join(attr)
    }

    fn write_channel_attr(&self, attr: &str, value: &str) -> Result<()> {
        let path = self.attr_path(attr);
        fs::write(&path, format!("{}\n", value)).map_err(|e| HardwareError::PwmWrite {
            path,
            reason: format!("Failed to write {}: {}", value, e),
        })
    }

    fn read_channel_attr(&self, attr: &str) -> Result<u64> {
        let path = self.attr_path(attr);
        let content = fs::read_to_string(&path).map_err(|e| HardwareError::PwmRead {
            path: path.clone(),
            reason: format!("Failed to read: {}", e),
        })?;
        content
            .trim()
            .parse::<u64>()
            .map_err(|e| HardwareError::PwmRead {
                path,
                reason: format!("Failed to parse '{}': {}", content.trim(), e),
            })
    }
}

impl Drop for PwmChannel {
    fn drop(&mut self) {
        if self.exported {
            if let Err(e) = self.release() {
                warn!(error = %e, "failed to unexport pwm channel on drop");
            }
        }
    }
}

/// Actuation seam between the thermal governor and the PWM hardware
///
/// `level` is a fraction of full speed; implementations saturate values
/// outside [0, 1].
pub trait FanOutput {
    fn set_level(&mut self, level: f64) -> Result<()>;
}

impl FanOutput for PwmChannel {
    fn set_level(&mut self, level: f64) -> Result<()> {
        let level = level.clamp(0.0, 1.0);
        let period = if self.period_ns > 0 {
            self.period_ns
        } else {
            let period = self.read_period()?;
            self.period_ns = period;
            period
        };
        let duty = (level * period as f64).round() as u64;
        self.set_duty_cycle(duty)
    }
}

/// Export and configure a channel for governor use
///
/// Sequence follows the hardware bring-up order: output disabled and duty
/// zeroed before the period changes, then the initial level applied and the
/// output enabled.
pub fn bring_up(chip: PwmChip, period_ns: u64, initial_level: f64) -> Result<PwmChannel> {
    let mut channel = chip.export()?;
    channel.set_enabled(false)?;
    channel.set_duty_cycle(0)?;
    channel.set_period(period_ns)?;
    channel.set_level(initial_level)?;
    channel.set_enabled(true)?;
    Ok(channel)
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, format!("{}\n", value)).map_err(|e| HardwareError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Bounded readiness poll with exponential backoff
fn wait_until(timeout: Duration, what: &str, ready: impl Fn() -> bool) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut backoff = pwm_const::POLL_INTERVAL_MIN;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(HardwareError::timeout(what, timeout));
        }
        thread::sleep(backoff);
        backoff = (backoff * 2).min(pwm_const::POLL_INTERVAL_MAX);
    }
    Ok(())
}
