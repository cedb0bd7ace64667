//! Digital input edge waits for the tachometer pin
//!
//! The tachometer loop only needs two primitives: block until the line goes
//! active, and block until it goes inactive, each with a timeout. The trait
//! keeps the counting logic independent of the GPIO transport.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use fp_error::{HardwareError, Result};

use crate::constants::input as input_const;

/// Edge-wait capability for one digital line
pub trait DigitalInput: Send {
    /// Wait until the line reads active. `Ok(true)` if it happened before
    /// the timeout, `Ok(false)` on timeout.
    fn wait_for_active(&mut self, timeout: Duration) -> Result<bool>;

    /// Wait until the line reads inactive
    fn wait_for_inactive(&mut self, timeout: Duration) -> Result<bool>;
}

/// Level-polling implementation over a sysfs GPIO value attribute
/// (e.g. `/sys/class/gpio/gpio17/value`)
///
/// Polls at a 1 ms quantum, which resolves tachometer pulses comfortably:
/// even at 10000 RPM a two-pulse-per-rotation signal is ~3 ms per phase.
pub struct GpioLevelInput {
    value_path: PathBuf,
    active_low: bool,
    poll_interval: Duration,
}

impl GpioLevelInput {
    pub fn new(value_path: impl Into<PathBuf>, active_low: bool) -> Self {
        Self {
            value_path: value_path.into(),
            active_low,
            poll_interval: input_const::LEVEL_POLL_INTERVAL,
        }
    }

    fn read_active(&self) -> Result<bool> {
        let content =
            fs::read_to_string(&self.value_path).map_err(|e| HardwareError::TachRead {
                path: self.value_path.clone(),
                reason: format!("Failed to read: {}", e),
            })?;
        let high = content.trim() == "1";
        Ok(high != self.active_low)
    }

    fn wait_for(&mut self, target: bool, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.read_active()? == target {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl DigitalInput for GpioLevelInput {
    fn wait_for_active(&mut self, timeout: Duration) -> Result<bool> {
        self.wait_for(true, timeout)
    }

    fn wait_for_inactive(&mut self, timeout: Duration) -> Result<bool> {
        self.wait_for(false, timeout)
    }
}
