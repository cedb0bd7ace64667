//! Tachometer pulse counting
//!
//! Counts fan tachometer pulses over one-second windows and derives RPM.
//! A pulse is a rising edge followed by a falling edge; waiting out the
//! falling edge before re-arming debounces one physical pulse into exactly
//! one count regardless of pulse width.
//!
//! Windows accumulate measured wall-clock time rather than assuming exactly
//! one second, since a pair of edge waits can consume up to ~2 s combined.

use std::sync::atomic::{AtomicBool, Ordering};

use fp_error::Result;
use tracing::{debug, info};

use crate::clock::{Cadence, Clock};
use crate::constants::timing;
use crate::input::DigitalInput;

/// Background loop deriving RPM from a digital tachometer line
///
/// Owns its input pin exclusively; shares nothing with the governor.
pub struct TachometerMonitor<I: DigitalInput, C: Clock> {
    input: I,
    clock: C,
    log_cadence: Cadence,
}

impl<I: DigitalInput, C: Clock> TachometerMonitor<I, C> {
    pub fn new(input: I, clock: C) -> Self {
        Self {
            input,
            clock,
            log_cadence: Cadence::new(timing::RPM_LOG_INTERVAL_S),
        }
    }

    /// Count debounced pulses for one window and derive RPM
    ///
    /// Input read failures propagate; an unreadable tachometer is fatal to
    /// the loop, not something to retry silently.
    pub fn run_window(&mut self) -> Result<u32> {
        let mut pulses: u32 = 0;
        let mut elapsed = std::time::Duration::ZERO;

        while elapsed < timing::TACH_WINDOW {
            let start = self.clock.now();
            if self.input.wait_for_active(timing::EDGE_WAIT_TIMEOUT)? {
                pulses += 1;
                // swallow the falling edge so this pulse counts only once
                self.input.wait_for_inactive(timing::EDGE_WAIT_TIMEOUT)?;
            }
            elapsed += self.clock.now().saturating_sub(start);
        }

        // pulses-per-second scaled to a minute
        Ok(pulses * 60)
    }

    /// Run windows until the shutdown flag is set
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        debug!("tachometer monitor running");
        while !shutdown.load(Ordering::SeqCst) {
            let rpm = self.run_window()?;
            if self.log_cadence.due(self.clock.now_secs()) {
                info!("RPM = {}", rpm);
            }
        }
        debug!("tachometer monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use fp_error::HardwareError;
    use std::time::Duration;

    /// Scripted pin: produces a fixed number of pulse pairs, then idles.
    /// Every wait advances the shared virtual clock by the time the real
    /// hardware interaction would have taken.
    struct ScriptedInput {
        clock: ManualClock,
        pulses_remaining: u32,
        gap: Duration,
        pulse_width: Duration,
    }

    impl DigitalInput for ScriptedInput {
        fn wait_for_active(&mut self, timeout: Duration) -> fp_error::Result<bool> {
            if self.pulses_remaining > 0 {
                self.pulses_remaining -= 1;
                self.clock.advance(self.gap);
                Ok(true)
            } else {
                self.clock.advance(timeout);
                Ok(false)
            }
        }

        fn wait_for_inactive(&mut self, _timeout: Duration) -> fp_error::Result<bool> {
            self.clock.advance(self.pulse_width);
            Ok(true)
        }
    }

    struct BrokenInput;

    impl DigitalInput for BrokenInput {
        fn wait_for_active(&mut self, _timeout: Duration) -> fp_error::Result<bool> {
            Err(HardwareError::TachRead {
                path: "/sys/class/gpio/gpio17/value".into(),
                reason: "gone".into(),
            })
        }

        fn wait_for_inactive(&mut self, _timeout: Duration) -> fp_error::Result<bool> {
            unreachable!()
        }
    }

    #[test]
    fn test_rpm_is_pulses_times_sixty() {
        let clock = ManualClock::new();
        let input = ScriptedInput {
            clock: clock.clone(),
            pulses_remaining: 7,
            gap: Duration::from_millis(50),
            pulse_width: Duration::from_millis(10),
        };
        let mut monitor = TachometerMonitor::new(input, clock);
        assert_eq!(monitor.run_window().unwrap(), 7 * 60);
    }

    #[test]
    fn test_stalled_fan_reports_zero() {
        let clock = ManualClock::new();
        let input = ScriptedInput {
            clock: clock.clone(),
            pulses_remaining: 0,
            gap: Duration::ZERO,
            pulse_width: Duration::ZERO,
        };
        let mut monitor = TachometerMonitor::new(input, clock);
        assert_eq!(monitor.run_window().unwrap(), 0);
    }

    #[test]
    fn test_window_spans_at_least_a_second() {
        let clock = ManualClock::new();
        // More pulses than fit in one window: only ~1 s worth is counted
        let input = ScriptedInput {
            clock: clock.clone(),
            pulses_remaining: 1000,
            gap: Duration::from_millis(90),
            pulse_width: Duration::from_millis(10),
        };
        let mut monitor = TachometerMonitor::new(input, clock.clone());
        // 100 ms per pulse pair: the window closes after 10 pulses
        assert_eq!(monitor.run_window().unwrap(), 10 * 60);
        assert!(clock.now() >= Duration::from_secs(1));
    }

    #[test]
    fn test_input_error_is_fatal() {
        let mut monitor = TachometerMonitor::new(BrokenInput, ManualClock::new());
        assert!(matches!(
            monitor.run_window(),
            Err(HardwareError::TachRead { .. })
        ));
    }
}
