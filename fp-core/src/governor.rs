//! Thermal governor
//!
//! One ticking loop multiplexes three cadences off the shared second
//! counter:
//!
//! - every 15 s: a blocking 2 s sampling burst (50 reads, 40 ms apart)
//!   averaged into a new fan level, written to the PWM output
//! - every 60 s: status log (fan level percentage + current temperature)
//! - every 10 s: overheat check against the sensor's warn threshold
//!
//! The burst deliberately blocks the tick loop for 2 of every 15 seconds,
//! trading responsiveness for noise smoothing. Samples <= 0 are excluded
//! from the sum but the average still divides by the full burst size, so
//! occasional invalid reads bias the level toward the minimum rather than
//! inflating it.

use std::sync::atomic::{AtomicBool, Ordering};

use fp_error::Result;
use tracing::{debug, error, info, warn};

use crate::clock::{Cadence, Clock};
use crate::constants::{pwm as pwm_const, timing};
use crate::pwm::FanOutput;
use crate::sensor::TemperatureSensor;

/// Background loop mapping CPU temperature to fan speed
///
/// Exclusively owns both the sensor and the PWM output for the life of the
/// process.
pub struct ThermalGovernor<S: TemperatureSensor, F: FanOutput, C: Clock> {
    sensor: S,
    fan: F,
    clock: C,
    speed_cadence: Cadence,
    status_cadence: Cadence,
    overheat_cadence: Cadence,
    /// Last level written, reported by the status log
    fan_level: f64,
}

impl<S: TemperatureSensor, F: FanOutput, C: Clock> ThermalGovernor<S, F, C> {
    pub fn new(sensor: S, fan: F, clock: C) -> Self {
        Self {
            sensor,
            fan,
            clock,
            speed_cadence: Cadence::new(timing::SPEED_UPDATE_INTERVAL_S),
            status_cadence: Cadence::new(timing::STATUS_LOG_INTERVAL_S),
            overheat_cadence: Cadence::new(timing::OVERHEAT_CHECK_INTERVAL_S),
            fan_level: pwm_const::INITIAL_FAN_LEVEL,
        }
    }

    /// Blocking sampling burst: 50 reads spaced 40 ms apart, averaged over
    /// the full burst size regardless of how many reads were valid
    pub fn sample_burst(&mut self) -> f64 {
        let mut sum = 0.0f64;
        let mut errors = 0u32;

        for _ in 0..timing::SAMPLE_BURST_STEPS {
            self.clock.sleep(timing::SAMPLE_SPACING);
            match self.sensor.normalized() {
                Ok(value) if value > 0.0 => sum += value as f64,
                Ok(_) => {}
                Err(e) => {
                    errors += 1;
                    debug!(error = %e, "temperature read failed during burst");
                }
            }
        }

        if errors == timing::SAMPLE_BURST_STEPS {
            error!("temperature sensor unreadable for an entire sampling burst; holding minimum fan level");
        }

        sum / timing::SAMPLE_BURST_STEPS as f64
    }

    /// One second's worth of governor work
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now_secs();

        if self.speed_cadence.due(now) {
            let average = self.sample_burst();
            let level = (pwm_const::MIN_FAN_LEVEL + average / 2.0).clamp(0.0, 1.0);
            self.fan.set_level(level)?;
            self.fan_level = level;
            debug!(average, level, "fan level updated");
        }

        if self.status_cadence.due(now) {
            match self.sensor.celsius() {
                Ok(celsius) => info!(
                    "Speed {:.2}% Temperature {:.1} deg Celsius",
                    self.fan_level * 100.0,
                    celsius
                ),
                Err(e) => warn!(
                    error = %e,
                    "Speed {:.2}%, temperature unavailable",
                    self.fan_level * 100.0
                ),
            }
        }

        if self.overheat_cadence.due(now) {
            match self.sensor.threshold_exceeded() {
                Ok(true) => warn!("Max temp of {} reached!", self.sensor.max_temp()),
                Ok(false) => {}
                Err(e) => debug!(error = %e, "overheat check failed"),
            }
        }

        Ok(())
    }

    /// Tick once per second until the shutdown flag is set
    ///
    /// A write failure to the PWM output is fatal; the supervisor turns it
    /// into full-process shutdown.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        debug!("thermal governor running");
        while !shutdown.load(Ordering::SeqCst) {
            self.clock.sleep(timing::TICK);
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.tick()?;
        }
        debug!("thermal governor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use fp_error::HardwareError;
    use std::time::Duration;

    /// Replays a fixed reading sequence, repeating the last entry forever
    struct ScriptedSensor {
        readings: Vec<f32>,
        index: usize,
        fail: bool,
        exceeded: bool,
        /// Number of `celsius()` calls, one per status log line
        celsius_calls: usize,
    }

    impl ScriptedSensor {
        fn constant(value: f32) -> Self {
            Self::sequence(vec![value])
        }

        fn sequence(readings: Vec<f32>) -> Self {
            Self {
                readings,
                index: 0,
                fail: false,
                exceeded: false,
                celsius_calls: 0,
            }
        }
    }

    impl TemperatureSensor for ScriptedSensor {
        fn normalized(&mut self) -> fp_error::Result<f32> {
            if self.fail {
                return Err(HardwareError::TemperatureRead {
                    path: "/sys/class/thermal/thermal_zone0/temp".into(),
                    reason: "gone".into(),
                });
            }
            let value = self.readings[self.index.min(self.readings.len() - 1)];
            self.index += 1;
            Ok(value)
        }

        fn celsius(&mut self) -> fp_error::Result<f32> {
            self.celsius_calls += 1;
            Ok(50.0)
        }

        fn threshold_exceeded(&mut self) -> fp_error::Result<bool> {
            Ok(self.exceeded)
        }

        fn max_temp(&self) -> f32 {
            60.0
        }
    }

    #[derive(Default)]
    struct RecordingFan {
        levels: Vec<f64>,
    }

    impl FanOutput for RecordingFan {
        fn set_level(&mut self, level: f64) -> fp_error::Result<()> {
            self.levels.push(level);
            Ok(())
        }
    }

    fn governor(
        sensor: ScriptedSensor,
    ) -> ThermalGovernor<ScriptedSensor, RecordingFan, ManualClock> {
        ThermalGovernor::new(sensor, RecordingFan::default(), ManualClock::new())
    }

    #[test]
    fn test_burst_divides_by_full_burst_size() {
        // 20 invalid readings, then 30 valid ones summing to 15.0
        let mut readings = vec![0.0f32; 20];
        readings.extend(std::iter::repeat(0.5).take(30));
        let mut governor = governor(ScriptedSensor::sequence(readings));

        let average = governor.sample_burst();
        assert!((average - 15.0 / 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_invalid_burst_holds_minimum_level() {
        let mut governor = governor(ScriptedSensor::constant(-0.2));

        governor.clock.set(Duration::from_secs(1));
        governor.tick().unwrap(); // arms the cadences
        governor.clock.set(Duration::from_secs(15));
        governor.tick().unwrap();

        assert_eq!(governor.fan.levels, vec![0.1]);
    }

    #[test]
    fn test_sixty_ticks_update_on_fifteen_second_boundaries() {
        let mut governor = governor(ScriptedSensor::constant(0.4));

        for second in 1..=60u64 {
            governor.clock.set(Duration::from_secs(second));
            governor.tick().unwrap();
        }

        // Boundaries at 15, 30, 45, 60; each applies 0.1 + 0.4/2 = 0.3
        assert_eq!(governor.fan.levels.len(), 4);
        for level in &governor.fan.levels {
            assert!((level - 0.3).abs() < 1e-9);
        }

        // The status line fires only on the 60 s boundary and reports the
        // level applied at that tick (0.3, logged as 30.00%)
        assert_eq!(governor.sensor.celsius_calls, 1);
        assert!((governor.fan_level - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_status_log_fires_on_sixty_second_boundaries() {
        let mut governor = governor(ScriptedSensor::constant(0.4));

        for second in 1..=130u64 {
            governor.clock.set(Duration::from_secs(second));
            governor.tick().unwrap();
        }

        // Status boundaries crossed at 60 and 120
        assert_eq!(governor.sensor.celsius_calls, 2);
    }

    #[test]
    fn test_level_is_clamped() {
        // Normalized readings above 1.0 (sensor past max_temp)
        let mut governor = governor(ScriptedSensor::constant(3.0));

        governor.clock.set(Duration::from_secs(1));
        governor.tick().unwrap();
        governor.clock.set(Duration::from_secs(15));
        governor.tick().unwrap();

        assert_eq!(governor.fan.levels, vec![1.0]);
    }

    #[test]
    fn test_sensor_errors_count_as_invalid_samples() {
        let mut sensor = ScriptedSensor::constant(0.0);
        sensor.fail = true;
        let mut governor = governor(sensor);

        governor.clock.set(Duration::from_secs(1));
        governor.tick().unwrap();
        governor.clock.set(Duration::from_secs(15));
        governor.tick().unwrap();

        // Every read errored; the fan still lands at the safe minimum
        assert_eq!(governor.fan.levels, vec![0.1]);
    }
}
