//! CPU temperature sensing
//!
//! Linux thermal zones report millidegrees Celsius through a single sysfs
//! attribute (e.g. `/sys/class/thermal/thermal_zone0/temp`). The governor
//! consumes temperatures normalized against a configured min/max range, so
//! 0.0 means "at or below min_temp" and 1.0 means "at max_temp".
//!
//! A normalized reading can be negative (below min_temp) or above 1.0
//! (above max_temp); the governor treats values <= 0 as invalid samples.

use std::fs;
use std::path::PathBuf;

use fp_error::{HardwareError, Result};

use crate::constants::temperature;

/// Capability interface the thermal governor samples from
pub trait TemperatureSensor: Send {
    /// Current temperature as a fraction of the configured min/max range
    fn normalized(&mut self) -> Result<f32>;

    /// Current temperature in degrees Celsius
    fn celsius(&mut self) -> Result<f32>;

    /// Whether the warn threshold is currently exceeded
    fn threshold_exceeded(&mut self) -> Result<bool>;

    /// Configured maximum temperature, for log messages
    fn max_temp(&self) -> f32;
}

/// Thermal-zone-backed sensor
pub struct CpuTemperature {
    input_path: PathBuf,
    min_temp: f32,
    max_temp: f32,
    threshold: f32,
}

impl CpuTemperature {
    pub fn new(input_path: impl Into<PathBuf>, min_temp: f32, max_temp: f32, threshold: f32) -> Self {
        Self {
            input_path: input_path.into(),
            min_temp,
            max_temp,
            threshold,
        }
    }

    fn read_celsius(&self) -> Result<f32> {
        let content =
            fs::read_to_string(&self.input_path).map_err(|e| HardwareError::TemperatureRead {
                path: self.input_path.clone(),
                reason: format!("Failed to read: {}", e),
            })?;

        let millidegrees =
            content
                .trim()
                .parse::<i64>()
                .map_err(|e| HardwareError::TemperatureRead {
                    path: self.input_path.clone(),
                    reason: format!("Failed to parse '{}': {}", content.trim(), e),
                })?;

        Ok(millidegrees as f32 / temperature::MILLIDEGREE_DIVISOR)
    }
}

impl TemperatureSensor for CpuTemperature {
    fn normalized(&mut self) -> Result<f32> {
        let celsius = self.read_celsius()?;
        Ok((celsius - self.min_temp) / (self.max_temp - self.min_temp))
    }

    fn celsius(&mut self) -> Result<f32> {
        self.read_celsius()
    }

    fn threshold_exceeded(&mut self) -> Result<bool> {
        Ok(self.read_celsius()? >= self.threshold)
    }

    fn max_temp(&self) -> f32 {
        self.max_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sensor_with(contents: &str) -> (NamedTempFile, CpuTemperature) {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        let sensor = CpuTemperature::new(file.path(), 40.0, 60.0, 60.0);
        (file, sensor)
    }

    #[test]
    fn test_celsius_converts_millidegrees() {
        let (_file, mut sensor) = sensor_with("45000\n");
        assert!((sensor.celsius().unwrap() - 45.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_normalized_against_range() {
        let (_file, mut sensor) = sensor_with("45000\n");
        assert!((sensor.normalized().unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_below_min_is_negative() {
        let (_file, mut sensor) = sensor_with("35000\n");
        assert!(sensor.normalized().unwrap() < 0.0);
    }

    #[test]
    fn test_threshold_exceeded() {
        let (_file, mut sensor) = sensor_with("61000\n");
        assert!(sensor.threshold_exceeded().unwrap());

        let (_file, mut sensor) = sensor_with("59000\n");
        assert!(!sensor.threshold_exceeded().unwrap());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let (_file, mut sensor) = sensor_with("not-a-number\n");
        assert!(matches!(
            sensor.celsius(),
            Err(HardwareError::TemperatureRead { .. })
        ));
    }
}
