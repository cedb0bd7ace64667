//! Daemon configuration
//!
//! JSON file with `#[serde(default)]` everywhere, so a partial config (or
//! none at all) falls back to the built-in defaults. Defaults match the
//! reference hardware: pwmchip0 channel 0 at 50 µs period, tachometer on
//! GPIO 17 (active low), thermal zone 0 mapped over 40-60 °C.

use std::fs;
use std::path::{Path, PathBuf};

use fp_error::{HardwareError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{paths, pwm, temperature};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub pwm: PwmConfig,

    #[serde(default)]
    pub tachometer: TachConfig,

    #[serde(default)]
    pub thermal: ThermalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PwmConfig {
    /// sysfs controller directory
    #[serde(default = "default_chip_path")]
    pub chip_path: PathBuf,

    /// Channel index on the controller
    #[serde(default)]
    pub channel: u32,

    /// PWM period in nanoseconds
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,

    /// Bound on export/unexport readiness polling, in milliseconds
    #[serde(default = "default_export_timeout_ms")]
    pub export_timeout_ms: u64,

    /// Fan level applied during bring-up
    #[serde(default = "default_initial_level")]
    pub initial_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TachConfig {
    /// sysfs GPIO value attribute for the tachometer line
    #[serde(default = "default_tach_value_path")]
    pub value_path: PathBuf,

    /// Tachometer pulses read as 0 when active
    #[serde(default = "default_active_low")]
    pub active_low: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalConfig {
    /// sysfs thermal zone input (millidegrees Celsius)
    #[serde(default = "default_zone_path")]
    pub zone_path: PathBuf,

    /// Temperature mapped to fan level 0.0
    #[serde(default = "default_min_temp")]
    pub min_temp: f32,

    /// Temperature mapped to fan level 1.0
    #[serde(default = "default_max_temp")]
    pub max_temp: f32,

    /// Temperature above which the overheat warning fires
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f32,
}

fn default_chip_path() -> PathBuf {
    PathBuf::from(paths::PWM_CHIP)
}

fn default_period_ns() -> u64 {
    pwm::DEFAULT_PERIOD_NS
}

fn default_export_timeout_ms() -> u64 {
    pwm::DEFAULT_EXPORT_TIMEOUT.as_millis() as u64
}

fn default_initial_level() -> f64 {
    pwm::INITIAL_FAN_LEVEL
}

fn default_tach_value_path() -> PathBuf {
    PathBuf::from(paths::TACH_VALUE)
}

fn default_active_low() -> bool {
    true
}

fn default_zone_path() -> PathBuf {
    PathBuf::from(paths::THERMAL_ZONE)
}

fn default_min_temp() -> f32 {
    temperature::DEFAULT_MIN_TEMP
}

fn default_max_temp() -> f32 {
    temperature::DEFAULT_MAX_TEMP
}

fn default_warn_threshold() -> f32 {
    temperature::DEFAULT_WARN_THRESHOLD
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            chip_path: default_chip_path(),
            channel: 0,
            period_ns: default_period_ns(),
            export_timeout_ms: default_export_timeout_ms(),
            initial_level: default_initial_level(),
        }
    }
}

impl Default for TachConfig {
    fn default() -> Self {
        Self {
            value_path: default_tach_value_path(),
            active_low: default_active_low(),
        }
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            zone_path: default_zone_path(),
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
            warn_threshold: default_warn_threshold(),
        }
    }
}

impl DaemonConfig {
    /// Load from a JSON file; an explicitly given path must exist and parse
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HardwareError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            HardwareError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pwm.period_ns == 0 {
            return Err(HardwareError::config("pwm.period_ns must be positive"));
        }
        if self.thermal.max_temp <= self.thermal.min_temp {
            return Err(HardwareError::config(
                "thermal.max_temp must be above thermal.min_temp",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_yields_defaults() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "{}").unwrap();
        let config = DaemonConfig::load(file.path()).unwrap();

        assert_eq!(config.pwm.period_ns, 50_000);
        assert_eq!(config.pwm.channel, 0);
        assert!((config.thermal.min_temp - 40.0).abs() < f32::EPSILON);
        assert!(config.tachometer.active_low);
    }

    #[test]
    fn test_partial_section_overrides() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"{"thermal": {"max_temp": 70.0}, "pwm": {"channel": 1}}"#,
        )
        .unwrap();
        let config = DaemonConfig::load(file.path()).unwrap();

        assert!((config.thermal.max_temp - 70.0).abs() < f32::EPSILON);
        assert!((config.thermal.min_temp - 40.0).abs() < f32::EPSILON);
        assert_eq!(config.pwm.channel, 1);
        assert_eq!(config.pwm.period_ns, 50_000);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"{"thermal": {"min_temp": 60.0, "max_temp": 50.0}}"#,
        )
        .unwrap();
        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(HardwareError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            DaemonConfig::load(Path::new("/nonexistent/fanpwm.json")),
            Err(HardwareError::FileRead { .. })
        ));
    }
}
