//! Constants and configuration defaults for the fan-pwm governor
//!
//! Centralizes magic numbers, paths, and timing values. Never use magic
//! numbers in other files - add them here first.

use std::time::Duration;

/// Default system paths
pub mod paths {
    /// Default PWM controller directory (sysfs pwmchip)
    pub const PWM_CHIP: &str = "/sys/class/pwm/pwmchip0";

    /// Default tachometer GPIO value attribute
    pub const TACH_VALUE: &str = "/sys/class/gpio/gpio17/value";

    /// Default CPU thermal zone input (millidegrees Celsius)
    pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
}

/// Loop timing and cadences
pub mod timing {
    use super::Duration;

    /// Governor tick interval
    pub const TICK: Duration = Duration::from_secs(1);

    /// Seconds between fan speed updates
    pub const SPEED_UPDATE_INTERVAL_S: u64 = 15;

    /// Seconds between status log lines
    pub const STATUS_LOG_INTERVAL_S: u64 = 60;

    /// Seconds between overheat-flag checks
    pub const OVERHEAT_CHECK_INTERVAL_S: u64 = 10;

    /// Seconds between RPM log lines
    pub const RPM_LOG_INTERVAL_S: u64 = 60;

    /// Number of temperature reads in one sampling burst
    pub const SAMPLE_BURST_STEPS: u32 = 50;

    /// Spacing between reads within a burst (50 reads over 2 seconds)
    pub const SAMPLE_SPACING: Duration = Duration::from_millis(40);

    /// Tachometer pulse-counting window
    pub const TACH_WINDOW: Duration = Duration::from_secs(1);

    /// Timeout for a single edge wait on the tachometer pin
    pub const EDGE_WAIT_TIMEOUT: Duration = Duration::from_secs(1);
}

/// PWM channel defaults
pub mod pwm {
    use super::Duration;

    /// Default PWM period in nanoseconds (20 kHz)
    pub const DEFAULT_PERIOD_NS: u64 = 50_000;

    /// Bound on export/unexport readiness polling
    pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Initial readiness poll interval (doubles up to the max)
    pub const POLL_INTERVAL_MIN: Duration = Duration::from_micros(50);

    /// Ceiling for the readiness poll backoff
    pub const POLL_INTERVAL_MAX: Duration = Duration::from_millis(5);

    /// Lowest fan level the governor will command
    pub const MIN_FAN_LEVEL: f64 = 0.1;

    /// Fan level applied during bring-up, before the first sampling burst
    pub const INITIAL_FAN_LEVEL: f64 = 0.2;
}

/// Temperature sensor defaults
pub mod temperature {
    /// sysfs thermal zones report millidegrees Celsius
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;

    /// Temperature mapped to fan level 0.0
    pub const DEFAULT_MIN_TEMP: f32 = 40.0;

    /// Temperature mapped to fan level 1.0
    pub const DEFAULT_MAX_TEMP: f32 = 60.0;

    /// Temperature above which the overheat warning fires
    pub const DEFAULT_WARN_THRESHOLD: f32 = 60.0;
}

/// Digital input defaults
pub mod input {
    use super::Duration;

    /// Poll quantum for level waits on a GPIO value attribute
    pub const LEVEL_POLL_INTERVAL: Duration = Duration::from_millis(1);
}
