//! fan-pwm core library
//!
//! Concurrent control engine for a temperature-driven PWM fan governor:
//!
//! - `pwm` - sysfs PWM channel lifecycle (export/configure/unexport with an
//!   owning guard and bounded readiness polling)
//! - `tach` - tachometer pulse counting over one-second windows
//! - `governor` - temperature sampling, averaging and fan level control
//! - `sensor` / `input` - capability traits over the hardware transports,
//!   plus their sysfs-backed implementations
//! - `clock` - monotonic time abstraction and periodic-task cadences
//! - `config` - JSON daemon configuration with built-in defaults
//!
//! The two loops share no mutable state: the governor exclusively owns the
//! PWM channel and the temperature sensor, the tachometer monitor
//! exclusively owns its input pin. The supervisor in the daemon crate is
//! the only coordination point.

pub mod clock;
pub mod config;
pub mod constants;
pub mod governor;
pub mod input;
pub mod pwm;
pub mod sensor;
pub mod tach;

pub use fp_error::{HardwareError, Result};

pub use clock::{Cadence, Clock, MonotonicClock};
pub use config::DaemonConfig;
pub use governor::ThermalGovernor;
pub use input::{DigitalInput, GpioLevelInput};
pub use pwm::{FanOutput, PwmChannel, PwmChip};
pub use sensor::{CpuTemperature, TemperatureSensor};
pub use tach::TachometerMonitor;
