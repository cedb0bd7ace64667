//! fanpwmd - temperature-driven PWM fan governor
//!
//! Reads the CPU temperature, drives a PWM fan through the sysfs pwmchip
//! interface and monitors the fan's tachometer line. Runs in the
//! foreground for the lifetime of the host; intended to be supervised by
//! an init system.

mod supervisor;

use std::path::PathBuf;

use tracing::{error, info};

use fp_core::config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("fanpwmd {} - temperature-driven PWM fan governor", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    fanpwmd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Config file (JSON; built-in defaults otherwise)");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    FANPWM_LOG          Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("fanpwmd {}", VERSION);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                print_version();
                return Ok(());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let log_level = std::env::var("FANPWM_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();

    info!("STARTUP: fanpwmd {} starting", VERSION);

    let config = match &config_path {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    info!(
        "STARTUP: pwm {} channel {}, tach {}, thermal zone {}",
        config.pwm.chip_path.display(),
        config.pwm.channel,
        config.tachometer.value_path.display(),
        config.thermal.zone_path.display()
    );

    if let Err(e) = supervisor::run(config).await {
        error!("FATAL: {:#}", e);
        std::process::exit(1);
    }

    info!("SHUTDOWN: fanpwmd terminated cleanly");
    Ok(())
}
