//! Config validation CLI tool
//!
//! Validates a geoalarm configuration file and reports any errors.

use geoalarm_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a geoalarm configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match geoalarm_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", geoalarm_config::CURRENT_CONFIG_VERSION);
            println!("  Data dir: {}", settings.service.data_dir.display());
            println!("  Trigger policy: {:?}", settings.alarm.trigger_policy);
            println!(
                "  Re-assert every: {}",
                format_duration(settings.alarm.refresh_interval)
            );
            println!(
                "  Default snooze: {}",
                format_duration(settings.alarm.default_snooze)
            );

            if !settings.seed_zones.is_empty() {
                println!();
                println!("Seed zones:");
                for zone in &settings.seed_zones {
                    println!(
                        "  - {} {} r={}m{}",
                        zone.name,
                        zone.center,
                        zone.radius_meters,
                        if zone.active { "" } else { " (off)" }
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                geoalarm_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                geoalarm_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                geoalarm_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                geoalarm_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        geoalarm_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
