//! Config validation CLI tool
//!
//! Validates a wattwatchd configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use wattwatch_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a wattwatchd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config ./wattwatch.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match wattwatch_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", wattwatch_config::CURRENT_CONFIG_VERSION);
            println!(
                "  Source: {}/{}",
                settings.source.base_url.as_deref().unwrap_or("(set with --source-url)"),
                settings.source.path
            );
            println!("  Poll interval: {}s", settings.source.poll_interval.as_secs());
            println!(
                "  Tariff: rate {} / fixed {} / solar {}%{}",
                settings.tariff.rate,
                settings.tariff.fixed,
                settings.tariff.solar,
                if settings.solar_mode { " (solar mode)" } else { "" }
            );
            println!("  Seed rules: {}", settings.seed_rules.len());

            if !settings.seed_rules.is_empty() {
                println!();
                println!("Rules:");
                for rule in &settings.seed_rules {
                    println!(
                        "  - {} {} {}: limit {}{}",
                        rule.target.display_name(),
                        rule.period.display_name(),
                        rule.metric.label(),
                        rule.metric.unit(),
                        rule.limit
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                wattwatch_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                wattwatch_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                wattwatch_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                wattwatch_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        wattwatch_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
