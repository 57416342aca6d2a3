//! Config validation CLI tool
//!
//! Validates a playcache configuration file and reports any errors.

use playcache_api::RecordKind;
use playcache_util::default_config_path;
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
            eprintln!("Validates a playcache configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match playcache_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", playcache_config::CURRENT_CONFIG_VERSION);
            println!("  Database: {}", settings.service.database_path().display());
            println!("  Remote: {}", settings.remote.base_url);
            println!(
                "  Sync every {}s (fast path {})",
                settings.sync.interval.as_secs(),
                if settings.sync.fast_path { "on" } else { "off" }
            );
            println!(
                "  Connectivity probe: {} every {}s",
                settings.connectivity.check_url,
                settings.connectivity.check_interval.as_secs()
            );

            if settings.widget.enabled {
                let kinds: Vec<&str> = RecordKind::APPEND_ONLY
                    .iter()
                    .filter(|kind| settings.widget.kinds.includes(**kind))
                    .map(|kind| kind.as_str())
                    .collect();
                println!(
                    "  Widget: {} [{}]",
                    settings.widget.dir.display(),
                    kinds.join(", ")
                );
            } else {
                println!("  Widget: disabled");
            }

            println!("  Score window: {}", settings.scoring.window);

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                playcache_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                playcache_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                playcache_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                playcache_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        playcache_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
