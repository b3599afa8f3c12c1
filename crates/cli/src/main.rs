// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use vellum_config::{Config, ConfigManager, LogLevel};

mod commands;

const MAX_BREAKER_CALLS: u32 = 10_000;

fn build_cli() -> Command {
    Command::new("vellum")
        .version(env!("CARGO_PKG_VERSION"))
        .author("DrTomLLC")
        .about("Retry presets and circuit breakers for encryption, storage and access-policy calls")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config")
                .value_name("DIR")
                .help("Configuration directory (defaults to the platform config dir)")
                .global(true),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand(Command::new("init").about("Write a commented default config file"))
                .subcommand(Command::new("show").about("Print the effective configuration and resolved presets"))
                .subcommand(Command::new("validate").about("Check the config file for invalid values"))
                .subcommand(Command::new("path").about("Print the config file path")),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a scripted flaky operation through a retry profile")
                .arg(
                    Arg::new("profile")
                        .short('p')
                        .long("profile")
                        .value_name("PROFILE")
                        .help("Retry profile")
                        .value_parser(["default", "encryption", "decryption", "storage", "access_validation"])
                        .default_value("default"),
                )
                .arg(
                    Arg::new("fail-first")
                        .short('f')
                        .long("fail-first")
                        .value_name("N")
                        .help("Number of leading attempts that fail")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("max-attempts")
                        .long("max-attempts")
                        .value_name("N")
                        .help("Override the profile's attempt limit")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("no-jitter")
                        .long("no-jitter")
                        .help("Disable delay jitter")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("breaker")
                .about("Drive a circuit breaker with scripted calls and print its transitions")
                .arg(
                    Arg::new("service")
                        .short('s')
                        .long("service")
                        .value_name("NAME")
                        .help("Service key")
                        .default_value("storage"),
                )
                .arg(
                    Arg::new("calls")
                        .short('n')
                        .long("calls")
                        .value_name("N")
                        .help("Number of calls to make")
                        .value_parser(clap::value_parser!(u32).range(1..=MAX_BREAKER_CALLS as i64))
                        .default_value("10"),
                )
                .arg(
                    Arg::new("fail-first")
                        .short('f')
                        .long("fail-first")
                        .value_name("K")
                        .help("Number of leading calls whose operation fails")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("5"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Pause between calls")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                ),
        )
}

fn config_manager(dir: Option<&String>) -> Result<ConfigManager> {
    let manager = match dir {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    };
    manager.context("Failed to locate configuration directory")
}

fn init_logging(config: Option<&Config>) {
    let level = config.map(|c| c.logging.level).unwrap_or(LogLevel::Info);
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level.to_string()),
    );
    if config.is_some_and(|c| !c.logging.timestamps) {
        builder.format_timestamp(None);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(matches.get_one::<String>("config-dir"))?;

    let config = manager.load_with_env_overrides();
    init_logging(config.as_ref().ok());

    match matches.subcommand() {
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&manager),
            Some(("show", _)) => commands::config_show(&manager, &config?),
            Some(("validate", _)) => commands::config_validate(&manager),
            Some(("path", _)) => commands::config_path(&manager),
            _ => {
                build_cli().print_help()?;
                Ok(())
            }
        },
        Some(("simulate", sub_matches)) => {
            let config = config.context("Failed to load configuration")?;
            commands::simulate(&config.build_resilience(), sub_matches).await
        }
        Some(("breaker", sub_matches)) => {
            let config = config.context("Failed to load configuration")?;
            commands::breaker(&config, sub_matches).await
        }
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
