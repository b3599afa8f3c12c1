// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vellum_config::{Config, ConfigManager};
use vellum_resilience::{
    CircuitBreakerConfig, CircuitState, Resilience, RetryConfigOverride, RetryProfile,
    RetryResult,
};

/// Write a commented default config file
pub fn config_init(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to initialize configuration")?;

    if created {
        println!(
            "{} Created {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }

    Ok(())
}

/// Print the effective configuration and the presets it resolves to
pub fn config_show(manager: &ConfigManager, config: &Config) -> Result<()> {
    let toml = toml::to_string_pretty(config).context("Failed to render configuration")?;

    println!("{} {}", style("#").dim(), manager.config_path().display());
    println!("{}", toml);

    println!("{}", style("Resolved retry profiles").bold().cyan());
    println!("{}", "=".repeat(80));

    let presets = config.presets();
    for profile in RetryProfile::ALL {
        let resolved = presets.resolve(profile, None);
        println!(
            "  {:<18} attempts={} base={} max={} multiplier={} jitter={}",
            profile.to_string(),
            resolved.max_attempts(),
            format_duration(resolved.base_delay()),
            format_duration(resolved.max_delay()),
            resolved.backoff_multiplier(),
            resolved.jitter()
        );
    }

    let breaker = config.breaker_config();
    println!(
        "\n{} failure_threshold={} timeout={} success_threshold={}",
        style("Circuit breaker").bold().cyan(),
        breaker.failure_threshold(),
        format_duration(breaker.timeout()),
        breaker.success_threshold()
    );

    Ok(())
}

/// Check the config file and fail when it holds invalid values
pub fn config_validate(manager: &ConfigManager) -> Result<()> {
    let errors = manager
        .validate()
        .context("Failed to load configuration")?;

    if errors.is_empty() {
        println!(
            "{} {} is valid",
            style("✓").green().bold(),
            manager.config_path().display()
        );
        return Ok(());
    }

    for error in &errors {
        println!("  {} {}", style("✗").red().bold(), error);
    }
    bail!("{} invalid value(s) in configuration", errors.len())
}

pub fn config_path(manager: &ConfigManager) -> Result<()> {
    println!("{}", manager.config_path().display());
    Ok(())
}

/// Run a scripted flaky operation through a retry profile
pub async fn simulate(resilience: &Resilience, matches: &ArgMatches) -> Result<()> {
    let profile: RetryProfile = matches
        .get_one::<String>("profile")
        .map(|s| s.as_str())
        .unwrap_or("default")
        .parse()?;
    let fail_first = matches.get_one::<u32>("fail-first").copied().unwrap_or(1);

    let mut overrides = RetryConfigOverride::new();
    if let Some(max_attempts) = matches.get_one::<u32>("max-attempts") {
        overrides = overrides.max_attempts(*max_attempts);
    }
    if matches.get_flag("no-jitter") {
        overrides = overrides.jitter(false);
    }

    let config = resilience.resolve(profile, Some(&overrides));
    println!(
        "Simulating {} with {} leading failure(s), up to {} attempt(s)",
        style(profile).bold(),
        fail_first,
        config.max_attempts()
    );

    let result = run_simulation(resilience, profile, fail_first, overrides).await;

    println!("  Attempts: {}", result.attempts());
    println!("  Total time: {}", format_duration(result.total_time()));

    match (result.data(), result.error_message()) {
        (Some(attempt), _) => {
            println!(
                "{} Succeeded on attempt {}",
                style("✓").green().bold(),
                attempt
            );
        }
        (None, message) => {
            println!(
                "{} Failed: {}",
                style("✗").red().bold(),
                message.unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Retries an operation that fails its first `fail_first` attempts
///
/// On success the data is the attempt number that succeeded.
pub async fn run_simulation(
    resilience: &Resilience,
    profile: RetryProfile,
    fail_first: u32,
    overrides: RetryConfigOverride,
) -> RetryResult<u32> {
    let calls = AtomicU32::new(0);
    let operation = || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt <= fail_first {
                log::debug!("Simulated attempt {} failing", attempt);
                Err(format!("simulated failure on attempt {}", attempt))
            } else {
                Ok(attempt)
            }
        }
    };

    let overrides = if overrides.is_empty() {
        None
    } else {
        Some(overrides)
    };
    resilience
        .retry_with_profile(profile, operation, overrides)
        .await
}

/// Drive a circuit breaker with scripted calls and print its transitions
pub async fn breaker(config: &Config, matches: &ArgMatches) -> Result<()> {
    let service = matches
        .get_one::<String>("service")
        .map(|s| s.as_str())
        .unwrap_or("storage");
    let calls = matches.get_one::<u32>("calls").copied().unwrap_or(10);
    let fail_first = matches.get_one::<u32>("fail-first").copied().unwrap_or(5);
    let interval = Duration::from_millis(
        matches.get_one::<u64>("interval-ms").copied().unwrap_or(0),
    );

    let breaker_config = config.breaker_config();
    println!(
        "Driving '{}' with {} call(s), {} failing (threshold {}, timeout {})",
        style(service).bold(),
        calls,
        fail_first,
        breaker_config.failure_threshold(),
        format_duration(breaker_config.timeout())
    );
    println!("{}", "=".repeat(80));

    let resilience = config.build_resilience();
    let steps = drive_breaker(
        &resilience,
        service,
        &breaker_config,
        calls,
        fail_first,
        interval,
    )
    .await;

    let mut previous = CircuitState::Closed;
    for step in &steps {
        let outcome = match &step.outcome {
            CallOutcome::Succeeded => style("ok".to_string()).green(),
            CallOutcome::Failed(message) => style(format!("failed: {}", message)).red(),
            CallOutcome::Rejected => style("rejected".to_string()).yellow(),
        };
        print!("  call {:>3}  {}", step.call, outcome);
        if step.state != previous {
            print!("  [{} -> {}]", previous, style(step.state).bold());
            previous = step.state;
        }
        println!();
    }

    println!("\nFinal state: {}", style(previous).bold());
    Ok(())
}

/// Outcome of one breaker-gated call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Succeeded,
    Failed(String),
    Rejected,
}

/// One call made by [`drive_breaker`] and the state it left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerStep {
    pub call: u32,
    pub outcome: CallOutcome,
    pub state: CircuitState,
}

/// Makes `calls` breaker-gated calls whose first `fail_first` operations fail
pub async fn drive_breaker(
    resilience: &Resilience,
    service: &str,
    config: &CircuitBreakerConfig,
    calls: u32,
    fail_first: u32,
    interval: Duration,
) -> Vec<BreakerStep> {
    let mut steps = Vec::new();

    for call in 1..=calls {
        if call > 1 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let result = resilience
            .execute_with_circuit_breaker(
                || async move {
                    if call <= fail_first {
                        Err(format!("simulated outage on call {}", call))
                    } else {
                        Ok(call)
                    }
                },
                service,
                config,
            )
            .await;

        let outcome = match result.error() {
            None => CallOutcome::Succeeded,
            Some(error) if error.is_circuit_open() => CallOutcome::Rejected,
            Some(error) => CallOutcome::Failed(error.to_string()),
        };
        let state = resilience
            .circuit_breaker_state(service)
            .map(|s| s.state())
            .unwrap_or(CircuitState::Closed);

        steps.push(BreakerStep {
            call,
            outcome,
            state,
        });
    }

    steps
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis >= 1000 && millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else if millis >= 1000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", millis)
    }
}
