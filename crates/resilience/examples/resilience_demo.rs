// crates/resilience/examples/resilience_demo.rs
//! Demonstration of resilience patterns

use std::time::Duration;
use vellum_resilience::{
    CircuitBreakerConfig, Resilience, RetryConfigOverride, RetryPresets, RetryProfile,
};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Resilience Patterns Demo");
    println!("========================\n");

    let resilience = Resilience::with_presets(RetryPresets::default());

    demo_retry(&resilience).await;
    println!();
    demo_circuit_breaker(&resilience).await;
}

async fn demo_retry(resilience: &Resilience) {
    println!("1. Retry Pattern (storage profile)");
    println!("----------------------------------");

    let fast = RetryConfigOverride::new()
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(400));
    let mut attempt = 0;

    let result = resilience
        .retry_with_profile(
            RetryProfile::Storage,
            || {
                attempt += 1;
                let current = attempt;
                println!("  Attempt {}", current);
                async move {
                    if current < 3 {
                        Err("Simulated upload failure")
                    } else {
                        Ok(current)
                    }
                }
            },
            Some(fast),
        )
        .await;

    match result.data() {
        Some(value) => println!(
            "✓ Success after {} attempts in {:?}: {}",
            result.attempts(),
            result.total_time(),
            value
        ),
        None => println!("✗ Failed: {}", result.error_message().unwrap_or_default()),
    }
}

async fn demo_circuit_breaker(resilience: &Resilience) {
    println!("2. Circuit Breaker Pattern");
    println!("--------------------------");

    let config = CircuitBreakerConfig::new(3, Duration::from_millis(100)).with_success_threshold(1);

    for i in 1..=5 {
        let result = resilience
            .execute_with_circuit_breaker(|| async { Err::<(), _>("Service down") }, "kms", &config)
            .await;
        println!(
            "  Call {}: {}",
            i,
            result.error_message().unwrap_or_default()
        );
    }

    println!("  Waiting for timeout...");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = resilience
        .execute_with_circuit_breaker(|| async { Ok::<_, String>("key") }, "kms", &config)
        .await;
    println!("  After timeout: success = {}", result.success());

    if let Some(state) = resilience.circuit_breaker_state("kms") {
        println!("  Breaker is now {}", state.state());
    }
}
