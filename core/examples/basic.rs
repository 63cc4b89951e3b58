//! Basic circuit breaker usage example

use adaptive_breaker::{CircuitBreaker, SettingsUpdate};
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== Circuit Breaker Basic Example ===\n");

    // Create a circuit with builder API
    let circuit = CircuitBreaker::builder("payment_api")
        .failure_threshold(3)
        .interval(Duration::from_secs(10))
        .timeout(Duration::from_millis(500))
        .max_requests(1)
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .on_close(|name| println!("🟢 Circuit '{}' closed!", name))
        .on_half_open(|name| println!("🟡 Circuit '{}' half-open, testing...", name))
        .build();

    println!("Initial state: {}\n", circuit.state_name());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        match circuit.call(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ Error: {}", e),
        }
    }
    println!("State: {}\n", circuit.state_name());

    // Simulate failures
    println!("--- Triggering failures ---");
    for i in 1..=3 {
        match circuit.call(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {} (circuit opened)\n", circuit.state_name());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match circuit.call(|| Ok::<_, String>("Should be rejected")) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    if let Some(wait) = circuit.diagnostics().time_until_probe {
        println!("Next probe in {:?}\n", wait);
    }

    // Stretch the open timeout at runtime; the open timer restarts
    println!("--- Tuning timeout while open ---");
    match circuit.update_settings(SettingsUpdate::new().timeout(Duration::from_millis(800))) {
        Ok(settings) => println!("Timeout is now {:?}\n", settings.timeout),
        Err(e) => println!("✗ {}\n", e),
    }

    // Wait for the probe window and demonstrate recovery
    println!("--- Waiting for recovery ---");
    thread::sleep(Duration::from_millis(900));
    match circuit.call(|| Ok::<_, String>("Payment successful")) {
        Ok(result) => println!("✓ {}", result),
        Err(e) => println!("✗ {}", e),
    }
    println!("State: {}\n", circuit.state_name());

    let metrics = circuit.metrics();
    println!(
        "Metrics: requests={} failure_rate={:.2}",
        metrics.counts.requests, metrics.failure_rate
    );
}
