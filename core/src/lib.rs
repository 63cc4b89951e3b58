//! adaptive-breaker - Lock-free circuit breaker for a single dependency
//!
//! This crate provides a circuit breaker that can be shared across threads and
//! tasks without external locking:
//! - Three-state lifecycle (Closed → Open → HalfOpen) with compare-and-swap transitions
//! - Saturating atomic counters with a one-time warning on overflow
//! - Optional adaptive tripping on failure rate, gated by a minimum request count
//! - Runtime-tunable settings with all-or-nothing validation
//! - Panic-safe invocation of user-supplied policy hooks
//! - Monotonic time tracking to prevent NTP clock skew issues
//!
//! # Example
//!
//! ```rust
//! use adaptive_breaker::CircuitBreaker;
//! use std::time::Duration;
//!
//! let circuit = CircuitBreaker::builder("my_service")
//!     .failure_threshold(5)
//!     .timeout(Duration::from_secs(30))
//!     .max_requests(2)
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! // Execute with circuit protection
//! let result = circuit.call(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//! assert!(result.is_ok());
//!
//! // Check circuit state
//! if circuit.is_open() {
//!     println!("Circuit is open, skipping call");
//! }
//! ```

pub mod adaptive;
mod admission;
pub mod builder;
pub mod callbacks;
pub mod cancel;
pub mod circuit;
pub mod classifier;
mod clock;
pub mod counts;
pub mod errors;
pub mod hooks;
pub mod metrics;
pub mod settings;
pub mod state;

pub use builder::CircuitBuilder;
pub use cancel::{CancelSignal, Cancellation, Deadline};
pub use circuit::{CircuitBreaker, InvariantViolation, TripFn};
pub use classifier::{DefaultClassifier, OutcomeContext, PredicateClassifier, SuccessClassifier};
pub use counts::{CounterKind, Counts};
pub use errors::{CircuitError, ConfigError};
pub use hooks::{FaultLogger, HookFault, HookKind, TracingFaultLogger};
pub use metrics::{Diagnostics, Metrics};
pub use settings::{Config, Settings, SettingsUpdate};
pub use state::State;
