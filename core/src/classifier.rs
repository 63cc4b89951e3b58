//! Outcome classification
//!
//! This module decides whether a finished call counts as a success or a
//! failure for the breaker's statistics. The error value passed through to
//! the caller is never changed by classification.

use std::any::Any;
use std::time::Duration;

/// Context provided to success classifiers for outcome evaluation
#[derive(Debug)]
pub struct OutcomeContext<'a> {
    /// Circuit name
    pub circuit_name: &'a str,
    /// The error returned by the call, if any (can be downcast to specific types)
    pub error: Option<&'a dyn Any>,
    /// Duration of the call
    pub duration: Duration,
}

/// Trait for classifying outcomes - determines if a call counts as healthy
///
/// Implementors can inspect the error type and context to decide whether an
/// error is "expected" (a validation failure, a 404) and should not count
/// against the dependency.
///
/// # Examples
///
/// ```rust
/// use adaptive_breaker::{OutcomeContext, SuccessClassifier};
///
/// #[derive(Debug)]
/// struct NotFoundIsFine;
///
/// impl SuccessClassifier for NotFoundIsFine {
///     fn is_successful(&self, ctx: &OutcomeContext<'_>) -> bool {
///         match ctx.error {
///             None => true,
///             Some(e) => e.downcast_ref::<u16>() == Some(&404),
///         }
///     }
/// }
/// ```
pub trait SuccessClassifier: Send + Sync + std::fmt::Debug {
    /// Returns `true` if the outcome should be recorded as a success
    fn is_successful(&self, ctx: &OutcomeContext<'_>) -> bool;
}

/// Default classifier: a call succeeded exactly when it returned no error
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl SuccessClassifier for DefaultClassifier {
    fn is_successful(&self, ctx: &OutcomeContext<'_>) -> bool {
        ctx.error.is_none()
    }
}

/// Predicate-based classifier using a closure
///
/// Allows using simple closures for common filtering patterns.
pub struct PredicateClassifier<F>
where
    F: Fn(&OutcomeContext<'_>) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&OutcomeContext<'_>) -> bool + Send + Sync,
{
    /// Create a new predicate-based classifier
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> SuccessClassifier for PredicateClassifier<F>
where
    F: Fn(&OutcomeContext<'_>) -> bool + Send + Sync,
{
    fn is_successful(&self, ctx: &OutcomeContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&OutcomeContext<'_>) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classifier() {
        let classifier = DefaultClassifier;

        let ok = OutcomeContext {
            circuit_name: "test",
            error: None,
            duration: Duration::from_millis(1),
        };
        let failed = OutcomeContext {
            circuit_name: "test",
            error: Some(&"any error" as &dyn Any),
            duration: Duration::from_millis(1),
        };

        assert!(classifier.is_successful(&ok));
        assert!(!classifier.is_successful(&failed));
    }

    #[test]
    fn test_slow_calls_count_as_failures() {
        let classifier = PredicateClassifier::new(|ctx| {
            ctx.error.is_none() && ctx.duration < Duration::from_secs(1)
        });

        let fast = OutcomeContext {
            circuit_name: "test",
            error: None,
            duration: Duration::from_millis(500),
        };
        let slow = OutcomeContext {
            circuit_name: "test",
            error: None,
            duration: Duration::from_secs(2),
        };

        assert!(classifier.is_successful(&fast));
        assert!(!classifier.is_successful(&slow));
    }

    #[test]
    fn test_error_type_downcast() {
        #[derive(Debug)]
        struct MyError {
            is_server_error: bool,
        }

        let server_error = MyError {
            is_server_error: true,
        };
        let client_error = MyError {
            is_server_error: false,
        };

        // Client errors are the caller's fault, not the dependency's
        let classifier = PredicateClassifier::new(|ctx| match ctx.error {
            None => true,
            Some(e) => e
                .downcast_ref::<MyError>()
                .map(|e| !e.is_server_error)
                .unwrap_or(false),
        });

        let server_ctx = OutcomeContext {
            circuit_name: "test",
            error: Some(&server_error as &dyn Any),
            duration: Duration::from_millis(100),
        };
        let client_ctx = OutcomeContext {
            circuit_name: "test",
            error: Some(&client_error as &dyn Any),
            duration: Duration::from_millis(100),
        };

        assert!(!classifier.is_successful(&server_ctx));
        assert!(classifier.is_successful(&client_ctx));
    }
}
