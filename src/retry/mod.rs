//! Retry with exponential backoff
//!
//! This module provides:
//! - Error classification (category, severity, retry decision)
//! - A generic retry executor driven by that classification
//! - A network variant with registry-specific defaults
//!
//! Backoff sleeps here are the only deliberate suspension points of a run.

mod classifier;

pub use classifier::{
    ErrorCategory, ErrorClassifier, ErrorContext, ErrorInfo, ErrorSeverity,
    DEFAULT_MAX_CONTEXT_BYTES,
};

use crate::error::AppError;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Relative jitter applied to each delay (±10%)
const JITTER_RATIO: f64 = 0.1;

/// Backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Defaults for registry HTTP requests
    pub fn network() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5_000),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Override the retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt + 1`, without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        if base <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (base * self.multiplier.powi(exponent)).min(max);
        if delay.is_finite() && delay > 0.0 {
            Duration::from_secs_f64(delay)
        } else {
            Duration::ZERO
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = 1.0 + (fastrand::f64() * 2.0 - 1.0) * JITTER_RATIO;
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }
}

/// Runs fallible async operations under a `RetryConfig`
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    classifier: ErrorClassifier,
    /// Policy used by `execute_network_request`
    network_config: RetryConfig,
}

impl RetryExecutor {
    /// Create an executor that classifies failures with `classifier`
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self {
            classifier,
            network_config: RetryConfig::network(),
        }
    }

    /// Replace the policy used for registry requests
    pub fn with_network_config(mut self, network_config: RetryConfig) -> Self {
        self.network_config = network_config;
        self
    }

    /// Policy used for registry requests
    pub fn network_config(&self) -> &RetryConfig {
        &self.network_config
    }

    /// The classifier used to decide retryability
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries` retries have been spent. The last error is returned.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        config: &RetryConfig,
        mut operation: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            debug!(operation = label, attempt = attempt + 1, "Starting attempt");

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let mut context = ErrorContext::new();
            context.insert("operation".to_string(), Value::from(label));
            context.insert("attempt".to_string(), Value::from(attempt + 1));
            context.insert("max_retries".to_string(), Value::from(config.max_retries));
            let info = self.classifier.classify(&err, context);

            if !info.retryable {
                debug!(operation = label, "Not retrying non-retryable error");
                return Err(err);
            }
            if attempt >= config.max_retries {
                warn!(
                    operation = label,
                    attempts = attempt + 1,
                    "Retries exhausted"
                );
                return Err(err);
            }

            let delay = config.backoff(attempt);
            warn!(
                operation = label,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying after backoff"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// `execute` with the registry request policy
    pub async fn execute_network_request<T, F, Fut>(
        &self,
        label: &str,
        operation: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        self.execute(label, &self.network_config, operation).await
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(ErrorClassifier::new())
    }
}
