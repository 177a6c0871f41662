//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted log files
//! - Configurable log levels
//! - Local file logging with rotation
//! - Progress reporting through `tracing` events
//!
//! # Example
//!
//! ```no_run
//! use batcher::logging::init_logging;
//! use batcher::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Batch started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a run
///
/// # Example
///
/// ```no_run
/// use batcher::log_run_start;
/// use batcher::domain::ids::ImageId;
///
/// log_run_start!(ImageId::new(1), 12);
/// ```
#[macro_export]
macro_rules! log_run_start {
    ($image:expr, $num_items:expr) => {
        tracing::info!(
            image = %$image,
            items = $num_items,
            "Starting batch run"
        );
    };
}

/// Log the completion of a run
///
/// # Example
///
/// ```no_run
/// use batcher::log_run_complete;
/// use std::time::Duration;
///
/// log_run_complete!(10, 8, Duration::from_millis(250));
/// ```
#[macro_export]
macro_rules! log_run_complete {
    ($processed:expr, $exported:expr, $duration:expr) => {
        tracing::info!(
            processed = $processed,
            exported = $exported,
            duration_ms = $duration.as_millis(),
            "Batch run completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use batcher::log_error_with_context;
/// use batcher::domain::BatcherError;
///
/// let error = BatcherError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log an automatic export retry
///
/// # Example
///
/// ```no_run
/// use batcher::log_retry_attempt;
///
/// log_retry_attempt!("Layer 1", 2, "calling error");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($item:expr, $attempt:expr, $reason:expr) => {
        tracing::warn!(
            item = %$item,
            attempt = $attempt,
            reason = %$reason,
            "Retrying export"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::ids::ImageId;
    use crate::domain::BatcherError;
    use std::time::Duration;

    #[test]
    fn test_macros_expand() {
        log_run_start!(ImageId::new(1), 3);
        log_run_complete!(3, 2, Duration::from_millis(5));
        log_error_with_context!(&BatcherError::Io("disk".to_string()), "cleanup");
        log_retry_attempt!("Layer", 2, "calling error");
    }
}
