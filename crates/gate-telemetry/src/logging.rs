// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured `tracing` bootstrap shared by every binary built on the
//! decision core (SPEC_FULL §2a).

use gate_error::{ClaweeError, ErrorCode};
use tracing_subscriber::EnvFilter;

/// Output format for the global tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, ANSI-colored output, for local/interactive use.
    Pretty,
    /// Newline-delimited JSON, for shipping to a log aggregator.
    Json,
}

/// Installs the global `tracing_subscriber` registry.
///
/// Reads the `CLAWEE_LOG` environment variable for the filter directive
/// (e.g. `clawee_pipeline=debug,gate_budget=info`), falling back to `info`
/// if unset or invalid.
///
/// # Errors
///
/// Returns [`ClaweeError`] if a global subscriber has already been
/// installed.
pub fn init_tracing(format: LogFormat) -> Result<(), ClaweeError> {
    let filter = EnvFilter::try_from_env("CLAWEE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
    };

    result.map_err(|e| {
        ClaweeError::new(ErrorCode::Internal, "failed to install global tracing subscriber")
            .with_context("cause", e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_variants_are_distinct() {
        assert_ne!(LogFormat::Pretty, LogFormat::Json);
    }

    #[test]
    fn init_tracing_does_not_panic() {
        // try_init (rather than init) means a second call in the same
        // process returns Err instead of panicking; either outcome is fine
        // here since test binaries run this concurrently with other tests.
        let _ = init_tracing(LogFormat::Json);
    }
}
