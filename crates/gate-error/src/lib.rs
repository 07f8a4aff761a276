// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the clawee decision core.
//!
//! Every error carries an [`ErrorCode`] (a machine-readable, stable string
//! tag), a human-readable message, an optional cause chain, and arbitrary
//! key-value context. Use the builder returned by [`ClaweeError::new`] to
//! construct errors fluently.
//!
//! Per-gate denials (`PolicyDeny`, `EgressDeny`, `BudgetSuspended`, ...) are
//! *not* represented here — SPEC_FULL §7 treats a deny as a decision, not an
//! exception, so those live as [`gate_core::Decision`] values. This crate
//! covers the remaining kinds: boot/reload-fatal configuration problems,
//! signature verification failures, and transient backend unavailability.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Boot-time or reload-time catalog/keyring/env configuration problems.
    Configuration,
    /// HMAC signature verification failures.
    Signature,
    /// Replay-protection store contract violations.
    Replay,
    /// Approval or budget store backend unavailability.
    Backend,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Signature => "signature",
            Self::Replay => "replay",
            Self::Backend => "backend",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Configuration (fatal at boot; reload retains the current snapshot) --
    /// A required configuration value (path, cap, key) was not supplied.
    ConfigMissingField,
    /// A catalog document is present but unsigned.
    ConfigCatalogUnsigned,
    /// A catalog document could not be parsed as JSON or failed schema validation.
    ConfigCatalogUnparseable,
    /// A keyring was constructed without a valid active kid.
    ConfigKeyringMissingActive,
    /// The pricing catalog has neither an exact model entry nor a `*` fallback.
    ConfigPricingMissingModel,

    // -- Signature --
    /// A signature (legacy or v2) failed verification against the keyring.
    SignatureMismatch,

    // -- Replay --
    /// A backend cannot guarantee the linearizable register-if-absent contract.
    ReplayBackendUnreliable,

    // -- Backend --
    /// The approval, budget, or replay backing store is unavailable.
    BackendUnavailable,
    /// A backend I/O operation failed (disk, network).
    BackendIo,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigMissingField
            | Self::ConfigCatalogUnsigned
            | Self::ConfigCatalogUnparseable
            | Self::ConfigKeyringMissingActive
            | Self::ConfigPricingMissingModel => ErrorCategory::Configuration,

            Self::SignatureMismatch => ErrorCategory::Signature,

            Self::ReplayBackendUnreliable => ErrorCategory::Replay,

            Self::BackendUnavailable | Self::BackendIo => ErrorCategory::Backend,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"CONFIG_CATALOG_UNSIGNED"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissingField => "CONFIG_MISSING_FIELD",
            Self::ConfigCatalogUnsigned => "CONFIG_CATALOG_UNSIGNED",
            Self::ConfigCatalogUnparseable => "CONFIG_CATALOG_UNPARSEABLE",
            Self::ConfigKeyringMissingActive => "CONFIG_KEYRING_MISSING_ACTIVE",
            Self::ConfigPricingMissingModel => "CONFIG_PRICING_MISSING_MODEL",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::ReplayBackendUnreliable => "REPLAY_BACKEND_UNRELIABLE",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::BackendIo => "BACKEND_IO",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ClaweeError
// ---------------------------------------------------------------------------

/// Unified error for the clawee decision core.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// underlying cause, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use gate_error::{ClaweeError, ErrorCode};
///
/// let err = ClaweeError::new(ErrorCode::BackendUnavailable, "replay store unreachable")
///     .with_context("backend", "remote-sql")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct ClaweeError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ClaweeError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), source: None, context: BTreeMap::new() }
    }

    /// Attaches a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for ClaweeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ClaweeError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ClaweeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ClaweeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ClaweeError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaweeErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ClaweeError> for ClaweeErrorDto {
    fn from(err: &ClaweeError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ClaweeErrorDto> for ClaweeError {
    fn from(dto: ClaweeErrorDto) -> Self {
        Self { code: dto.code, message: dto.message, source: None, context: dto.context }
    }
}
