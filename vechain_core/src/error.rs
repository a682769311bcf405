//! Error taxonomy shared by the capability registry and the transaction intent builder.
//!
//! Errors never cross the registry boundary as Rust errors: [`crate::CapabilitySet::invoke`]
//! folds every [`CapabilityError`] into a [`crate::CapabilityResult::Err`] value carrying
//! its [`ErrorKind`] and a human-readable message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a failed invocation, serialized with the names orchestrators match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "UpstreamError")]
    Upstream,
    #[serde(rename = "ExecutionError")]
    Execution,
    #[serde(rename = "InvalidAmountError")]
    InvalidAmount,
    #[serde(rename = "UnsupportedTokenError")]
    UnsupportedToken,
    #[serde(rename = "MetadataUnavailableError")]
    MetadataUnavailable,
    #[serde(rename = "DuplicateNameError")]
    DuplicateName,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Upstream => "UpstreamError",
            ErrorKind::Execution => "ExecutionError",
            ErrorKind::InvalidAmount => "InvalidAmountError",
            ErrorKind::UnsupportedToken => "UnsupportedTokenError",
            ErrorKind::MetadataUnavailable => "MetadataUnavailableError",
            ErrorKind::DuplicateName => "DuplicateNameError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single argument that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldError {
    /// Dotted path of the argument, e.g. `"recipient"` or `"clauses[0].to"`
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn display_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors produced while resolving, validating or executing a capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("invalid arguments: {}", display_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("capability {0:?} not found")]
    NotFound(String),

    #[error("capability {0:?} is already registered")]
    DuplicateName(String),

    #[error("{endpoint}: {message}")]
    Upstream { endpoint: String, message: String },

    #[error("{0}")]
    Execution(String),

    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("unsupported token {token}: {reason}")]
    UnsupportedToken { token: String, reason: String },

    #[error("token metadata unavailable for {token}: {reason}")]
    MetadataUnavailable { token: String, reason: String },
}

impl CapabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapabilityError::Validation(_) => ErrorKind::Validation,
            CapabilityError::NotFound(_) => ErrorKind::NotFound,
            CapabilityError::DuplicateName(_) => ErrorKind::DuplicateName,
            CapabilityError::Upstream { .. } => ErrorKind::Upstream,
            CapabilityError::Execution(_) => ErrorKind::Execution,
            CapabilityError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            CapabilityError::UnsupportedToken { .. } => ErrorKind::UnsupportedToken,
            CapabilityError::MetadataUnavailable { .. } => ErrorKind::MetadataUnavailable,
        }
    }

    /// Shorthand for a validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        CapabilityError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn upstream(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        CapabilityError::Upstream {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        CapabilityError::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        }
    }

    /// An invocation or request abandoned through its cancellation token. Always
    /// `ExecutionError`, whichever layer noticed the cancellation first.
    pub fn cancelled(what: impl fmt::Display) -> Self {
        CapabilityError::Execution(format!("{what} was cancelled"))
    }

    /// Returns the failing fields of a validation error, empty for other kinds.
    pub fn fields(&self) -> &[FieldError] {
        match self {
            CapabilityError::Validation(fields) => fields,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        CapabilityError::Execution(format!("json error: {err}"))
    }
}
