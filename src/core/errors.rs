// src/core/errors.rs

//! Defines the primary error type for the entire application.
//!
//! Every domain failure funnels through `FleetError` so that the HTTP layer
//! (`server::http::envelope`) has exactly one place that maps a failure to a
//! status code and a machine-readable `kind` string.

use std::sync::Arc;
use thiserror::Error;

/// The sub-kind of an `UpstreamFailed` error, naming which external tool failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Zfs,
    Hypervisor,
    Jail,
    Samba,
    Dhcp,
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpstreamKind::Zfs => "zfs",
            UpstreamKind::Hypervisor => "hypervisor",
            UpstreamKind::Jail => "jail",
            UpstreamKind::Samba => "samba",
            UpstreamKind::Dhcp => "dhcp",
        };
        f.write_str(s)
    }
}

/// The sub-kind of a `TransferFailed` error, naming which replication phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Send,
    Recv,
    Resume,
    Divergence,
    NoSource,
    MissingBase,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferKind::Send => "send",
            TransferKind::Recv => "recv",
            TransferKind::Resume => "resume",
            TransferKind::Divergence => "divergence",
            TransferKind::NoSource => "no_source",
            TransferKind::MissingBase => "missing_base",
        };
        f.write_str(s)
    }
}

/// The main error enum, representing all possible failures within the server.
///
/// `kind()` returns the machine-readable taxonomy string; the
/// `Display` impl (via `thiserror`) is the human-facing `message`. The two
/// are deliberately kept separate — callers must never put `data.detail`
/// (upstream stderr, etc.) into the text that reaches `message`.
#[derive(Error, Debug, Clone)]
pub enum FleetError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("resource busy: {0}")]
    ResourceBusy(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cluster unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("leader unknown")]
    LeaderUnknown,

    #[error("forward to {node} failed: {reason}")]
    ForwardFailed { node: String, reason: String },

    #[error("upstream {kind} failed: {message}")]
    UpstreamFailed {
        kind: UpstreamKind,
        message: String,
        detail: Option<String>,
    },

    #[error("transfer failed ({kind}): {message}")]
    TransferFailed { kind: TransferKind, message: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),
}

impl FleetError {
    /// The machine-readable `kind` string for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            FleetError::Validation(_) => "Validation",
            FleetError::NotFound(_) => "NotFound",
            FleetError::AlreadyExists(_) => "AlreadyExists",
            FleetError::InvalidState(_) => "InvalidState",
            FleetError::ResourceBusy(_) => "ResourceBusy",
            FleetError::PermissionDenied(_) => "PermissionDenied",
            FleetError::ClusterUnavailable(_) => "ClusterUnavailable",
            FleetError::LeaderUnknown => "LeaderUnknown",
            FleetError::ForwardFailed { .. } => "ForwardFailed",
            FleetError::UpstreamFailed { .. } => "UpstreamFailed",
            FleetError::TransferFailed { .. } => "TransferFailed",
            FleetError::Timeout(_) => "Timeout",
            FleetError::Cancelled => "Cancelled",
            FleetError::Internal(_) => "Internal",
            FleetError::Io(_) => "Internal",
        }
    }

    /// Detail that is safe to carry in `data.detail` but must never be
    /// folded into the user-visible `message` (propagation rule).
    pub fn detail(&self) -> Option<&str> {
        match self {
            FleetError::UpstreamFailed { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn upstream(kind: UpstreamKind, message: impl Into<String>, stderr: Option<String>) -> Self {
        FleetError::UpstreamFailed {
            kind,
            message: message.into(),
            detail: stderr,
        }
    }

    pub fn transfer(kind: TransferKind, message: impl Into<String>) -> Self {
        FleetError::TransferFailed {
            kind,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for FleetError {
    fn from(e: std::io::Error) -> Self {
        FleetError::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FleetError::Timeout(e.to_string())
        } else {
            FleetError::Internal(format!("http client error: {e}"))
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(e: serde_json::Error) -> Self {
        FleetError::Internal(format!("json error: {e}"))
    }
}

impl From<std::num::ParseIntError> for FleetError {
    fn from(e: std::num::ParseIntError) -> Self {
        FleetError::Validation(format!("invalid integer: {e}"))
    }
}

pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_error_taxonomy() {
        assert_eq!(FleetError::Validation("x".into()).kind(), "Validation");
        assert_eq!(FleetError::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(FleetError::LeaderUnknown.kind(), "LeaderUnknown");
        assert_eq!(
            FleetError::upstream(UpstreamKind::Zfs, "boom", Some("stderr".into())).kind(),
            "UpstreamFailed"
        );
    }

    #[test]
    fn detail_never_leaks_into_display() {
        let e = FleetError::upstream(UpstreamKind::Zfs, "send failed", Some("secret-stderr".into()));
        assert!(!e.to_string().contains("secret-stderr"));
        assert_eq!(e.detail(), Some("secret-stderr"));
    }
}
