//! HTTP client error types.

use std::fmt;
use thiserror::Error;

use crate::{Diagnostics, Response, TransportKind};

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Invalid or missing option, detected before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A name that is not a member of one of the protocol tables.
    #[error("unsupported {table} value: {key}")]
    Unsupported {
        /// Table the lookup ran against.
        table: &'static str,
        /// The rejected key.
        key: String,
    },

    /// Dispatch was invoked with a verb outside the supported set.
    #[error("Unknown HTTP method: {0}")]
    MethodNotFound(String),

    /// The transport failed before a response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-2xx response, raised only when the error-throwing policy is on.
    #[error("HTTP status error: {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// The full response, kept for inspection.
        response: Box<Response>,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Unsupported { .. })
    }

    /// Check if this is a transport error.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.kind() == TransportErrorKind::Timeout)
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Transport(e) if matches!(e.kind(), TransportErrorKind::Connect | TransportErrorKind::Resolve)
        )
    }

    /// Get the HTTP status code if this is a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused or reset.
    Connect,
    /// DNS or proxy name resolution failed.
    Resolve,
    /// Connect or total timeout elapsed.
    Timeout,
    /// TLS handshake or certificate verification failed.
    Tls,
    /// Redirect limit or redirect policy violation.
    Redirect,
    /// Anything else the backend reported.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Resolve => "resolve",
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Redirect => "redirect",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Low-level failure captured during dispatch.
///
/// `code` is backend specific: the libcurl `CURLcode` for the direct
/// transport, the [`TransportErrorKind`] ordinal for the delegating one.
#[derive(Debug, Clone, Error)]
#[error("{transport} transport error {code} ({kind}): {message}")]
pub struct TransportError {
    transport: TransportKind,
    kind: TransportErrorKind,
    code: i32,
    message: String,
    diagnostics: Diagnostics,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(
        transport: TransportKind,
        kind: TransportErrorKind,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            kind,
            code,
            message: message.into(),
            diagnostics: Diagnostics::new(transport),
        }
    }

    /// Attach the partial diagnostics gathered before the failure.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Transport that produced the error.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Error classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Backend-specific error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Backend error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostics collected up to the failure.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
