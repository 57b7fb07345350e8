//! Per-dispatch transfer diagnostics.

use serde::Serialize;
use std::time::Duration;

use crate::TransportKind;

/// Timing and negotiation details for one dispatch.
///
/// Fields a backend cannot observe stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Transport that performed the dispatch.
    pub transport: TransportKind,
    /// Final URL after redirects.
    pub effective_url: Option<String>,
    /// Status code as reported by the engine.
    pub status: Option<u16>,
    /// Negotiated protocol, e.g. `HTTP/1.1` or `HTTP/2`.
    pub protocol: Option<String>,
    /// Total transfer time.
    pub total_time: Option<Duration>,
    /// Time until name resolution completed.
    pub name_lookup_time: Option<Duration>,
    /// Time until the TCP connection was established.
    pub connect_time: Option<Duration>,
    /// Time until the TLS handshake completed.
    pub tls_handshake_time: Option<Duration>,
    /// Remote IP address of the last connection.
    pub primary_ip: Option<String>,
    /// Number of redirects followed.
    pub redirect_count: u32,
    /// URLs visited while following redirects (only when hop tracking is on).
    pub redirect_hops: Vec<String>,
}

impl Diagnostics {
    /// Empty diagnostics for the given transport.
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            ..Default::default()
        }
    }

    /// Render as a JSON value, for logging or debugging output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
