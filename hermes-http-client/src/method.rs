//! Supported HTTP verbs.

use std::fmt;
use std::str::FromStr;

use crate::{HttpClientError, Result};

/// The closed set of verbs a [`Client`](crate::Client) can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// CONNECT
    Connect,
    /// DELETE
    Delete,
    /// GET
    Get,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// PATCH
    Patch,
    /// POST
    Post,
    /// PURGE (cache invalidation, non-standard)
    Purge,
    /// PUT
    Put,
    /// TRACE
    Trace,
}

impl Method {
    /// Every supported verb.
    pub const ALL: [Method; 10] = [
        Method::Connect,
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Patch,
        Method::Post,
        Method::Purge,
        Method::Put,
        Method::Trace,
    ];

    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Purge => "PURGE",
            Self::Put => "PUT",
            Self::Trace => "TRACE",
        }
    }

    /// Whether a configured body is attached for this verb.
    pub fn carries_body(&self) -> bool {
        matches!(
            self,
            Self::Post | Self::Put | Self::Delete | Self::Patch | Self::Options
        )
    }

    /// Convert to the `http` crate's method type.
    pub fn to_http(&self) -> http::Method {
        match self {
            Self::Connect => http::Method::CONNECT,
            Self::Delete => http::Method::DELETE,
            Self::Get => http::Method::GET,
            Self::Head => http::Method::HEAD,
            Self::Options => http::Method::OPTIONS,
            Self::Patch => http::Method::PATCH,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Trace => http::Method::TRACE,
            Self::Purge => http::Method::from_bytes(b"PURGE").unwrap_or(http::Method::GET),
        }
    }
}

impl FromStr for Method {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == name)
            .ok_or(HttpClientError::MethodNotFound(name))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
