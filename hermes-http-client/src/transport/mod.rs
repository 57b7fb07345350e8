//! Transport drivers.
//!
//! A driver turns a [`PreparedRequest`] plus the [`OptionSet`] it came from
//! into a [`Response`]. Two drivers ship with the crate:
//!
//! - [`DirectTransport`] drives libcurl and rebuilds the response from the
//!   raw transfer buffer.
//! - [`DelegatingTransport`] hands the request to reqwest, which already
//!   returns a structured response.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::options::{HeaderList, OptionSet, RequestBody};
use crate::{HttpClientError, Method, Response, Result};

mod delegating;
mod direct;

pub use delegating::DelegatingTransport;
pub use direct::DirectTransport;

/// Built-in transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// libcurl, raw buffer reconstruction.
    Direct,
    /// reqwest.
    #[default]
    Delegating,
}

impl TransportKind {
    /// Construct the driver for this kind.
    pub fn driver(self) -> Arc<dyn TransportDriver> {
        match self {
            Self::Direct => Arc::new(DirectTransport::new()),
            Self::Delegating => Arc::new(DelegatingTransport::new()),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Delegating => f.write_str("delegating"),
        }
    }
}

/// A backend able to perform one request.
#[async_trait]
pub trait TransportDriver: Send + Sync {
    /// Which transport this is, recorded in diagnostics.
    fn kind(&self) -> TransportKind;

    /// Perform the request. Every engine resource is released before this
    /// returns.
    async fn dispatch(&self, request: PreparedRequest, options: &OptionSet) -> Result<Response>;
}

/// Backend-neutral request derived from an [`OptionSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// HTTP verb.
    pub method: Method,
    /// Final target URL, query included.
    pub url: String,
    /// Headers to send, implicit defaults applied.
    pub headers: HeaderList,
    /// Single `Cookie` value: a caller-set `Cookie` header first, then the
    /// configured cookies. `headers` never carries a `Cookie` entry.
    pub cookie: Option<String>,
    /// Authoritative body, `None` for verbs without one.
    pub body: Option<RequestBody>,
}

impl PreparedRequest {
    /// Resolve URL, query, body and implicit headers for `method`.
    pub fn prepare(method: Method, uri: &str, options: &OptionSet) -> Result<Self> {
        let mut url = resolve_url(&options.base_uri, uri)?;
        if method == Method::Get {
            url = append_query(&url, options.query.pairs())?;
        }

        let body = if method.carries_body() {
            options.body()
        } else {
            None
        };

        let mut headers = options.headers.clone();
        match &body {
            Some(RequestBody::Json(_)) => {
                headers.set_default("Content-Type", "application/json");
                headers.set_default("Accept", "application/json");
            }
            Some(RequestBody::Form(_)) => {
                headers.set_default("Content-Type", "application/x-www-form-urlencoded");
            }
            Some(RequestBody::Raw(_)) => {
                headers.set_default("Content-Type", "application/octet-stream");
            }
            _ => {}
        }

        let cookie = match (headers.remove("Cookie"), options.cookie_header()) {
            (Some(caller), Some(configured)) if !caller.trim().is_empty() => {
                Some(format!("{}; {}", caller.trim().trim_end_matches(';'), configured))
            }
            (Some(caller), None) if !caller.trim().is_empty() => Some(caller),
            (_, configured) => configured,
        };

        Ok(Self {
            method,
            url,
            headers,
            cookie,
            body,
        })
    }
}

/// Resolve the request target.
///
/// An absolute URI (containing `://`) is used verbatim, a relative one is
/// appended to `base` as-is, and an empty one falls back to `base`.
pub fn resolve_url(base: &str, uri: &str) -> Result<String> {
    let uri = uri.trim();
    if uri.contains("://") {
        return Ok(uri.to_string());
    }
    if base.is_empty() {
        return Err(HttpClientError::config("no URL available"));
    }
    Ok(format!("{}{}", base, uri))
}

/// Append URL-encoded query pairs.
///
/// Pairs are joined to an existing query string with `&`; a fragment stays
/// at the end.
pub fn append_query(url: &str, pairs: &[(String, String)]) -> Result<String> {
    if pairs.is_empty() {
        return Ok(url.to_string());
    }
    let encoded = serde_urlencoded::to_string(pairs)
        .map_err(|e| HttpClientError::config(format!("invalid query: {}", e)))?;

    let (target, fragment) = match url.split_once('#') {
        Some((target, fragment)) => (target, Some(fragment)),
        None => (url, None),
    };
    let separator = match target.find('?') {
        None => "?",
        Some(_) if target.ends_with('?') || target.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut out = format!("{}{}{}", target, separator, encoded);
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    Ok(out)
}

pub(crate) fn urlencode_pairs(pairs: &[(String, String)]) -> Result<String> {
    serde_urlencoded::to_string(pairs)
        .map_err(|e| HttpClientError::config(format!("invalid form fields: {}", e)))
}
