//! Normalized HTTP response.

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::{Diagnostics, HttpClientError, Result};

/// Response produced by every transport.
///
/// Header names are lower-cased. `headers()` keeps the last value of a
/// repeated header; `header_all()` returns every occurrence.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    header_lines: Vec<(String, String)>,
    body: Bytes,
    diagnostics: Diagnostics,
}

impl Response {
    pub(crate) fn from_parts(
        status: StatusCode,
        headers: BTreeMap<String, String>,
        header_lines: Vec<(String, String)>,
        body: Bytes,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            status,
            headers,
            header_lines,
            body,
            diagnostics,
        }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get the response headers (last value per name).
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Get a header value by case-insensitive name.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(&name.as_ref().trim().to_lowercase())
            .map(String::as_str)
    }

    /// Get every value of a header, in arrival order.
    pub fn header_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        let name = name.as_ref().trim().to_lowercase();
        self.header_lines
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Every header occurrence, in arrival order.
    pub fn header_lines(&self) -> &[(String, String)] {
        &self.header_lines
    }

    /// Final URL, when the transport reported one.
    pub fn url(&self) -> Option<&str> {
        self.diagnostics.effective_url.as_deref()
    }

    /// Transfer diagnostics.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body as bytes.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Get the response body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Get the response body as text, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Get the content length if available.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Turn a non-2xx response into [`HttpClientError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(HttpClientError::HttpStatus {
                status: self.status.as_u16(),
                response: Box::new(self),
            })
        }
    }
}
