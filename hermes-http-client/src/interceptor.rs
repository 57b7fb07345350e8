//! Request and response interceptors.

use async_trait::async_trait;

use crate::{PreparedRequest, Response, Result};

/// Hook run around every dispatch, whatever the transport.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Inspect or modify the request before it is handed to the transport.
    async fn before_dispatch(&self, request: &mut PreparedRequest) -> Result<()> {
        let _ = request;
        Ok(())
    }

    /// Inspect, replace or reject the response.
    async fn after_dispatch(&self, response: Response) -> Result<Response> {
        Ok(response)
    }
}

/// Logging interceptor that logs requests and responses.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor {
    log_headers: bool,
    log_body: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }

    /// Enable logging of body.
    pub fn with_body(mut self) -> Self {
        self.log_body = true;
        self
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn before_dispatch(&self, request: &mut PreparedRequest) -> Result<()> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            "Sending HTTP request"
        );

        if self.log_headers {
            for (name, value) in request.headers.iter() {
                tracing::trace!(header = %name, value = %value, "Request header");
            }
        }

        if self.log_body && request.body.is_some() {
            tracing::trace!(body = ?request.body, "Request body");
        }

        Ok(())
    }

    async fn after_dispatch(&self, response: Response) -> Result<Response> {
        tracing::debug!(
            status = %response.status(),
            transport = %response.diagnostics().transport,
            "Received HTTP response"
        );

        if self.log_headers {
            for (name, value) in response.header_lines() {
                tracing::trace!(header = %name, value = %value, "Response header");
            }
        }

        if self.log_body {
            tracing::trace!(body = %response.text_lossy(), "Response body");
        }

        Ok(response)
    }
}
