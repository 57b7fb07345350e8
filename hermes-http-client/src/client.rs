//! HTTP client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::{
    HttpClientError, Interceptor, Method, OptionSet, OptionsBuilder, PreparedRequest, Response,
    Result, TransportDriver, TransportError, TransportKind,
};

/// Stateful HTTP client.
///
/// The client owns one [`OptionSet`] that every dispatch reuses. Mutating
/// the options never performs I/O; only the dispatch methods talk to the
/// network, through the selected [`TransportDriver`].
#[derive(Clone)]
pub struct Client {
    options: OptionSet,
    driver: Arc<dyn TransportDriver>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    last_error: Option<TransportError>,
}

macro_rules! verbs {
    ($($method:ident, $with:ident => $verb:ident;)*) => {
        $(
            #[doc = concat!("Dispatch a `", stringify!($verb), "` request.")]
            pub async fn $method(&mut self, uri: &str) -> Result<Response> {
                self.dispatch(Method::$verb, uri).await
            }

            #[doc = concat!("Dispatch a `", stringify!($verb), "` request with per-call overrides.")]
            pub async fn $with<F>(&mut self, uri: &str, overrides: F) -> Result<Response>
            where
                F: FnOnce(OptionsBuilder) -> Result<OptionsBuilder>,
            {
                self.dispatch_with(Method::$verb, uri, overrides).await
            }
        )*
    };
}

impl Client {
    /// Create a client with the given options and the default transport.
    pub fn new(options: OptionSet) -> Self {
        Self {
            options,
            driver: TransportKind::default().driver(),
            interceptors: Vec::new(),
            last_error: None,
        }
    }

    /// Create a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Switch to a built-in transport.
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.set_transport(kind);
        self
    }

    /// Use a custom transport driver.
    pub fn with_driver(mut self, driver: Arc<dyn TransportDriver>) -> Self {
        self.driver = driver;
        self
    }

    /// Register an interceptor. Interceptors run in registration order.
    pub fn with_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Switch to a built-in transport.
    pub fn set_transport(&mut self, kind: TransportKind) {
        self.driver = kind.driver();
    }

    /// The transport that will perform the next dispatch.
    pub fn transport(&self) -> TransportKind {
        self.driver.kind()
    }

    /// Get the held options.
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Get the held options mutably.
    pub fn options_mut(&mut self) -> &mut OptionSet {
        &mut self.options
    }

    /// Apply builder calls to the held options.
    ///
    /// When `configure` fails the held options are left unchanged.
    pub fn configure<F>(&mut self, configure: F) -> Result<&mut Self>
    where
        F: FnOnce(OptionsBuilder) -> Result<OptionsBuilder>,
    {
        let updated = configure(OptionsBuilder::from(self.options.clone()))?;
        self.options = updated.build();
        Ok(self)
    }

    /// Restore default options.
    pub fn reset(&mut self) {
        self.options = OptionSet::default();
    }

    /// The transport error recorded by the last dispatch, if it failed in
    /// the transport.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    /// Dispatch a request with the held options.
    pub async fn dispatch(&mut self, method: Method, uri: &str) -> Result<Response> {
        let options = self.options.clone();
        self.execute(method, uri, &options).await
    }

    /// Dispatch with per-call overrides applied to a copy of the held
    /// options. The overrides are not persisted.
    pub async fn dispatch_with<F>(&mut self, method: Method, uri: &str, overrides: F) -> Result<Response>
    where
        F: FnOnce(OptionsBuilder) -> Result<OptionsBuilder>,
    {
        let options = overrides(OptionsBuilder::from(self.options.clone()))?.build();
        self.execute(method, uri, &options).await
    }

    /// Dispatch by verb name, e.g. `"GET"`.
    ///
    /// Unknown verbs fail with [`HttpClientError::MethodNotFound`] before
    /// anything else happens.
    pub async fn dispatch_named(&mut self, method: &str, uri: &str) -> Result<Response> {
        let method: Method = method.parse()?;
        self.dispatch(method, uri).await
    }

    verbs! {
        get, get_with => Get;
        post, post_with => Post;
        put, put_with => Put;
        delete, delete_with => Delete;
        patch, patch_with => Patch;
        head, head_with => Head;
        options_request, options_with => Options;
        connect, connect_with => Connect;
        trace, trace_with => Trace;
        purge, purge_with => Purge;
    }

    async fn execute(&mut self, method: Method, uri: &str, options: &OptionSet) -> Result<Response> {
        self.last_error = None;

        let mut request = PreparedRequest::prepare(method, uri, options)?;
        for interceptor in &self.interceptors {
            interceptor.before_dispatch(&mut request).await?;
        }

        if let Some(delay) = options.delay {
            trace!(delay_ms = delay.as_millis() as u64, "delaying request");
            tokio::time::sleep(delay).await;
        }

        let transport = self.driver.kind();
        debug!(method = %method, url = %request.url, transport = %transport, "dispatching request");
        if options.verbose {
            for (name, value) in request.headers.iter() {
                trace!(header = %name, value = %value, "request header");
            }
        }

        let started = Instant::now();
        let mut response = match self.driver.dispatch(request, options).await {
            Ok(response) => response,
            Err(HttpClientError::Transport(e)) => {
                error!(
                    transport = %transport,
                    code = e.code(),
                    kind = %e.kind(),
                    "request failed: {}",
                    e.message()
                );
                self.last_error = Some(e.clone());
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };

        debug!(
            status = response.status_code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        if options.verbose {
            for (name, value) in response.header_lines() {
                trace!(header = %name, value = %value, "response header");
            }
        }

        for interceptor in &self.interceptors {
            response = interceptor.after_dispatch(response).await?;
        }

        if options.http_errors {
            response = response.error_for_status()?;
        }
        Ok(response)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(OptionSet::default())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("transport", &self.driver.kind())
            .field("interceptors", &self.interceptors.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    options: OptionSet,
    driver: Option<Arc<dyn TransportDriver>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ClientBuilder {
    /// Set the initial options.
    pub fn options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    /// Select a built-in transport.
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.driver = Some(kind.driver());
        self
    }

    /// Use a custom transport driver.
    pub fn driver(mut self, driver: Arc<dyn TransportDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Register an interceptor.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        Client {
            options: self.options,
            driver: self.driver.unwrap_or_else(|| TransportKind::default().driver()),
            interceptors: self.interceptors,
            last_error: None,
        }
    }
}
