//! # Hermes HTTP Client
//!
//! A configurable outbound HTTP client. Options accumulate on a [`Client`]
//! and are mapped onto one of two interchangeable transports at dispatch
//! time.
//!
//! ## Features
//!
//! - **Fluent configuration**: headers, cookies, query, JSON/form/multipart
//!   bodies, auth, proxy, redirects, TLS and protocol version
//! - **Direct transport**: libcurl, with the response rebuilt from the raw
//!   transfer buffer
//! - **Delegating transport**: reqwest, structured responses
//! - **Diagnostics**: timings, effective URL, redirect hops per dispatch
//! - **Interceptors**: request/response hooks for every transport
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hermes_http_client::{Client, OptionSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = OptionSet::builder()
//!         .base_uri("https://api.example.com")
//!         .query_param("token", "123456")
//!         .build();
//!
//!     let mut client = Client::new(options);
//!     let response = client.get("/users").await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Selecting a Transport
//!
//! ```rust,no_run
//! use hermes_http_client::{Client, TransportKind};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::default().with_transport(TransportKind::Direct);
//!     client.configure(|b| Ok(b.base_uri("https://httpbin.org").protocol_version("2")?))?;
//!
//!     let response = client
//!         .post_with("/post", |b| b.json(&json!({"os": "macOS"})))
//!         .await?;
//!
//!     println!("{:?}", response.diagnostics().total_time);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod diagnostics;
mod error;
mod interceptor;
mod method;
mod options;
mod response;

pub mod protocol;
pub mod reconstruct;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::{ENV_PREFIX, OptionsBuilder};
pub use diagnostics::Diagnostics;
pub use error::{HttpClientError, Result, TransportError, TransportErrorKind};
pub use interceptor::{Interceptor, LoggingInterceptor};
pub use method::Method;
pub use options::{
    ClientCert, Credentials, DEFAULT_USER_AGENT, HeaderList, IpResolve, MultipartField,
    OptionSet, ParamList, ProxyConfig, RedirectOptions, RedirectPolicy, RequestBody,
};
pub use protocol::{AuthScheme, ProtocolVersion, ProxyScheme};
pub use reconstruct::{RawResult, ResponseReconstructor};
pub use response::Response;
pub use transport::{
    DelegatingTransport, DirectTransport, PreparedRequest, TransportDriver, TransportKind,
};

// Re-export common types
pub use bytes::Bytes;
pub use http::StatusCode;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use hermes_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{Client, ClientBuilder};
    pub use crate::config::OptionsBuilder;
    pub use crate::error::{HttpClientError, Result};
    pub use crate::interceptor::{Interceptor, LoggingInterceptor};
    pub use crate::method::Method;
    pub use crate::options::{MultipartField, OptionSet, ProxyConfig, RedirectOptions, RedirectPolicy};
    pub use crate::protocol::{AuthScheme, ProtocolVersion, ProxyScheme};
    pub use crate::response::Response;
    pub use crate::transport::{TransportDriver, TransportKind};
    pub use http::StatusCode;
}
