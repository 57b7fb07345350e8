// Hermes - a configurable outbound HTTP client for Rust
//
// Options accumulate on a client and are mapped onto a libcurl or reqwest
// transport when a request is dispatched.

// Re-export the client crate
pub use hermes_http_client::*;

/// Prelude for common imports.
pub mod prelude {
    pub use hermes_http_client::prelude::*;
}
