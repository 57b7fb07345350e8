//! The request option model shared by every transport.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::{AuthScheme, ProtocolVersion, ProxyScheme};

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("hermes/", env!("CARGO_PKG_VERSION"));

/// Ordered header collection with case-insensitive keys.
///
/// A write to an existing name replaces its value and casing in place, so
/// the first insertion fixes the serialization position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, last write wins.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Set `name` only if it is not present yet.
    pub fn set_default(&mut self, name: &str, value: &str) {
        if !self.contains(name) {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate `(name, value)` pairs in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as `Key: Value` lines.
    pub fn to_lines(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for HeaderList {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

/// Ordered, case-sensitive `name → value` map used for cookies and query
/// parameters. Later writes override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamList {
    entries: Vec<(String, String)>,
}

impl ParamList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or override a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw pairs, for URL encoding.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ParamList {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

/// Username, password and scheme for server authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password, may be empty.
    pub password: String,
    /// Authentication scheme.
    pub scheme: AuthScheme,
}

/// Outbound proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host name or address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Proxy protocol.
    pub scheme: ProxyScheme,
    /// Optional `(username, password)` for the proxy.
    pub credentials: Option<(String, String)>,
}

impl ProxyConfig {
    /// Create a proxy entry without credentials.
    pub fn new(host: impl Into<String>, port: u16, scheme: ProxyScheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
            credentials: None,
        }
    }

    /// Attach proxy credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Rules for following redirects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Return 3xx responses as-is.
    #[default]
    Disabled,
    /// Follow redirects.
    Follow(RedirectOptions),
}

impl RedirectPolicy {
    /// Follow with default options.
    pub fn follow() -> Self {
        Self::Follow(RedirectOptions::default())
    }

    /// Follow up to `max_hops` redirects.
    pub fn limited(max_hops: u32) -> Self {
        Self::Follow(RedirectOptions {
            max_hops,
            ..Default::default()
        })
    }

    /// Options when following is enabled.
    pub fn options(&self) -> Option<&RedirectOptions> {
        match self {
            Self::Disabled => None,
            Self::Follow(options) => Some(options),
        }
    }

    /// Whether redirects are followed at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Follow(_))
    }
}

/// Redirect-following options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOptions {
    /// Maximum number of hops.
    pub max_hops: u32,
    /// Keep the original method on 301/302/303 instead of switching to GET.
    pub strict: bool,
    /// Send a `Referer` header when following.
    pub send_referer: bool,
    /// URL schemes a redirect may lead to.
    pub allowed_protocols: Vec<String>,
    /// Record every visited URL in the response diagnostics.
    pub track_hops: bool,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self {
            max_hops: 3,
            strict: false,
            send_referer: false,
            allowed_protocols: vec!["http".to_string(), "https".to_string()],
            track_hops: false,
        }
    }
}

impl RedirectOptions {
    /// Whether a redirect to `scheme` is allowed.
    pub fn allows(&self, scheme: &str) -> bool {
        self.allowed_protocols
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    /// Field name.
    pub name: String,
    /// Part contents.
    pub contents: Bytes,
    /// File name, marks the part as a file upload.
    pub file_name: Option<String>,
    /// Part content type.
    pub content_type: Option<String>,
}

impl MultipartField {
    /// Plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: Bytes::from(value.into()),
            file_name: None,
            content_type: None,
        }
    }

    /// File part with in-memory contents.
    pub fn file(name: impl Into<String>, file_name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            file_name: Some(file_name.into()),
            content_type: None,
        }
    }

    /// Set the part content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// TLS client certificate (PEM).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCert {
    /// Canonical path to the certificate file.
    pub path: PathBuf,
    /// Private key password, if the key is encrypted.
    pub password: Option<String>,
}

/// Address family used for name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpResolve {
    /// Whatever the resolver returns.
    #[default]
    Any,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

/// The authoritative request body after precedence resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document.
    Json(serde_json::Value),
    /// `multipart/form-data` parts.
    Multipart(Vec<MultipartField>),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Raw bytes, sent as-is.
    Raw(Bytes),
}

/// Accumulated configuration for one pending request.
#[derive(Debug, Clone)]
pub struct OptionSet {
    /// Prefix for relative request URIs (empty for none).
    pub base_uri: String,
    /// Connect and total timeout.
    pub timeout: Duration,
    /// Request headers.
    pub headers: HeaderList,
    /// Cookies sent as a `Cookie` header.
    pub cookies: ParamList,
    /// Query parameters appended to GET requests.
    pub query: ParamList,
    /// JSON body.
    pub json: Option<serde_json::Value>,
    /// Raw body.
    pub raw_body: Option<Bytes>,
    /// URL-encoded form fields.
    pub form: Option<Vec<(String, String)>>,
    /// Multipart fields.
    pub multipart: Option<Vec<MultipartField>>,
    /// Server authentication.
    pub auth: Option<Credentials>,
    /// Outbound proxy.
    pub proxy: Option<ProxyConfig>,
    /// Redirect policy.
    pub redirect: RedirectPolicy,
    /// Verify TLS certificates.
    pub verify_tls: bool,
    /// Protocol version to negotiate.
    pub protocol_version: ProtocolVersion,
    /// Verbose transport output.
    pub verbose: bool,
    /// Keep the raw response header block in front of the body.
    pub header_info: bool,
    /// Raise [`HttpClientError::HttpStatus`](crate::HttpClientError::HttpStatus)
    /// for non-2xx responses.
    pub http_errors: bool,
    /// Address family for name resolution.
    pub ip_resolve: IpResolve,
    /// Sleep before sending.
    pub delay: Option<Duration>,
    pub(crate) cookie_file: Option<PathBuf>,
    pub(crate) client_cert: Option<ClientCert>,
}

impl Default for OptionSet {
    fn default() -> Self {
        let mut headers = HeaderList::new();
        headers.set("User-Agent", DEFAULT_USER_AGENT);

        Self {
            base_uri: String::new(),
            timeout: Duration::from_secs(10),
            headers,
            cookies: ParamList::new(),
            query: ParamList::new(),
            json: None,
            raw_body: None,
            form: None,
            multipart: None,
            auth: None,
            proxy: None,
            redirect: RedirectPolicy::Disabled,
            verify_tls: true,
            protocol_version: ProtocolVersion::Http11,
            verbose: false,
            header_info: false,
            http_errors: false,
            ip_resolve: IpResolve::Any,
            delay: None,
            cookie_file: None,
            client_cert: None,
        }
    }
}

impl OptionSet {
    /// Create a new options builder.
    pub fn builder() -> crate::OptionsBuilder {
        crate::OptionsBuilder::default()
    }

    /// Resolve the authoritative body: json > multipart > form > raw.
    pub fn body(&self) -> Option<RequestBody> {
        if let Some(json) = &self.json {
            return Some(RequestBody::Json(json.clone()));
        }
        if let Some(parts) = &self.multipart {
            return Some(RequestBody::Multipart(parts.clone()));
        }
        if let Some(form) = &self.form {
            return Some(RequestBody::Form(form.clone()));
        }
        self.raw_body.clone().map(RequestBody::Raw)
    }

    /// Drop every configured body.
    pub fn clear_body(&mut self) {
        self.json = None;
        self.multipart = None;
        self.form = None;
        self.raw_body = None;
    }

    /// The configured user agent, if any.
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("User-Agent")
    }

    /// The configured referer, if any.
    pub fn referer(&self) -> Option<&str> {
        self.headers.get("Referer").filter(|r| !r.is_empty())
    }

    /// Assemble the `Cookie` header value from [`cookies`](Self::cookies).
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }

    /// Canonical path of the cookie jar file.
    pub fn cookie_file(&self) -> Option<&Path> {
        self.cookie_file.as_deref()
    }

    /// TLS client certificate.
    pub fn client_cert(&self) -> Option<&ClientCert> {
        self.client_cert.as_ref()
    }
}
