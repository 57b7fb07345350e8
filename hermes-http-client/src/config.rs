//! Fluent request configuration.

use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::options::{
    ClientCert, Credentials, IpResolve, MultipartField, OptionSet, ProxyConfig, RedirectOptions,
    RedirectPolicy,
};
use crate::protocol::{AUTH_SCHEMES, AuthScheme, PROTOCOL_VERSIONS, PROXY_SCHEMES, ProtocolVersion};
use crate::{HttpClientError, Result};

/// Environment variable prefix read by [`OptionsBuilder::from_env`].
pub const ENV_PREFIX: &str = "HERMES_HTTP";

/// Builder accumulating an [`OptionSet`].
///
/// Every method validates its own argument and nothing else; `build` never
/// re-checks earlier input.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: OptionSet,
}

impl From<OptionSet> for OptionsBuilder {
    fn from(options: OptionSet) -> Self {
        Self { options }
    }
}

impl OptionsBuilder {
    /// Create a builder seeded with the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from `HERMES_HTTP_*` environment variables.
    ///
    /// Recognised keys: `BASE_URI`, `TIMEOUT` (seconds), `VERIFY_TLS`,
    /// `PROTOCOL_VERSION`, `USER_AGENT`, `DEBUG`.
    pub fn from_env() -> Result<Self> {
        Self::new().apply_vars(|key| std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok())
    }

    /// Overlay values produced by `lookup` (keys without the prefix).
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("BASE_URI") {
            self = self.base_uri(uri);
        }
        if let Some(timeout) = lookup("TIMEOUT") {
            let secs: f64 = timeout.trim().parse().map_err(|_| {
                HttpClientError::config(format!("invalid {}_TIMEOUT: {}", ENV_PREFIX, timeout))
            })?;
            self = self.timeout_secs(secs)?;
        }
        if let Some(verify) = lookup("VERIFY_TLS") {
            self = self.verify_tls(parse_flag("VERIFY_TLS", &verify)?);
        }
        if let Some(version) = lookup("PROTOCOL_VERSION") {
            self = self.protocol_version(&version)?;
        }
        if let Some(user_agent) = lookup("USER_AGENT") {
            self = self.user_agent(user_agent);
        }
        if let Some(debug) = lookup("DEBUG") {
            self = self.verbose(parse_flag("DEBUG", &debug)?);
        }
        Ok(self)
    }

    /// Set the base URI prepended to relative request URIs.
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.options.base_uri = uri.into();
        self
    }

    /// Set the connect and total timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the timeout in (fractional) seconds.
    pub fn timeout_secs(self, secs: f64) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| HttpClientError::config(format!("invalid timeout: {}", secs)))?;
        Ok(self.timeout(timeout))
    }

    /// Set a header, replacing any value under the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.headers.set(name, value.to_string());
        self
    }

    /// Set several headers, in iteration order.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.headers.extend(headers);
        self
    }

    /// Set the `User-Agent` header.
    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.header("User-Agent", user_agent.into())
    }

    /// Set the `Referer` header.
    pub fn referer(self, referer: impl Into<String>) -> Self {
        self.header("Referer", referer.into())
    }

    /// Set bearer authentication.
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Add a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.cookies.set(name, value);
        self
    }

    /// Merge several cookies, later values override.
    pub fn cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.cookies.extend(cookies);
        self
    }

    /// Use `path` as the cookie jar. The file must exist.
    pub fn cookie_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.options.cookie_file = Some(existing_file("cookie file", path.as_ref())?);
        Ok(self)
    }

    /// Replace the query parameters.
    pub fn query<I, K, V>(mut self, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.query.clear();
        self.options.query.extend(query);
        self
    }

    /// Add one query parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.set(name, value);
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.options.json = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.options.raw_body = Some(body.into());
        self
    }

    /// Set URL-encoded form fields.
    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        self.options.form = Some(fields);
        self
    }

    /// Set multipart fields.
    pub fn multipart(mut self, fields: impl IntoIterator<Item = MultipartField>) -> Self {
        self.options.multipart = Some(fields.into_iter().collect());
        self
    }

    /// Set server authentication.
    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>, scheme: AuthScheme) -> Self {
        self.options.auth = Some(Credentials {
            username: username.into(),
            password: password.into(),
            scheme,
        });
        self
    }

    /// Set server authentication with the scheme given by name.
    pub fn auth_named(self, username: impl Into<String>, password: impl Into<String>, scheme: &str) -> Result<Self> {
        let scheme = AUTH_SCHEMES.resolve(scheme)?;
        Ok(self.auth(username, password, scheme))
    }

    /// Basic authentication.
    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth(username, password, AuthScheme::Basic)
    }

    /// Digest authentication.
    pub fn digest_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth(username, password, AuthScheme::Digest)
    }

    /// NTLM authentication.
    pub fn ntlm_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth(username, password, AuthScheme::Ntlm)
    }

    /// Route requests through a proxy.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.options.proxy = Some(proxy);
        self
    }

    /// Route requests through a proxy with the scheme given by name
    /// (`HTTP`, `HTTPS`, `SOCKS4`, `SOCKS4A`, `SOCKS5`).
    pub fn proxy_named(self, host: impl Into<String>, port: u16, scheme: &str) -> Result<Self> {
        let scheme = PROXY_SCHEMES.resolve(scheme)?;
        Ok(self.proxy(ProxyConfig::new(host, port, scheme)))
    }

    /// Set the redirect policy.
    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.options.redirect = policy;
        self
    }

    /// Follow redirects with the given options.
    pub fn follow_redirects(self, options: RedirectOptions) -> Self {
        self.redirect(RedirectPolicy::Follow(options))
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.options.verify_tls = verify;
        self
    }

    /// Present a PEM client certificate. The file must exist.
    pub fn client_cert(mut self, path: impl AsRef<Path>, password: Option<String>) -> Result<Self> {
        let path = existing_file("certificate", path.as_ref())?;
        self.options.client_cert = Some(ClientCert { path, password });
        Ok(self)
    }

    /// Set the protocol version.
    pub fn protocol(mut self, version: ProtocolVersion) -> Self {
        self.options.protocol_version = version;
        self
    }

    /// Set the protocol version by name (`1.0`, `1.1`, `2`, `2.0`, `2_tls`,
    /// `2pk`, `3`, `3o`, `0`).
    pub fn protocol_version(self, version: &str) -> Result<Self> {
        let version = PROTOCOL_VERSIONS.resolve(version)?;
        Ok(self.protocol(version))
    }

    /// Resolve host names to IPv4 addresses only.
    pub fn ipv4(mut self) -> Self {
        self.options.ip_resolve = IpResolve::V4;
        self
    }

    /// Resolve host names to IPv6 addresses only.
    pub fn ipv6(mut self) -> Self {
        self.options.ip_resolve = IpResolve::V6;
        self
    }

    /// Wait before sending the request.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.options.delay = Some(delay);
        self
    }

    /// Enable verbose transport output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    /// Keep the raw header block in front of the response body.
    pub fn header_info(mut self, show: bool) -> Self {
        self.options.header_info = show;
        self
    }

    /// Raise an error for non-2xx responses instead of returning them.
    pub fn http_errors(mut self, raise: bool) -> Self {
        self.options.http_errors = raise;
        self
    }

    /// Build the option set.
    pub fn build(self) -> OptionSet {
        self.options
    }
}

fn existing_file(what: &str, path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
        .map_err(|_| HttpClientError::config(format!("{} not found: {}", what, path.display())))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HttpClientError::config(format!(
            "invalid {}_{}: {}",
            ENV_PREFIX, key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProxyScheme;
    use std::collections::HashMap;

    #[test]
    fn test_header_call_order() {
        let options = OptionsBuilder::new()
            .header("X", "a")
            .header("X", "b")
            .build();
        assert_eq!(options.headers.get("x"), Some("b"));

        let options = OptionsBuilder::new()
            .header("X-Token", "single")
            .headers([("x-token", "bulk")])
            .build();
        assert_eq!(options.headers.get("X-Token"), Some("bulk"));

        let options = OptionsBuilder::new()
            .headers([("x-token", "bulk")])
            .header("X-Token", "single")
            .build();
        assert_eq!(options.headers.get("X-Token"), Some("single"));
    }

    #[test]
    fn test_user_agent_overrides_header() {
        let options = OptionsBuilder::new()
            .header("User-Agent", "custom-agent")
            .user_agent("hermes-agent")
            .build();
        assert_eq!(options.user_agent(), Some("hermes-agent"));
    }

    #[test]
    fn test_empty_header_value_accepted() {
        let options = OptionsBuilder::new().header("X-Empty", "").build();
        assert_eq!(options.headers.get("x-empty"), Some(""));
    }

    #[test]
    fn test_cookies_merge() {
        let options = OptionsBuilder::new()
            .cookies([("username", "a"), ("theme", "dark")])
            .cookie("theme2", "dark")
            .cookies([("username", "b")])
            .build();
        assert_eq!(options.cookies.get("username"), Some("b"));
        assert_eq!(options.cookies.len(), 3);
    }

    #[test]
    fn test_missing_cookie_file_rejected() {
        let err = OptionsBuilder::new()
            .cookie_file("/definitely/not/here/cookies.txt")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cookie_file_canonicalised() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = OptionsBuilder::new().cookie_file(file.path()).unwrap().build();
        assert_eq!(
            options.cookie_file(),
            Some(std::fs::canonicalize(file.path()).unwrap().as_path())
        );
    }

    #[test]
    fn test_protocol_version_by_name() {
        let options = OptionsBuilder::new().protocol_version("2_tls").unwrap().build();
        assert_eq!(options.protocol_version, ProtocolVersion::Http2Tls);

        let err = OptionsBuilder::new().protocol_version("9.9").unwrap_err();
        assert_eq!(err.to_string(), "unsupported protocol version value: 9.9");
    }

    #[test]
    fn test_named_proxy_and_auth() {
        let options = OptionsBuilder::new()
            .proxy_named("127.0.0.1", 7890, "socks5")
            .unwrap()
            .auth_named("admin", "123456", "Digest")
            .unwrap()
            .build();
        assert_eq!(options.proxy.unwrap().scheme, ProxyScheme::Socks5);
        assert_eq!(options.auth.unwrap().scheme, AuthScheme::Digest);

        assert!(OptionsBuilder::new().proxy_named("h", 1, "quic").is_err());
        assert!(OptionsBuilder::new().auth_named("u", "p", "kerberos").is_err());
    }

    #[test]
    fn test_query_replaces() {
        let options = OptionsBuilder::new()
            .query([("a", "1")])
            .query([("token", "123456")])
            .build();
        assert_eq!(options.query.len(), 1);
        assert_eq!(options.query.get("token"), Some("123456"));
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> = [
            ("BASE_URI", "http://127.0.0.1:8083"),
            ("TIMEOUT", "2.5"),
            ("VERIFY_TLS", "false"),
            ("PROTOCOL_VERSION", "1.0"),
            ("DEBUG", "1"),
        ]
        .into_iter()
        .collect();

        let options = OptionsBuilder::new()
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap()
            .build();

        assert_eq!(options.base_uri, "http://127.0.0.1:8083");
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert!(!options.verify_tls);
        assert!(options.verbose);
        assert_eq!(options.protocol_version, ProtocolVersion::Http10);
    }

    #[test]
    fn test_apply_vars_rejects_bad_values() {
        let err = OptionsBuilder::new()
            .apply_vars(|key| (key == "VERIFY_TLS").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());

        let err = OptionsBuilder::new()
            .apply_vars(|key| (key == "TIMEOUT").then(|| "-1".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
