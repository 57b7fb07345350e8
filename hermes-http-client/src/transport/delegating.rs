//! reqwest transport.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Version};
use parking_lot::Mutex;
use reqwest::redirect::Policy;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

use super::{PreparedRequest, TransportDriver, TransportKind, urlencode_pairs};
use crate::options::{IpResolve, MultipartField, OptionSet, RedirectPolicy, RequestBody};
use crate::protocol::{AuthScheme, ProtocolVersion, ProxyScheme};
use crate::{
    Diagnostics, HttpClientError, Response, Result, TransportError, TransportErrorKind,
};

/// Transport delegating to [`reqwest`].
///
/// A fresh `reqwest::Client` is built for every dispatch, so no connection
/// or cookie state survives between requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelegatingTransport;

impl DelegatingTransport {
    /// Create the transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportDriver for DelegatingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Delegating
    }

    async fn dispatch(&self, request: PreparedRequest, options: &OptionSet) -> Result<Response> {
        let url = Url::parse(&request.url)
            .map_err(|e| HttpClientError::config(format!("invalid URL {}: {}", request.url, e)))?;

        let hops = Arc::new(Mutex::new(Vec::new()));
        let client = build_client(options, hops.clone())?;

        let mut headers = header_map(&request)?;
        if let Some(cookie) = cookie_header(&request, options, &url)? {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| HttpClientError::config(format!("invalid cookie value: {}", e)))?;
            headers.insert(http::header::COOKIE, value);
        }

        let mut builder = client
            .request(request.method.to_http(), url.clone())
            .headers(headers);

        if options.protocol_version == ProtocolVersion::Http10 {
            builder = builder.version(Version::HTTP_10);
        }

        if let Some(credentials) = &options.auth {
            match credentials.scheme {
                AuthScheme::Basic => {
                    builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
                }
                AuthScheme::Digest | AuthScheme::Ntlm => {
                    return Err(unsupported("auth scheme", credentials.scheme.as_str()));
                }
            }
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.body(serde_json::to_vec(&value)?),
            Some(RequestBody::Form(fields)) => builder.body(urlencode_pairs(&fields)?),
            Some(RequestBody::Raw(bytes)) => builder.body(bytes),
            Some(RequestBody::Multipart(fields)) => builder.multipart(multipart_form(fields)?),
            None => builder,
        };

        let started = Instant::now();
        let mut diagnostics = Diagnostics::new(TransportKind::Delegating);
        diagnostics.effective_url = Some(url.to_string());

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                diagnostics.total_time = Some(started.elapsed());
                diagnostics.redirect_count = hops.lock().len() as u32;
                return Err(transport_error(&e, diagnostics).into());
            }
        };

        let status = response.status();
        let version = response.version();
        diagnostics.effective_url = Some(response.url().to_string());
        diagnostics.status = Some(status.as_u16());
        diagnostics.protocol = Some(format!("{:?}", version));
        diagnostics.primary_ip = response.remote_addr().map(|addr| addr.ip().to_string());

        let mut header_lines = Vec::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
            header_lines.push((name.as_str().to_string(), value));
        }
        let headers: BTreeMap<String, String> = header_lines.iter().cloned().collect();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                diagnostics.total_time = Some(started.elapsed());
                return Err(transport_error(&e, diagnostics).into());
            }
        };

        diagnostics.total_time = Some(started.elapsed());
        let visited = std::mem::take(&mut *hops.lock());
        diagnostics.redirect_count = visited.len() as u32;
        if options.redirect.options().is_some_and(|r| r.track_hops) {
            diagnostics.redirect_hops = visited;
        }

        let body = if options.header_info {
            with_header_block(version, status, &header_lines, &body)
        } else {
            body
        };

        debug!(status = status.as_u16(), url = ?diagnostics.effective_url, "delegate returned");
        Ok(Response::from_parts(status, headers, header_lines, body, diagnostics))
    }
}

fn build_client(options: &OptionSet, hops: Arc<Mutex<Vec<String>>>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(options.timeout)
        .connect_timeout(options.timeout)
        .danger_accept_invalid_certs(!options.verify_tls)
        .connection_verbose(options.verbose)
        .redirect(redirect_policy(&options.redirect, hops))
        .referer(
            options
                .redirect
                .options()
                .is_some_and(|redirect| redirect.send_referer),
        );

    if let Some(redirect) = options.redirect.options()
        && redirect.strict
    {
        warn!("delegating transport rewrites POST to GET on 301/302/303 redirects");
    }

    builder = match options.protocol_version {
        ProtocolVersion::Http10 | ProtocolVersion::Http11 => builder.http1_only(),
        ProtocolVersion::Http2 | ProtocolVersion::Http2Tls | ProtocolVersion::Negotiate => builder,
        ProtocolVersion::Http2PriorKnowledge => builder.http2_prior_knowledge(),
        ProtocolVersion::Http3 | ProtocolVersion::Http3Only => {
            return Err(unsupported("protocol version", options.protocol_version.as_str()));
        }
    };

    builder = match options.ip_resolve {
        IpResolve::Any => builder,
        IpResolve::V4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        IpResolve::V6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    };

    if let Some(proxy) = &options.proxy {
        let scheme = match proxy.scheme {
            ProxyScheme::Http | ProxyScheme::Https => "http",
            ProxyScheme::Socks5 => "socks5",
            ProxyScheme::Socks4 | ProxyScheme::Socks4a => {
                return Err(unsupported("proxy scheme", proxy.scheme.as_str()));
            }
        };
        let mut entry = reqwest::Proxy::all(format!("{}://{}:{}", scheme, proxy.host, proxy.port))
            .map_err(|e| HttpClientError::config(format!("invalid proxy: {}", e)))?;
        if let Some((username, password)) = &proxy.credentials {
            entry = entry.basic_auth(username, password);
        }
        builder = builder.proxy(entry);
    }

    if let Some(cert) = options.client_cert() {
        if cert.password.is_some() {
            return Err(HttpClientError::config(
                "delegating transport does not support encrypted client keys",
            ));
        }
        let pem = std::fs::read(&cert.path)?;
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| HttpClientError::config(format!("invalid client certificate: {}", e)))?;
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| HttpClientError::config(format!("failed to build HTTP client: {}", e)))
}

/// Follow policy honouring max hops and allowed protocols. Every followed
/// URL is pushed onto `hops`.
fn redirect_policy(policy: &RedirectPolicy, hops: Arc<Mutex<Vec<String>>>) -> Policy {
    let Some(options) = policy.options().cloned() else {
        return Policy::none();
    };

    Policy::custom(move |attempt| {
        if attempt.previous().len() > options.max_hops as usize {
            return attempt.error(format!("too many redirects (max {})", options.max_hops));
        }
        let scheme = attempt.url().scheme().to_string();
        if !options.allows(&scheme) {
            return attempt.error(format!("redirect to disallowed protocol: {}", scheme));
        }
        hops.lock().push(attempt.url().to_string());
        attempt.follow()
    })
}

fn header_map(request: &PreparedRequest) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in request.headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpClientError::config(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpClientError::config(format!("invalid header value for {}: {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}

/// The prepared cookie value first, then jar cookies whose names it does
/// not already carry.
fn cookie_header(request: &PreparedRequest, options: &OptionSet, url: &Url) -> Result<Option<String>> {
    let Some(path) = options.cookie_file() else {
        return Ok(request.cookie.clone());
    };

    let mut pairs: Vec<String> = request.cookie.iter().cloned().collect();
    let taken: Vec<&str> = request
        .cookie
        .iter()
        .flat_map(|cookie| cookie.split(';'))
        .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim()))
        .collect();
    for (name, value) in jar_cookies(path, url)? {
        if !taken.contains(&name.as_str()) {
            pairs.push(format!("{}={}", name, value));
        }
    }

    Ok((!pairs.is_empty()).then(|| pairs.join("; ")))
}

/// Read cookies matching `url` from a Netscape-format cookie file.
pub(crate) fn jar_cookies(path: &Path, url: &Url) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut cookies = Vec::new();
    for line in contents.lines() {
        let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, subdomains, cookie_path, secure, expires, name, value] = fields[..] else {
            continue;
        };

        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        let domain_match = host == domain
            || (subdomains.eq_ignore_ascii_case("TRUE") && host.ends_with(&format!(".{}", domain)));
        if !domain_match || !url.path().starts_with(cookie_path) {
            continue;
        }
        if secure.eq_ignore_ascii_case("TRUE") && url.scheme() != "https" {
            continue;
        }
        let expires: u64 = expires.parse().unwrap_or(0);
        if expires != 0 && expires <= now {
            continue;
        }
        cookies.push((name.to_string(), value.to_string()));
    }
    Ok(cookies)
}

fn multipart_form(fields: Vec<MultipartField>) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        let mut part = reqwest::multipart::Part::bytes(field.contents.to_vec());
        if let Some(file_name) = field.file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = &field.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                HttpClientError::config(format!("invalid content type {}: {}", content_type, e))
            })?;
        }
        form = form.part(field.name, part);
    }
    Ok(form)
}

/// Rebuild a header block in front of the body, mirroring header echo.
fn with_header_block(
    version: Version,
    status: http::StatusCode,
    lines: &[(String, String)],
    body: &Bytes,
) -> Bytes {
    let mut out = BytesMut::with_capacity(body.len() + 256);
    out.put_slice(
        format!(
            "{:?} {} {}\r\n",
            version,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    for (name, value) in lines {
        out.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);
    out.freeze()
}

fn unsupported(table: &'static str, key: &str) -> HttpClientError {
    HttpClientError::config(format!("delegating transport does not support {} {}", table, key))
}

fn transport_error(error: &reqwest::Error, diagnostics: Diagnostics) -> TransportError {
    let message = error_chain(error);
    let lowered = message.to_lowercase();

    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_redirect() {
        TransportErrorKind::Redirect
    } else if lowered.contains("dns error") || lowered.contains("failed to lookup address") {
        TransportErrorKind::Resolve
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("handshake") {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(TransportKind::Delegating, kind, kind as i32, message).with_diagnostics(diagnostics)
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
