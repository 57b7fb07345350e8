//! libcurl transport.

use async_trait::async_trait;
use bytes::Bytes;
use curl::easy::{
    Auth, Easy2, Form, Handler, HttpVersion, InfoType, IpResolve as CurlIpResolve, List,
    PostRedirections, ProxyType, WriteError,
};
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::{PreparedRequest, TransportDriver, TransportKind, urlencode_pairs};
use crate::options::{IpResolve, MultipartField, OptionSet, RedirectOptions, RequestBody};
use crate::protocol::{AuthScheme, ProtocolVersion, ProxyScheme};
use crate::reconstruct::{RawResult, ResponseReconstructor, TransportFailure, parse_header_blocks, split};
use crate::{
    Diagnostics, HttpClientError, Method, Response, Result, TransportError, TransportErrorKind,
};

/// Transport driving libcurl directly.
///
/// Header echo is always on: the write handler receives every header block
/// followed by the body, and [`ResponseReconstructor`] splits them using the
/// header size reported by libcurl.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTransport;

impl DirectTransport {
    /// Create the transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportDriver for DirectTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    async fn dispatch(&self, request: PreparedRequest, options: &OptionSet) -> Result<Response> {
        if let Some(redirect) = options.redirect.options()
            && redirect.allowed_protocols != RedirectOptions::default().allowed_protocols
        {
            warn!(
                protocols = ?redirect.allowed_protocols,
                "direct transport does not restrict redirect protocols"
            );
        }

        let options = options.clone();
        let keep_header_block = options.header_info;

        let raw = tokio::task::spawn_blocking(move || perform(request, &options))
            .await
            .map_err(|e| {
                TransportError::new(
                    TransportKind::Direct,
                    TransportErrorKind::Other,
                    0,
                    format!("transfer worker failed: {}", e),
                )
            })??;

        ResponseReconstructor::new(keep_header_block).reconstruct(raw)
    }
}

/// Buffers everything libcurl writes and routes verbose output to tracing.
struct Collector {
    buffer: Vec<u8>,
}

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> std::result::Result<usize, WriteError> {
        self.buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn debug(&mut self, kind: InfoType, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        match kind {
            InfoType::Text => trace!(target: "hermes::curl", "* {}", text.trim_end()),
            InfoType::HeaderIn => trace!(target: "hermes::curl", "< {}", text.trim_end()),
            InfoType::HeaderOut => trace!(target: "hermes::curl", "> {}", text.trim_end()),
            _ => {}
        }
    }
}

/// Runs on a blocking worker. The handle is dropped before returning.
fn perform(request: PreparedRequest, options: &OptionSet) -> Result<RawResult> {
    let mut easy = Easy2::new(Collector { buffer: Vec::new() });

    let (payload, form) = match &request.body {
        Some(RequestBody::Json(value)) => (Some(serde_json::to_vec(value)?), None),
        Some(RequestBody::Form(fields)) => (Some(urlencode_pairs(fields)?.into_bytes()), None),
        Some(RequestBody::Raw(bytes)) => (Some(bytes.to_vec()), None),
        Some(RequestBody::Multipart(fields)) => (None, Some(build_form(fields)?)),
        None => (None, None),
    };
    configure(&mut easy, &request, options, payload.as_deref(), form).map_err(|e| {
        HttpClientError::config(format!("libcurl rejected option: {}", e))
    })?;

    debug!(method = %request.method, url = %request.url, "performing transfer");
    let failure = easy.perform().err().map(|e| TransportFailure {
        code: e.code() as i32,
        kind: classify(&e),
        message: e.to_string(),
    });

    let mut diagnostics = collect_diagnostics(&mut easy);
    let header_size = easy.header_size().unwrap_or(0) as usize;
    let bytes = Bytes::from(std::mem::take(&mut easy.get_mut().buffer));

    if options.redirect.options().is_some_and(|r| r.track_hops) {
        let (block, _) = split(&bytes, header_size);
        diagnostics.redirect_hops = parse_header_blocks(&block)
            .into_iter()
            .flat_map(|head| head.lines)
            .filter(|(name, _)| name == "location")
            .map(|(_, value)| value)
            .collect();
    }

    Ok(RawResult {
        bytes,
        header_size,
        diagnostics,
        error: failure,
    })
}

fn configure(
    easy: &mut Easy2<Collector>,
    request: &PreparedRequest,
    options: &OptionSet,
    payload: Option<&[u8]>,
    form: Option<Form>,
) -> std::result::Result<(), curl::Error> {
    easy.url(&request.url)?;
    easy.show_header(true)?;
    easy.verbose(options.verbose)?;
    easy.timeout(options.timeout)?;
    easy.connect_timeout(options.timeout)?;
    easy.ssl_verify_peer(options.verify_tls)?;
    easy.ssl_verify_host(options.verify_tls)?;

    if let Some(user_agent) = options.user_agent() {
        easy.useragent(user_agent)?;
    }
    if let Some(referer) = options.referer() {
        easy.referer(referer)?;
    }

    let mut headers = List::new();
    for line in request.headers.to_lines() {
        headers.append(&line)?;
    }
    easy.http_headers(headers)?;

    if let Some(cookie) = &request.cookie {
        easy.cookie(cookie)?;
    }
    if let Some(path) = options.cookie_file() {
        easy.cookie_file(path)?;
        easy.cookie_jar(path)?;
    }

    match options.redirect.options() {
        Some(redirect) => {
            easy.follow_location(true)?;
            easy.max_redirections(redirect.max_hops)?;
            easy.autoreferer(redirect.send_referer)?;
            if redirect.strict {
                let mut post = PostRedirections::new();
                post.redirect_all(true);
                easy.post_redirections(&post)?;
            }
        }
        None => easy.follow_location(false)?,
    }

    easy.http_version(http_version(options.protocol_version))?;
    easy.ip_resolve(match options.ip_resolve {
        IpResolve::Any => CurlIpResolve::Any,
        IpResolve::V4 => CurlIpResolve::V4,
        IpResolve::V6 => CurlIpResolve::V6,
    })?;

    if let Some(credentials) = &options.auth {
        easy.username(&credentials.username)?;
        easy.password(&credentials.password)?;
        easy.http_auth(&auth(credentials.scheme))?;
    }

    if let Some(proxy) = &options.proxy {
        easy.proxy(&proxy.host)?;
        easy.proxy_port(proxy.port)?;
        easy.proxy_type(proxy_type(proxy.scheme))?;
        if let Some((username, password)) = &proxy.credentials {
            easy.proxy_username(username)?;
            easy.proxy_password(password)?;
            easy.proxy_auth(Auth::new().basic(true))?;
        }
    }

    if let Some(cert) = options.client_cert() {
        easy.ssl_cert(&cert.path)?;
        easy.ssl_cert_type("PEM")?;
        if let Some(password) = &cert.password {
            easy.key_password(password)?;
        }
    }

    match request.method {
        Method::Get => easy.get(true)?,
        Method::Head => easy.nobody(true)?,
        Method::Post => easy.post(true)?,
        other => easy.custom_request(other.as_str())?,
    }

    match (payload, form) {
        (_, Some(form)) => easy.httppost(form)?,
        (Some(payload), None) => easy.post_fields_copy(payload)?,
        (None, None) if request.method == Method::Post => easy.post_fields_copy(&[])?,
        (None, None) => {}
    }

    Ok(())
}

fn build_form(fields: &[MultipartField]) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        let mut part = form.part(&field.name);
        match &field.file_name {
            Some(file_name) => part.buffer(file_name, field.contents.to_vec()),
            None => part.contents(&field.contents),
        };
        if let Some(content_type) = &field.content_type {
            part.content_type(content_type);
        }
        part.add().map_err(|e| {
            HttpClientError::config(format!("invalid multipart field {}: {}", field.name, e))
        })?;
    }
    Ok(form)
}

fn http_version(version: ProtocolVersion) -> HttpVersion {
    match version {
        ProtocolVersion::Http10 => HttpVersion::V10,
        ProtocolVersion::Http11 => HttpVersion::V11,
        ProtocolVersion::Http2 => HttpVersion::V2,
        ProtocolVersion::Http2Tls => HttpVersion::V2TLS,
        ProtocolVersion::Http2PriorKnowledge => HttpVersion::V2PriorKnowledge,
        ProtocolVersion::Http3 | ProtocolVersion::Http3Only => HttpVersion::V3,
        ProtocolVersion::Negotiate => HttpVersion::Any,
    }
}

fn proxy_type(scheme: ProxyScheme) -> ProxyType {
    match scheme {
        ProxyScheme::Http | ProxyScheme::Https => ProxyType::Http,
        ProxyScheme::Socks4 => ProxyType::Socks4,
        ProxyScheme::Socks4a => ProxyType::Socks4a,
        ProxyScheme::Socks5 => ProxyType::Socks5,
    }
}

fn auth(scheme: AuthScheme) -> Auth {
    let mut auth = Auth::new();
    match scheme {
        AuthScheme::Basic => auth.basic(true),
        AuthScheme::Digest => auth.digest(true),
        AuthScheme::Ntlm => auth.ntlm(true),
    };
    auth
}

fn classify(error: &curl::Error) -> TransportErrorKind {
    if error.is_operation_timedout() {
        TransportErrorKind::Timeout
    } else if error.is_couldnt_resolve_host() || error.is_couldnt_resolve_proxy() {
        TransportErrorKind::Resolve
    } else if error.is_couldnt_connect() {
        TransportErrorKind::Connect
    } else if error.is_ssl_connect_error()
        || error.is_peer_failed_verification()
        || error.is_ssl_certproblem()
        || error.is_ssl_cacert()
    {
        TransportErrorKind::Tls
    } else if error.is_too_many_redirects() {
        TransportErrorKind::Redirect
    } else {
        TransportErrorKind::Other
    }
}

fn collect_diagnostics(easy: &mut Easy2<Collector>) -> Diagnostics {
    let mut diagnostics = Diagnostics::new(TransportKind::Direct);
    diagnostics.effective_url = easy.effective_url().ok().flatten().map(str::to_string);
    diagnostics.status = easy
        .response_code()
        .ok()
        .filter(|code| *code != 0)
        .and_then(|code| u16::try_from(code).ok());
    diagnostics.total_time = easy.total_time().ok();
    diagnostics.name_lookup_time = easy.namelookup_time().ok().filter(|t| *t > Duration::ZERO);
    diagnostics.connect_time = easy.connect_time().ok().filter(|t| *t > Duration::ZERO);
    diagnostics.tls_handshake_time = easy.appconnect_time().ok().filter(|t| *t > Duration::ZERO);
    diagnostics.primary_ip = easy
        .primary_ip()
        .ok()
        .flatten()
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);
    diagnostics.redirect_count = easy.redirect_count().unwrap_or(0);
    diagnostics
}
