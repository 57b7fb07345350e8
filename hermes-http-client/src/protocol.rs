//! Protocol tables.
//!
//! Name → token tables for protocol versions, proxy schemes and auth schemes.
//! The tables are the only place these names are defined; every transport
//! converts the resolved tokens into its own primitives with an exhaustive
//! `match`, so coverage cannot drift between backends.

use std::fmt;
use std::str::FromStr;

use crate::{HttpClientError, Result};

/// An immutable, named lookup table.
#[derive(Debug)]
pub struct Table<T: 'static> {
    name: &'static str,
    case_sensitive: bool,
    entries: &'static [(&'static str, T)],
}

impl<T: Copy> Table<T> {
    /// Table name used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All accepted keys, in table order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Look up `key`.
    pub fn resolve(&self, key: &str) -> Result<T> {
        let key = key.trim();
        self.entries
            .iter()
            .find(|(name, _)| {
                if self.case_sensitive {
                    *name == key
                } else {
                    name.eq_ignore_ascii_case(key)
                }
            })
            .map(|(_, token)| *token)
            .ok_or_else(|| HttpClientError::Unsupported {
                table: self.name,
                key: key.to_string(),
            })
    }
}

/// Resolve `key` against `table`.
pub fn resolve<T: Copy>(table: &Table<T>, key: &str) -> Result<T> {
    table.resolve(key)
}

/// HTTP protocol version selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Force HTTP/1.0.
    Http10,
    /// Force HTTP/1.1.
    #[default]
    Http11,
    /// Attempt HTTP/2.
    Http2,
    /// Attempt HTTP/2 over TLS only.
    Http2Tls,
    /// HTTP/2 without the HTTP/1.1 upgrade dance.
    Http2PriorKnowledge,
    /// Attempt HTTP/3.
    Http3,
    /// Force HTTP/3.
    Http3Only,
    /// Let the backend decide.
    Negotiate,
}

/// Protocol version names.
pub static PROTOCOL_VERSIONS: Table<ProtocolVersion> = Table {
    name: "protocol version",
    case_sensitive: true,
    entries: &[
        ("1.0", ProtocolVersion::Http10),
        ("1.1", ProtocolVersion::Http11),
        ("2", ProtocolVersion::Http2),
        ("2.0", ProtocolVersion::Http2),
        ("2_tls", ProtocolVersion::Http2Tls),
        ("2pk", ProtocolVersion::Http2PriorKnowledge),
        ("3", ProtocolVersion::Http3),
        ("3o", ProtocolVersion::Http3Only),
        ("0", ProtocolVersion::Negotiate),
    ],
};

impl ProtocolVersion {
    /// Canonical table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "1.0",
            Self::Http11 => "1.1",
            Self::Http2 => "2",
            Self::Http2Tls => "2_tls",
            Self::Http2PriorKnowledge => "2pk",
            Self::Http3 => "3",
            Self::Http3Only => "3o",
            Self::Negotiate => "0",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        PROTOCOL_VERSIONS.resolve(s)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProxyScheme {
    /// Plain HTTP proxy.
    #[default]
    Http,
    /// HTTP proxy reached for HTTPS targets (CONNECT tunnel).
    Https,
    /// SOCKS4.
    Socks4,
    /// SOCKS4a (proxy-side name resolution).
    Socks4a,
    /// SOCKS5.
    Socks5,
}

/// Proxy scheme names.
pub static PROXY_SCHEMES: Table<ProxyScheme> = Table {
    name: "proxy scheme",
    case_sensitive: false,
    entries: &[
        ("HTTP", ProxyScheme::Http),
        ("HTTPS", ProxyScheme::Https),
        ("SOCKS4", ProxyScheme::Socks4),
        ("SOCKS4A", ProxyScheme::Socks4a),
        ("SOCKS5", ProxyScheme::Socks5),
    ],
};

impl ProxyScheme {
    /// Canonical table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Socks4 => "SOCKS4",
            Self::Socks4a => "SOCKS4A",
            Self::Socks5 => "SOCKS5",
        }
    }
}

impl FromStr for ProxyScheme {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        PROXY_SCHEMES.resolve(s)
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthScheme {
    /// RFC 7617 basic authentication.
    #[default]
    Basic,
    /// RFC 7616 digest authentication.
    Digest,
    /// Microsoft NTLM.
    Ntlm,
}

/// Auth scheme names.
pub static AUTH_SCHEMES: Table<AuthScheme> = Table {
    name: "auth scheme",
    case_sensitive: false,
    entries: &[
        ("basic", AuthScheme::Basic),
        ("digest", AuthScheme::Digest),
        ("ntlm", AuthScheme::Ntlm),
    ],
};

impl AuthScheme {
    /// Canonical table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Digest => "digest",
            Self::Ntlm => "ntlm",
        }
    }
}

impl FromStr for AuthScheme {
    type Err = HttpClientError;

    fn from_str(s: &str) -> Result<Self> {
        AUTH_SCHEMES.resolve(s)
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
