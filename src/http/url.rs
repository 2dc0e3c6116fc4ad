//! Split request URLs.
//!
//! # Responsibilities
//! - Split an absolute request URI into scheme, host, port, path, query, fragment
//! - Reassemble the absolute form for logging
//! - Produce the "rest of URL" forwarded upstream
//!
//! # Design Decisions
//! - Values are immutable; the `with_*` helpers return modified copies
//! - Equality is structural so misdirection changes can be detected by `!=`
//! - Splitting never normalizes: dot segments, percent escapes and an explicit
//!   default port are forwarded exactly as the client wrote them
//! - Hostnames and schemes are case-folded

use std::fmt;

use axum::http::Uri;

/// Error type for URL handling.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    /// The input is not an absolute URL.
    #[error("invalid request target `{input}`: {reason}")]
    Invalid { input: String, reason: String },

    /// The URL has no host component.
    #[error("request target `{0}` has no host")]
    MissingHost(String),

    /// The port segment of a netloc is not a valid port number.
    #[error("malformed netloc `{0}`")]
    MalformedNetloc(String),
}

/// An absolute URL split into its components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedUrl {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl ParsedUrl {
    /// Split an absolute URL.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let invalid = |reason: String| UrlError::Invalid {
            input: input.to_string(),
            reason,
        };

        let (target, fragment) = match input.split_once('#') {
            Some((target, fragment)) => (target, Some(fragment.to_string())),
            None => (input, None),
        };

        let uri: Uri = target.parse().map_err(|e: axum::http::uri::InvalidUri| {
            let netloc = netloc_of(target);
            if target.contains("://") && split_netloc(netloc).is_err() {
                UrlError::MalformedNetloc(netloc.to_string())
            } else {
                invalid(e.to_string())
            }
        })?;

        let scheme = uri
            .scheme_str()
            .ok_or_else(|| invalid("not an absolute URL".to_string()))?;
        let authority = uri
            .authority()
            .map(|a| a.as_str())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| UrlError::MissingHost(input.to_string()))?;
        let netloc = authority
            .rsplit_once('@')
            .map_or(authority, |(_, netloc)| netloc);
        let (host, port) = split_netloc(netloc)?;

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            fragment,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host as written in the URL (IPv6 literals keep their brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Case-folded hostname.
    pub fn hostname(&self) -> String {
        self.host.to_ascii_lowercase()
    }

    /// Explicit port, if the URL carried one.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The `host[:port]` portion.
    pub fn netloc(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Path, query and fragment with scheme and netloc stripped.
    ///
    /// Falls back to `/` when all three are empty.
    pub fn rest_of_url(&self) -> String {
        let mut rest = self.path.clone();
        if let Some(query) = &self.query {
            rest.push('?');
            rest.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            rest.push('#');
            rest.push_str(fragment);
        }
        if rest.is_empty() {
            rest.push('/');
        }
        rest
    }

    pub fn with_scheme(&self, scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            ..self.clone()
        }
    }

    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            ..self.clone()
        }
    }

    pub fn with_port(&self, port: Option<u16>) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    /// Replace host and port from a `host[:port]` string.
    pub fn with_netloc(&self, netloc: &str) -> Result<Self, UrlError> {
        let (host, port) = split_netloc(netloc)?;
        Ok(Self {
            host: host.to_ascii_lowercase(),
            port,
            ..self.clone()
        })
    }

    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    pub fn with_query(&self, query: Option<&str>) -> Self {
        Self {
            query: query.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn with_fragment(&self, fragment: Option<&str>) -> Self {
        Self {
            fragment: fragment.map(str::to_string),
            ..self.clone()
        }
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.netloc(), self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ParsedUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a netloc into host and optional port.
///
/// A netloc containing `:` (outside an IPv6 literal) must end in a numeric port.
pub fn split_netloc(netloc: &str) -> Result<(String, Option<u16>), UrlError> {
    let malformed = || UrlError::MalformedNetloc(netloc.to_string());

    let (host, port) = if let Some(rest) = netloc.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(malformed)?;
        let host = &netloc[..end + 2];
        match &rest[end + 1..] {
            "" => (host, None),
            tail => (host, Some(tail.strip_prefix(':').ok_or_else(malformed)?)),
        }
    } else {
        match netloc.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (netloc, None),
        }
    };

    if host.is_empty() {
        return Err(malformed());
    }

    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| malformed()))
        .transpose()?;

    Ok((host.to_string(), port))
}

/// Best-effort netloc extraction for error messages.
fn netloc_of(input: &str) -> &str {
    let after_scheme = input.split_once("://").map(|(_, rest)| rest).unwrap_or(input);
    after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme)
}
