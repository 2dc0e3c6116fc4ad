//! Inbound requests.
//!
//! # Responsibilities
//! - Capture method, target, headers and the fully buffered body
//! - Expose them for in-place editing by request manglers
//!
//! # Design Decisions
//! - The body is read completely before any hook runs
//! - `uri` keeps the target exactly as received; `url` is the effective
//!   target after misdirection and mangling

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request};

use crate::error::RelayError;
use crate::http::body::{collect_limited, BodyBuffer};
use crate::http::url::ParsedUrl;
use crate::http::HttpMessage;

/// One client request, owned by the connection that received it.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Request target as received on the wire.
    pub uri: String,
    /// Effective target.
    pub url: ParsedUrl,
    pub headers: HeaderMap,
    pub body: BodyBuffer,
}

impl InboundRequest {
    /// Build a request with no headers and an empty body.
    pub fn new(method: Method, url: ParsedUrl) -> Self {
        Self {
            method,
            uri: url.to_string(),
            url,
            headers: HeaderMap::new(),
            body: BodyBuffer::new(),
        }
    }

    /// Read a request off the connection, buffering at most `max_body_bytes` of body.
    pub async fn receive(request: Request<Body>, max_body_bytes: usize) -> Result<Self, RelayError> {
        let (parts, body) = request.into_parts();
        if parts.method == Method::CONNECT {
            return Err(RelayError::TunnelingUnsupported);
        }

        let uri = parts.uri.to_string();
        let url = ParsedUrl::parse(&uri)?;

        let mut buffer = BodyBuffer::new();
        collect_limited(body, max_body_bytes, &mut buffer).await?;

        Ok(Self {
            method: parts.method,
            uri,
            url,
            headers: parts.headers,
            body: buffer,
        })
    }
}

impl HttpMessage for InboundRequest {
    fn url(&self) -> &ParsedUrl {
        &self.url
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn body_mut(&mut self) -> &mut BodyBuffer {
        &mut self.body
    }
}
