//! Responses relayed back to the client.
//!
//! # Responsibilities
//! - Hold a captured upstream response for response manglers
//! - Replay the final status, headers and body to the client
//! - Relay uncaptured responses straight through
//!
//! # Design Decisions
//! - Replay always rewinds the body and re-reads whatever the manglers left
//! - Framing headers are recomputed on replay since manglers may resize the body,
//!   except for responses that carry no body (HEAD, 1xx, 204, 304), whose
//!   `Content-Length` describes the entity and is replayed as received
//! - Every response to the client carries `Connection: close`

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode};

use crate::http::body::BodyBuffer;
use crate::http::headers::set_fixed_length;
use crate::http::url::ParsedUrl;
use crate::http::HttpMessage;

/// A fully captured upstream response.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// Method of the request this answers.
    pub method: Method,
    /// URL the response was fetched from.
    pub url: ParsedUrl,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyBuffer,
}

impl ResponseRecord {
    /// Start a record from a received status line and header block.
    pub fn new(method: Method, url: ParsedUrl, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            method,
            url,
            status,
            headers,
            body: BodyBuffer::new(),
        }
    }

    /// Whether this response may carry a body at all.
    pub fn has_body(&self) -> bool {
        !(self.method == Method::HEAD
            || self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED)
    }

    /// Turn the record into the response written to the client.
    pub fn replay(mut self) -> Response<Body> {
        self.body.rewind();
        let content = self.body.read_to_end();

        let body = if self.has_body() {
            set_fixed_length(&mut self.headers, content.len());
            Body::from(content)
        } else {
            Body::empty()
        };
        self.headers
            .insert(header::CONNECTION, HeaderValue::from_static("close"));

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl HttpMessage for ResponseRecord {
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

/// Relay an upstream response to the client without buffering.
pub fn pass_through<B>(response: Response<B>) -> Response<Body>
where
    B: hyper::body::Body<Data = bytes::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let mut response = response.map(Body::new);
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
