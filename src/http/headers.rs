//! Header rewriting for relayed messages.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Copy the inbound headers for the outbound request, adding `Host` if missing.
pub fn build_outbound_headers(inbound: &HeaderMap, host: &HeaderValue) -> HeaderMap {
    let mut headers = inbound.clone();
    if !headers.contains_key(header::HOST) {
        headers.insert(header::HOST, host.clone());
    }
    headers
}

/// `Host` value for a resolved target; the port is omitted when it is the scheme default.
pub fn host_header(host: &str, port: u16, default_port: u16) -> Option<HeaderValue> {
    let value = if port == default_port {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    };
    HeaderValue::from_str(&value).ok()
}

/// Drop `Proxy-Connection` and force `Connection: close`.
pub fn scrub(headers: &mut HeaderMap) {
    headers.remove(PROXY_CONNECTION);
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
}

/// Make the framing headers describe a fully buffered body of `len` bytes.
pub fn set_fixed_length(headers: &mut HeaderMap, len: usize) {
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}
