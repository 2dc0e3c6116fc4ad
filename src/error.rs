//! Per-request error taxonomy.
//!
//! Every error here is scoped to the request that produced it. The connection
//! handler turns it into a best-effort status response and closes the client
//! connection; the listener and other connections are never affected.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::hooks::HookError;
use crate::http::url::UrlError;

/// Error type for a single relayed request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The request target could not be split into an absolute URL.
    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    /// CONNECT tunnels are not relayed.
    #[error("CONNECT tunneling is not supported")]
    TunnelingUnsupported,

    /// No relay client is registered for the resolved scheme.
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    /// The netloc carries a port segment that is not a number.
    #[error("malformed netloc `{0}`")]
    MalformedNetloc(String),

    /// TCP connect to the upstream failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    UpstreamConnect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// TCP connect to the upstream did not finish in time.
    #[error("timed out connecting to {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },

    /// HTTP exchange with the upstream failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] hyper::Error),

    /// The client's request body could not be read.
    #[error("body error: {0}")]
    Body(#[source] axum::Error),

    /// The client's request body grew past the configured limit.
    #[error("body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The upstream response body broke off before it was fully captured.
    #[error("upstream body error: {0}")]
    UpstreamBody(#[source] axum::Error),

    /// A captured upstream response grew past the configured limit.
    #[error("upstream response exceeds {limit} bytes")]
    UpstreamTooLarge { limit: usize },

    /// A misdirector or mangler failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The handler already finished its one request.
    #[error("connection handler already finished")]
    HandlerExhausted,

    /// The relay session was finished before this response could be replayed.
    #[error("relay session already finished")]
    AlreadyFinished,
}

impl RelayError {
    /// Status code written to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidTarget(_) | RelayError::MalformedNetloc(_) | RelayError::Body(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::TunnelingUnsupported => StatusCode::NOT_IMPLEMENTED,
            RelayError::UnsupportedScheme(_)
            | RelayError::UpstreamConnect { .. }
            | RelayError::Upstream(_)
            | RelayError::UpstreamBody(_)
            | RelayError::UpstreamTooLarge { .. } => StatusCode::BAD_GATEWAY,
            RelayError::ConnectTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Hook(_) | RelayError::AlreadyFinished => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::HandlerExhausted => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Reattribute a body error raised while reading an upstream response.
    pub fn into_upstream(self) -> Self {
        match self {
            RelayError::Body(e) => RelayError::UpstreamBody(e),
            RelayError::BodyTooLarge { limit } => RelayError::UpstreamTooLarge { limit },
            other => other,
        }
    }
}

impl From<UrlError> for RelayError {
    fn from(value: UrlError) -> Self {
        match value {
            UrlError::MalformedNetloc(netloc) => RelayError::MalformedNetloc(netloc),
            other => RelayError::InvalidTarget(other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, format!("{}\n", self)).into_response();
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}
