//! Outbound relay client.
//!
//! # Responsibilities
//! - Own exactly one upstream connection per relayed request
//! - Send the scrubbed request line, headers and buffered body
//! - Either stream the response through or capture it for mangling

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use bytes::Bytes;
use hyper_util::rt::TokioIo;

use crate::error::RelayError;
use crate::hooks::Mangler;
use crate::http::body::collect_limited;
use crate::http::headers::{scrub, set_fixed_length};
use crate::http::response::{pass_through, ResponseRecord};
use crate::observability::metrics::RelayMode;
use crate::relay::schemes::{SchemeRegistry, Target};
use crate::relay::session::RelaySession;

/// A request ready to be written upstream.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub target: Target,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Relays requests to resolved upstreams.
#[derive(Clone)]
pub struct RelayClient {
    registry: SchemeRegistry,
    max_body_bytes: usize,
}

impl RelayClient {
    pub fn new(registry: SchemeRegistry, max_body_bytes: usize) -> Self {
        Self {
            registry,
            max_body_bytes,
        }
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Relay `request` within `session`.
    ///
    /// With no `response_mangler` the upstream response is streamed through
    /// as it arrives. Otherwise it is captured in full and handed to
    /// [`RelaySession::end_of_response`]. If the exchange fails after the
    /// upstream connection is up, the session is aborted before returning.
    pub async fn relay(
        &self,
        session: &RelaySession,
        request: OutboundRequest,
        response_mangler: Option<&dyn Mangler<ResponseRecord>>,
    ) -> Result<(Response<Body>, RelayMode), RelayError> {
        let OutboundRequest {
            method,
            target,
            mut headers,
            body,
        } = request;

        let uri: Uri = target
            .rest
            .parse()
            .map_err(|_| RelayError::InvalidTarget(target.rest.clone()))?;

        let stream = target.connector.connect(&target.host, target.port).await?;
        let (mut sender, connection) =
            hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream)).await?;

        let session_id = session.id();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(session_id = %session_id, error = %e, "upstream connection ended with error");
            }
        });
        session.attach_upstream(driver.abort_handle());

        scrub(&mut headers);
        set_fixed_length(&mut headers, body.len());

        tracing::debug!(
            session_id = %session_id,
            method = %method,
            url = %target.url,
            "sending upstream request"
        );

        let mut outbound = Request::new(Body::from(body));
        *outbound.method_mut() = method.clone();
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        let response = match sender.send_request(outbound).await {
            Ok(response) => response,
            Err(e) => {
                session.abort();
                return Err(e.into());
            }
        };

        let Some(mangler) = response_mangler else {
            session.detach();
            return Ok((pass_through(response), RelayMode::PassThrough));
        };

        let (parts, incoming) = response.into_parts();
        let mut record = ResponseRecord::new(method, target.url, parts.status, parts.headers);
        if let Err(e) = collect_limited(Body::new(incoming), self.max_body_bytes, &mut record.body).await {
            session.abort();
            return Err(e.into_upstream());
        }

        let replay = session
            .end_of_response(record, mangler)
            .await?
            .ok_or(RelayError::AlreadyFinished)?;
        Ok((replay, RelayMode::Mangled))
    }
}
