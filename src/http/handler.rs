//! Inbound request handler.
//!
//! # Data Flow
//! ```text
//! Received        buffered InboundRequest
//!     → Misdirected     misdirector applied, change logged
//!     → RequestMangled  request mangler completed
//!     → Resolving       scheme → connector, host/port/rest split
//!     → Relaying        outbound headers built, relay client running
//!     → Done            terminal; the handler accepts nothing further
//! ```
//!
//! # Design Decisions
//! - One handler per client connection, built with the hooks current at accept time
//! - Every failure is scoped to this request and becomes a status response

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;

use crate::error::RelayError;
use crate::hooks::{HookError, Shared};
use crate::http::factory::Hooks;
use crate::http::headers::build_outbound_headers;
use crate::http::request::InboundRequest;
use crate::misdirection;
use crate::net::ConnectionId;
use crate::observability::metrics::{self, RelayMode};
use crate::relay::{OutboundRequest, RelayClient, RelaySession};

/// Where a handler is in its single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Received,
    Misdirected,
    RequestMangled,
    Resolving,
    Relaying,
    Done,
}

pub struct InboundRequestHandler {
    id: ConnectionId,
    hooks: Arc<Hooks>,
    relay: Arc<RelayClient>,
    max_body_bytes: usize,
    state: Mutex<HandlerState>,
}

impl InboundRequestHandler {
    pub fn new(
        id: ConnectionId,
        hooks: Arc<Hooks>,
        relay: Arc<RelayClient>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            id,
            hooks,
            relay,
            max_body_bytes,
            state: Mutex::new(HandlerState::Received),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn state(&self) -> HandlerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: HandlerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(connection_id = %self.id, from = ?*state, to = ?next, "handler state");
        *state = next;
    }

    /// Handle the connection's request. Always produces a response.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        if self.state() != HandlerState::Received {
            tracing::warn!(connection_id = %self.id, "request on finished handler");
            return RelayError::HandlerExhausted.into_response();
        }

        let start = Instant::now();
        let method = request.method().to_string();

        let result = self.process(request).await;
        self.transition(HandlerState::Done);

        match result {
            Ok((response, mode)) => {
                tracing::info!(
                    connection_id = %self.id,
                    method = %method,
                    status = response.status().as_u16(),
                    mode = mode.as_str(),
                    "request relayed"
                );
                metrics::record_relay(&method, response.status().as_u16(), mode, start);
                response
            }
            Err(e) => {
                let status = e.status();
                tracing::warn!(
                    connection_id = %self.id,
                    method = %method,
                    status = status.as_u16(),
                    error = %e,
                    "relay failed"
                );
                metrics::record_relay(&method, status.as_u16(), RelayMode::Error, start);
                e.into_response()
            }
        }
    }

    async fn process(&self, request: Request<Body>) -> Result<(Response<Body>, RelayMode), RelayError> {
        let mut inbound = InboundRequest::receive(request, self.max_body_bytes).await?;

        inbound.url = misdirection::apply(self.hooks.misdirector.as_ref(), &inbound.url)
            .map_err(|e| hook_failure("misdirect", e))?;
        self.transition(HandlerState::Misdirected);

        let inbound = self
            .mangle_request(inbound)
            .await
            .map_err(|e| hook_failure("request", e))?;
        self.transition(HandlerState::RequestMangled);

        self.transition(HandlerState::Resolving);
        let target = self.relay.registry().resolve(&inbound.url)?;

        self.transition(HandlerState::Relaying);
        let headers = build_outbound_headers(&inbound.headers, &target.host_header);
        let outbound = OutboundRequest {
            method: inbound.method,
            target,
            headers,
            body: inbound.body.as_bytes().to_vec().into(),
        };

        let session = RelaySession::new();
        tracing::debug!(
            connection_id = %self.id,
            session_id = %session.id(),
            url = %outbound.target.url,
            "relaying"
        );
        self.relay
            .relay(&session, outbound, self.hooks.response_mangler.as_deref())
            .await
            .map_err(|e| match e {
                RelayError::Hook(e) => hook_failure("response", e),
                other => other,
            })
    }

    /// Run the request mangler and take the request back from it.
    async fn mangle_request(&self, inbound: InboundRequest) -> Result<InboundRequest, HookError> {
        let shared = Shared::new(inbound);
        self.hooks
            .request_mangler
            .as_ref()
            .mangle(shared.clone())
            .await?;
        shared.into_inner()
    }
}

fn hook_failure(stage: &'static str, error: HookError) -> RelayError {
    metrics::record_hook_failure(stage);
    RelayError::Hook(error)
}
