//! Client-facing HTTP/1.1 server.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve exactly one request per connection through a fresh handler
//! - Stop accepting on shutdown and drain in-flight connections
//!
//! # Design Decisions
//! - hyper's connection driver is used directly (no router): every request
//!   goes to the proxy handler regardless of path
//! - Keep-alive is off; the connection closes after its one response

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::sync::broadcast;

use crate::http::factory::ProxyFactory;
use crate::net::{ConnectionTracker, Listener, ListenerError};

pub struct ProxyServer {
    factory: Arc<ProxyFactory>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl ProxyServer {
    pub fn new(factory: Arc<ProxyFactory>, drain_timeout: Duration) -> Self {
        Self {
            factory,
            tracker: ConnectionTracker::new(),
            drain_timeout,
        }
    }

    pub fn factory(&self) -> &Arc<ProxyFactory> {
        &self.factory
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept and serve connections until `shutdown` fires, then drain.
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "proxy server starting");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr, permit)) => {
                            let guard = self.tracker.track();
                            let handler = Arc::new(self.factory.build_handler(guard.id()));
                            tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, "serving connection");

                            tokio::spawn(async move {
                                let service = service_fn(move |request: hyper::Request<hyper::body::Incoming>| {
                                    let handler = Arc::clone(&handler);
                                    async move {
                                        Ok::<_, Infallible>(handler.handle(request.map(Body::new)).await)
                                    }
                                });

                                if let Err(e) = http1::Builder::new()
                                    .keep_alive(false)
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await
                                {
                                    tracing::debug!(connection_id = %guard.id(), error = %e, "client connection ended with error");
                                }
                                drop(permit);
                                drop(guard);
                            });
                        }
                        Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }

        drop(listener);
        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, timeout = ?self.drain_timeout, "draining connections");
        }
        if !self.tracker.wait_for_idle(self.drain_timeout).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "drain timeout elapsed, dropping remaining connections"
            );
        }
        tracing::info!("proxy server stopped");
        Ok(())
    }
}
