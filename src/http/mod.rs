//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (per-connection HTTP/1.1 driver, one handler per connection)
//!     → handler.rs (misdirect → mangle → resolve → relay)
//!     → request.rs (buffered InboundRequest)
//!     → [relay client talks to upstream]
//!     → response.rs (ResponseRecord replay or pass-through)
//!     → Send to client, close
//! ```

pub mod body;
pub mod factory;
pub mod handler;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod url;

use axum::http::HeaderMap;

pub use body::BodyBuffer;
pub use factory::{Hooks, ProxyFactory};
pub use handler::{HandlerState, InboundRequestHandler};
pub use request::InboundRequest;
pub use response::ResponseRecord;
pub use server::ProxyServer;
pub use url::ParsedUrl;

/// Parts of a request or response that manglers commonly edit.
pub trait HttpMessage {
    fn url(&self) -> &ParsedUrl;
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn body_mut(&mut self) -> &mut BodyBuffer;
}
