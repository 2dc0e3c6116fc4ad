//! Outbound relay engine.
//!
//! # Data Flow
//! ```text
//! effective ParsedUrl
//!     → schemes.rs (scheme → connector, host/port/rest resolution)
//!     → client.rs (connect, send scrubbed request)
//!         ├─ no response mangler: stream upstream response to client
//!         └─ response mangler: capture status/headers/body
//!               → session.rs (finish once, close upstream, mangle, replay)
//! ```
//!
//! # Design Decisions
//! - Each relay owns exactly one upstream connection; nothing is pooled
//! - The capture/pass-through decision is made once, from the optional
//!   response mangler slot
//! - Dropping a session aborts its upstream connection

pub mod client;
pub mod schemes;
pub mod session;

pub use client::{OutboundRequest, RelayClient};
pub use schemes::{connect_within, Connector, SchemeRegistry, Target, TcpConnector};
pub use session::RelaySession;
