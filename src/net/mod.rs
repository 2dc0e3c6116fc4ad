//! Client-side sockets.
//!
//! # Data Flow
//! ```text
//! client TCP connection
//!     → listener.rs (semaphore permit per socket)
//!     → connection.rs (id, active gauge, idle notification)
//!     → http::server builds one InboundRequestHandler for it
//! ```
//!
//! # Design Decisions
//! - Accept waits for a permit once `max_connections` sockets are open
//! - The tracker is what shutdown drains against

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
