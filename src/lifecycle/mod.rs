//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! SIGINT / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → ProxyServer stops accepting, waits up to drain_secs, returns
//! ```
//!
//! Connections still open after the drain deadline are dropped along with
//! their relay sessions.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
