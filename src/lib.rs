//! minitrue: an HTTP intercepting proxy with pluggable misdirection,
//! request mangling and response mangling hooks.

pub mod config;
pub mod error;
pub mod hooks;
pub mod http;
pub mod lifecycle;
pub mod misdirection;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::schema::ProxyConfig;
pub use error::RelayError;
pub use hooks::{HookError, Identity, Mangler, Misdirector, OrderedAll, Shared, UnorderedAll};
pub use http::{Hooks, InboundRequest, ParsedUrl, ProxyFactory, ProxyServer, ResponseRecord};
pub use lifecycle::Shutdown;
