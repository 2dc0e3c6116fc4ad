//! Scheme registry and target resolution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use futures_util::future::BoxFuture;
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::http::headers::host_header;
use crate::http::url::ParsedUrl;

/// Opens upstream connections for one scheme.
pub trait Connector: Send + Sync {
    /// Port used when the URL carries none.
    fn default_port(&self) -> u16;

    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<TcpStream, RelayError>>;
}

/// Plain TCP with a connect deadline.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    default_port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(default_port: u16, connect_timeout: Duration) -> Self {
        Self {
            default_port,
            connect_timeout,
        }
    }

    /// The `http` connector.
    pub fn http(connect_timeout: Duration) -> Self {
        Self::new(80, connect_timeout)
    }
}

impl Connector for TcpConnector {
    fn default_port(&self) -> u16 {
        self.default_port
    }

    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<TcpStream, RelayError>> {
        // IPv6 literals arrive bracketed.
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        Box::pin(connect_within(
            self.connect_timeout,
            host,
            port,
            TcpStream::connect((bare, port)),
        ))
    }
}

/// Await `connecting`, giving up after `deadline`.
pub async fn connect_within<F>(
    deadline: Duration,
    host: &str,
    port: u16,
    connecting: F,
) -> Result<TcpStream, RelayError>
where
    F: Future<Output = std::io::Result<TcpStream>>,
{
    match tokio::time::timeout(deadline, connecting).await {
        Ok(Ok(stream)) => {
            tracing::debug!(host = %host, port, "upstream connected");
            Ok(stream)
        }
        Ok(Err(source)) => Err(RelayError::UpstreamConnect {
            host: host.to_string(),
            port,
            source,
        }),
        Err(_) => Err(RelayError::ConnectTimeout {
            host: host.to_string(),
            port,
        }),
    }
}

/// A resolved upstream.
#[derive(Clone)]
pub struct Target {
    /// Effective URL the request is relayed to.
    pub url: ParsedUrl,
    pub host: String,
    pub port: u16,
    /// Path, query and fragment sent on the request line.
    pub rest: String,
    /// `Host` value injected when the client sent none.
    pub host_header: HeaderValue,
    pub connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("url", &self.url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rest", &self.rest)
            .finish()
    }
}

/// Maps URL schemes to connectors. Only `http` is registered by default.
#[derive(Clone)]
pub struct SchemeRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl SchemeRegistry {
    /// A registry with no schemes at all.
    pub fn empty() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    pub fn new(connect_timeout: Duration) -> Self {
        Self::empty().register("http", TcpConnector::http(connect_timeout))
    }

    pub fn register(self, scheme: &str, connector: impl Connector + 'static) -> Self {
        self.register_shared(scheme, Arc::new(connector))
    }

    /// Register a connector that is already shared. Replaces any previous one for `scheme`.
    pub fn register_shared(mut self, scheme: &str, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(scheme.to_ascii_lowercase(), connector);
        self
    }

    pub fn default_port(&self, scheme: &str) -> Option<u16> {
        self.connectors
            .get(&scheme.to_ascii_lowercase())
            .map(|c| c.default_port())
    }

    /// Pick the connector for `url` and split out where to connect.
    pub fn resolve(&self, url: &ParsedUrl) -> Result<Target, RelayError> {
        let connector = self
            .connectors
            .get(&url.scheme().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RelayError::UnsupportedScheme(url.scheme().to_string()))?;

        let default_port = connector.default_port();
        let port = url.port().unwrap_or(default_port);
        let host_header = host_header(url.host(), port, default_port)
            .ok_or_else(|| RelayError::InvalidTarget(url.to_string()))?;

        Ok(Target {
            url: url.clone(),
            host: url.host().to_string(),
            port,
            rest: url.rest_of_url(),
            host_header,
            connector,
        })
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
