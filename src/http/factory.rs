//! Binds hooks to accepted connections.
//!
//! # Responsibilities
//! - Hold the current misdirector, request mangler and response mangler
//! - Default every unset slot to the identity hook
//! - Build one [`InboundRequestHandler`] per accepted connection
//! - Swap in new hooks on config reload without disturbing live connections

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::{HeaderName, HeaderValue};

use crate::config::{ProxyConfig, ReplaceConfig};
use crate::hooks::rules::{RemoveHeaders, ReplaceBody, SetHeaders, SetStatus};
use crate::hooks::{HookError, Identity, Mangler, Misdirector, OrderedAll};
use crate::http::handler::InboundRequestHandler;
use crate::http::request::InboundRequest;
use crate::http::response::ResponseRecord;
use crate::http::HttpMessage;
use crate::misdirection::{MisdirectorChain, RewriteRule};
use crate::net::ConnectionId;
use crate::relay::{Connector, RelayClient, SchemeRegistry};

/// The three hook slots.
#[derive(Clone)]
pub struct Hooks {
    pub misdirector: Arc<dyn Misdirector>,
    pub request_mangler: Arc<dyn Mangler<InboundRequest>>,
    /// `None` relays responses straight through without capturing them.
    pub response_mangler: Option<Arc<dyn Mangler<ResponseRecord>>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            misdirector: Arc::new(Identity),
            request_mangler: Arc::new(Identity),
            response_mangler: None,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("misdirector", &self.misdirector.as_ref().name())
            .field("request_mangler", &self.request_mangler.as_ref().name())
            .field(
                "response_mangler",
                &self.response_mangler.as_deref().map(|m| m.name()),
            )
            .finish()
    }
}

impl Hooks {
    /// Build hooks from the `[[misdirect]]`, `[request]` and `[response]` sections.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, HookError> {
        let mut hooks = Hooks::default();

        if !config.misdirect.is_empty() {
            let chain = config
                .misdirect
                .iter()
                .fold(MisdirectorChain::new(), |chain, rule| {
                    chain.link(RewriteRule::from_config(rule))
                });
            hooks.misdirector = Arc::new(chain);
        }

        let request = &config.request;
        if !request.is_empty() {
            let pipeline = message_rules::<InboundRequest>(
                &request.remove_headers,
                request.set_headers.iter(),
                &request.replace,
                OrderedAll::new(),
            )?;
            hooks.request_mangler = Arc::new(pipeline);
        }

        let response = &config.response;
        if !response.is_empty() {
            let mut pipeline = OrderedAll::new();
            if let Some(status) = response.status {
                pipeline = pipeline.part(SetStatus::from_u16(status)?);
            }
            let pipeline = message_rules::<ResponseRecord>(
                &response.remove_headers,
                response.set_headers.iter(),
                &response.replace,
                pipeline,
            )?;
            hooks.response_mangler = Some(Arc::new(pipeline));
        }

        Ok(hooks)
    }
}

fn message_rules<'a, M>(
    remove: &[String],
    set: impl Iterator<Item = (&'a String, &'a String)>,
    replace: &[ReplaceConfig],
    mut pipeline: OrderedAll<M>,
) -> Result<OrderedAll<M>, HookError>
where
    M: HttpMessage + Send + 'static,
{
    let invalid = |what: String| HookError::failed("config", what);

    if !remove.is_empty() {
        let names = remove
            .iter()
            .map(|n| {
                HeaderName::from_bytes(n.as_bytes())
                    .map_err(|_| invalid(format!("invalid header name `{}`", n)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        pipeline = pipeline.part(RemoveHeaders::new(names));
    }

    let headers = set
        .map(|(name, value)| -> Result<(HeaderName, HeaderValue), HookError> {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| invalid(format!("invalid header name `{}`", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| invalid(format!("invalid value for `{}`", name)))?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if !headers.is_empty() {
        pipeline = pipeline.part(SetHeaders::new(headers));
    }

    for rule in replace {
        let mut mangler = ReplaceBody::new(rule.find.as_bytes(), rule.replace.as_bytes());
        if let Some(fragment) = &rule.path_contains {
            mangler = mangler.when_path_contains(fragment.clone());
        }
        pipeline = pipeline.part(mangler);
    }

    Ok(pipeline)
}

/// Creates one handler per accepted connection from the current hooks.
pub struct ProxyFactory {
    hooks: ArcSwap<Hooks>,
    relay: Arc<RelayClient>,
    max_body_bytes: usize,
}

impl ProxyFactory {
    pub fn builder() -> ProxyFactoryBuilder {
        ProxyFactoryBuilder::default()
    }

    /// Factory with hooks, timeouts and limits taken from `config`.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, HookError> {
        Ok(Self::builder()
            .hooks(Hooks::from_config(config)?)
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .max_body_bytes(config.limits.max_body_bytes)
            .build())
    }

    /// The hooks new connections are built with.
    pub fn hooks(&self) -> Arc<Hooks> {
        self.hooks.load_full()
    }

    /// Replace the hooks. Connections already accepted keep their old ones.
    pub fn swap_hooks(&self, hooks: Hooks) {
        tracing::info!(hooks = ?hooks, "hooks replaced");
        self.hooks.store(Arc::new(hooks));
    }

    pub fn build_handler(&self, id: ConnectionId) -> InboundRequestHandler {
        InboundRequestHandler::new(
            id,
            self.hooks.load_full(),
            Arc::clone(&self.relay),
            self.max_body_bytes,
        )
    }
}

pub struct ProxyFactoryBuilder {
    hooks: Hooks,
    connect_timeout: Duration,
    max_body_bytes: usize,
    schemes: Vec<(String, Arc<dyn Connector>)>,
}

impl Default for ProxyFactoryBuilder {
    fn default() -> Self {
        Self {
            hooks: Hooks::default(),
            connect_timeout: Duration::from_secs(10),
            max_body_bytes: 10 * 1024 * 1024,
            schemes: Vec::new(),
        }
    }
}

impl ProxyFactoryBuilder {
    pub fn misdirector(mut self, misdirector: impl Misdirector + 'static) -> Self {
        self.hooks.misdirector = Arc::new(misdirector);
        self
    }

    pub fn request_mangler(mut self, mangler: impl Mangler<InboundRequest> + 'static) -> Self {
        self.hooks.request_mangler = Arc::new(mangler);
        self
    }

    /// Setting a response mangler switches relays to capture-and-replay.
    pub fn response_mangler(mut self, mangler: impl Mangler<ResponseRecord> + 'static) -> Self {
        self.hooks.response_mangler = Some(Arc::new(mangler));
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Register an extra scheme next to `http`.
    pub fn scheme(mut self, name: &str, connector: impl Connector + 'static) -> Self {
        self.schemes.push((name.to_string(), Arc::new(connector)));
        self
    }

    pub fn build(self) -> ProxyFactory {
        let registry = self
            .schemes
            .into_iter()
            .fold(SchemeRegistry::new(self.connect_timeout), |registry, (name, connector)| {
                registry.register_shared(&name, connector)
            });
        ProxyFactory {
            hooks: ArcSwap::from_pointee(self.hooks),
            relay: Arc::new(RelayClient::new(registry, self.max_body_bytes)),
            max_body_bytes: self.max_body_bytes,
        }
    }
}
