//! Config-driven misdirection rules.

use crate::config::MisdirectConfig;
use crate::hooks::{HookError, Misdirector};
use crate::http::url::ParsedUrl;

use super::filters::{restrict_to_hostnames, restrict_to_paths};

/// Replaces selected URL components.
#[derive(Debug, Clone, Default)]
pub struct RewriteRule {
    name: String,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    query: Option<String>,
}

impl RewriteRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Build the rule described by a `[[misdirect]]` entry, wrapped in the
    /// hostname and path guards it lists.
    pub fn from_config(config: &MisdirectConfig) -> Box<dyn Misdirector> {
        let mut rule = RewriteRule::new(config.name.clone());
        rule.scheme = config.scheme.clone();
        rule.host = config.host.clone();
        rule.port = config.port;
        rule.path = config.path.clone();
        rule.query = config.query.clone();

        match (config.hosts.is_empty(), config.paths.is_empty()) {
            (true, true) => Box::new(rule),
            (false, true) => Box::new(restrict_to_hostnames(&config.hosts, rule)),
            (true, false) => Box::new(restrict_to_paths(config.paths.clone(), rule)),
            (false, false) => Box::new(restrict_to_hostnames(
                &config.hosts,
                restrict_to_paths(config.paths.clone(), rule),
            )),
        }
    }
}

impl Misdirector for RewriteRule {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        let mut rewritten = url.clone();
        if let Some(scheme) = &self.scheme {
            rewritten = rewritten.with_scheme(scheme.as_str());
        }
        if let Some(host) = &self.host {
            rewritten = rewritten.with_host(host.as_str());
        }
        if let Some(port) = self.port {
            rewritten = rewritten.with_port(Some(port));
        }
        if let Some(path) = &self.path {
            rewritten = rewritten.with_path(path.as_str());
        }
        if let Some(query) = &self.query {
            rewritten = rewritten.with_query(Some(query).filter(|q| !q.is_empty()).map(String::as_str));
        }
        Ok(Some(rewritten))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
