//! URL misdirection.
//!
//! # Data Flow
//! ```text
//! ParsedUrl (split request target)
//!     → filters.rs (hostname / path guards)
//!     → rewrite.rs (config-driven component replacement)
//!     → apply(): compare, log on an actual change
//!     → effective target URL
//! ```
//!
//! # Design Decisions
//! - Equality with the input, not the presence of a value, decides whether a
//!   misdirection happened
//! - Exactly one log line per actual misdirection

pub mod filters;
pub mod rewrite;

use std::sync::Arc;

use crate::hooks::{HookError, Misdirector};
use crate::http::url::ParsedUrl;
use crate::observability::metrics;

pub use filters::{restrict_to_hostnames, restrict_to_paths, RestrictToHostnames, RestrictToPaths};
pub use rewrite::RewriteRule;

/// Apply `misdirector` to `original` and return the effective URL.
///
/// Logs `Misdirecting <original> to <new>` only when the URL actually changed.
pub fn apply(misdirector: &dyn Misdirector, original: &ParsedUrl) -> Result<ParsedUrl, HookError> {
    match misdirector.misdirect(original)? {
        Some(misdirected) if misdirected != *original => {
            tracing::info!(
                target: "minitrue::misdirection",
                "Misdirecting {} to {}",
                original,
                misdirected
            );
            metrics::record_misdirection();
            Ok(misdirected)
        }
        _ => Ok(original.clone()),
    }
}

/// Tries misdirectors in order; the first one that changes the URL wins.
#[derive(Default)]
pub struct MisdirectorChain {
    links: Vec<Arc<dyn Misdirector>>,
}

impl MisdirectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, misdirector: impl Misdirector + 'static) -> Self {
        self.links.push(Arc::new(misdirector));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl Misdirector for MisdirectorChain {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        for link in &self.links {
            match link.misdirect(url)? {
                Some(changed) if changed != *url => return Ok(Some(changed)),
                _ => continue,
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "misdirector-chain"
    }
}
