//! Guards that restrict a misdirector to certain URLs.
//!
//! A failed guard short-circuits to "no change" without calling the wrapped hook.

use std::collections::HashSet;

use crate::hooks::{HookError, Misdirector};
use crate::http::url::ParsedUrl;

/// Runs the wrapped misdirector only for listed hostnames (case-insensitive).
#[derive(Debug, Clone)]
pub struct RestrictToHostnames<M> {
    hostnames: HashSet<String>,
    inner: M,
}

/// Restrict `inner` to URLs whose hostname is one of `names`.
pub fn restrict_to_hostnames<M, I, S>(names: I, inner: M) -> RestrictToHostnames<M>
where
    M: Misdirector,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    RestrictToHostnames {
        hostnames: names
            .into_iter()
            .map(|n| n.as_ref().to_ascii_lowercase())
            .collect(),
        inner,
    }
}

impl<M: Misdirector> Misdirector for RestrictToHostnames<M> {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        if !self.hostnames.contains(&url.hostname()) {
            return Ok(None);
        }
        self.inner.misdirect(url)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Runs the wrapped misdirector only for listed paths (exact match).
#[derive(Debug, Clone)]
pub struct RestrictToPaths<M> {
    paths: HashSet<String>,
    inner: M,
}

/// Restrict `inner` to URLs whose path is one of `paths`.
pub fn restrict_to_paths<M, I, S>(paths: I, inner: M) -> RestrictToPaths<M>
where
    M: Misdirector,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RestrictToPaths {
        paths: paths.into_iter().map(Into::into).collect(),
        inner,
    }
}

impl<M: Misdirector> Misdirector for RestrictToPaths<M> {
    fn misdirect(&self, url: &ParsedUrl) -> Result<Option<ParsedUrl>, HookError> {
        if !self.paths.contains(url.path()) {
            return Ok(None);
        }
        self.inner.misdirect(url)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
