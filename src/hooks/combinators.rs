//! Mangler pipelines.
//!
//! Both combinators are manglers themselves, so pipelines nest freely.

use std::sync::Arc;

use futures_util::future::{try_join_all, BoxFuture};

use super::{HookResult, Mangler, Shared};

/// Runs every part concurrently and completes once all have completed.
///
/// Parts interleave at their suspension points; no ordering between their
/// edits is guaranteed. The first failure cancels the parts still running.
pub struct UnorderedAll<T> {
    parts: Vec<Arc<dyn Mangler<T>>>,
}

impl<T> UnorderedAll<T> {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Add a part to the pipeline.
    pub fn part(mut self, mangler: impl Mangler<T> + 'static) -> Self {
        self.parts.push(Arc::new(mangler));
        self
    }

    /// Add an already shared part.
    pub fn part_arc(mut self, mangler: Arc<dyn Mangler<T>>) -> Self {
        self.parts.push(mangler);
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<T> Default for UnorderedAll<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Mangler<T> for UnorderedAll<T> {
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult> {
        let running = self
            .parts
            .iter()
            .map(|part| part.mangle(target.clone()))
            .collect::<Vec<_>>();
        drop(target);
        Box::pin(async move {
            try_join_all(running).await?;
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "unordered-all"
    }
}

/// Runs each part only after the previous one has completed, in insertion order.
///
/// A failing part stops the pipeline; later parts are never started.
pub struct OrderedAll<T> {
    parts: Vec<Arc<dyn Mangler<T>>>,
}

impl<T> OrderedAll<T> {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Append a part to the pipeline.
    pub fn part(mut self, mangler: impl Mangler<T> + 'static) -> Self {
        self.parts.push(Arc::new(mangler));
        self
    }

    /// Append an already shared part.
    pub fn part_arc(mut self, mangler: Arc<dyn Mangler<T>>) -> Self {
        self.parts.push(mangler);
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<T> Default for OrderedAll<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Mangler<T> for OrderedAll<T> {
    fn mangle(&self, target: Shared<T>) -> BoxFuture<'_, HookResult> {
        Box::pin(async move {
            for part in &self.parts {
                if let Err(e) = part.mangle(target.clone()).await {
                    tracing::debug!(hook = part.as_ref().name(), error = %e, "Ordered pipeline stopped");
                    return Err(e);
                }
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "ordered-all"
    }
}
