//! One relay: an inbound request, its upstream connection and the captured response.
//!
//! # Design Decisions
//! - The finished flag is a single compare-and-swap, so replay happens at most
//!   once even when end-of-response is signalled twice
//! - The upstream connection is closed before the response mangler runs
//! - Dropping an unfinished session aborts its upstream connection, which is
//!   how a client disconnect mid-relay releases resources

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use axum::body::Body;
use axum::http::Response;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::error::RelayError;
use crate::hooks::{Mangler, Shared};
use crate::http::response::ResponseRecord;

#[derive(Debug)]
pub struct RelaySession {
    id: Uuid,
    finished: AtomicBool,
    upstream: Mutex<Option<AbortHandle>>,
}

impl RelaySession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            finished: AtomicBool::new(false),
            upstream: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Bind the task driving the upstream connection to this session.
    pub fn attach_upstream(&self, handle: AbortHandle) {
        let previous = self
            .upstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn take_upstream(&self) -> Option<AbortHandle> {
        self.upstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Close the upstream connection. No more bytes are read from it.
    pub fn close_upstream(&self) {
        if let Some(handle) = self.take_upstream() {
            handle.abort();
            tracing::trace!(session_id = %self.id, "upstream closed");
        }
    }

    /// Finish a captured relay: close upstream, run `mangler`, replay.
    ///
    /// Returns `Ok(None)` if the session had already finished; in that case
    /// neither the mangler nor the replay runs.
    pub async fn end_of_response(
        &self,
        record: ResponseRecord,
        mangler: &dyn Mangler<ResponseRecord>,
    ) -> Result<Option<Response<Body>>, RelayError> {
        if self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(session_id = %self.id, "duplicate end of response ignored");
            return Ok(None);
        }
        self.close_upstream();

        let shared = Shared::new(record);
        mangler.mangle(shared.clone()).await?;
        let record = shared.into_inner()?;

        tracing::debug!(
            session_id = %self.id,
            status = record.status.as_u16(),
            body_len = record.body.len(),
            "replaying mangled response"
        );
        Ok(Some(record.replay()))
    }

    /// Finish a pass-through relay. The upstream connection keeps running
    /// until its body has been streamed to the client.
    pub fn detach(&self) {
        self.finished.store(true, Ordering::Release);
        drop(self.take_upstream());
    }

    /// Finish without replaying anything. Used when the upstream exchange
    /// fails; a later end-of-response is ignored.
    pub fn abort(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            tracing::debug!(session_id = %self.id, "relay aborted");
        }
        self.close_upstream();
    }
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if let Some(handle) = self.take_upstream() {
            handle.abort();
            tracing::debug!(session_id = %self.id, "relay dropped, upstream aborted");
        }
    }
}
