//! Fully buffered message bodies.
//!
//! Bodies are held in memory so manglers can rewrite them before anything
//! reaches the other side. The read cursor is explicit and is rewound before
//! every replay.

use std::borrow::Cow;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::error::RelayError;

/// An in-memory body with a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyBuffer {
    data: BytesMut,
    cursor: usize,
}

impl BodyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk at the end of the buffer. The cursor does not move.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Replace the whole content and rewind.
    pub fn replace(&mut self, content: impl AsRef<[u8]>) {
        self.data.clear();
        self.data.extend_from_slice(content.as_ref());
        self.cursor = 0;
    }

    /// Replace every occurrence of `find` with `with`, returning how many were replaced.
    ///
    /// The cursor is rewound when anything changed.
    pub fn replace_all(&mut self, find: &[u8], with: &[u8]) -> usize {
        if find.is_empty() || self.data.len() < find.len() {
            return 0;
        }

        let mut out = BytesMut::with_capacity(self.data.len());
        let mut count = 0;
        let mut i = 0;
        while i < self.data.len() {
            if self.data[i..].starts_with(find) {
                out.extend_from_slice(with);
                i += find.len();
                count += 1;
            } else {
                out.extend_from_slice(&self.data[i..i + 1]);
                i += 1;
            }
        }

        if count > 0 {
            self.data = out;
            self.cursor = 0;
        }
        count
    }

    /// Move the read cursor back to the start.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Copy up to `buf.len()` unread bytes into `buf`, advancing the cursor.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        n
    }

    /// Everything from the cursor to the end, leaving the cursor at the end.
    pub fn read_to_end(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.data[self.cursor..]);
        self.cursor = self.data.len();
        rest
    }

    /// The whole content regardless of the cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The whole content as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&[u8]> for BodyBuffer {
    fn from(value: &[u8]) -> Self {
        let mut body = Self::new();
        body.append(value);
        body
    }
}

impl From<&str> for BodyBuffer {
    fn from(value: &str) -> Self {
        Self::from(value.as_bytes())
    }
}

impl From<Bytes> for BodyBuffer {
    fn from(value: Bytes) -> Self {
        Self::from(value.as_ref())
    }
}

/// Drain `body` into `buffer`, failing once more than `limit` bytes have arrived.
pub async fn collect_limited(
    body: Body,
    limit: usize,
    buffer: &mut BodyBuffer,
) -> Result<(), RelayError> {
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RelayError::Body)?;
        if buffer.len() + chunk.len() > limit {
            return Err(RelayError::BodyTooLarge { limit });
        }
        buffer.append(&chunk);
    }
    Ok(())
}
