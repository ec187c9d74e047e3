//! Test support: scripted HTTP bodies for driving stream readers without
//! a live server.

use hyper::body::{Body, Bytes, Frame};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing_subscriber::EnvFilter;

/// Route tracing output through the test harness. Safe to call from every
/// test; only the first initialization wins.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Yields its chunks in order, then either ends cleanly or stalls forever
/// (for cancellation/abort tests).
pub(crate) struct ChunkBody {
    chunks: VecDeque<Bytes>,
    stall: bool,
}

impl ChunkBody {
    pub fn new<S: AsRef<str>>(chunks: &[S]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|c| Bytes::from(c.as_ref().to_string()))
                .collect(),
            stall: false,
        }
    }

    pub fn stalling<S: AsRef<str>>(chunks: &[S]) -> Self {
        let mut body = Self::new(chunks);
        body.stall = true;
        body
    }

    /// No data at all; every poll is `Pending`.
    pub fn pending() -> Self {
        Self {
            chunks: VecDeque::new(),
            stall: true,
        }
    }
}

impl Body for ChunkBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.chunks.pop_front() {
            Some(chunk) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            None if this.stall => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}
