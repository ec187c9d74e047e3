//! Incrementally streamed chat responses.
//!
//! The backend answers `POST /api/chat/stream` with a chunked body framed
//! as SSE `data:` lines. [`ChatStream`] pulls body frames lazily, decodes
//! them with [`ChatDecoder`], and yields typed events one at a time; the
//! caller can abandon the stream mid-flight through its [`CancelHandle`].

mod decoder;

pub use decoder::{
    ChatDecoder, ChatStreamEvent, Citation, DONE_SENTINEL, decode_payload, dedupe_citations,
};

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Incoming};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::auth::TokenProvider;
use crate::cancel::CancelHandle;
use crate::config::Config;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::http::HttpClient;

/// Request body for the chat-stream endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPrompt {
    pub message: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Issues chat requests and hands back the live event stream.
pub struct ChatClient {
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    stream_url: String,
}

impl ChatClient {
    pub fn new(http: Arc<HttpClient>, tokens: Arc<dyn TokenProvider>, config: &Config) -> Self {
        Self {
            http,
            tokens,
            stream_url: format!("{}/api/chat/stream", config.http.origin()),
        }
    }

    pub async fn stream_message(&self, prompt: &ChatPrompt) -> Result<ChatStream> {
        let body = serde_json::to_vec(prompt).map_err(ProtocolError::Json)?;
        let token = self.tokens.bearer_token();

        let response = self
            .http
            .post_stream(&self.stream_url, body.into(), token.as_deref())
            .await?;

        debug!(project_id = %prompt.project_id, "chat stream opened");
        Ok(ChatStream::new(response.into_body()))
    }
}

/// Lazy, single-pass event stream over a chat response body.
///
/// Not restartable: once it reports `None` (or an error) it stays
/// terminated. Dropping the stream releases the underlying connection.
pub struct ChatStream<B = Incoming> {
    body: Option<B>,
    decoder: ChatDecoder,
    pending: VecDeque<ChatStreamEvent>,
    cancel: CancelHandle,
}

impl<B> ChatStream<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    pub fn new(body: B) -> Self {
        Self {
            body: Some(body),
            decoder: ChatDecoder::new(),
            pending: VecDeque::new(),
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for aborting the stream from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Next decoded event, or `None` once the stream has ended.
    ///
    /// The end sentinel and a plain transport close both terminate
    /// normally. After cancellation this returns `Error::Cancelled` and
    /// the body reader has been released.
    pub async fn next_event(&mut self) -> Result<Option<ChatStreamEvent>> {
        loop {
            if self.cancel.is_cancelled() {
                self.body = None;
                return Err(Error::Cancelled);
            }

            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            if self.decoder.is_finished() {
                self.body = None;
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };

            let cancel = self.cancel.clone();
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                frame = body.frame() => Some(frame),
            };

            match step {
                None => {
                    self.body = None;
                    return Err(Error::Cancelled);
                }
                Some(None) => {
                    // Body exhausted without the sentinel: normal end.
                    self.body = None;
                }
                Some(Some(Err(e))) => {
                    self.body = None;
                    return Err(TransportError::Body(e.to_string()).into());
                }
                Some(Some(Ok(frame))) => {
                    if let Some(data) = frame.data_ref() {
                        let events = self.decoder.feed(data);
                        self.pending.extend(events);
                    }
                }
            }
        }
    }

    /// Drain the stream, concatenating content deltas in arrival order.
    /// Citation events are skipped; callers that need them should consume
    /// events one by one.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await? {
            if let ChatStreamEvent::Content { content } = event {
                text.push_str(&content);
            }
        }
        Ok(text)
    }
}
