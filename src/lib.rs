//! Realtime streaming clients for the Quill workspace backend.
//!
//! Three independent components, one per transport surface:
//! - [`sync::SyncStreamClient`]: starts a backend sync job and follows its
//!   SSE progress stream through to a confirmed terminal state.
//! - [`chat::ChatStream`]: lazy, cancellable decoding of an SSE-framed
//!   chat response body into typed events.
//! - [`rpc::RpcToolClient`]: JSON-RPC 2.0 tool invocation plus a named-event
//!   SSE side channel.
//!
//! They share only the HTTP plumbing in [`http`], the SSE framing in
//! [`sse`], and the application-supplied [`auth::TokenProvider`].
//!
//! ```no_run
//! use quill_stream::auth::StaticToken;
//! use quill_stream::chat::{ChatClient, ChatPrompt, ChatStreamEvent};
//! use quill_stream::config::Config;
//! use quill_stream::http::HttpClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> quill_stream::Result<()> {
//! let config = Config::default();
//! let http = Arc::new(HttpClient::new(&config.http));
//! let chat = ChatClient::new(http, StaticToken::new("token"), &config);
//!
//! let mut stream = chat
//!     .stream_message(&ChatPrompt {
//!         message: "What changed this week?".to_string(),
//!         project_id: "p-42".to_string(),
//!         session_id: None,
//!     })
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await? {
//!     if let ChatStreamEvent::Content { content } = event {
//!         print!("{content}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cancel;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod rpc;
pub mod sse;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{DomainFailure, Error, ProtocolError, Result, TransportError};
