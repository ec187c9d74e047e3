//! Shared HTTP plumbing for the streaming clients.
//!
//! One connector-backed client pair serves every component: unary JSON
//! calls collect the response body, streaming calls hand the raw
//! [`hyper::body::Incoming`] back to the caller so frames can be pulled
//! lazily. Bearer tokens come from the application's [`TokenProvider`];
//! a missing token simply omits the `Authorization` header.

use http_body_util::{BodyExt, Empty, Full};
use hyper::Request;
use hyper::body::{Bytes, Incoming};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Error, Result, TransportError};

type Connector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

pub struct HttpClient {
    full_client: Client<Connector, Full<Bytes>>,
    empty_client: Client<Connector, Empty<Bytes>>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();

        let full_client = Client::builder(TokioExecutor::new()).build(connector.clone());
        let empty_client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            full_client,
            empty_client,
            request_timeout: config.request_timeout(),
        }
    }

    /// POST a JSON body and collect the JSON response.
    pub async fn post_json(&self, url: &str, body: Bytes, token: Option<&str>) -> Result<Bytes> {
        let response = self.post_raw(url, body, token, false).await?;
        collect_success(response).await
    }

    /// GET a JSON resource and collect the response.
    pub async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Bytes> {
        debug!(url = %url, "GET");

        let request = build_get(url, token, false)?;
        let response = self
            .with_timeout(self.empty_client.request(request))
            .await?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        collect_success(response).await
    }

    /// POST a JSON body and return the streaming response without
    /// collecting it. The timeout covers response-header receipt only;
    /// the body is read at the caller's pace.
    pub async fn post_stream(
        &self,
        url: &str,
        body: Bytes,
        token: Option<&str>,
    ) -> Result<hyper::Response<Incoming>> {
        let response = self.post_raw(url, body, token, true).await?;
        reject_failure(response).await
    }

    /// GET an SSE subscription and return the streaming response.
    pub async fn get_stream(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Incoming>> {
        debug!(url = %url, "GET (stream)");

        let request = build_get(url, token, true)?;
        let response = self
            .with_timeout(self.empty_client.request(request))
            .await?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        reject_failure(response).await
    }

    async fn post_raw(
        &self,
        url: &str,
        body: Bytes,
        token: Option<&str>,
        streaming: bool,
    ) -> Result<hyper::Response<Incoming>> {
        debug!(url = %url, streaming = streaming, body_len = body.len(), "POST");

        let mut builder = Request::builder()
            .method("POST")
            .uri(url)
            .header("Content-Type", "application/json");

        if streaming {
            builder = builder.header("Accept", "text/event-stream");
        }
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = builder
            .body(Full::new(body))
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        self.with_timeout(self.full_client.request(request))
            .await?
            .map_err(|e| TransportError::Connect(e.to_string()).into())
    }

    async fn with_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| Error::Timeout(self.request_timeout))
    }
}

fn build_get(url: &str, token: Option<&str>, streaming: bool) -> Result<Request<Empty<Bytes>>> {
    let mut builder = Request::builder().method("GET").uri(url);

    if streaming {
        builder = builder.header("Accept", "text/event-stream");
    }
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    builder
        .body(Empty::new())
        .map_err(|e| TransportError::Connect(e.to_string()).into())
}

/// Collect a 2xx body; a non-2xx status maps to a transport error carrying
/// the (truncated) error body.
async fn collect_success(response: hyper::Response<Incoming>) -> Result<Bytes> {
    let status = response.status();

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?
        .to_bytes();

    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }

    Ok(body)
}

/// Pass a 2xx streaming response through; collect and surface the error
/// body otherwise.
async fn reject_failure(response: hyper::Response<Incoming>) -> Result<hyper::Response<Incoming>> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .into_body()
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();

    Err(status_error(status, &body))
}

fn status_error(status: u16, body: &[u8]) -> Error {
    let message: String = String::from_utf8_lossy(body).chars().take(500).collect();
    TransportError::Status { status, message }.into()
}
