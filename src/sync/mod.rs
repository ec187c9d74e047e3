//! Sync-job lifecycle client.
//!
//! Starting a sync is a unary POST; progress then arrives on an SSE
//! subscription that a spawned reader task drains. The reader and the
//! owning client share one instance-owned state cell, so the
//! transport-close path judges "deliberate shutdown vs. lost connection"
//! from live state rather than values captured at subscribe time.

mod job;
mod state;

pub use job::{JobStatus, SyncEvent, SyncJob};
pub use state::SyncPhase;
use state::{EventOutcome, StateCell};

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Incoming};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::error::{ProtocolError, Result};
use crate::http::HttpClient;
use crate::sse::FrameBuffer;

/// Receives lifecycle callbacks for one sync attempt.
///
/// Callbacks fire on the reader task, in stream arrival order. Exactly one
/// of `on_success` / `on_failure` / `on_disconnected` ends an attempt,
/// unless it was cancelled first.
pub trait SyncObserver: Send + Sync {
    /// A non-terminal progress snapshot. Replaces any prior one.
    fn on_progress(&self, event: &SyncEvent) {
        let _ = event;
    }
    /// The job finished and its final record was confirmed.
    fn on_success(&self, job: SyncJob);
    /// The server reported the job FAILED.
    fn on_failure(&self, message: &str);
    /// The stream dropped before any terminal state was reached.
    fn on_disconnected(&self) {}
}

/// Parameters for starting a sync run.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub project_id: String,
    /// Connector-specific options, forwarded verbatim as the POST body.
    pub params: Value,
}

impl SyncRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            params: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Client for the sync-job endpoints. One live transport at most; starting
/// a new sync tears down any previous attempt first.
pub struct SyncStreamClient {
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    origin: String,
    settle_delay: Duration,
    state: Arc<Mutex<StateCell>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SyncStreamClient {
    pub fn new(http: Arc<HttpClient>, tokens: Arc<dyn TokenProvider>, config: &Config) -> Self {
        Self {
            http,
            tokens,
            origin: config.http.origin().to_string(),
            settle_delay: config.sync.settle_delay(),
            state: Arc::new(Mutex::new(StateCell::new())),
            reader: Mutex::new(None),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SyncPhase {
        self.state.lock().phase
    }

    /// Latest progress snapshot, if any.
    pub fn snapshot(&self) -> Option<SyncEvent> {
        self.state.lock().snapshot.clone()
    }

    /// Start a sync job and subscribe to its progress stream.
    ///
    /// Returns once the job is started and the subscription (if one is
    /// needed) is open; progress is then delivered through the observer.
    /// An error from the start call or the subscription leaves the client
    /// back in `Idle` with no callback fired.
    pub async fn start_sync(
        &self,
        request: SyncRequest,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<()> {
        self.cancel_sync();

        let start_url = format!("{}/api/projects/{}/sync", self.origin, request.project_id);
        let body = serde_json::to_vec(&request.params).map_err(ProtocolError::Json)?;
        let token = self.tokens.bearer_token();

        let bytes = self
            .http
            .post_json(&start_url, body.into(), token.as_deref())
            .await?;
        let job: SyncJob = serde_json::from_slice(&bytes).map_err(ProtocolError::Json)?;

        info!(job_id = %job.id, status = ?job.status, "sync job started");

        if self.short_circuit(&job, &observer) {
            return Ok(());
        }

        let events_url = format!("{}/api/sync/jobs/{}/events", self.origin, job.id);
        let status_url = format!("{}/api/sync/jobs/{}", self.origin, job.id);

        self.state.lock().phase = SyncPhase::Connecting;

        let response = match self.http.get_stream(&events_url, token.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                // Subscription never opened: reject the call, back to idle.
                self.state.lock().reset();
                return Err(e);
            }
        };

        debug!(job_id = %job.id, "sync event stream opened");

        let task = tokio::spawn(run_stream(
            self.http.clone(),
            self.tokens.clone(),
            self.state.clone(),
            observer,
            response.into_body(),
            status_url,
            self.settle_delay,
        ));
        *self.reader.lock() = Some(task);

        Ok(())
    }

    /// Tear down any in-flight sync: close the transport, clear the
    /// snapshot, return to `Idle`. Safe to call at any time, from any
    /// state. Local-only: the server-side job keeps running.
    pub fn cancel_sync(&self) {
        if let Some(task) = self.reader.lock().take() {
            task.abort();
            debug!("sync event stream closed by cancel");
        }
        self.state.lock().reset();
    }

    /// Handle a job that settled synchronously in the start call.
    /// Returns true when the attempt is finished and no transport needs
    /// to be opened.
    fn short_circuit(&self, job: &SyncJob, observer: &Arc<dyn SyncObserver>) -> bool {
        match job.status {
            JobStatus::Failed => {
                let message = job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "sync job failed".to_string());
                self.finish_without_stream();
                observer.on_failure(&message);
                true
            }
            JobStatus::Succeeded => {
                self.finish_without_stream();
                observer.on_success(job.clone());
                true
            }
            JobStatus::Pending | JobStatus::Running => false,
        }
    }

    fn finish_without_stream(&self) {
        let mut cell = self.state.lock();
        cell.completed = true;
        cell.phase = SyncPhase::Done;
    }
}

impl Drop for SyncStreamClient {
    fn drop(&mut self) {
        self.cancel_sync();
    }
}

/// Why the event loop stopped consuming the stream.
enum StreamEnd {
    /// Terminal success event; the final record still needs confirming.
    Succeeded(SyncEvent),
    /// Terminal failure event with its message.
    Failed(String),
    /// The transport closed or errored without a terminal event.
    Dropped,
}

/// Drain the subscription until a terminal event or transport loss.
///
/// Returning drops `body`, which is what closes the transport; the
/// completed flag is latched inside `apply_event` before that happens.
async fn drive_stream<B>(
    state: &Mutex<StateCell>,
    observer: &Arc<dyn SyncObserver>,
    mut body: B,
) -> StreamEnd
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut frames = FrameBuffer::new();

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                let Some(data) = frame.data_ref() else {
                    continue;
                };
                for sse_frame in frames.feed(data) {
                    if sse_frame.data.is_empty() {
                        continue;
                    }

                    let event: SyncEvent = match serde_json::from_str(&sse_frame.data) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "dropping malformed sync event");
                            continue;
                        }
                    };

                    let outcome = state.lock().apply_event(event.clone());
                    match outcome {
                        EventOutcome::Progress => observer.on_progress(&event),
                        EventOutcome::Succeeded => return StreamEnd::Succeeded(event),
                        EventOutcome::Failed(message) => return StreamEnd::Failed(message),
                        EventOutcome::Stale => {
                            debug!(job_id = %event.job_id, "event after terminal state ignored");
                        }
                    }
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "sync event stream errored");
                return StreamEnd::Dropped;
            }
            None => return StreamEnd::Dropped,
        }
    }
}

async fn run_stream(
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    state: Arc<Mutex<StateCell>>,
    observer: Arc<dyn SyncObserver>,
    body: Incoming,
    status_url: String,
    settle_delay: Duration,
) {
    let end = drive_stream(&state, &observer, body).await;
    settle_and_report(&http, &tokens, &state, &observer, end, &status_url, settle_delay).await;
}

/// Terminal handling shared by the spawned reader. The stream body is
/// already dropped by the time this runs.
async fn settle_and_report(
    http: &HttpClient,
    tokens: &Arc<dyn TokenProvider>,
    state: &Mutex<StateCell>,
    observer: &Arc<dyn SyncObserver>,
    end: StreamEnd,
    status_url: &str,
    settle_delay: Duration,
) {
    match end {
        StreamEnd::Succeeded(event) => {
            // Stream notifications can outrun the persisted job record;
            // settle briefly, then confirm against the poll endpoint.
            debug!(
                job_id = %event.job_id,
                delay_ms = settle_delay.as_millis() as u64,
                "settling before confirmation fetch"
            );
            tokio::time::sleep(settle_delay).await;

            let job = match confirm_job(http, tokens, status_url).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(error = %e, "confirmation fetch failed, reporting from stream event");
                    SyncJob {
                        id: event.job_id.clone(),
                        status: JobStatus::Succeeded,
                        error_message: None,
                    }
                }
            };

            state.lock().phase = SyncPhase::Done;
            info!(job_id = %job.id, "sync completed");
            observer.on_success(job);
        }
        StreamEnd::Failed(message) => {
            info!(message = %message, "sync job failed");
            observer.on_failure(&message);
        }
        StreamEnd::Dropped => {
            // Judged from live state: a close right after the terminal
            // event is deliberate shutdown, not a failure.
            let lost = state.lock().connection_lost();
            if lost {
                warn!("sync event stream disconnected before completion");
                observer.on_disconnected();
            }
        }
    }
}

async fn confirm_job(
    http: &HttpClient,
    tokens: &Arc<dyn TokenProvider>,
    status_url: &str,
) -> Result<SyncJob> {
    let token = tokens.bearer_token();
    let bytes = http.get_json(status_url, token.as_deref()).await?;
    serde_json::from_slice(&bytes).map_err(|e| ProtocolError::Json(e).into())
}
