use super::job::{JobStatus, SyncEvent};

/// Externally observable lifecycle of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No sync in flight; also the state after a cancel.
    Idle,
    /// Job started, waiting for the first stream frame.
    Connecting,
    /// Receiving progress events.
    Streaming,
    /// Terminal success seen on the stream; waiting out the settle delay
    /// before the confirmation fetch.
    Settling,
    /// Finished, successfully or with a server-reported failure.
    Done,
    /// The stream dropped before any terminal state was reached.
    Disconnected,
}

/// What applying one stream event means for the driver loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EventOutcome {
    /// Non-terminal progress; forward to the observer.
    Progress,
    /// Terminal success; settle, confirm, then report.
    Succeeded,
    /// Terminal failure with the event's message.
    Failed(String),
    /// Arrived after a terminal state; drop it.
    Stale,
}

/// Instance-owned mutable cell shared between the client and its reader
/// task. Handlers read it at fire time; nothing captures snapshots at
/// subscribe time.
#[derive(Debug)]
pub(crate) struct StateCell {
    pub phase: SyncPhase,
    pub snapshot: Option<SyncEvent>,
    /// Set before the transport is closed on a terminal event, so the
    /// close callback can tell deliberate shutdown from failure.
    pub completed: bool,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
            snapshot: None,
            completed: false,
        }
    }

    /// Apply one inbound event: last-write-wins snapshot replacement plus
    /// the phase transition it implies.
    pub fn apply_event(&mut self, event: SyncEvent) -> EventOutcome {
        if self.completed {
            return EventOutcome::Stale;
        }

        let status = event.status;
        let message = event.message.clone();
        self.snapshot = Some(event);

        match status {
            JobStatus::Succeeded => {
                self.completed = true;
                self.phase = SyncPhase::Settling;
                EventOutcome::Succeeded
            }
            JobStatus::Failed => {
                self.completed = true;
                self.phase = SyncPhase::Done;
                EventOutcome::Failed(message)
            }
            JobStatus::Pending | JobStatus::Running => {
                self.phase = SyncPhase::Streaming;
                EventOutcome::Progress
            }
        }
    }

    /// The transport closed or errored. Returns true when that should be
    /// surfaced as an abnormal disconnect, i.e. neither the completed flag
    /// nor the current snapshot indicates a terminal state.
    pub fn connection_lost(&mut self) -> bool {
        if self.completed {
            return false;
        }
        if let Some(snapshot) = &self.snapshot
            && snapshot.status.is_terminal()
        {
            return false;
        }

        self.phase = SyncPhase::Disconnected;
        true
    }

    /// Cancel/teardown: back to the initial state.
    pub fn reset(&mut self) {
        self.phase = SyncPhase::Idle;
        self.snapshot = None;
        self.completed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: JobStatus, message: &str, progress: u8) -> SyncEvent {
        SyncEvent {
            job_id: "j1".to_string(),
            status,
            message: message.to_string(),
            progress,
            total_docs: 10,
            processed_docs: progress as u64 / 10,
        }
    }

    #[test]
    fn test_progress_events_replace_snapshot() {
        let mut cell = StateCell::new();

        assert_eq!(
            cell.apply_event(event(JobStatus::Pending, "queued", 0)),
            EventOutcome::Progress
        );
        assert_eq!(
            cell.apply_event(event(JobStatus::Running, "indexing", 40)),
            EventOutcome::Progress
        );

        // Last write wins: only the newest snapshot is observable.
        let snapshot = cell.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.progress, 40);
        assert_eq!(cell.phase, SyncPhase::Streaming);
        assert!(!cell.completed);
    }

    #[test]
    fn test_success_latches_completed_before_close() {
        let mut cell = StateCell::new();
        cell.apply_event(event(JobStatus::Running, "indexing", 80));

        assert_eq!(
            cell.apply_event(event(JobStatus::Succeeded, "done", 100)),
            EventOutcome::Succeeded
        );
        assert!(cell.completed);
        assert_eq!(cell.phase, SyncPhase::Settling);
    }

    #[test]
    fn test_failure_carries_event_message() {
        let mut cell = StateCell::new();
        assert_eq!(
            cell.apply_event(event(JobStatus::Failed, "credential expired", 30)),
            EventOutcome::Failed("credential expired".to_string())
        );
        assert_eq!(cell.phase, SyncPhase::Done);
    }

    #[test]
    fn test_no_event_processed_after_terminal() {
        let mut cell = StateCell::new();
        cell.apply_event(event(JobStatus::Succeeded, "done", 100));

        assert_eq!(
            cell.apply_event(event(JobStatus::Running, "ghost", 10)),
            EventOutcome::Stale
        );
        // The stale event must not clobber the terminal snapshot.
        assert_eq!(
            cell.snapshot.as_ref().unwrap().status,
            JobStatus::Succeeded
        );
    }

    #[test]
    fn test_connection_lost_before_terminal_is_abnormal() {
        let mut cell = StateCell::new();
        cell.apply_event(event(JobStatus::Running, "indexing", 10));

        assert!(cell.connection_lost());
        assert_eq!(cell.phase, SyncPhase::Disconnected);
    }

    #[test]
    fn test_connection_close_after_completion_is_benign() {
        let mut cell = StateCell::new();
        cell.apply_event(event(JobStatus::Succeeded, "done", 100));

        assert!(!cell.connection_lost());
        assert_eq!(cell.phase, SyncPhase::Settling);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut cell = StateCell::new();
        cell.apply_event(event(JobStatus::Running, "indexing", 50));
        cell.reset();

        assert_eq!(cell.phase, SyncPhase::Idle);
        assert!(cell.snapshot.is_none());
        assert!(!cell.completed);
    }
}
