use serde::{Deserialize, Serialize};

/// Server-side lifecycle of a sync job. Only the server mutates it;
/// `SUCCEEDED` and `FAILED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// A sync job as reported by the start and poll endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One progress snapshot from the job's event stream.
///
/// Events replace each other: consumers observe only the latest snapshot,
/// never an accumulated history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: String,
    /// Percentage in 0..=100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub total_docs: u64,
    #[serde(default)]
    pub processed_docs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format_is_screaming_snake() {
        let job: SyncJob =
            serde_json::from_str(r#"{"id":"j1","status":"RUNNING"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.error_message.is_none());

        let failed: SyncJob = serde_json::from_str(
            r#"{"id":"j2","status":"FAILED","errorMessage":"credential expired"}"#,
        )
        .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("credential expired"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_event_defaults_for_missing_counters() {
        let event: SyncEvent =
            serde_json::from_str(r#"{"jobId":"j1","status":"PENDING"}"#).unwrap();
        assert_eq!(event.progress, 0);
        assert_eq!(event.total_docs, 0);
        assert_eq!(event.message, "");
    }

    #[test]
    fn test_event_full_payload() {
        let event: SyncEvent = serde_json::from_str(
            r#"{"jobId":"j1","status":"RUNNING","message":"indexing","progress":40,"totalDocs":120,"processedDocs":48}"#,
        )
        .unwrap();
        assert_eq!(event.progress, 40);
        assert_eq!(event.processed_docs, 48);
    }
}
