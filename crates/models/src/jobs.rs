use crate::Id;
use chrono::{DateTime, Utc};

/// Decode error for job enums stored as text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParseJobEnumError(String);

/// The unit of asynchronous work executed by the agent runtime.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: Id,
    #[sqlx(try_from = "String")]
    pub job_type: JobType,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub params: serde_json::Value,
    pub progress: i32,
    pub status_message: String,
    pub error: String,
    pub task_id: Option<uuid::Uuid>,
    pub attempts: i32,
    pub input_path: String,
    pub output_path: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// An append-only log line attached to a job.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct JobLog {
    pub id: i64,
    pub job_id: Id,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    GoesFetch,
    GoesBackfill,
    CompositeFetch,
    CompositeGenerate,
    Animation,
    ImageProcess,
    Cleanup,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::GoesFetch,
        JobType::GoesBackfill,
        JobType::CompositeFetch,
        JobType::CompositeGenerate,
        JobType::Animation,
        JobType::ImageProcess,
        JobType::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::GoesFetch => "goes_fetch",
            JobType::GoesBackfill => "goes_backfill",
            JobType::CompositeFetch => "composite_fetch",
            JobType::CompositeGenerate => "composite_generate",
            JobType::Animation => "animation",
            JobType::ImageProcess => "image_process",
            JobType::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = ParseJobEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ParseJobEnumError(format!("unknown job type {s:?}")))
    }
}

impl TryFrom<String> for JobType {
    type Error = ParseJobEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    CompletedPartial,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::CompletedPartial => "completed_partial",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses must carry `completed_at` and reject cancellation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::CompletedPartial
                | JobStatus::Failed
                | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ParseJobEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "completed_partial" => Ok(JobStatus::CompletedPartial),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(ParseJobEnumError(format!("unknown job status {other:?}"))),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = ParseJobEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The wire shape published to `job:{id}` for every progress update.
/// Terminal updates additionally fan out `{type: "job_{status}"}` on the
/// global events topic.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    pub job_id: Id,
    pub progress: i32,
    pub message: String,
    pub status: JobStatus,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn job_type_round_trips() {
        for t in JobType::ALL {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::CompletedPartial.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn progress_event_wire_shape() {
        let event = ProgressEvent {
            job_id: Id::nil(),
            progress: 40,
            message: "Downloading frame 2/5".to_string(),
            status: JobStatus::Processing,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["progress"], 40);
        assert_eq!(value["status"], "processing");
    }
}
