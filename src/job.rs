//! # Background Jobs
//!
//! Background queries and scans run on the server without streaming results.
//! A [`Job`] is the handle returned on dispatch, keyed by `(job_id, module)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::client::Client;
use crate::command::Command;
use crate::commands::JobInfoConverter;
use crate::error::CommandResult;
use crate::operation::Operation;
use crate::policy::InfoPolicy;
use crate::transport::Arg;

/// Module name for jobs started from a query with filters.
pub const QUERY_MODULE: &str = "query";
/// Module name for jobs started from a full scan.
pub const SCAN_MODULE: &str = "scan";

/// Random non-zero job identifier.
pub fn next_job_id() -> u64 {
    loop {
        let (_, low) = Uuid::new_v4().as_u64_pair();
        if low != 0 {
            return low;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    #[serde(other)]
    Undefined,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Undefined => write!(f, "undefined"),
        }
    }
}

/// Progress report for a background job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub status: JobStatus,
    #[serde(default)]
    pub progress_pct: u32,
    #[serde(default)]
    pub records_read: u64,
}

/// Handle to a background job.
#[derive(Clone)]
pub struct Job {
    client: Client,
    job_id: u64,
    module: String,
}

impl Job {
    pub fn new(client: &Client, job_id: u64, module: impl Into<String>) -> Self {
        Self {
            client: client.clone(),
            job_id,
            module: module.into(),
        }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Fetch the job's current progress.
    pub fn info(&self, policy: Option<InfoPolicy>) -> Command<JobInfoConverter> {
        Command::new(
            &self.client,
            Operation::JobInfo,
            vec![
                Arg::JobId(self.job_id),
                Arg::Module(self.module.clone()),
                Arg::Policy(policy.map(Into::into)),
            ],
            JobInfoConverter,
        )
    }

    /// Poll until the job reports completion.
    pub async fn wait_until_done(&self, poll_interval: Duration) -> CommandResult<JobInfo> {
        loop {
            let info = self.info(None).await?;
            if info.status.is_done() {
                return Ok(info);
            }
            debug!(
                job_id = self.job_id,
                module = %self.module,
                progress_pct = info.progress_pct,
                "Background job still running"
            );
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_id", &self.job_id)
            .field("module", &self.module)
            .finish()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.job_id == other.job_id && self.module == other.module
    }
}
