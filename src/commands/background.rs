//! Background queries/scans and job progress.

use crate::client::Client;
use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::job::{Job, JobInfo, QUERY_MODULE, SCAN_MODULE};
use crate::policy::Policy;
use crate::query::Query;
use crate::status::StatusCode;
use crate::transport::{Arg, RawPayload};

use super::unexpected_payload;

/// Resolves a background dispatch to its [`Job`] handle.
#[derive(Clone)]
pub struct BackgroundConverter {
    client: Client,
    job_id: u64,
    module: &'static str,
}

impl BackgroundConverter {
    pub fn new(client: &Client, query: &Query, job_id: u64) -> Self {
        Self {
            client: client.clone(),
            job_id,
            module: Self::module_for(query),
        }
    }

    /// Filtered queries run as `query` jobs, everything else as `scan`.
    pub fn module_for(query: &Query) -> &'static str {
        if query.has_filters() {
            QUERY_MODULE
        } else {
            SCAN_MODULE
        }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Dispatch arguments: `(namespace, set, query, policy, job_id)`.
    pub fn args(&self, query: Query, policy: Option<Policy>) -> Vec<Arg> {
        vec![
            Arg::Namespace(query.namespace.clone()),
            Arg::Set(query.set.clone()),
            Arg::Query(query),
            Arg::Policy(policy),
            Arg::JobId(self.job_id),
        ]
    }
}

impl ResultConverter for BackgroundConverter {
    type Output = Job;

    fn convert_result(&self, _payload: RawPayload, _ctx: &ConvertContext) -> CommandResult<Self::Output> {
        Ok(Job::new(&self.client, self.job_id, self.module))
    }
}

/// Parses a job progress report.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobInfoConverter;

impl ResultConverter for JobInfoConverter {
    type Output = JobInfo;

    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        match payload {
            RawPayload::Value(value) => serde_json::from_value(value).map_err(|e| {
                let mut error = crate::error::CommandError::new(
                    StatusCode::ERR_CLIENT,
                    format!("Invalid job info: {e}"),
                );
                error.command = Some(ctx.command.clone());
                error
            }),
            other => Err(unexpected_payload(ctx, &other)),
        }
    }
}
