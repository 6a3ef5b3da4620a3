//! Existence checks.
//!
//! "Record not found" is the one error recast into a successful result: a
//! keyed check resolves to a metadata-only record with no ttl or generation,
//! an unkeyed check to `false`. Whether the record was found travels with the
//! outcome and is never inferred from metadata.

use serde::{Deserialize, Serialize};

use crate::command::{ConvertContext, ResultConverter};
use crate::error::{CommandError, CommandResult};
use crate::record::{Key, Record};
use crate::status::StatusCode;
use crate::transport::RawPayload;

use super::unexpected_payload;

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExistsOutcome {
    /// Metadata-only record for keyed checks. Bins are always `None`.
    Record { record: Record, found: bool },
    /// Plain answer when the check had no key context.
    Flag(bool),
}

impl ExistsOutcome {
    pub fn exists(&self) -> bool {
        match self {
            ExistsOutcome::Record { found, .. } => *found,
            ExistsOutcome::Flag(flag) => *flag,
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            ExistsOutcome::Record { record, .. } => Some(record),
            ExistsOutcome::Flag(_) => None,
        }
    }

    fn not_found(key: Option<&Key>) -> Self {
        match key {
            Some(key) => ExistsOutcome::Record {
                record: Record::metadata_only(key.clone(), None),
                found: false,
            },
            None => ExistsOutcome::Flag(false),
        }
    }
}

/// Existence strategy. The key it carries decides the outcome shape.
#[derive(Debug, Clone, Default)]
pub struct ExistsConverter {
    key: Option<Key>,
}

impl ExistsConverter {
    /// Resolve to [`ExistsOutcome::Record`] for `key`.
    pub fn keyed(key: Key) -> Self {
        Self { key: Some(key) }
    }

    /// Resolve to [`ExistsOutcome::Flag`].
    pub fn flag() -> Self {
        Self { key: None }
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }
}

impl ResultConverter for ExistsConverter {
    type Output = ExistsOutcome;

    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        match (&self.key, payload) {
            (Some(key), RawPayload::Record { meta, .. }) => Ok(ExistsOutcome::Record {
                record: Record::metadata_only(key.clone(), meta),
                found: true,
            }),
            (Some(key), RawPayload::None) => Ok(ExistsOutcome::Record {
                record: Record::metadata_only(key.clone(), None),
                found: true,
            }),
            (None, RawPayload::Record { .. } | RawPayload::None) => Ok(ExistsOutcome::Flag(true)),
            (_, other) => Err(unexpected_payload(ctx, &other)),
        }
    }

    fn convert_response(
        &self,
        error: Option<CommandError>,
        payload: RawPayload,
        ctx: &ConvertContext,
    ) -> CommandResult<Self::Output> {
        match error {
            Some(error) if error.code == StatusCode::ERR_RECORD_NOT_FOUND => {
                Ok(ExistsOutcome::not_found(self.key.as_ref()))
            }
            Some(error) => Err(error),
            None => self.convert_result(payload, ctx),
        }
    }
}
