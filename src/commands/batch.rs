//! Batch completions: raw per-key entries become [`BatchResult`]s.

use tracing::warn;

use crate::batch::{BatchRecord, BatchResult};
use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::record::Record;
use crate::transport::{RawBatchEntry, RawPayload};

use super::unexpected_payload;

/// Which entries of a batch may write.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteMask {
    None,
    All,
    PerEntry(Vec<bool>),
}

#[derive(Debug, Clone)]
pub struct BatchConverter {
    writes: WriteMask,
}

impl BatchConverter {
    /// Batches made only of reads (get, exists, select).
    pub fn read_only() -> Self {
        Self { writes: WriteMask::None }
    }

    /// Batches where every entry may write (apply, remove).
    pub fn all_writes() -> Self {
        Self { writes: WriteMask::All }
    }

    /// Mixed batches: entry `i` may write when `records[i]` does.
    pub fn for_records(records: &[BatchRecord]) -> Self {
        Self {
            writes: WriteMask::PerEntry(records.iter().map(BatchRecord::has_write).collect()),
        }
    }

    fn may_write(&self, index: usize) -> bool {
        match &self.writes {
            WriteMask::None => false,
            WriteMask::All => true,
            WriteMask::PerEntry(mask) => mask.get(index).copied().unwrap_or(false),
        }
    }

    fn convert_entry(&self, index: usize, entry: RawBatchEntry) -> BatchResult {
        let mut in_doubt = entry.in_doubt;
        if in_doubt && !self.may_write(index) {
            warn!(index, key = %entry.key, "Clearing in-doubt flag on read-only batch entry");
            in_doubt = false;
        }
        let record = Record::new(entry.key, entry.bins, entry.meta);
        BatchResult::new(entry.status, Some(record), in_doubt)
    }
}

impl ResultConverter for BatchConverter {
    type Output = Vec<BatchResult>;

    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        match payload {
            RawPayload::Batch(None) | RawPayload::None => Ok(Vec::new()),
            RawPayload::Batch(Some(entries)) => Ok(entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| self.convert_entry(index, entry))
                .collect()),
            other => Err(unexpected_payload(ctx, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandRef;
    use crate::operation::Operation;
    use crate::record::{Bins, Key, RecordMetadata};
    use crate::status::StatusCode;
    use serde_json::json;

    fn ctx(operation: Operation) -> ConvertContext {
        ConvertContext::new(CommandRef { operation, key: None }, None)
    }

    fn entry(n: i64, status: StatusCode, in_doubt: bool) -> RawBatchEntry {
        let mut bins = Bins::new();
        bins.insert("n".to_string(), json!(n));
        RawBatchEntry {
            status,
            key: Key::new("test", "demo", n),
            bins: Some(bins),
            meta: Some(RecordMetadata::new(10, 1)),
            in_doubt,
        }
    }

    #[test]
    fn test_absent_results_are_empty() {
        let results = BatchConverter::read_only()
            .convert_result(RawPayload::Batch(None), &ctx(Operation::BatchGet))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_entries_convert_in_order() {
        let payload = RawPayload::Batch(Some(vec![
            entry(1, StatusCode::OK, false),
            entry(2, StatusCode::ERR_RECORD_NOT_FOUND, false),
        ]));
        let results = BatchConverter::read_only()
            .convert_result(payload, &ctx(Operation::BatchGet))
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].status, StatusCode::ERR_RECORD_NOT_FOUND);
        let record = results[0].record.as_ref().unwrap();
        assert_eq!(record.key, Key::new("test", "demo", 1));
        assert_eq!(record.bin("n"), Some(&json!(1)));
        assert_eq!(record.ttl, Some(10));
    }

    #[test]
    fn test_in_doubt_cleared_for_reads_only() {
        let records = vec![
            BatchRecord::read_all(Key::new("test", "demo", 1)),
            BatchRecord::remove(Key::new("test", "demo", 2), None),
        ];
        let payload = RawPayload::Batch(Some(vec![
            entry(1, StatusCode::ERR_TIMEOUT, true),
            entry(2, StatusCode::ERR_TIMEOUT, true),
        ]));
        let results = BatchConverter::for_records(&records)
            .convert_result(payload, &ctx(Operation::BatchRead))
            .unwrap();

        assert!(!results[0].in_doubt);
        assert!(results[1].in_doubt);
    }

    #[test]
    fn test_all_writes_keep_in_doubt() {
        let payload = RawPayload::Batch(Some(vec![entry(1, StatusCode::ERR_TIMEOUT, true)]));
        let results = BatchConverter::all_writes()
            .convert_result(payload, &ctx(Operation::BatchRemove))
            .unwrap();
        assert!(results[0].in_doubt);
    }
}
