//! # Operation Table
//!
//! Every native operation a command can dispatch is a variant of [`Operation`].
//! A static table maps each variant to its transport entry point and the shape
//! of its completion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native operations reachable through the dispatch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    // Single record
    Get,
    Select,
    Exists,
    Put,
    Remove,
    Operate,
    Apply,

    // Batch
    BatchGet,
    BatchExists,
    BatchSelect,
    BatchRead,
    BatchWrite,
    BatchApply,
    BatchRemove,

    // Query and scan
    Query,
    Scan,
    QueryBackground,
    ScanBackground,
    JobInfo,

    // Administrative
    Truncate,
    InfoAny,

    // Multi-record transactions
    TxnCommit,
    TxnAbort,
}

/// Values the transport passes to the completion of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionShape {
    /// `(error)`
    ErrorOnly,
    /// `(error, value)`
    Single,
    /// `(error, bins, metadata, key)`
    Triple,
    /// Repeated `(error, bins, metadata, key)` followed by a terminator.
    Stream,
}

/// One row of the operation table.
#[derive(Debug, Clone, Copy)]
pub struct OperationEntry {
    pub operation: Operation,
    pub entry_point: &'static str,
    pub shape: CompletionShape,
}

static OPERATION_TABLE: &[OperationEntry] = &[
    row(Operation::Get, "get_async", CompletionShape::Triple),
    row(Operation::Select, "select_async", CompletionShape::Triple),
    row(Operation::Exists, "exists_async", CompletionShape::Triple),
    row(Operation::Put, "put_async", CompletionShape::ErrorOnly),
    row(Operation::Remove, "remove_async", CompletionShape::ErrorOnly),
    row(Operation::Operate, "operate_async", CompletionShape::Triple),
    row(Operation::Apply, "apply_async", CompletionShape::Single),
    row(Operation::BatchGet, "batch_get_async", CompletionShape::Single),
    row(Operation::BatchExists, "batch_exists_async", CompletionShape::Single),
    row(Operation::BatchSelect, "batch_select_async", CompletionShape::Single),
    row(Operation::BatchRead, "batch_read_async", CompletionShape::Single),
    row(Operation::BatchWrite, "batch_write_async", CompletionShape::Single),
    row(Operation::BatchApply, "batch_apply_async", CompletionShape::Single),
    row(Operation::BatchRemove, "batch_remove_async", CompletionShape::Single),
    row(Operation::Query, "query_async", CompletionShape::Stream),
    row(Operation::Scan, "scan_async", CompletionShape::Stream),
    row(Operation::QueryBackground, "query_background", CompletionShape::ErrorOnly),
    row(Operation::ScanBackground, "scan_background", CompletionShape::ErrorOnly),
    row(Operation::JobInfo, "job_info", CompletionShape::Single),
    row(Operation::Truncate, "truncate", CompletionShape::ErrorOnly),
    row(Operation::InfoAny, "info_any", CompletionShape::Single),
    row(Operation::TxnCommit, "txn_commit", CompletionShape::Single),
    row(Operation::TxnAbort, "txn_abort", CompletionShape::Single),
];

const fn row(operation: Operation, entry_point: &'static str, shape: CompletionShape) -> OperationEntry {
    OperationEntry {
        operation,
        entry_point,
        shape,
    }
}

impl Operation {
    /// Every operation, in table order.
    pub fn all() -> impl Iterator<Item = Operation> {
        OPERATION_TABLE.iter().map(|entry| entry.operation)
    }

    /// Look up the table row for this operation.
    pub fn entry(self) -> &'static OperationEntry {
        // Table rows are declared in enum order.
        let row = &OPERATION_TABLE[self as usize];
        debug_assert_eq!(row.operation, self);
        row
    }

    pub fn entry_point(self) -> &'static str {
        self.entry().entry_point
    }

    pub fn shape(self) -> CompletionShape {
        self.entry().shape
    }

    pub fn is_stream(self) -> bool {
        self.shape() == CompletionShape::Stream
    }

    pub fn is_batch(self) -> bool {
        matches!(
            self,
            Operation::BatchGet
                | Operation::BatchExists
                | Operation::BatchSelect
                | Operation::BatchRead
                | Operation::BatchWrite
                | Operation::BatchApply
                | Operation::BatchRemove
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_rows_follow_enum_order() {
        for (index, row) in OPERATION_TABLE.iter().enumerate() {
            assert_eq!(row.operation as usize, index, "row {:?} out of order", row.operation);
        }
    }

    #[test]
    fn test_entry_points_are_unique() {
        let names: HashSet<_> = Operation::all().map(Operation::entry_point).collect();
        assert_eq!(names.len(), OPERATION_TABLE.len());
    }

    #[test]
    fn test_stream_operations() {
        let streams: Vec<_> = Operation::all().filter(|op| op.is_stream()).collect();
        assert_eq!(streams, vec![Operation::Query, Operation::Scan]);
    }

    #[test]
    fn test_batch_operations_complete_with_single_value() {
        for op in Operation::all().filter(|op| op.is_batch()) {
            assert_eq!(op.shape(), CompletionShape::Single);
        }
    }
}
