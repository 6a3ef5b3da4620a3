//! # Batch Model
//!
//! Per-key requests ([`BatchRecord`]) and outcomes ([`BatchResult`]) of batch
//! operations.

use serde::{Deserialize, Serialize};

use crate::policy::{ApplyPolicy, WritePolicy};
use crate::query::{BinOp, UdfCall};
use crate::record::{Key, Record};
use crate::status::StatusCode;

/// Discriminant of a [`BatchRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    Read,
    Write,
    Apply,
    Remove,
}

/// What a single batch entry asks for.
#[derive(Debug, Clone)]
pub enum BatchRecordKind {
    Read {
        bins: Option<Vec<String>>,
        ops: Vec<BinOp>,
        read_all_bins: bool,
    },
    Write {
        ops: Vec<BinOp>,
        policy: Option<WritePolicy>,
    },
    Apply {
        udf: UdfCall,
        policy: Option<ApplyPolicy>,
    },
    Remove {
        policy: Option<WritePolicy>,
    },
}

/// One entry of a mixed batch request.
///
/// The [`BatchType`] discriminant is derived from the populated variant, so it
/// cannot disagree with the fields it describes.
#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub key: Key,
    pub kind: BatchRecordKind,
}

impl BatchRecord {
    pub fn read_all(key: Key) -> Self {
        Self::new(
            key,
            BatchRecordKind::Read {
                bins: None,
                ops: Vec::new(),
                read_all_bins: true,
            },
        )
    }

    pub fn read_bins(key: Key, bins: Vec<String>) -> Self {
        Self::new(
            key,
            BatchRecordKind::Read {
                bins: Some(bins),
                ops: Vec::new(),
                read_all_bins: false,
            },
        )
    }

    pub fn read_ops(key: Key, ops: Vec<BinOp>) -> Self {
        Self::new(
            key,
            BatchRecordKind::Read {
                bins: None,
                ops,
                read_all_bins: false,
            },
        )
    }

    pub fn write(key: Key, ops: Vec<BinOp>, policy: Option<WritePolicy>) -> Self {
        Self::new(key, BatchRecordKind::Write { ops, policy })
    }

    pub fn apply(key: Key, udf: UdfCall, policy: Option<ApplyPolicy>) -> Self {
        Self::new(key, BatchRecordKind::Apply { udf, policy })
    }

    pub fn remove(key: Key, policy: Option<WritePolicy>) -> Self {
        Self::new(key, BatchRecordKind::Remove { policy })
    }

    fn new(key: Key, kind: BatchRecordKind) -> Self {
        Self { key, kind }
    }

    pub fn batch_type(&self) -> BatchType {
        match self.kind {
            BatchRecordKind::Read { .. } => BatchType::Read,
            BatchRecordKind::Write { .. } => BatchType::Write,
            BatchRecordKind::Apply { .. } => BatchType::Apply,
            BatchRecordKind::Remove { .. } => BatchType::Remove,
        }
    }

    /// Whether the entry may modify the record. Apply counts as a write since
    /// the UDF can mutate.
    pub fn has_write(&self) -> bool {
        !matches!(self.kind, BatchRecordKind::Read { .. })
    }
}

/// Outcome of one key within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub status: StatusCode,
    pub record: Option<Record>,
    /// The write may have applied even though a failure was observed.
    /// Only ever true for write-capable entries.
    pub in_doubt: bool,
}

impl BatchResult {
    pub fn new(status: StatusCode, record: Option<Record>, in_doubt: bool) -> Self {
        Self {
            status,
            record,
            in_doubt,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}
