//! # Transport Abstraction
//!
//! The network/cluster engine that actually talks to database nodes sits behind
//! the [`Transport`] trait. Commands hand it a [`NativeCall`] (operation, entry
//! point, ordered arguments) and receive a [`RawReply`] whose payload mirrors the
//! completion shapes of the native API: `(error)`, `(error, value)` or
//! `(error, bins, metadata, key)`. Streaming operations instead push
//! [`RawStreamItem`]s into a [`StreamSink`] and learn from its return value
//! whether the consumer aborted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::BatchRecord;
use crate::error::{NativeError, RawError};
use crate::operation::Operation;
use crate::policy::Policy;
use crate::query::{BinOp, Query, UdfCall};
use crate::record::{Bins, Key, RawKey, RecordMetadata};
use crate::status::StatusCode;

/// Common interface for native transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport name for debugging/logging.
    fn transport_name(&self) -> &'static str;

    /// Whether the transport currently holds a live cluster connection.
    fn is_connected(&self) -> bool;

    /// Execute a point or batch operation and return its single completion.
    async fn call(&self, call: NativeCall) -> RawReply;

    /// Execute a streaming operation, delivering every item and a final
    /// terminator (an error, or an item carrying `state`) into `sink`.
    /// Implementations stop producing once `sink` answers
    /// [`StreamControl::Abort`].
    async fn stream(&self, call: NativeCall, sink: StreamSink);
}

/// One positional argument of a native call.
#[derive(Debug, Clone)]
pub enum Arg {
    Key(Key),
    Keys(Vec<Key>),
    Bins(Bins),
    BinNames(Vec<String>),
    Ops(Vec<BinOp>),
    Udf(UdfCall),
    BatchRecords(Vec<BatchRecord>),
    Namespace(String),
    Set(Option<String>),
    Query(Query),
    JobId(u64),
    Module(String),
    TxnId(u64),
    Metadata(RecordMetadata),
    Value(serde_json::Value),
    Policy(Option<Policy>),
}

/// A resolved invocation of a native entry point.
#[derive(Debug, Clone)]
pub struct NativeCall {
    pub operation: Operation,
    pub entry_point: &'static str,
    pub args: Vec<Arg>,
}

impl NativeCall {
    pub fn new(operation: Operation, args: Vec<Arg>) -> Self {
        Self {
            operation,
            entry_point: operation.entry_point(),
            args,
        }
    }

    /// First key argument, if any.
    pub fn key(&self) -> Option<&Key> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Key(key) => Some(key),
            _ => None,
        })
    }

    /// Policy argument, if any.
    pub fn policy(&self) -> Option<&Policy> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Policy(policy) => policy.as_ref(),
            _ => None,
        })
    }
}

/// Per-key outcome as delivered by the transport for batch operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatchEntry {
    pub status: StatusCode,
    pub key: Key,
    pub bins: Option<Bins>,
    pub meta: Option<RecordMetadata>,
    #[serde(default)]
    pub in_doubt: bool,
}

/// Values passed to a completion besides the error.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawPayload {
    /// `(error)` only.
    #[default]
    None,
    /// `(error, value)`
    Value(serde_json::Value),
    /// `(error, bins, metadata, key)`
    Record {
        bins: Option<Bins>,
        meta: Option<RecordMetadata>,
        key: Option<RawKey>,
    },
    /// `(error, results)`; `None` when the transport produced no array.
    Batch(Option<Vec<RawBatchEntry>>),
}

impl RawPayload {
    /// The first raw value, for operations whose result is passed through.
    pub fn into_first_value(self) -> serde_json::Value {
        match self {
            RawPayload::None => serde_json::Value::Null,
            RawPayload::Value(value) => value,
            RawPayload::Record { bins, .. } => bins
                .and_then(|bins| serde_json::to_value(bins).ok())
                .unwrap_or(serde_json::Value::Null),
            RawPayload::Batch(entries) => entries
                .and_then(|entries| serde_json::to_value(entries).ok())
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Completion of a point or batch operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReply {
    pub error: Option<RawError>,
    pub payload: RawPayload,
}

impl RawReply {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: RawPayload) -> Self {
        Self {
            error: None,
            payload,
        }
    }

    pub fn record(bins: Option<Bins>, meta: Option<RecordMetadata>) -> Self {
        Self::with_payload(RawPayload::Record {
            bins,
            meta,
            key: None,
        })
    }

    pub fn value(value: serde_json::Value) -> Self {
        Self::with_payload(RawPayload::Value(value))
    }

    pub fn batch(entries: Option<Vec<RawBatchEntry>>) -> Self {
        Self::with_payload(RawPayload::Batch(entries))
    }

    pub fn error(error: NativeError) -> Self {
        Self {
            error: Some(RawError::Native(error)),
            payload: RawPayload::None,
        }
    }
}

/// One delivery of a streaming operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStreamItem {
    pub error: Option<RawError>,
    pub bins: Option<Bins>,
    pub meta: Option<RecordMetadata>,
    pub key: Option<RawKey>,
    /// Resume point, carried by the end-of-stream terminator.
    pub state: Option<serde_json::Value>,
}

impl RawStreamItem {
    pub fn record(key: RawKey, bins: Bins, meta: RecordMetadata) -> Self {
        Self {
            bins: Some(bins),
            meta: Some(meta),
            key: Some(key),
            ..Default::default()
        }
    }

    pub fn end(state: serde_json::Value) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn error(error: NativeError) -> Self {
        Self {
            error: Some(RawError::Native(error)),
            ..Default::default()
        }
    }

    /// A successful delivery without bins terminates the stream.
    pub fn is_end(&self) -> bool {
        self.error.is_none() && self.bins.is_none()
    }
}

/// Answer to the transport after each streamed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Abort,
}

type StreamHandler = Box<dyn FnMut(RawStreamItem) -> StreamControl + Send>;

/// Per-item completion for streaming operations.
pub struct StreamSink {
    handler: StreamHandler,
}

impl StreamSink {
    pub fn new(handler: impl FnMut(RawStreamItem) -> StreamControl + Send + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Hand one item to the consumer side.
    pub fn deliver(&mut self, item: RawStreamItem) -> StreamControl {
        (self.handler)(item)
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_call_resolves_entry_point() {
        let key = Key::new("test", "demo", 1);
        let call = NativeCall::new(Operation::Get, vec![Arg::Key(key.clone()), Arg::Policy(None)]);
        assert_eq!(call.entry_point, "get_async");
        assert_eq!(call.key(), Some(&key));
        assert!(call.policy().is_none());
    }

    #[test]
    fn test_end_item_detection() {
        assert!(RawStreamItem::end(json!({"partitions": []})).is_end());
        let record = RawStreamItem::record(RawKey::default(), Bins::new(), RecordMetadata::default());
        assert!(!record.is_end());
    }

    #[test]
    fn test_first_value_passthrough() {
        assert_eq!(RawPayload::Value(json!(7)).into_first_value(), json!(7));
        assert_eq!(RawPayload::None.into_first_value(), serde_json::Value::Null);
        assert_eq!(RawPayload::Batch(None).into_first_value(), serde_json::Value::Null);
    }

    #[test]
    fn test_sink_reports_handler_answer() {
        let mut seen = 0;
        let mut sink = StreamSink::new(move |_| {
            seen += 1;
            if seen > 1 {
                StreamControl::Abort
            } else {
                StreamControl::Continue
            }
        });
        assert_eq!(sink.deliver(RawStreamItem::default()), StreamControl::Continue);
        assert_eq!(sink.deliver(RawStreamItem::default()), StreamControl::Abort);
    }
}
