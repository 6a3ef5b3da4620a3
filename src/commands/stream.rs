//! Query and scan: per-item completions feed a [`RecordStream`](crate::stream::RecordStream).

use async_trait::async_trait;
use tracing::debug;

use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::record::{Key, Record};
use crate::stream::StreamProducer;
use crate::transport::{NativeCall, RawPayload, RawReply, RawStreamItem, StreamControl, StreamSink, Transport};

/// A successfully delivered stream item.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Record(Record),
    /// Terminator, with the resume state if the transport sent one.
    End(Option<serde_json::Value>),
}

/// Convert an error-free delivery. A delivery without bins ends the stream.
pub fn convert_item(item: RawStreamItem) -> StreamItem {
    match item.bins {
        None => StreamItem::End(item.state),
        Some(bins) => {
            let key = Key::from_raw(item.key.unwrap_or_default());
            StreamItem::Record(Record::new(key, Some(bins), item.meta))
        }
    }
}

/// Forwards every transport delivery into a stream producer.
#[derive(Debug, Clone)]
pub struct StreamConverter {
    producer: StreamProducer,
}

impl StreamConverter {
    pub fn new(producer: StreamProducer) -> Self {
        Self { producer }
    }

    /// Handle one delivery; the answer tells the transport whether to go on.
    pub fn handle_item(producer: &StreamProducer, item: RawStreamItem, ctx: &ConvertContext) -> StreamControl {
        if producer.is_aborted() {
            return StreamControl::Abort;
        }
        let mut item = item;
        if let Some(error) = ctx.convert_error(item.error.take()) {
            return producer.fail(error);
        }
        match convert_item(item) {
            StreamItem::Record(record) => producer.data(record),
            StreamItem::End(state) => producer.end(state),
        }
    }
}

#[async_trait]
impl ResultConverter for StreamConverter {
    type Output = ();

    async fn invoke(&self, transport: &dyn Transport, call: NativeCall, ctx: &ConvertContext) -> RawReply {
        let producer = self.producer.clone();
        let sink_ctx = ctx.clone();
        let sink = StreamSink::new(move |item| Self::handle_item(&producer, item, &sink_ctx));

        transport.stream(call, sink).await;

        // Transport returned without a terminator
        if !self.producer.is_terminated() {
            debug!(operation = %ctx.operation(), "Stream finished without terminator, ending");
            self.producer.end(None);
        }
        RawReply::ok()
    }

    fn convert_result(&self, _payload: RawPayload, _ctx: &ConvertContext) -> CommandResult<Self::Output> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandRef, NativeError};
    use crate::operation::Operation;
    use crate::record::{Bins, RawKey, RecordMetadata};
    use crate::status::StatusCode;
    use crate::stream::{channel, StreamEvent, StreamStatus};
    use serde_json::json;

    fn ctx() -> ConvertContext {
        ConvertContext::new(
            CommandRef {
                operation: Operation::Scan,
                key: None,
            },
            None,
        )
    }

    fn raw_key(n: i64) -> RawKey {
        RawKey {
            ns: "test".to_string(),
            set: Some("demo".to_string()),
            key: Some(n.into()),
            digest: None,
        }
    }

    #[test]
    fn test_convert_item_shapes() {
        let end = convert_item(RawStreamItem::end(json!({"cursor": 7})));
        assert_eq!(end, StreamItem::End(Some(json!({"cursor": 7}))));

        let record = convert_item(RawStreamItem::record(raw_key(3), Bins::new(), RecordMetadata::new(1, 2)));
        match record {
            StreamItem::Record(record) => {
                assert_eq!(record.key, Key::new("test", "demo", 3));
                assert_eq!(record.gen, Some(2));
            }
            other => panic!("Expected record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_item_is_terminal() {
        let (producer, mut stream) = channel(Operation::Scan);
        let ctx = ctx();

        let item = RawStreamItem::error(NativeError::new(StatusCode::ERR_SERVER, "AS_ERR_SERVER"));
        assert_eq!(StreamConverter::handle_item(&producer, item, &ctx), StreamControl::Abort);
        let after = RawStreamItem::record(raw_key(1), Bins::new(), RecordMetadata::default());
        assert_eq!(StreamConverter::handle_item(&producer, after, &ctx), StreamControl::Abort);
        drop(producer);

        match stream.next_event().await {
            Some(StreamEvent::Error(error)) => {
                assert_eq!(error.code, StatusCode::ERR_SERVER);
                assert_eq!(error.message, StatusCode::ERR_SERVER.description());
            }
            other => panic!("Expected error event, got {other:?}"),
        }
        assert_eq!(stream.next_event().await, None);
        assert_eq!(stream.status(), StreamStatus::Errored);
    }

    #[test]
    fn test_success_code_error_is_not_an_error() {
        let (producer, _stream) = channel(Operation::Scan);
        let mut item = RawStreamItem::record(raw_key(1), Bins::new(), RecordMetadata::default());
        item.error = Some(NativeError::new(StatusCode::OK, "").into());
        assert_eq!(StreamConverter::handle_item(&producer, item, &ctx()), StreamControl::Continue);
    }
}
