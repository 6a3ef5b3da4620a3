//! Scriptable in-memory transport for integration tests.

use async_trait::async_trait;
use dispatch_core::operation::Operation;
use dispatch_core::transport::{NativeCall, RawReply, RawStreamItem, StreamControl, StreamSink, Transport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// How a scripted stream ended on the transport side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every scripted item was delivered.
    Exhausted,
    /// The consumer answered abort to item number `produced`.
    Aborted { produced: usize },
}

#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    replies: Mutex<VecDeque<RawReply>>,
    streams: Mutex<VecDeque<Vec<RawStreamItem>>>,
    calls: Mutex<Vec<NativeCall>>,
    stream_outcomes: Mutex<Vec<StreamOutcome>>,
    stream_done: Notify,
}

impl MockTransport {
    pub fn connected() -> Arc<Self> {
        let transport = Self::default();
        transport.connected.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue the reply for the next point or batch call. Unscripted calls
    /// succeed with an empty payload.
    pub fn push_reply(&self, reply: RawReply) {
        self.replies.lock().push_back(reply);
    }

    /// Queue the items delivered by the next stream call.
    pub fn push_stream(&self, items: Vec<RawStreamItem>) {
        self.streams.lock().push_back(items);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<NativeCall> {
        self.calls.lock().last().cloned()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls.lock().iter().map(|call| call.operation).collect()
    }

    pub fn stream_outcomes(&self) -> Vec<StreamOutcome> {
        self.stream_outcomes.lock().clone()
    }

    /// Wait until a stream call has returned.
    pub async fn stream_finished(&self) {
        self.stream_done.notified().await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_name(&self) -> &'static str {
        "mock"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn call(&self, call: NativeCall) -> RawReply {
        self.calls.lock().push(call);
        let reply = self.replies.lock().pop_front();
        reply.unwrap_or_default()
    }

    async fn stream(&self, call: NativeCall, mut sink: StreamSink) {
        self.calls.lock().push(call);
        let items = self.streams.lock().pop_front().unwrap_or_default();

        let mut outcome = StreamOutcome::Exhausted;
        for (index, item) in items.into_iter().enumerate() {
            if sink.deliver(item) == StreamControl::Abort {
                outcome = StreamOutcome::Aborted { produced: index + 1 };
                break;
            }
            // Give the consumer a chance to run between items
            tokio::task::yield_now().await;
        }

        self.stream_outcomes.lock().push(outcome);
        self.stream_done.notify_one();
    }
}
