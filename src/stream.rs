//! # Record Streams
//!
//! Query and scan results arrive as a [`RecordStream`]: a channel of
//! [`StreamEvent`]s guarded by a small state machine.
//!
//! ```text
//! Started ──data──▶ Data ──data──▶ Data
//!    │                │
//!    ├──end / error───┴──▶ Ended | Errored   (terminal)
//!    └──abort()──────────▶ Aborted           (terminal)
//! ```
//!
//! The transport side writes through a [`StreamProducer`]. Once the stream is
//! terminal nothing more is delivered, and after [`RecordStream::abort`] the
//! producer answers [`StreamControl::Abort`] on its next delivery. Abort is
//! cooperative: one in-flight item may still be produced, but it is dropped.

use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CommandError;
use crate::operation::Operation;
use crate::record::Record;
use crate::transport::StreamControl;

/// One event observed by a stream consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Data(Record),
    /// Terminal. The translated error that ended the stream.
    Error(CommandError),
    /// Terminal. Carries the resume state when the transport reports one.
    End(Option<serde_json::Value>),
}

/// Stream lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Started,
    Data,
    Ended,
    Errored,
    Aborted,
}

impl StreamStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Errored | Self::Aborted)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Data => write!(f, "data"),
            Self::Ended => write!(f, "ended"),
            Self::Errored => write!(f, "errored"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug)]
struct StreamShared {
    operation: Operation,
    status: Mutex<StreamStatus>,
    aborted: AtomicBool,
}

impl StreamShared {
    /// Move to `next` unless already terminal.
    fn transition(&self, next: StreamStatus) -> bool {
        let mut status = self.status.lock();
        if status.is_terminal() {
            return false;
        }
        *status = next;
        true
    }

    fn abort(&self) -> bool {
        self.aborted.store(true, Ordering::SeqCst);
        self.transition(StreamStatus::Aborted)
    }
}

/// Create a connected producer/consumer pair for `operation`.
pub fn channel(operation: Operation) -> (StreamProducer, RecordStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let shared = Arc::new(StreamShared {
        operation,
        status: Mutex::new(StreamStatus::Started),
        aborted: AtomicBool::new(false),
    });
    (
        StreamProducer {
            sender,
            shared: Arc::clone(&shared),
        },
        RecordStream { receiver, shared },
    )
}

/// Writing half of a record stream.
#[derive(Debug, Clone)]
pub struct StreamProducer {
    sender: mpsc::UnboundedSender<StreamEvent>,
    shared: Arc<StreamShared>,
}

impl StreamProducer {
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> StreamStatus {
        *self.shared.status.lock()
    }

    pub fn is_terminated(&self) -> bool {
        self.status().is_terminal()
    }

    /// Deliver a record.
    pub fn data(&self, record: Record) -> StreamControl {
        if self.is_aborted() || !self.shared.transition(StreamStatus::Data) {
            return StreamControl::Abort;
        }
        self.send(StreamEvent::Data(record))
    }

    /// Deliver the terminating error.
    pub fn fail(&self, error: CommandError) -> StreamControl {
        if self.is_aborted() || !self.shared.transition(StreamStatus::Errored) {
            return StreamControl::Abort;
        }
        debug!(operation = %self.shared.operation, code = %error.code, "Stream errored");
        self.send(StreamEvent::Error(error));
        StreamControl::Abort
    }

    /// Deliver the end-of-stream marker.
    pub fn end(&self, state: Option<serde_json::Value>) -> StreamControl {
        if self.is_aborted() || !self.shared.transition(StreamStatus::Ended) {
            return StreamControl::Abort;
        }
        debug!(operation = %self.shared.operation, "Stream ended");
        self.send(StreamEvent::End(state));
        StreamControl::Abort
    }

    fn send(&self, event: StreamEvent) -> StreamControl {
        match self.sender.send(event) {
            Ok(()) => StreamControl::Continue,
            Err(_) => {
                // Consumer is gone
                self.shared.abort();
                StreamControl::Abort
            }
        }
    }
}

/// Consuming half of a record stream.
///
/// Dropping the stream aborts it.
#[derive(Debug)]
pub struct RecordStream {
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
    shared: Arc<StreamShared>,
}

impl RecordStream {
    pub fn operation(&self) -> Operation {
        self.shared.operation
    }

    pub fn status(&self) -> StreamStatus {
        *self.shared.status.lock()
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }

    /// Next event, or `None` once the stream is exhausted or aborted.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.is_aborted() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Stop the stream. No further events are observed, and the producer is
    /// told to stop on its next delivery.
    pub fn abort(&mut self) {
        if self.shared.abort() {
            debug!(operation = %self.shared.operation, "Stream aborted by consumer");
        }
        self.receiver.close();
    }

    /// Drain every record until the stream ends, failing on a stream error.
    pub async fn collect_records(mut self) -> Result<Vec<Record>, CommandError> {
        let mut records = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Data(record) => records.push(record),
                StreamEvent::Error(error) => return Err(error),
                StreamEvent::End(_) => break,
            }
        }
        Ok(records)
    }
}

impl Stream for RecordStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_aborted() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.shared.abort();
    }
}
