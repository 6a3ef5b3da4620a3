#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatch Core
//!
//! Command dispatch core for a record database client.
//!
//! ## Overview
//!
//! Every logical operation (get, put, batch, query/scan, multi-record
//! transaction) becomes a [`Command`] that runs through one execution
//! protocol against a pluggable [`Transport`]:
//!
//! 1. Refuse to dispatch when a connection is required and missing.
//! 2. Optionally capture the call site for error stacks.
//! 3. Hand a [`NativeCall`](transport::NativeCall) to the transport.
//! 4. Translate the raw error (if any) into a [`CommandError`].
//! 5. Convert the raw payload with the command's
//!    [`ResultConverter`](command::ResultConverter) strategy.
//!
//! Commands complete exactly once, through a future (the default, and
//! `.await` works directly) or a callback that always runs after dispatch
//! has returned.
//!
//! ## Module Organization
//!
//! - [`command`] - Generic command, conversion trait and completion modes
//! - [`commands`] - Conversion strategies per result shape
//! - [`error`] - Error translation and client-side failures
//! - [`stream`] - Record streams with abort
//! - [`transaction`] - Multi-record transactions and their registry
//! - [`job`] - Background job handles
//! - [`client`] - Client façade
//! - [`config`] / [`logging`] - Ambient configuration and structured logging

pub mod batch;
pub mod client;
pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod operation;
pub mod policy;
pub mod query;
pub mod record;
pub mod status;
pub mod stream;
pub mod transaction;
pub mod transport;

pub use batch::{BatchRecord, BatchResult, BatchType};
pub use client::Client;
pub use command::{CallbackCommand, Command, Dispatch, ResultConverter};
pub use commands::{ExistsOutcome, TxnOutcome};
pub use crate::config::ClientConfig;
pub use error::{CommandError, CommandResult, DispatchError, DispatchResult};
pub use job::{Job, JobInfo, JobStatus};
pub use operation::Operation;
pub use record::{Bins, Key, Record, RecordMetadata};
pub use status::StatusCode;
pub use stream::{RecordStream, StreamEvent, StreamStatus};
pub use transaction::{Transaction, TransactionRegistry, TxnState};
pub use transport::Transport;
