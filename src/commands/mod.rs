//! # Conversion Strategies
//!
//! One [`ResultConverter`](crate::command::ResultConverter) per result shape.
//! The client pairs each operation with the strategy that understands its
//! completion.

pub mod background;
pub mod batch;
pub mod exists;
pub mod identity;
pub mod read;
pub mod stream;
pub mod txn;
pub mod write;

pub use background::{BackgroundConverter, JobInfoConverter};
pub use batch::BatchConverter;
pub use exists::{ExistsConverter, ExistsOutcome};
pub use identity::IdentityConverter;
pub use read::ReadRecordConverter;
pub use stream::{StreamConverter, StreamItem};
pub use txn::{TxnAction, TxnConverter, TxnOutcome};
pub use write::WriteRecordConverter;

use crate::command::ConvertContext;
use crate::error::CommandError;
use crate::status::StatusCode;
use crate::transport::RawPayload;

/// Error for a completion whose payload does not match the operation's shape.
pub(crate) fn unexpected_payload(ctx: &ConvertContext, payload: &RawPayload) -> CommandError {
    let mut error = CommandError::new(
        StatusCode::ERR_CLIENT,
        format!("Unexpected completion for {}: {payload:?}", ctx.operation()),
    );
    error.command = Some(ctx.command.clone());
    error
}
