//! Transaction commit and abort.
//!
//! Success moves the transaction to its final state and closes it. A commit
//! failure flagged in doubt marks the transaction in doubt and leaves it open
//! so the caller can retry or abort. Acting on an already closed transaction
//! never reaches the transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::{ConvertContext, ResultConverter};
use crate::error::{CommandError, CommandResult, DispatchError, RawError};
use crate::transaction::{Transaction, TxnState};
use crate::transport::{NativeCall, RawPayload, RawReply, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnAction {
    Commit,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnOutcome {
    Committed,
    Aborted,
    AlreadyCommitted,
    AlreadyAborted,
}

#[derive(Debug, Clone)]
pub struct TxnConverter {
    txn: Transaction,
    action: TxnAction,
}

impl TxnConverter {
    pub fn new(txn: &Transaction, action: TxnAction) -> Self {
        Self {
            txn: txn.clone(),
            action,
        }
    }

    /// Outcome for a transaction closed before this command ran.
    fn closed_outcome(&self, state: TxnState) -> Result<TxnOutcome, DispatchError> {
        match (self.action, state) {
            (TxnAction::Commit, TxnState::Committed) => Ok(TxnOutcome::AlreadyCommitted),
            (TxnAction::Abort, TxnState::Aborted) => Ok(TxnOutcome::AlreadyAborted),
            _ => Err(DispatchError::TransactionComplete { txn_id: self.txn.id() }),
        }
    }
}

#[async_trait]
impl ResultConverter for TxnConverter {
    type Output = TxnOutcome;

    async fn invoke(&self, transport: &dyn Transport, call: NativeCall, ctx: &ConvertContext) -> RawReply {
        if let Some(snapshot) = self.txn.snapshot() {
            debug!(txn_id = self.txn.id(), state = %snapshot.state, "Transaction already closed, skipping transport");
            return match self.closed_outcome(snapshot.state) {
                Ok(_) => RawReply::ok(),
                Err(error) => RawReply {
                    error: Some(RawError::Translated(ctx.dispatch_error(error))),
                    payload: RawPayload::None,
                },
            };
        }
        transport.call(call).await
    }

    fn convert_result(&self, _payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        if let Some(snapshot) = self.txn.snapshot() {
            return self.closed_outcome(snapshot.state).map_err(|error| ctx.dispatch_error(error));
        }

        let (state, outcome) = match self.action {
            TxnAction::Commit => (TxnState::Committed, TxnOutcome::Committed),
            TxnAction::Abort => (TxnState::Aborted, TxnOutcome::Aborted),
        };
        self.txn.set_state(state);
        self.txn.close();
        info!(txn_id = self.txn.id(), outcome = ?outcome, "Transaction finished");
        Ok(outcome)
    }

    fn convert_response(
        &self,
        error: Option<CommandError>,
        payload: RawPayload,
        ctx: &ConvertContext,
    ) -> CommandResult<Self::Output> {
        match error {
            Some(error) => {
                if error.in_doubt && self.action == TxnAction::Commit {
                    self.txn.mark_in_doubt();
                }
                Err(error)
            }
            None => self.convert_result(payload, ctx),
        }
    }
}
