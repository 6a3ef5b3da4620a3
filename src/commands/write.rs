//! Single-record writes: put and remove resolve to the affected key.

use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::record::Key;
use crate::transport::RawPayload;

use super::unexpected_payload;

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteRecordConverter;

impl ResultConverter for WriteRecordConverter {
    type Output = Key;

    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        ctx.key()
            .cloned()
            .ok_or_else(|| unexpected_payload(ctx, &payload))
    }
}
