use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::transport::RawPayload;

/// Passes the first raw completion value through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl ResultConverter for IdentityConverter {
    type Output = serde_json::Value;

    fn convert_result(&self, payload: RawPayload, _ctx: &ConvertContext) -> CommandResult<Self::Output> {
        Ok(payload.into_first_value())
    }
}
