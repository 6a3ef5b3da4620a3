//! Single-record reads: get, select and operate.

use crate::command::{ConvertContext, ResultConverter};
use crate::error::CommandResult;
use crate::record::{Key, Record};
use crate::transport::RawPayload;

use super::unexpected_payload;

/// Builds a [`Record`] from `(bins, metadata)`, keyed by the command's key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadRecordConverter;

impl ResultConverter for ReadRecordConverter {
    type Output = Record;

    fn convert_result(&self, payload: RawPayload, ctx: &ConvertContext) -> CommandResult<Self::Output> {
        match payload {
            RawPayload::Record { bins, meta, key } => {
                let key = match (ctx.key(), key) {
                    (Some(key), _) => key.clone(),
                    (None, Some(raw)) => Key::from_raw(raw),
                    (None, None) => return Err(unexpected_payload(ctx, &RawPayload::Record { bins, meta, key: None })),
                };
                Ok(Record::new(key, Some(bins.unwrap_or_default()), meta))
            }
            other => Err(unexpected_payload(ctx, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandRef;
    use crate::operation::Operation;
    use crate::record::{Bins, RecordMetadata};
    use crate::status::StatusCode;

    fn ctx(key: Option<Key>) -> ConvertContext {
        ConvertContext::new(
            CommandRef {
                operation: Operation::Get,
                key,
            },
            None,
        )
    }

    #[test]
    fn test_missing_bins_become_empty() {
        let key = Key::new("test", "demo", 9);
        let record = ReadRecordConverter
            .convert_result(
                RawPayload::Record {
                    bins: None,
                    meta: Some(RecordMetadata::new(0, 1)),
                    key: None,
                },
                &ctx(Some(key.clone())),
            )
            .unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.bins, Some(Bins::new()));
        assert_eq!(record.gen, Some(1));
    }

    #[test]
    fn test_wrong_shape_is_client_error() {
        let err = ReadRecordConverter
            .convert_result(RawPayload::Batch(None), &ctx(Some(Key::new("test", "demo", 1))))
            .unwrap_err();
        assert_eq!(err.code, StatusCode::ERR_CLIENT);
        assert!(err.message.contains("get_async"));
    }
}
