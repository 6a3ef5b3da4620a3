//! Single-record commands through the client: argument order and conversion.

mod common;

use common::*;
use dispatch_core::error::NativeError;
use dispatch_core::policy::{BasePolicy, ReadPolicy, WritePolicy};
use dispatch_core::query::{BinOp, UdfCall};
use dispatch_core::transport::{Arg, RawReply};
use dispatch_core::{Bins, ClientConfig, ExistsOutcome, Key, Operation, Record, RecordMetadata, StatusCode};
use serde_json::json;

fn key() -> Key {
    Key::new("test", "users", 42)
}

fn bins() -> Bins {
    let mut bins = Bins::new();
    bins.insert("name".to_string(), json!("ada"));
    bins.insert("visits".to_string(), json!(3));
    bins
}

#[tokio::test]
async fn test_get_returns_record_with_metadata() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::record(Some(bins()), Some(RecordMetadata::new(3600, 7))));

    let record = client.get(key(), None).await.unwrap();
    assert_eq!(record, Record::new(key(), Some(bins()), Some(RecordMetadata::new(3600, 7))));

    let call = transport.last_call().unwrap();
    assert_eq!(call.entry_point, "get_async");
    assert_eq!(call.key(), Some(&key()));
    assert!(matches!(call.args[1], Arg::Policy(None)));
}

#[tokio::test]
async fn test_select_passes_bin_names() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::record(Some(bins()), None));

    client.select(key(), vec!["name".to_string()], None).await.unwrap();
    let call = transport.last_call().unwrap();
    assert_eq!(call.operation, Operation::Select);
    match &call.args[1] {
        Arg::BinNames(names) => assert_eq!(names, &vec!["name".to_string()]),
        other => panic!("Expected bin names, got {other:?}"),
    }
}

#[tokio::test]
async fn test_put_and_remove_resolve_to_key() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);

    let written = client.put(key(), bins(), Some(RecordMetadata::new(60, 0)), None).await.unwrap();
    assert_eq!(written, key());
    let removed = client.remove(key(), None).await.unwrap();
    assert_eq!(removed, key());
    assert_eq!(transport.operations(), vec![Operation::Put, Operation::Remove]);
}

#[tokio::test]
async fn test_exists_with_metadata_not_found_is_recast() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::error(NativeError::new(
        StatusCode::ERR_RECORD_NOT_FOUND,
        "AS_ERR_RECORD_NOT_FOUND",
    )));

    let outcome = client.exists_with_metadata(key(), None).await.unwrap();
    assert!(!outcome.exists());
    match outcome {
        ExistsOutcome::Record { record, found } => {
            assert!(!found);
            assert_eq!(record.key, key());
            assert!(record.bins.is_none());
            assert!(record.ttl.is_none());
            assert!(record.gen.is_none());
        }
        other => panic!("Expected record outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exists_with_metadata_keeps_metadata() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::record(None, Some(RecordMetadata::new(10, 2))));

    let outcome = client.exists_with_metadata(key(), None).await.unwrap();
    assert!(outcome.exists());
    assert_eq!(outcome.record().unwrap().gen, Some(2));
}

#[tokio::test]
async fn test_exists_success_without_metadata_is_found() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::ok());
    transport.push_reply(RawReply::error(NativeError::new(StatusCode::ERR_RECORD_NOT_FOUND, "")));

    let found = client.exists_with_metadata(key(), None).await.unwrap();
    let missing = client.exists_with_metadata(key(), None).await.unwrap();

    assert!(found.exists());
    assert!(!missing.exists());
    assert_ne!(found, missing);
}

#[tokio::test]
async fn test_exists_resolves_to_flag() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::record(None, Some(RecordMetadata::new(10, 2))));
    transport.push_reply(RawReply::error(NativeError::new(StatusCode::ERR_RECORD_NOT_FOUND, "")));

    assert_eq!(client.exists(key(), None).await.unwrap(), ExistsOutcome::Flag(true));
    assert_eq!(client.exists(key(), None).await.unwrap(), ExistsOutcome::Flag(false));

    // The key still reaches the transport
    let call = transport.last_call().unwrap();
    assert_eq!(call.operation, Operation::Exists);
    assert!(matches!(&call.args[0], Arg::Key(k) if *k == key()));
}

#[tokio::test]
async fn test_exists_other_error_propagates() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::error(NativeError::new(StatusCode::ERR_TIMEOUT, "").in_doubt(false)));

    let error = client.exists(key(), None).await.unwrap_err();
    assert_eq!(error.code, StatusCode::ERR_TIMEOUT);
}

#[tokio::test]
async fn test_operate_and_apply() {
    let transport = MockTransport::connected();
    let client = client_with(&transport);
    transport.push_reply(RawReply::record(Some(bins()), Some(RecordMetadata::new(0, 8))));
    transport.push_reply(RawReply::value(json!(99)));

    let record = client
        .operate(key(), vec![BinOp(json!({"op": "incr", "bin": "visits", "value": 1}))], None, None)
        .await
        .unwrap();
    assert_eq!(record.gen, Some(8));

    let value = client
        .apply(key(), UdfCall::new("counters", "bump").with_args(vec![json!(1)]), None)
        .await
        .unwrap();
    assert_eq!(value, json!(99));
    assert_eq!(transport.operations(), vec![Operation::Operate, Operation::Apply]);
}

#[tokio::test]
async fn test_policy_defaults_from_config() {
    let transport = MockTransport::connected();
    let mut config = ClientConfig::default();
    config.policies.total_timeout_ms = Some(2500);
    config.policies.max_retries = Some(4);
    let client = dispatch_core::Client::new(transport.clone(), config);

    let policy = ReadPolicy {
        base: BasePolicy::default().with_total_timeout(100),
    };
    client.get(key(), Some(policy)).await.unwrap_err();
    client.remove(key(), Some(WritePolicy::default())).await.unwrap();

    let calls = transport.calls();
    match calls[0].policy() {
        Some(dispatch_core::policy::Policy::Read(read)) => {
            assert_eq!(read.base.total_timeout_ms, Some(100));
            assert_eq!(read.base.max_retries, Some(4));
        }
        other => panic!("Expected read policy, got {other:?}"),
    }
    match calls[1].policy() {
        Some(dispatch_core::policy::Policy::Write(write)) => {
            assert_eq!(write.base.total_timeout_ms, Some(2500));
        }
        other => panic!("Expected write policy, got {other:?}"),
    }
}
