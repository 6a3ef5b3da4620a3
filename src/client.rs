//! # Client
//!
//! Entry point for issuing commands. A [`Client`] pairs a [`Transport`] with
//! configuration and a [`TransactionRegistry`], and builds one [`Command`] per
//! operation with the conversion strategy matching its completion.
//!
//! Cloning a client is cheap; clones share the transport, registry and
//! settings.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::batch::BatchRecord;
use crate::command::Command;
use crate::commands::{
    BackgroundConverter, BatchConverter, ExistsConverter, IdentityConverter, JobInfoConverter,
    ReadRecordConverter, StreamConverter, TxnAction, TxnConverter, WriteRecordConverter,
};
use crate::config::ClientConfig;
use crate::error::DispatchResult;
use crate::job::{next_job_id, Job};
use crate::logging;
use crate::operation::Operation;
use crate::policy::{
    ApplyPolicy, BatchPolicy, InfoPolicy, Policy, QueryPolicy, ReadPolicy, ScanPolicy, WritePolicy,
};
use crate::query::{BinOp, Query, UdfCall};
use crate::record::{Bins, Key, RecordMetadata};
use crate::stream::{self, RecordStream};
use crate::transaction::{Transaction, TransactionRegistry};
use crate::transport::{Arg, Transport};

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    registry: Arc<TransactionRegistry>,
    capture_stack_traces: AtomicBool,
}

/// Database client building and dispatching commands.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client with its own transaction registry configured from `config`.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let registry = TransactionRegistry::new(config.transactions.clone());
        Self::with_registry(transport, config, registry)
    }

    /// Client sharing an existing registry, e.g. [`TransactionRegistry::global`].
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        registry: Arc<TransactionRegistry>,
    ) -> Self {
        logging::init_with_config(&config.logging);
        info!(
            transport = transport.transport_name(),
            capture_stack_traces = config.client.capture_stack_traces,
            "Client created"
        );
        Self {
            inner: Arc::new(ClientInner {
                capture_stack_traces: AtomicBool::new(config.client.capture_stack_traces),
                transport,
                config,
                registry,
            }),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.inner.registry
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Read when a command is built; changing it affects later commands only.
    pub fn capture_stack_traces(&self) -> bool {
        self.inner.capture_stack_traces.load(Ordering::Relaxed)
    }

    pub fn set_capture_stack_traces(&self, enabled: bool) {
        self.inner.capture_stack_traces.store(enabled, Ordering::Relaxed);
    }

    fn policy<P: Into<Policy>>(&self, policy: Option<P>) -> Arg {
        Arg::Policy(policy.map(|p| p.into().with_defaults(&self.inner.config.policies)))
    }

    // Single record

    pub fn get(&self, key: Key, policy: Option<ReadPolicy>) -> Command<ReadRecordConverter> {
        Command::new(self, Operation::Get, vec![Arg::Key(key), self.policy(policy)], ReadRecordConverter)
    }

    pub fn select(&self, key: Key, bins: Vec<String>, policy: Option<ReadPolicy>) -> Command<ReadRecordConverter> {
        Command::new(
            self,
            Operation::Select,
            vec![Arg::Key(key), Arg::BinNames(bins), self.policy(policy)],
            ReadRecordConverter,
        )
    }

    /// Existence check resolving to [`ExistsOutcome::Flag`](crate::ExistsOutcome::Flag).
    pub fn exists(&self, key: Key, policy: Option<ReadPolicy>) -> Command<ExistsConverter> {
        Command::new(
            self,
            Operation::Exists,
            vec![Arg::Key(key), self.policy(policy)],
            ExistsConverter::flag(),
        )
    }

    /// Existence check resolving to a metadata-only record, found or not.
    pub fn exists_with_metadata(&self, key: Key, policy: Option<ReadPolicy>) -> Command<ExistsConverter> {
        Command::new(
            self,
            Operation::Exists,
            vec![Arg::Key(key.clone()), self.policy(policy)],
            ExistsConverter::keyed(key),
        )
    }

    pub fn put(
        &self,
        key: Key,
        bins: Bins,
        meta: Option<RecordMetadata>,
        policy: Option<WritePolicy>,
    ) -> Command<WriteRecordConverter> {
        Command::new(
            self,
            Operation::Put,
            vec![
                Arg::Key(key),
                Arg::Bins(bins),
                Arg::Metadata(meta.unwrap_or_default()),
                self.policy(policy),
            ],
            WriteRecordConverter,
        )
    }

    pub fn remove(&self, key: Key, policy: Option<WritePolicy>) -> Command<WriteRecordConverter> {
        Command::new(self, Operation::Remove, vec![Arg::Key(key), self.policy(policy)], WriteRecordConverter)
    }

    pub fn operate(
        &self,
        key: Key,
        ops: Vec<BinOp>,
        meta: Option<RecordMetadata>,
        policy: Option<WritePolicy>,
    ) -> Command<ReadRecordConverter> {
        Command::new(
            self,
            Operation::Operate,
            vec![
                Arg::Key(key),
                Arg::Ops(ops),
                Arg::Metadata(meta.unwrap_or_default()),
                self.policy(policy),
            ],
            ReadRecordConverter,
        )
    }

    pub fn apply(&self, key: Key, udf: UdfCall, policy: Option<ApplyPolicy>) -> Command<IdentityConverter> {
        Command::new(
            self,
            Operation::Apply,
            vec![Arg::Key(key), Arg::Udf(udf), self.policy(policy)],
            IdentityConverter,
        )
    }

    // Batch

    pub fn batch_get(&self, keys: Vec<Key>, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        Command::new(
            self,
            Operation::BatchGet,
            vec![Arg::Keys(keys), self.policy(policy)],
            BatchConverter::read_only(),
        )
    }

    pub fn batch_exists(&self, keys: Vec<Key>, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        Command::new(
            self,
            Operation::BatchExists,
            vec![Arg::Keys(keys), self.policy(policy)],
            BatchConverter::read_only(),
        )
    }

    pub fn batch_select(
        &self,
        keys: Vec<Key>,
        bins: Vec<String>,
        policy: Option<BatchPolicy>,
    ) -> Command<BatchConverter> {
        Command::new(
            self,
            Operation::BatchSelect,
            vec![Arg::Keys(keys), Arg::BinNames(bins), self.policy(policy)],
            BatchConverter::read_only(),
        )
    }

    pub fn batch_read(&self, records: Vec<BatchRecord>, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        let converter = BatchConverter::for_records(&records);
        Command::new(
            self,
            Operation::BatchRead,
            vec![Arg::BatchRecords(records), self.policy(policy)],
            converter,
        )
    }

    pub fn batch_write(&self, records: Vec<BatchRecord>, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        let converter = BatchConverter::for_records(&records);
        Command::new(
            self,
            Operation::BatchWrite,
            vec![Arg::BatchRecords(records), self.policy(policy)],
            converter,
        )
    }

    pub fn batch_apply(&self, keys: Vec<Key>, udf: UdfCall, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        Command::new(
            self,
            Operation::BatchApply,
            vec![Arg::Keys(keys), Arg::Udf(udf), self.policy(policy)],
            BatchConverter::all_writes(),
        )
    }

    pub fn batch_remove(&self, keys: Vec<Key>, policy: Option<BatchPolicy>) -> Command<BatchConverter> {
        Command::new(
            self,
            Operation::BatchRemove,
            vec![Arg::Keys(keys), self.policy(policy)],
            BatchConverter::all_writes(),
        )
    }

    // Query and scan

    /// Stream the records matching `query`. Must be called within a tokio runtime.
    #[track_caller]
    pub fn query(&self, query: Query, policy: Option<QueryPolicy>) -> RecordStream {
        let policy = self.policy(policy);
        self.stream(Operation::Query, query, policy)
    }

    /// Stream every record of a namespace/set. Must be called within a tokio runtime.
    #[track_caller]
    pub fn scan(&self, namespace: &str, set: Option<&str>, policy: Option<ScanPolicy>) -> RecordStream {
        let policy = self.policy(policy);
        self.stream(Operation::Scan, Query::new(namespace, set.map(str::to_string)), policy)
    }

    #[track_caller]
    fn stream(&self, operation: Operation, query: Query, policy: Arg) -> RecordStream {
        let (producer, stream) = stream::channel(operation);
        let args = vec![
            Arg::Namespace(query.namespace.clone()),
            Arg::Set(query.set.clone()),
            Arg::Query(query),
            policy,
        ];
        let dispatch = Command::new(self, operation, args, StreamConverter::new(producer.clone())).execute();

        tokio::spawn(async move {
            if let Err(error) = dispatch.await {
                producer.fail(error);
            }
        });
        stream
    }

    /// Run `query` on the server without streaming results.
    ///
    /// The job id is random unless supplied.
    pub fn query_background(
        &self,
        query: Query,
        policy: Option<WritePolicy>,
        job_id: Option<u64>,
    ) -> Command<BackgroundConverter> {
        self.background(Operation::QueryBackground, query, policy, job_id)
    }

    /// Apply `udf` to every record of a namespace/set on the server.
    pub fn scan_background(
        &self,
        namespace: &str,
        set: Option<&str>,
        udf: UdfCall,
        policy: Option<WritePolicy>,
        job_id: Option<u64>,
    ) -> Command<BackgroundConverter> {
        let query = Query::new(namespace, set.map(str::to_string)).with_udf(udf);
        self.background(Operation::ScanBackground, query, policy, job_id)
    }

    fn background(
        &self,
        operation: Operation,
        query: Query,
        policy: Option<WritePolicy>,
        job_id: Option<u64>,
    ) -> Command<BackgroundConverter> {
        let converter = BackgroundConverter::new(self, &query, job_id.unwrap_or_else(next_job_id));
        let policy = policy.map(|p| Policy::from(p).with_defaults(&self.inner.config.policies));
        let args = converter.args(query, policy);
        debug!(operation = %operation, job_id = converter.job_id(), "Building background command");
        Command::new(self, operation, args, converter)
    }

    pub fn job_info(&self, job_id: u64, module: &str, policy: Option<InfoPolicy>) -> Command<JobInfoConverter> {
        Job::new(self, job_id, module).info(policy)
    }

    // Administrative

    /// Remove records of a namespace/set last updated before `before_nanos`
    /// (0 removes all).
    pub fn truncate(
        &self,
        namespace: &str,
        set: Option<&str>,
        before_nanos: u64,
        policy: Option<InfoPolicy>,
    ) -> Command<IdentityConverter> {
        Command::new(
            self,
            Operation::Truncate,
            vec![
                Arg::Namespace(namespace.to_string()),
                Arg::Set(set.map(str::to_string)),
                Arg::Value(serde_json::Value::from(before_nanos)),
                self.policy(policy),
            ],
            IdentityConverter,
        )
    }

    /// Send an info request to any node.
    pub fn info_any(&self, request: &str, policy: Option<InfoPolicy>) -> Command<IdentityConverter> {
        Command::new(
            self,
            Operation::InfoAny,
            vec![Arg::Value(serde_json::Value::from(request)), self.policy(policy)],
            IdentityConverter,
        )
    }

    // Multi-record transactions

    /// Start a transaction registered with this client's registry.
    pub fn transaction(&self, reads_capacity: Option<i64>, writes_capacity: Option<i64>) -> DispatchResult<Transaction> {
        Transaction::new(&self.inner.registry, reads_capacity, writes_capacity)
    }

    pub fn commit(&self, txn: &Transaction) -> Command<TxnConverter> {
        self.finish(txn, Operation::TxnCommit, TxnAction::Commit)
    }

    pub fn abort(&self, txn: &Transaction) -> Command<TxnConverter> {
        self.finish(txn, Operation::TxnAbort, TxnAction::Abort)
    }

    fn finish(&self, txn: &Transaction, operation: Operation, action: TxnAction) -> Command<TxnConverter> {
        Command::new(
            self,
            operation,
            vec![Arg::TxnId(txn.id()), Arg::Policy(None)],
            TxnConverter::new(txn, action),
        )
    }

    /// Close every transaction still registered with this client's registry.
    pub fn close(&self) {
        let live = self.inner.registry.live_count();
        self.inner.registry.destroy_all();
        info!(closed_transactions = live, "Client closed");
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.inner.transport.transport_name())
            .field("connected", &self.is_connected())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
