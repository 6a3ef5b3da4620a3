//! # Multi-Record Transactions
//!
//! A [`Transaction`] is a handle to a server-tracked group of reads and writes
//! that commit or abort together. Every transaction is registered with a
//! [`TransactionRegistry`] for its whole active life; the registry keeps a
//! running total of the read/write capacity reserved by live transactions and
//! can tear all of them down at once.
//!
//! Lifecycle: `new` (validate, reserve, register, begin native handle) →
//! referenced by command policies → `close` exactly once (snapshot, release
//! capacity, mark destroyed, drop native handle). Closing again is a no-op.
//! After close every getter answers from the snapshot.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TransactionConfig;
use crate::error::{DispatchError, DispatchResult};

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    /// Accepting reads and writes
    Open,
    /// Reads verified during commit, roll-forward pending
    Verified,
    /// Committed on the server
    Committed,
    /// Aborted on the server
    Aborted,
}

impl TxnState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Verified)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Verified => write!(f, "verified"),
            Self::Committed => write!(f, "committed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Values captured when a transaction is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnSnapshot {
    pub timeout: u32,
    pub in_doubt: bool,
    pub state: TxnState,
}

/// Live native transaction handle.
#[derive(Debug, Clone)]
struct NativeTxn {
    id: u64,
    timeout: u32,
    in_doubt: bool,
    state: TxnState,
}

impl NativeTxn {
    fn begin(timeout: u32) -> Self {
        Self {
            id: next_txn_id(),
            timeout,
            in_doubt: false,
            state: TxnState::Open,
        }
    }

    fn snapshot(&self) -> TxnSnapshot {
        TxnSnapshot {
            timeout: self.timeout,
            in_doubt: self.in_doubt,
            state: self.state,
        }
    }
}

// Non-zero 64-bit identifier.
fn next_txn_id() -> u64 {
    loop {
        let (high, _) = Uuid::new_v4().as_u64_pair();
        if high != 0 {
            return high;
        }
    }
}

#[derive(Debug)]
enum HandleState {
    Live(NativeTxn),
    Destroyed(TxnSnapshot),
}

struct TxnInner {
    slot: u64,
    id: u64,
    reads_capacity: u32,
    writes_capacity: u32,
    registry: Weak<TransactionRegistry>,
    handle: Mutex<HandleState>,
}

impl TxnInner {
    fn capacity(&self) -> u64 {
        u64::from(self.reads_capacity) + u64::from(self.writes_capacity)
    }
}

/// Handle to a multi-record transaction.
///
/// Cloning shares the same transaction; policies hold clones as references.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnInner>,
}

impl Transaction {
    /// Create and register a transaction.
    ///
    /// Explicit capacities must fit in an unsigned 32-bit count; omitted ones
    /// fall back to the registry defaults.
    pub fn new(
        registry: &Arc<TransactionRegistry>,
        reads_capacity: Option<i64>,
        writes_capacity: Option<i64>,
    ) -> DispatchResult<Self> {
        let defaults = registry.config();
        let reads = validate_capacity(reads_capacity, defaults.default_reads_capacity);
        let writes = validate_capacity(writes_capacity, defaults.default_writes_capacity);

        let (reads, writes) = match (reads, writes) {
            (Some(reads), Some(writes)) => (reads, writes),
            (reads, writes) => {
                let mut fields = Vec::new();
                if reads.is_none() {
                    fields.push("readsCapacity");
                }
                if writes.is_none() {
                    fields.push("writesCapacity");
                }
                return Err(DispatchError::invalid_fields(
                    fields,
                    "must be an integer between 0 and 4294967295",
                ));
            }
        };

        let timeout = defaults.default_timeout_secs;
        let inner = registry.register_with(u64::from(reads) + u64::from(writes), |slot| {
            let native = NativeTxn::begin(timeout);
            Arc::new(TxnInner {
                slot,
                id: native.id,
                reads_capacity: reads,
                writes_capacity: writes,
                registry: Arc::downgrade(registry),
                handle: Mutex::new(HandleState::Live(native)),
            })
        })?;

        info!(
            txn_id = inner.id,
            reads_capacity = reads,
            writes_capacity = writes,
            "Transaction created"
        );
        Ok(Self { inner })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn reads_capacity(&self) -> u32 {
        self.inner.reads_capacity
    }

    pub fn writes_capacity(&self) -> u32 {
        self.inner.writes_capacity
    }

    /// Capacity this transaction reserves in its registry.
    pub fn capacity(&self) -> u64 {
        self.inner.capacity()
    }

    pub fn in_doubt(&self) -> bool {
        self.read(|native| native.in_doubt, |snapshot| snapshot.in_doubt)
    }

    pub fn state(&self) -> TxnState {
        self.read(|native| native.state, |snapshot| snapshot.state)
    }

    /// Transaction deadline in seconds (0 = server default).
    pub fn timeout(&self) -> u32 {
        self.read(|native| native.timeout, |snapshot| snapshot.timeout)
    }

    pub fn set_timeout(&self, timeout: u32) -> DispatchResult<()> {
        match &mut *self.inner.handle.lock() {
            HandleState::Live(native) => {
                native.timeout = timeout;
                Ok(())
            }
            HandleState::Destroyed(_) => Err(DispatchError::TransactionComplete {
                txn_id: self.inner.id,
            }),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(&*self.inner.handle.lock(), HandleState::Destroyed(_))
    }

    /// Values captured at close, or `None` while the transaction is live.
    pub fn snapshot(&self) -> Option<TxnSnapshot> {
        match &*self.inner.handle.lock() {
            HandleState::Live(_) => None,
            HandleState::Destroyed(snapshot) => Some(*snapshot),
        }
    }

    /// Release the transaction. Only the first call has an effect.
    pub fn close(&self) {
        let mut handle = self.inner.handle.lock();
        let native = match &*handle {
            HandleState::Destroyed(_) => return,
            HandleState::Live(native) => native.clone(),
        };

        let snapshot = native.snapshot();
        match self.inner.registry.upgrade() {
            Some(registry) => registry.release(self.inner.slot, self.inner.capacity()),
            None => warn!(txn_id = self.inner.id, "Transaction registry dropped before close"),
        }
        *handle = HandleState::Destroyed(snapshot);
        drop(handle);
        drop(native);

        info!(txn_id = self.inner.id, state = %snapshot.state, in_doubt = snapshot.in_doubt, "Transaction closed");
    }

    pub(crate) fn set_state(&self, state: TxnState) {
        self.update(|native| native.state = state);
    }

    pub(crate) fn mark_in_doubt(&self) {
        self.update(|native| native.in_doubt = true);
    }

    fn read<T>(&self, live: impl FnOnce(&NativeTxn) -> T, closed: impl FnOnce(&TxnSnapshot) -> T) -> T {
        match &*self.inner.handle.lock() {
            HandleState::Live(native) => live(native),
            HandleState::Destroyed(snapshot) => closed(snapshot),
        }
    }

    // Updates after close are dropped; the snapshot is final.
    fn update(&self, apply: impl FnOnce(&mut NativeTxn)) {
        match &mut *self.inner.handle.lock() {
            HandleState::Live(native) => apply(native),
            HandleState::Destroyed(_) => {
                debug!(txn_id = self.inner.id, "Ignoring update to closed transaction")
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("reads_capacity", &self.inner.reads_capacity)
            .field("writes_capacity", &self.inner.writes_capacity)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn validate_capacity(value: Option<i64>, default: u32) -> Option<u32> {
    match value {
        None => Some(default),
        Some(value) => u32::try_from(value).ok(),
    }
}

#[derive(Default)]
struct RegistryState {
    live: HashMap<u64, Arc<TxnInner>>,
    reserved: u64,
    next_slot: u64,
}

/// Registry of every live transaction and the capacity they reserve.
///
/// Register, close and `destroy_all` are serialized by one mutex guarding both
/// the live set and the running total.
pub struct TransactionRegistry {
    config: TransactionConfig,
    state: Mutex<RegistryState>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<TransactionRegistry>> = OnceLock::new();

impl TransactionRegistry {
    pub fn new(config: TransactionConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(RegistryState::default()),
        })
    }

    /// Process-wide registry with default settings.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY
            .get_or_init(|| Self::new(TransactionConfig::default()))
            .clone()
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Sum of the capacities of all registered, non-destroyed transactions.
    pub fn reserved_capacity(&self) -> u64 {
        self.state.lock().reserved
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Live transactions, in no particular order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state
            .lock()
            .live
            .values()
            .map(|inner| Transaction {
                inner: Arc::clone(inner),
            })
            .collect()
    }

    /// Close every registered transaction.
    pub fn destroy_all(&self) {
        let transactions = self.transactions();
        let count = transactions.len();
        for txn in transactions {
            txn.close();
        }
        info!(closed = count, reserved = self.reserved_capacity(), "Destroyed all transactions");
    }

    fn register_with(
        &self,
        capacity: u64,
        build: impl FnOnce(u64) -> Arc<TxnInner>,
    ) -> DispatchResult<Arc<TxnInner>> {
        let mut state = self.state.lock();
        if let Some(budget) = self.config.max_reserved_capacity {
            if state.reserved + capacity > budget {
                return Err(DispatchError::CapacityExceeded {
                    requested: capacity,
                    reserved: state.reserved,
                    budget,
                });
            }
        }

        let slot = state.next_slot;
        state.next_slot += 1;
        let inner = build(slot);
        state.reserved += capacity;
        state.live.insert(slot, Arc::clone(&inner));
        debug!(slot, capacity, reserved = state.reserved, "Registered transaction");
        Ok(inner)
    }

    fn release(&self, slot: u64, capacity: u64) {
        let mut state = self.state.lock();
        if state.live.remove(&slot).is_some() {
            state.reserved = state.reserved.saturating_sub(capacity);
            debug!(slot, capacity, reserved = state.reserved, "Released transaction");
        } else {
            warn!(slot, "Release of unregistered transaction ignored");
        }
    }
}

impl fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TransactionRegistry")
            .field("live", &state.live.len())
            .field("reserved", &state.reserved)
            .finish()
    }
}
