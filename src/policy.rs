//! # Command Policies
//!
//! Per-command policies passed through to the transport. Policies may reference
//! a [`Transaction`]; the reference is shared, never owning the transaction's
//! lifecycle.

use serde::{Deserialize, Serialize};

use crate::config::PolicyDefaults;
use crate::transaction::Transaction;

/// Settings shared by every policy kind.
#[derive(Debug, Clone, Default)]
pub struct BasePolicy {
    /// Total operation deadline enforced by the transport.
    pub total_timeout_ms: Option<u64>,

    /// Transport-level retry budget. This layer never retries on its own.
    pub max_retries: Option<u32>,

    /// Multi-record transaction this command participates in.
    pub txn: Option<Transaction>,
}

impl BasePolicy {
    pub fn with_txn(mut self, txn: &Transaction) -> Self {
        self.txn = Some(txn.clone());
        self
    }

    pub fn with_total_timeout(mut self, total_timeout_ms: u64) -> Self {
        self.total_timeout_ms = Some(total_timeout_ms);
        self
    }
}

/// Behavior of a write when the record already exists (or does not).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordExistsAction {
    #[default]
    Update,
    UpdateOnly,
    Replace,
    ReplaceOnly,
    CreateOnly,
}

#[derive(Debug, Clone, Default)]
pub struct ReadPolicy {
    pub base: BasePolicy,
}

#[derive(Debug, Clone, Default)]
pub struct WritePolicy {
    pub base: BasePolicy,
    pub exists: RecordExistsAction,
    /// Expected generation for check-and-set writes.
    pub generation: Option<u32>,
    pub durable_delete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyPolicy {
    pub base: BasePolicy,
}

#[derive(Debug, Clone, Default)]
pub struct BatchPolicy {
    pub base: BasePolicy,
    /// Ask the transport to keep going after a per-key failure.
    pub respond_all_keys: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QueryPolicy {
    pub base: BasePolicy,
    pub max_records: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanPolicy {
    pub base: BasePolicy,
    pub max_records: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct InfoPolicy {
    pub timeout_ms: Option<u64>,
}

/// Any policy, as carried in a command's argument list.
#[derive(Debug, Clone)]
pub enum Policy {
    Read(ReadPolicy),
    Write(WritePolicy),
    Apply(ApplyPolicy),
    Batch(BatchPolicy),
    Query(QueryPolicy),
    Scan(ScanPolicy),
    Info(InfoPolicy),
}

impl Policy {
    fn base(&self) -> Option<&BasePolicy> {
        match self {
            Policy::Read(p) => Some(&p.base),
            Policy::Write(p) => Some(&p.base),
            Policy::Apply(p) => Some(&p.base),
            Policy::Batch(p) => Some(&p.base),
            Policy::Query(p) => Some(&p.base),
            Policy::Scan(p) => Some(&p.base),
            Policy::Info(_) => None,
        }
    }

    fn base_mut(&mut self) -> Option<&mut BasePolicy> {
        match self {
            Policy::Read(p) => Some(&mut p.base),
            Policy::Write(p) => Some(&mut p.base),
            Policy::Apply(p) => Some(&mut p.base),
            Policy::Batch(p) => Some(&mut p.base),
            Policy::Query(p) => Some(&mut p.base),
            Policy::Scan(p) => Some(&mut p.base),
            Policy::Info(_) => None,
        }
    }

    /// Transaction referenced by this policy, if any.
    pub fn txn(&self) -> Option<&Transaction> {
        self.base().and_then(|base| base.txn.as_ref())
    }

    /// Fill unset timeout and retry values from configured defaults.
    pub fn with_defaults(mut self, defaults: &PolicyDefaults) -> Self {
        if let Some(base) = self.base_mut() {
            base.total_timeout_ms = base.total_timeout_ms.or(defaults.total_timeout_ms);
            base.max_retries = base.max_retries.or(defaults.max_retries);
        }
        self
    }
}

impl From<ReadPolicy> for Policy {
    fn from(policy: ReadPolicy) -> Self {
        Policy::Read(policy)
    }
}

impl From<WritePolicy> for Policy {
    fn from(policy: WritePolicy) -> Self {
        Policy::Write(policy)
    }
}

impl From<ApplyPolicy> for Policy {
    fn from(policy: ApplyPolicy) -> Self {
        Policy::Apply(policy)
    }
}

impl From<BatchPolicy> for Policy {
    fn from(policy: BatchPolicy) -> Self {
        Policy::Batch(policy)
    }
}

impl From<QueryPolicy> for Policy {
    fn from(policy: QueryPolicy) -> Self {
        Policy::Query(policy)
    }
}

impl From<ScanPolicy> for Policy {
    fn from(policy: ScanPolicy) -> Self {
        Policy::Scan(policy)
    }
}

impl From<InfoPolicy> for Policy {
    fn from(policy: InfoPolicy) -> Self {
        Policy::Info(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_only_unset_values() {
        let defaults = PolicyDefaults {
            total_timeout_ms: Some(1000),
            max_retries: Some(2),
        };
        let policy = Policy::from(ReadPolicy {
            base: BasePolicy::default().with_total_timeout(50),
        })
        .with_defaults(&defaults);

        match policy {
            Policy::Read(read) => {
                assert_eq!(read.base.total_timeout_ms, Some(50));
                assert_eq!(read.base.max_retries, Some(2));
            }
            other => panic!("Expected read policy, got {other:?}"),
        }
    }

    #[test]
    fn test_info_policy_has_no_base() {
        let policy = Policy::from(InfoPolicy::default()).with_defaults(&PolicyDefaults::default());
        assert!(policy.txn().is_none());
    }
}
