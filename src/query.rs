//! # Query and Operation Values
//!
//! Secondary-index filters, bin operations and UDF calls are built elsewhere and
//! travel through this crate as opaque values. [`Query`] bundles them with the
//! namespace and set a query or scan targets.

use serde::{Deserialize, Serialize};

/// Opaque secondary-index predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(pub serde_json::Value);

/// Opaque bin operation (read, write, list/map operation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinOp(pub serde_json::Value);

/// A user-defined function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdfCall {
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl UdfCall {
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }
}

/// Query or scan definition.
///
/// A query without filters is executed as a scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    pub namespace: String,
    pub set: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub bins: Option<Vec<String>>,
    #[serde(default)]
    pub ops: Vec<BinOp>,
    pub udf: Option<UdfCall>,
    /// Resume position delivered by a previous stream's `End` event.
    pub partition_state: Option<serde_json::Value>,
}

impl Query {
    pub fn new(namespace: impl Into<String>, set: Option<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_udf(mut self, udf: UdfCall) -> Self {
        self.udf = Some(udf);
        self
    }

    pub fn with_ops(mut self, ops: Vec<BinOp>) -> Self {
        self.ops = ops;
        self
    }

    pub fn select(mut self, bins: Vec<String>) -> Self {
        self.bins = Some(bins);
        self
    }

    /// Continue from the state reported when a previous stream ended.
    pub fn resume_from(mut self, state: serde_json::Value) -> Self {
        self.partition_state = Some(state);
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }
}
